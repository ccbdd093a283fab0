#![forbid(unsafe_code)]

mod collector;
mod directives;
mod dispatcher;
mod executor;
mod fields;
mod path;
mod request;
mod resolver;
mod response;
mod stream;

pub use executor::{ExecutionResult, Executor};
pub use path::PathSegment;
pub use request::Request;
pub use resolver::{ResolvedValue, ResolverContext, Resolvers};
pub use response::{IncrementalPayload, Response, ServerError, StreamingPayload};
