#![forbid(unsafe_code)]

#[cfg(test)]
#[macro_use]
mod test_harness;

mod error;
mod rules;
mod utils;
mod visitor;

pub use error::RuleError;
use graphflow_schema::Schema;
use parser::types::ExecutableDocument;
pub use utils::{check_input_value, InputPathSegment, InputValueError};
use value::Variables;
use visitor::{visit, Visitor, VisitorContext, VisitorNil};

macro_rules! rules {
    ($($rule:ident),*) => {
        VisitorNil$(.with(rules::$rule::default()))*
    };
}

pub fn check_rules(
    schema: &Schema,
    document: &ExecutableDocument,
    variables: &Variables,
) -> Vec<RuleError> {
    let mut ctx = VisitorContext::new(schema, document, variables);
    let mut visitor = rules!(KnownDirectives, ConflictingStreamDirectives);
    visit(&mut visitor, &mut ctx, document);
    ctx.errors
}
