#![forbid(unsafe_code)]

mod error;
mod schema;
mod type_ext;

pub use error::SchemaError;
pub use schema::{
    Deprecation, MetaDirective, MetaEnumValue, MetaField, MetaInputValue, MetaType, Schema,
    TypeKind,
};
pub use type_ext::TypeExt;
