use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error(transparent)]
    Parse(#[from] parser::Error),

    #[error("The schema does not define a query root object type.")]
    MissingQueryRoot,
}
