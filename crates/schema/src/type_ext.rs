use parser::types::{BaseType, Type};

pub trait TypeExt {
    /// The named type behind any stack of list and non-null wrappers.
    fn concrete_typename(&self) -> &str;
}

impl TypeExt for Type {
    fn concrete_typename(&self) -> &str {
        match &self.base {
            BaseType::Named(name) => name.as_str(),
            BaseType::List(ty) => ty.concrete_typename(),
        }
    }
}
