use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::future::Future;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use indexmap::IndexMap;
use value::{ConstValue, Name};

/// A value produced by a field resolver.
pub enum ResolvedValue {
    /// An immediately available value.
    Value(ConstValue),
    /// A lazily produced sequence of list elements; the natural source for a
    /// `@stream`ed list field.
    Stream(BoxStream<'static, anyhow::Result<ConstValue>>),
}

impl From<ConstValue> for ResolvedValue {
    fn from(value: ConstValue) -> Self {
        ResolvedValue::Value(value)
    }
}

impl Debug for ResolvedValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ResolvedValue::Value(value) => f.debug_tuple("Value").field(value).finish(),
            ResolvedValue::Stream(_) => f.debug_tuple("Stream").finish(),
        }
    }
}

/// Everything a resolver gets to see: the parent source value, the coerced
/// argument values, and the opaque per-execution context value.
#[derive(Debug)]
pub struct ResolverContext {
    pub source: ConstValue,
    pub args: IndexMap<Name, ConstValue>,
    pub context: ConstValue,
}

impl ResolverContext {
    pub fn arg(&self, name: &str) -> Option<&ConstValue> {
        self.args.get(name)
    }
}

type BoxFieldResolver =
    Box<dyn Fn(ResolverContext) -> BoxFuture<'static, anyhow::Result<ResolvedValue>> + Send + Sync>;
type BoxTypeResolver = Box<dyn Fn(&ConstValue) -> BoxFuture<'static, Option<Name>> + Send + Sync>;

/// Registry of user-supplied resolvers, keyed by object type and field name.
///
/// Fields without a registered resolver fall back to the default resolver,
/// which reads the field name as a property of the source object. Abstract
/// types without a registered type resolver fall back to reading the
/// `__typename` property of the value.
#[derive(Default)]
pub struct Resolvers {
    fields: HashMap<(Name, Name), BoxFieldResolver>,
    types: HashMap<Name, BoxTypeResolver>,
    default_field: Option<BoxFieldResolver>,
    default_type: Option<BoxTypeResolver>,
}

impl Resolvers {
    pub fn register<F, Fut>(&mut self, type_name: &str, field_name: &str, resolver: F)
    where
        F: Fn(ResolverContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ResolvedValue>> + Send + 'static,
    {
        self.fields.insert(
            (Name::new(type_name), Name::new(field_name)),
            Box::new(move |ctx| Box::pin(resolver(ctx))),
        );
    }

    /// Registers the runtime-type resolver for an abstract type. Like field
    /// resolvers, type resolvers may be asynchronous; the returned future
    /// must not borrow the inspected value.
    pub fn register_type_resolver<F, Fut>(&mut self, type_name: &str, resolver: F)
    where
        F: Fn(&ConstValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Name>> + Send + 'static,
    {
        self.types.insert(
            Name::new(type_name),
            Box::new(move |value| Box::pin(resolver(value))),
        );
    }

    /// Replaces the property-reading fallback used for fields without a
    /// registered resolver.
    pub fn default_field_resolver<F, Fut>(&mut self, resolver: F)
    where
        F: Fn(ResolverContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ResolvedValue>> + Send + 'static,
    {
        self.default_field = Some(Box::new(move |ctx| Box::pin(resolver(ctx))));
    }

    /// Replaces the `__typename`-reading fallback used for abstract types
    /// without a registered type resolver.
    pub fn default_type_resolver<F, Fut>(&mut self, resolver: F)
    where
        F: Fn(&ConstValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Name>> + Send + 'static,
    {
        self.default_type = Some(Box::new(move |value| Box::pin(resolver(value))));
    }

    pub(crate) fn field_resolver(
        &self,
        type_name: &str,
        field_name: &str,
    ) -> Option<&BoxFieldResolver> {
        self.fields
            .get(&(Name::new(type_name), Name::new(field_name)))
            .or(self.default_field.as_ref())
    }

    /// Picks a runtime type name for a value of an abstract type. Registered
    /// resolvers may settle asynchronously; the `__typename` fallback is
    /// immediate.
    pub(crate) async fn resolve_type(
        &self,
        abstract_type: &str,
        value: &ConstValue,
    ) -> Option<Name> {
        if let Some(resolver) = self.types.get(abstract_type) {
            return resolver(value).await;
        }
        if let Some(resolver) = &self.default_type {
            return resolver(value).await;
        }
        default_resolve_type(value)
    }
}

impl Debug for Resolvers {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Resolvers")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish()
    }
}

pub(crate) fn default_resolve_field(source: &ConstValue, field_name: &str) -> ResolvedValue {
    match source {
        ConstValue::Object(object) => {
            ResolvedValue::Value(object.get(field_name).cloned().unwrap_or(ConstValue::Null))
        }
        _ => ResolvedValue::Value(ConstValue::Null),
    }
}

fn default_resolve_type(value: &ConstValue) -> Option<Name> {
    match value {
        ConstValue::Object(object) => match object.get("__typename") {
            Some(ConstValue::String(name)) => Some(Name::new(name)),
            _ => None,
        },
        _ => None,
    }
}
