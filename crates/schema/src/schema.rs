use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use parser::types::{
    self, ConstDirective, DirectiveDefinition, DirectiveLocation, EnumType, InputObjectType,
    InterfaceType, ObjectType, SchemaDefinition, ServiceDocument, Type, TypeDefinition,
    TypeSystemDefinition, UnionType,
};
use parser::Positioned;
use value::{ConstValue, Name};

use crate::error::SchemaError;
use crate::type_ext::TypeExt;

#[derive(Debug, Eq, PartialEq)]
pub enum Deprecation {
    NoDeprecated,
    Deprecated { reason: Option<String> },
}

#[derive(Debug, Eq, PartialEq)]
pub struct MetaField {
    pub description: Option<String>,
    pub name: Name,
    pub arguments: IndexMap<Name, MetaInputValue>,
    pub ty: Type,
    pub deprecation: Deprecation,
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
}

#[derive(Debug, Eq, PartialEq)]
pub struct MetaEnumValue {
    pub description: Option<String>,
    pub value: Name,
    pub deprecation: Deprecation,
}

#[derive(Debug, Eq, PartialEq)]
pub struct MetaInputValue {
    pub description: Option<String>,
    pub name: Name,
    pub ty: Type,
    pub default_value: Option<ConstValue>,
}

#[derive(Debug, Eq, PartialEq)]
pub struct MetaType {
    pub description: Option<String>,
    pub name: Name,
    pub kind: TypeKind,
    pub implements: IndexSet<Name>,
    pub fields: IndexMap<Name, MetaField>,
    pub possible_types: IndexSet<Name>,
    pub enum_values: IndexMap<Name, MetaEnumValue>,
    pub input_fields: IndexMap<Name, MetaInputValue>,
}

impl MetaType {
    #[inline]
    pub fn field_by_name(&self, name: &str) -> Option<&MetaField> {
        self.fields.get(name)
    }

    #[inline]
    pub fn is_abstract(&self) -> bool {
        matches!(self.kind, TypeKind::Interface | TypeKind::Union)
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, TypeKind::Enum | TypeKind::Scalar)
    }

    /// Whether a value of runtime type `type_name` can appear where this type
    /// is expected: equal object type, object implementing this interface, or
    /// object belonging to this union.
    #[inline]
    pub fn is_possible_type(&self, type_name: &str) -> bool {
        match self.kind {
            TypeKind::Interface | TypeKind::Union => self.possible_types.contains(type_name),
            TypeKind::Object => self.name == type_name,
            _ => false,
        }
    }

    /// Outbound coercion for scalar and enum leaves. Builtin scalars are
    /// checked for shape (with numeric IDs rendered as strings), custom
    /// scalars pass through, and enum values must belong to the type.
    pub fn serialize_leaf(&self, value: ConstValue) -> Result<ConstValue, String> {
        match self.kind {
            TypeKind::Scalar => match (self.name.as_str(), &value) {
                ("Int", ConstValue::Number(n)) if n.is_i64() || n.is_u64() => Ok(value),
                ("Float", ConstValue::Number(_)) => Ok(value),
                ("String", ConstValue::String(_)) => Ok(value),
                ("Boolean", ConstValue::Boolean(_)) => Ok(value),
                ("ID", ConstValue::String(_)) => Ok(value),
                ("ID", ConstValue::Number(n)) => Ok(ConstValue::String(n.to_string())),
                ("Int" | "Float" | "String" | "Boolean" | "ID", _) => Err(format!(
                    "Cannot represent value as type \"{}\": {}",
                    self.name, value
                )),
                _ => Ok(value),
            },
            TypeKind::Enum => {
                let name = match &value {
                    ConstValue::Enum(name) => Some(name.as_str()),
                    ConstValue::String(name) => Some(name.as_str()),
                    _ => None,
                };
                match name {
                    Some(name) if self.enum_values.contains_key(name) => {
                        Ok(ConstValue::String(name.to_string()))
                    }
                    _ => Err(format!(
                        "Enumeration type \"{}\" cannot represent value: {}",
                        self.name, value
                    )),
                }
            }
            _ => Ok(value),
        }
    }

}

#[derive(Debug)]
pub struct MetaDirective {
    pub name: Name,
    pub description: Option<String>,
    pub locations: Vec<DirectiveLocation>,
    pub arguments: IndexMap<Name, MetaInputValue>,
}

/// An executable schema: type and directive registries built from SDL.
///
/// `@defer` and `@stream` are not part of the registry by default; call
/// [`Schema::enable_incremental_delivery`] to install them. Documents using
/// them against a schema that did not are rejected by validation.
#[derive(Debug, Default)]
pub struct Schema {
    query_type: Option<Name>,
    mutation_type: Option<Name>,
    subscription_type: Option<Name>,
    pub types: HashMap<Name, MetaType>,
    pub directives: HashMap<Name, MetaDirective>,
}

impl Schema {
    pub fn parse(document: &str) -> Result<Schema, SchemaError> {
        Self::build(parser::parse_schema(document)?)
    }

    pub fn build(document: ServiceDocument) -> Result<Schema, SchemaError> {
        let mut schema = Schema::default();

        for definition in document.definitions.into_iter() {
            match definition {
                TypeSystemDefinition::Schema(schema_definition) => {
                    convert_schema_definition(&mut schema, schema_definition.node);
                }
                TypeSystemDefinition::Type(type_definition) => {
                    schema.types.insert(
                        type_definition.node.name.node.clone(),
                        convert_type_definition(type_definition.node),
                    );
                }
                TypeSystemDefinition::Directive(directive_definition) => {
                    schema.directives.insert(
                        directive_definition.node.name.node.clone(),
                        convert_directive_definition(directive_definition.node),
                    );
                }
            }
        }

        finish_schema(&mut schema);

        let has_query_root = matches!(
            schema.types.get(schema.query_type()),
            Some(ty) if ty.kind == TypeKind::Object
        );
        if has_query_root {
            Ok(schema)
        } else {
            Err(SchemaError::MissingQueryRoot)
        }
    }

    /// Installs the `@defer` and `@stream` directive definitions into the
    /// directive registry, enabling incremental delivery for documents
    /// validated against this schema.
    pub fn enable_incremental_delivery(mut self) -> Self {
        for definition in parser::parse_schema(include_str!("incremental.graphql"))
            .expect("invalid incremental delivery directives")
            .definitions
            .into_iter()
        {
            if let TypeSystemDefinition::Directive(directive_definition) = definition {
                self.directives.insert(
                    directive_definition.node.name.node.clone(),
                    convert_directive_definition(directive_definition.node),
                );
            }
        }
        self
    }

    #[inline]
    pub fn query_type(&self) -> &str {
        self.query_type
            .as_ref()
            .map(|name| name.as_str())
            .unwrap_or("Query")
    }

    #[inline]
    pub fn mutation_type(&self) -> Option<&str> {
        self.mutation_type
            .as_ref()
            .map(|name| name.as_str())
            .or_else(|| self.types.contains_key("Mutation").then_some("Mutation"))
    }

    #[inline]
    pub fn subscription_type(&self) -> Option<&str> {
        self.subscription_type
            .as_ref()
            .map(|name| name.as_str())
            .or_else(|| {
                self.types
                    .contains_key("Subscription")
                    .then_some("Subscription")
            })
    }

    /// Looks up the named type behind `ty`, stripping list and non-null
    /// wrappers.
    #[inline]
    pub fn get_type(&self, ty: &Type) -> Option<&MetaType> {
        self.types.get(ty.concrete_typename())
    }

    #[inline]
    pub fn type_by_name(&self, name: &str) -> Option<&MetaType> {
        self.types.get(name)
    }

    #[inline]
    pub fn directive_by_name(&self, name: &str) -> Option<&MetaDirective> {
        self.directives.get(name)
    }
}

fn get_argument_str<'a>(
    arguments: &'a [(Positioned<Name>, Positioned<ConstValue>)],
    name: &str,
) -> Option<Positioned<&'a str>> {
    arguments
        .iter()
        .find(|(arg_name, _)| arg_name.node.as_str() == name)
        .and_then(|(_, value)| match &value.node {
            ConstValue::String(s) => Some(Positioned::new(s.as_str(), value.pos)),
            _ => None,
        })
}

fn convert_schema_definition(schema: &mut Schema, schema_definition: SchemaDefinition) {
    schema.query_type = schema_definition.query.map(|name| name.node);
    schema.mutation_type = schema_definition.mutation.map(|name| name.node);
    schema.subscription_type = schema_definition.subscription.map(|name| name.node);
}

fn convert_type_definition(definition: TypeDefinition) -> MetaType {
    let mut type_definition = MetaType {
        description: definition.description.map(|description| description.node),
        name: definition.name.node.clone(),
        kind: TypeKind::Scalar,
        implements: Default::default(),
        fields: Default::default(),
        possible_types: Default::default(),
        enum_values: Default::default(),
        input_fields: Default::default(),
    };

    match definition.kind {
        types::TypeKind::Scalar => type_definition.kind = TypeKind::Scalar,
        types::TypeKind::Object(ObjectType { implements, fields }) => {
            type_definition.kind = TypeKind::Object;
            type_definition.implements = implements
                .into_iter()
                .map(|implement| implement.node)
                .collect();
            type_definition
                .fields
                .extend(fields.into_iter().map(|field| {
                    (
                        field.node.name.node.clone(),
                        convert_field_definition(field.node),
                    )
                }));
        }
        types::TypeKind::Interface(InterfaceType { implements, fields }) => {
            type_definition.kind = TypeKind::Interface;
            type_definition.implements = implements.into_iter().map(|name| name.node).collect();
            type_definition.fields = fields
                .into_iter()
                .map(|field| {
                    (
                        field.node.name.node.clone(),
                        convert_field_definition(field.node),
                    )
                })
                .collect();
        }
        types::TypeKind::Union(UnionType { members }) => {
            type_definition.kind = TypeKind::Union;
            type_definition.possible_types = members.into_iter().map(|name| name.node).collect();
        }
        types::TypeKind::Enum(EnumType { values }) => {
            type_definition.kind = TypeKind::Enum;
            type_definition
                .enum_values
                .extend(values.into_iter().map(|value| {
                    (
                        value.node.value.node.clone(),
                        MetaEnumValue {
                            description: value.node.description.map(|description| description.node),
                            value: value.node.value.node,
                            deprecation: get_deprecated(&value.node.directives),
                        },
                    )
                }));
        }
        types::TypeKind::InputObject(InputObjectType { fields }) => {
            type_definition.kind = TypeKind::InputObject;
            type_definition
                .input_fields
                .extend(fields.into_iter().map(|field| {
                    (
                        field.node.name.node.clone(),
                        convert_input_value_definition(field.node),
                    )
                }));
        }
    }

    type_definition
}

fn convert_field_definition(definition: types::FieldDefinition) -> MetaField {
    MetaField {
        description: definition.description.map(|description| description.node),
        name: definition.name.node,
        arguments: definition
            .arguments
            .into_iter()
            .map(|arg| {
                (
                    arg.node.name.node.clone(),
                    convert_input_value_definition(arg.node),
                )
            })
            .collect(),
        ty: definition.ty.node,
        deprecation: get_deprecated(&definition.directives),
    }
}

fn convert_input_value_definition(arg: parser::types::InputValueDefinition) -> MetaInputValue {
    MetaInputValue {
        description: arg.description.map(|description| description.node),
        name: arg.name.node,
        ty: arg.ty.node,
        default_value: arg.default_value.map(|default_value| default_value.node),
    }
}

fn convert_directive_definition(directive_definition: DirectiveDefinition) -> MetaDirective {
    MetaDirective {
        name: directive_definition.name.node,
        description: directive_definition
            .description
            .map(|directive_definition| directive_definition.node),
        locations: directive_definition
            .locations
            .into_iter()
            .map(|location| location.node)
            .collect(),
        arguments: directive_definition
            .arguments
            .into_iter()
            .map(|arg| {
                (
                    arg.node.name.node.clone(),
                    convert_input_value_definition(arg.node),
                )
            })
            .collect(),
    }
}

fn get_deprecated(directives: &[Positioned<ConstDirective>]) -> Deprecation {
    directives
        .iter()
        .find(|directive| directive.node.name.node.as_str() == "deprecated")
        .map(|directive| Deprecation::Deprecated {
            reason: get_argument_str(&directive.node.arguments, "reason")
                .map(|reason| reason.node.to_string()),
        })
        .unwrap_or(Deprecation::NoDeprecated)
}

fn finish_schema(schema: &mut Schema) {
    for definition in parser::parse_schema(include_str!("builtin.graphql"))
        .unwrap()
        .definitions
        .into_iter()
    {
        match definition {
            TypeSystemDefinition::Type(type_definition) => {
                let type_definition = convert_type_definition(type_definition.node);
                schema
                    .types
                    .entry(type_definition.name.clone())
                    .or_insert(type_definition);
            }
            TypeSystemDefinition::Directive(directive_definition) => {
                schema.directives.insert(
                    directive_definition.node.name.node.clone(),
                    convert_directive_definition(directive_definition.node),
                );
            }
            TypeSystemDefinition::Schema(_) => {}
        }
    }

    let mut possible_types: HashMap<Name, IndexSet<Name>> = Default::default();
    for ty in schema.types.values() {
        if ty.kind == TypeKind::Object {
            for implement in &ty.implements {
                possible_types
                    .entry(implement.clone())
                    .or_default()
                    .insert(ty.name.clone());
            }
        }
    }
    for (name, types) in possible_types {
        if let Some(ty) = schema.types.get_mut(&name) {
            ty.possible_types = types;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SDL: &str = r#"
        type Query {
            hero: Character
        }

        interface Character {
            id: ID!
            name: String!
        }

        type Droid implements Character {
            id: ID!
            name: String!
            primaryFunction: String
        }

        union SearchResult = Query | Droid
    "#;

    #[test]
    fn possible_types_are_wired() {
        let schema = Schema::parse(SDL).unwrap();
        let character = schema.type_by_name("Character").unwrap();
        assert!(character.is_possible_type("Droid"));
        assert!(!character.is_possible_type("Query"));

        let search = schema.type_by_name("SearchResult").unwrap();
        assert!(search.is_possible_type("Droid"));
    }

    #[test]
    fn incremental_directives_are_opt_in() {
        let schema = Schema::parse(SDL).unwrap();
        assert!(schema.directive_by_name("skip").is_some());
        assert!(schema.directive_by_name("include").is_some());
        assert!(schema.directive_by_name("defer").is_none());
        assert!(schema.directive_by_name("stream").is_none());

        let schema = schema.enable_incremental_delivery();
        assert!(schema.directive_by_name("defer").is_some());
        let stream = schema.directive_by_name("stream").unwrap();
        assert_eq!(
            stream.arguments.get("initialCount").unwrap().default_value,
            Some(ConstValue::from(0))
        );
    }

    #[test]
    fn missing_query_root_is_rejected() {
        assert!(matches!(
            Schema::parse("type Mutation { doIt: Int }"),
            Err(SchemaError::MissingQueryRoot)
        ));
    }
}
