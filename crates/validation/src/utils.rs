use std::collections::HashSet;
use std::fmt::{Display, Formatter, Result as FmtResult};

use graphflow_schema::{MetaType, Schema, TypeKind};
use parser::types::{BaseType, Type};
use value::ConstValue;

/// One step into an input value: an input-object field or a list index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPathSegment {
    Name(String),
    Index(usize),
}

/// A rejected input value: the path to the element the walk stopped at and
/// the reason it does not fit the expected type. The executor turns this
/// into a located error during variable coercion.
#[derive(Debug)]
pub struct InputValueError {
    pub path: Vec<InputPathSegment>,
    pub reason: String,
}

impl InputValueError {
    fn at(path: &[InputPathSegment], reason: String) -> Self {
        Self {
            path: path.to_vec(),
            reason,
        }
    }
}

impl Display for InputValueError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("\"")?;
        for (idx, segment) in self.path.iter().enumerate() {
            if idx > 0 {
                f.write_str(".")?;
            }
            match segment {
                InputPathSegment::Name(name) => write!(f, "{}", name)?,
                InputPathSegment::Index(index) => write!(f, "{}", index)?,
            }
        }
        write!(f, "\", {}", self.reason)
    }
}

/// Checks a constant input value against an input type. `None` means the
/// value fits; `name` roots the error path (the variable name during
/// variable coercion).
pub fn check_input_value(
    schema: &Schema,
    ty: &Type,
    value: &ConstValue,
    name: &str,
) -> Option<InputValueError> {
    let mut path = vec![InputPathSegment::Name(name.to_string())];
    check_type(schema, ty, value, &mut path)
}

fn check_type(
    schema: &Schema,
    ty: &Type,
    value: &ConstValue,
    path: &mut Vec<InputPathSegment>,
) -> Option<InputValueError> {
    if matches!(value, ConstValue::Null) {
        if ty.nullable {
            return None;
        }
        return Some(InputValueError::at(
            path,
            format!("expected type \"{}\"", ty),
        ));
    }

    match &ty.base {
        BaseType::List(element_ty) => match value {
            ConstValue::List(elements) => {
                for (idx, element) in elements.iter().enumerate() {
                    path.push(InputPathSegment::Index(idx));
                    let error = check_type(schema, element_ty, element, path);
                    path.pop();
                    if error.is_some() {
                        return error;
                    }
                }
                None
            }
            // A single value coerces to a one-element list.
            _ => check_type(schema, element_ty, value, path),
        },
        BaseType::Named(type_name) => {
            let meta_type = match schema.types.get(type_name.as_str()) {
                Some(meta_type) => meta_type,
                None => return None,
            };
            match meta_type.kind {
                TypeKind::Scalar => check_scalar(meta_type, value, path),
                TypeKind::Enum => check_enum(meta_type, value, path),
                TypeKind::InputObject => check_input_object(schema, meta_type, value, path),
                _ => None,
            }
        }
    }
}

fn check_scalar(
    meta_type: &MetaType,
    value: &ConstValue,
    path: &[InputPathSegment],
) -> Option<InputValueError> {
    let fits = match (meta_type.name.as_str(), value) {
        ("Int", ConstValue::Number(n)) => n.is_i64() || n.is_u64(),
        ("Float", ConstValue::Number(_)) => true,
        ("String", ConstValue::String(_)) => true,
        ("Boolean", ConstValue::Boolean(_)) => true,
        ("ID", ConstValue::String(_)) => true,
        ("ID", ConstValue::Number(n)) => n.is_i64() || n.is_u64(),
        ("Int" | "Float" | "String" | "Boolean" | "ID", _) => false,
        // Custom scalar, accepted as-is.
        _ => true,
    };
    if fits {
        None
    } else {
        Some(InputValueError::at(
            path,
            format!("expected type \"{}\"", meta_type.name),
        ))
    }
}

fn check_enum(
    meta_type: &MetaType,
    value: &ConstValue,
    path: &[InputPathSegment],
) -> Option<InputValueError> {
    let name = match value {
        ConstValue::Enum(name) => Some(name.as_str()),
        ConstValue::String(name) => Some(name.as_str()),
        _ => None,
    };
    match name {
        Some(name) if meta_type.enum_values.contains_key(name) => None,
        Some(name) => Some(InputValueError::at(
            path,
            format!(
                "enumeration type \"{}\" does not contain the value \"{}\"",
                meta_type.name, name
            ),
        )),
        None => Some(InputValueError::at(
            path,
            format!("expected type \"{}\"", meta_type.name),
        )),
    }
}

fn check_input_object(
    schema: &Schema,
    meta_type: &MetaType,
    value: &ConstValue,
    path: &mut Vec<InputPathSegment>,
) -> Option<InputValueError> {
    let values = match value {
        ConstValue::Object(values) => values,
        _ => {
            return Some(InputValueError::at(
                path,
                format!("expected type \"{}\"", meta_type.name),
            ))
        }
    };

    let mut unknown_fields = values.keys().collect::<HashSet<_>>();
    for field in meta_type.input_fields.values() {
        unknown_fields.remove(&field.name);
        match values.get(&field.name) {
            Some(field_value) => {
                path.push(InputPathSegment::Name(field.name.to_string()));
                let error = check_type(schema, &field.ty, field_value, path);
                path.pop();
                if error.is_some() {
                    return error;
                }
            }
            None => {
                if !field.ty.nullable && field.default_value.is_none() {
                    return Some(InputValueError::at(
                        path,
                        format!(
                            "field \"{}\" of type \"{}\" is required but not provided",
                            field.name, meta_type.name
                        ),
                    ));
                }
            }
        }
    }

    unknown_fields.iter().next().map(|name| {
        InputValueError::at(
            path,
            format!("unknown field \"{}\" of type \"{}\"", name, meta_type.name),
        )
    })
}
