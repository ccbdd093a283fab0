use std::sync::Arc;

use parser::Pos;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use value::ConstValue;

use crate::path::PathSegment;

/// A located execution error: message, AST source locations, and the
/// response path at which it surfaced. The original resolver error, if any,
/// is retained for programmatic inspection but never serialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerError {
    pub message: String,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub locations: Vec<Pos>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub path: Vec<PathSegment>,

    #[serde(skip)]
    pub source: Option<Arc<anyhow::Error>>,
}

impl ServerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: Vec::new(),
            source: None,
        }
    }

    pub fn locations(self, locations: Vec<Pos>) -> Self {
        Self { locations, ..self }
    }

    pub fn path(self, path: Vec<PathSegment>) -> Self {
        Self { path, ..self }
    }

    /// Wraps a resolver error into a located error, keeping the original as
    /// the unserialized cause.
    pub fn from_resolver_error(
        error: anyhow::Error,
        locations: Vec<Pos>,
        path: Vec<PathSegment>,
    ) -> Self {
        Self {
            message: error.to_string(),
            locations,
            path,
            source: Some(Arc::new(error)),
        }
    }
}

impl From<graphflow_validation::RuleError> for ServerError {
    fn from(err: graphflow_validation::RuleError) -> Self {
        Self {
            message: err.message,
            locations: err.locations,
            path: Vec::new(),
            source: None,
        }
    }
}

/// A complete (non-incremental) execution result. `data` is absent only when
/// execution failed before any field was resolved.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<ConstValue>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<ServerError>,
}

impl Response {
    pub fn from_errors(errors: Vec<ServerError>) -> Self {
        Self { data: None, errors }
    }
}

/// One incremental delivery unit: a deferred fragment's data, a streamed
/// list element, or the closing marker of an async-iterated stream (which
/// carries neither `data` nor `path`).
#[derive(Debug)]
pub struct IncrementalPayload {
    pub data: Option<ConstValue>,
    pub path: Option<Vec<PathSegment>>,
    pub label: Option<String>,
    pub errors: Vec<ServerError>,
    pub has_next: bool,
}

impl Serialize for IncrementalPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(data) = &self.data {
            map.serialize_entry("data", data)?;
        }
        if let Some(path) = &self.path {
            map.serialize_entry("path", path)?;
        }
        if let Some(label) = &self.label {
            map.serialize_entry("label", label)?;
        }
        if !self.errors.is_empty() {
            map.serialize_entry("errors", &self.errors)?;
        }
        map.serialize_entry("hasNext", &self.has_next)?;
        map.end()
    }
}

/// An element of the lazy result sequence produced by an incremental
/// execution: the initial result first, then one payload per patch, in
/// completion order. `has_next` is false exactly on the final element.
#[derive(Debug)]
pub enum StreamingPayload {
    Initial {
        data: Option<ConstValue>,
        errors: Vec<ServerError>,
        has_next: bool,
    },
    Incremental(IncrementalPayload),
}

impl Serialize for StreamingPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StreamingPayload::Initial {
                data,
                errors,
                has_next,
            } => {
                let mut map = serializer.serialize_map(None)?;
                if let Some(data) = data {
                    map.serialize_entry("data", data)?;
                }
                if !errors.is_empty() {
                    map.serialize_entry("errors", errors)?;
                }
                map.serialize_entry("hasNext", has_next)?;
                map.end()
            }
            StreamingPayload::Incremental(payload) => payload.serialize(serializer),
        }
    }
}
