use serde::{Deserialize, Serialize};

/// One segment of a response path: a field response key or a list index.
///
/// This is the owned form that appears on patches and located errors.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Name(String),
    Index(usize),
}

impl From<graphflow_validation::InputPathSegment> for PathSegment {
    fn from(segment: graphflow_validation::InputPathSegment) -> Self {
        match segment {
            graphflow_validation::InputPathSegment::Name(name) => PathSegment::Name(name),
            graphflow_validation::InputPathSegment::Index(index) => PathSegment::Index(index),
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub(crate) enum QueryPathSegment<'a> {
    Name(&'a str),
    Index(usize),
}

/// An immutable response-path node. Paths grow by prepending a new node on
/// the stack of the current walk; parents are shared, never mutated. The
/// linked shape is flattened only when a patch, workload, or error needs an
/// owned path.
#[derive(Debug, Copy, Clone)]
pub(crate) struct QueryPathNode<'a> {
    pub parent: Option<&'a QueryPathNode<'a>>,
    pub segment: QueryPathSegment<'a>,
}

impl<'a> QueryPathNode<'a> {
    pub fn append_to(&self, segments: &mut Vec<PathSegment>) {
        if let Some(parent) = self.parent {
            parent.append_to(segments);
        }
        segments.push(match self.segment {
            QueryPathSegment::Name(name) => PathSegment::Name(name.to_string()),
            QueryPathSegment::Index(idx) => PathSegment::Index(idx),
        });
    }

    pub fn to_segments(&self) -> Vec<PathSegment> {
        let mut segments = Vec::new();
        self.append_to(&mut segments);
        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_preserves_order() {
        let root = QueryPathNode {
            parent: None,
            segment: QueryPathSegment::Name("hero"),
        };
        let friends = QueryPathNode {
            parent: Some(&root),
            segment: QueryPathSegment::Name("friends"),
        };
        let second = QueryPathNode {
            parent: Some(&friends),
            segment: QueryPathSegment::Index(2),
        };
        assert_eq!(
            second.to_segments(),
            vec![
                PathSegment::Name("hero".to_string()),
                PathSegment::Name("friends".to_string()),
                PathSegment::Index(2),
            ]
        );
    }

    #[test]
    fn segments_serialize_untagged() {
        let segments = vec![PathSegment::Name("friends".to_string()), PathSegment::Index(0)];
        assert_eq!(
            serde_json::to_string(&segments).unwrap(),
            r#"["friends",0]"#
        );
    }
}
