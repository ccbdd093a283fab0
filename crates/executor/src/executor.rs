use std::sync::Arc;

use futures_util::stream::BoxStream;
use graphflow_schema::Schema;
use graphflow_validation::{check_input_value, check_rules};
use parser::types::{DocumentOperations, ExecutableDocument, OperationDefinition, OperationType};
use parser::Positioned;
use tracing::instrument;
use value::{ConstValue, Variables};

use crate::dispatcher::Dispatcher;
use crate::fields::execute_selection_sets;
use crate::path::{PathSegment, QueryPathNode};
use crate::request::Request;
use crate::resolver::Resolvers;
use crate::response::{Response, ServerError, StreamingPayload};

/// Shared, read-only state of one execution. Deferred and streamed workers
/// keep it alive for as long as the result sequence is being consumed.
pub(crate) struct OperationEnv {
    pub schema: Arc<Schema>,
    pub resolvers: Arc<Resolvers>,
    pub document: ExecutableDocument,
    pub variables: Variables,
    pub context_value: ConstValue,
}

/// One execution scope: the initial walk, a deferred fragment, or a
/// streamed element. Each scope owns its errors sink; errors raised while it
/// runs travel with its result (initial response or patch).
pub(crate) struct ExecContext {
    pub env: Arc<OperationEnv>,
    pub dispatcher: Dispatcher,
    pub errors: spin::Mutex<Vec<ServerError>>,
    pub base_path: Vec<PathSegment>,
}

impl ExecContext {
    pub fn add_error(&self, error: ServerError) {
        self.errors.lock().push(error);
    }

    pub fn take_errors(&self) -> Vec<ServerError> {
        std::mem::take(&mut *self.errors.lock())
    }

    /// Flattens a walk-relative path onto this scope's base path.
    pub fn full_path(&self, node: Option<&QueryPathNode<'_>>) -> Vec<PathSegment> {
        let mut path = self.base_path.clone();
        if let Some(node) = node {
            node.append_to(&mut path);
        }
        path
    }
}

/// What [`Executor::execute`] produces: a single response when no deferred
/// work was scheduled, otherwise the lazy payload sequence.
pub enum ExecutionResult {
    Single(Response),
    Incremental(BoxStream<'static, StreamingPayload>),
}

impl ExecutionResult {
    pub fn is_incremental(&self) -> bool {
        matches!(self, ExecutionResult::Incremental(_))
    }

    pub fn into_single(self) -> Option<Response> {
        match self {
            ExecutionResult::Single(response) => Some(response),
            ExecutionResult::Incremental(_) => None,
        }
    }
}

/// Top-level orchestrator: validates the request, selects the operation,
/// coerces variables, runs the initial walk, and decides between the
/// single-result and incremental response shapes.
pub struct Executor {
    schema: Arc<Schema>,
    resolvers: Arc<Resolvers>,
    root_value: ConstValue,
    context_value: ConstValue,
}

impl Executor {
    pub fn new(schema: impl Into<Arc<Schema>>) -> Self {
        Self {
            schema: schema.into(),
            resolvers: Arc::new(Resolvers::default()),
            root_value: ConstValue::Null,
            context_value: ConstValue::Null,
        }
    }

    pub fn resolvers(self, resolvers: Resolvers) -> Self {
        Self {
            resolvers: Arc::new(resolvers),
            ..self
        }
    }

    pub fn root_value(self, root_value: ConstValue) -> Self {
        Self { root_value, ..self }
    }

    pub fn context_value(self, context_value: ConstValue) -> Self {
        Self {
            context_value,
            ..self
        }
    }

    #[instrument(skip_all, level = "debug")]
    pub async fn execute(&self, request: Request) -> ExecutionResult {
        let document = match parser::parse_query(&request.query) {
            Ok(document) => document,
            Err(err) => {
                return ExecutionResult::Single(Response::from_errors(vec![ServerError::new(
                    err.to_string(),
                )]))
            }
        };

        let rule_errors = check_rules(&self.schema, &document, &request.variables);
        if !rule_errors.is_empty() {
            return ExecutionResult::Single(Response::from_errors(
                rule_errors.into_iter().map(Into::into).collect(),
            ));
        }

        let operation = match select_operation(&document, request.operation.as_deref()) {
            Ok(operation) => operation.clone(),
            Err(response) => return ExecutionResult::Single(response),
        };

        if operation.node.ty == OperationType::Subscription {
            return ExecutionResult::Single(Response::from_errors(vec![ServerError::new(
                "Subscription operations are not supported by this executor.",
            )]));
        }

        let variables = match coerce_variables(&self.schema, &operation.node, &request.variables) {
            Ok(variables) => variables,
            Err(errors) => return ExecutionResult::Single(Response::from_errors(errors)),
        };

        let root_type = match operation.node.ty {
            OperationType::Query => self.schema.type_by_name(self.schema.query_type()),
            OperationType::Mutation => self
                .schema
                .mutation_type()
                .and_then(|name| self.schema.type_by_name(name)),
            OperationType::Subscription => None,
        };
        let root_type = match root_type {
            Some(root_type) => root_type,
            None => {
                return ExecutionResult::Single(Response::from_errors(vec![ServerError::new(
                    "Schema is not configured for mutations.",
                )]))
            }
        };

        let env = Arc::new(OperationEnv {
            schema: self.schema.clone(),
            resolvers: self.resolvers.clone(),
            document,
            variables,
            context_value: self.context_value.clone(),
        });
        let (dispatcher, mut queue) = Dispatcher::new();
        let ctx = ExecContext {
            env,
            dispatcher,
            errors: Default::default(),
            base_path: Vec::new(),
        };

        // Mutations run their top-level field groups strictly in source
        // order; queries start them all at once.
        let ordered = operation.node.ty == OperationType::Mutation;
        let data = match execute_selection_sets(
            &ctx,
            root_type,
            &[&operation.node.selection_set.node],
            &self.root_value,
            None,
            ordered,
        )
        .await
        {
            Ok(value) => value,
            Err(error) => {
                ctx.add_error(error);
                ConstValue::Null
            }
        };
        let initial = Response {
            data: Some(data),
            errors: ctx.take_errors(),
        };

        match queue.try_take() {
            Some(first) => ExecutionResult::Incremental(queue.into_stream(first, initial)),
            None => ExecutionResult::Single(initial),
        }
    }
}

fn select_operation<'a>(
    document: &'a ExecutableDocument,
    operation_name: Option<&str>,
) -> Result<&'a Positioned<OperationDefinition>, Response> {
    match (&document.operations, operation_name) {
        (DocumentOperations::Single(operation), None) => Ok(operation),
        (DocumentOperations::Multiple(operations), None) => {
            let mut iter = operations.values();
            match (iter.next(), iter.next()) {
                (Some(operation), None) => Ok(operation),
                _ => Err(Response::from_errors(vec![ServerError::new(
                    "Must provide operation name if query contains multiple operations.",
                )])),
            }
        }
        (DocumentOperations::Single(_), Some(name)) => Err(unknown_operation(name)),
        (DocumentOperations::Multiple(operations), Some(name)) => {
            operations.get(name).ok_or_else(|| unknown_operation(name))
        }
    }
}

fn unknown_operation(name: &str) -> Response {
    Response::from_errors(vec![ServerError::new(format!(
        "Unknown operation named \"{}\".",
        name
    ))])
}

/// Coerces provided variable values against the operation's variable
/// definitions, applying defaults and reporting every failure.
fn coerce_variables(
    schema: &Schema,
    operation: &OperationDefinition,
    variables: &Variables,
) -> Result<Variables, Vec<ServerError>> {
    let mut coerced = Variables::default();
    let mut errors = Vec::new();

    for variable_definition in &operation.variable_definitions {
        let name = &variable_definition.node.name.node;
        let var_type = &variable_definition.node.var_type.node;
        let value = variables.get(name).cloned().or_else(|| {
            variable_definition
                .node
                .default_value
                .as_ref()
                .map(|default_value| default_value.node.clone())
        });
        match value {
            Some(value) => {
                if let Some(error) = check_input_value(schema, var_type, &value, name.as_str()) {
                    let message = format!("Invalid value for variable {}", error);
                    let path = error.path.into_iter().map(PathSegment::from).collect();
                    errors.push(
                        ServerError::new(message)
                            .locations(vec![variable_definition.pos])
                            .path(path),
                    );
                } else {
                    coerced.insert(name.clone(), value);
                }
            }
            None => {
                if !var_type.nullable {
                    errors.push(
                        ServerError::new(format!(
                            "Variable \"${}\" of required type \"{}\" was not provided.",
                            name, var_type
                        ))
                        .locations(vec![variable_definition.pos]),
                    );
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(coerced)
    } else {
        Err(errors)
    }
}
