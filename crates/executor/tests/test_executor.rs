use std::sync::{Arc, Mutex};
use std::time::Duration;

use graphflow_executor::{Executor, Request, ResolvedValue, Resolvers};
use serde_json::json;
use value::{ConstValue, Name, Variables};

mod common;

#[tokio::test]
async fn uses_inline_operation_if_no_name_provided() {
    let response = common::executor()
        .execute(Request::new("{ hero { id } }"))
        .await
        .into_single()
        .unwrap();
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({ "data": { "hero": { "id": "2001" } } })
    );
}

#[tokio::test]
async fn uses_only_named_operation() {
    let response = common::executor()
        .execute(Request::new("query Example { hero { id } }"))
        .await
        .into_single()
        .unwrap();
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({ "data": { "hero": { "id": "2001" } } })
    );
}

#[tokio::test]
async fn uses_named_operation_if_name_provided() {
    let response = common::executor()
        .execute(
            Request::new("query Example { hero { id } } query OtherExample { hero { name } }")
                .operation("OtherExample"),
        )
        .await
        .into_single()
        .unwrap();
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({ "data": { "hero": { "name": "R2-D2" } } })
    );
}

#[tokio::test]
async fn error_if_multiple_operations_provided_but_no_name() {
    let response = common::executor()
        .execute(Request::new(
            "query Example { hero { id } } query OtherExample { hero { name } }",
        ))
        .await
        .into_single()
        .unwrap();
    assert!(response.data.is_none());
    assert_eq!(
        response.errors[0].message,
        "Must provide operation name if query contains multiple operations."
    );
}

#[tokio::test]
async fn error_if_unknown_operation_name_provided() {
    let response = common::executor()
        .execute(
            Request::new("query Example { hero { id } } query OtherExample { hero { name } }")
                .operation("UnknownExample"),
        )
        .await
        .into_single()
        .unwrap();
    assert!(response.data.is_none());
    assert_eq!(
        response.errors[0].message,
        "Unknown operation named \"UnknownExample\"."
    );
}

#[tokio::test]
async fn subscriptions_are_rejected() {
    let response = common::executor()
        .execute(Request::new("subscription { hero { id } }"))
        .await
        .into_single()
        .unwrap();
    assert!(response.data.is_none());
    assert_eq!(
        response.errors[0].message,
        "Subscription operations are not supported by this executor."
    );
}

#[tokio::test]
async fn required_variable_must_be_provided() {
    let response = common::executor()
        .execute(Request::new("query ($id: ID!) { human(id: $id) { name } }"))
        .await
        .into_single()
        .unwrap();
    assert!(response.data.is_none());
    assert_eq!(
        response.errors[0].message,
        "Variable \"$id\" of required type \"ID!\" was not provided."
    );
}

#[tokio::test]
async fn invalid_variable_values_are_rejected() {
    let response = common::executor()
        .execute(
            Request::new("query ($episode: Int) { hero(episode: $episode) { id } }")
                .variables(Variables::from_json(json!({ "episode": "not a number" }))),
        )
        .await
        .into_single()
        .unwrap();
    assert!(response.data.is_none());
    assert!(response.errors[0]
        .message
        .starts_with("Invalid value for variable"));
    assert_eq!(
        serde_json::to_value(&response.errors[0].path).unwrap(),
        json!(["episode"])
    );
}

#[tokio::test]
async fn variable_defaults_apply() {
    let response = common::executor()
        .execute(Request::new(
            r#"query ($id: ID = "1000") { human(id: $id) { name homePlanet } }"#,
        ))
        .await
        .into_single()
        .unwrap();
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({ "data": { "human": { "name": "Luke Skywalker", "homePlanet": "Tatooine" } } })
    );
}

fn logging_resolvers(log: &Arc<Mutex<Vec<&'static str>>>) -> Resolvers {
    let mut resolvers = Resolvers::default();
    {
        let log = log.clone();
        resolvers.register("Mutation", "first", move |_ctx| {
            let log = log.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                log.lock().unwrap().push("first");
                Ok(ResolvedValue::Value(ConstValue::from(1)))
            }
        });
    }
    {
        let log = log.clone();
        resolvers.register("Mutation", "second", move |_ctx| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push("second");
                Ok(ResolvedValue::Value(ConstValue::from(2)))
            }
        });
    }
    {
        let log = log.clone();
        resolvers.register("Query", "slow", move |_ctx| {
            let log = log.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                log.lock().unwrap().push("slow");
                Ok(ResolvedValue::Value(ConstValue::String("slow".to_string())))
            }
        });
    }
    {
        let log = log.clone();
        resolvers.register("Query", "fast", move |_ctx| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push("fast");
                Ok(ResolvedValue::Value(ConstValue::String("fast".to_string())))
            }
        });
    }
    resolvers
}

#[tokio::test]
async fn mutation_fields_run_strictly_in_source_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let executor = Executor::new(common::schema()).resolvers(logging_resolvers(&log));
    let response = executor
        .execute(Request::new("mutation { first second }"))
        .await
        .into_single()
        .unwrap();

    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({ "data": { "first": 1, "second": 2 } })
    );
    assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
}

#[tokio::test]
async fn query_fields_run_concurrently() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let executor = Executor::new(common::schema()).resolvers(logging_resolvers(&log));
    let response = executor
        .execute(Request::new("{ slow fast }"))
        .await
        .into_single()
        .unwrap();

    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({ "data": { "slow": "slow", "fast": "fast" } })
    );
    assert_eq!(*log.lock().unwrap(), vec!["fast", "slow"]);
}

#[tokio::test]
async fn custom_type_resolvers_pick_the_runtime_type() {
    let mut resolvers = Resolvers::default();
    resolvers.register("Query", "hero", |_ctx| async move {
        // No __typename on the source; the type resolver decides.
        Ok(ResolvedValue::Value(
            ConstValue::from_json(json!({
                "id": "2001",
                "name": "R2-D2",
                "primaryFunction": "Astromech",
            }))
            .unwrap(),
        ))
    });
    resolvers.register_type_resolver("Character", |value: &ConstValue| {
        let type_name = match value {
            ConstValue::Object(object) if object.contains_key("primaryFunction") => {
                Name::new("Droid")
            }
            _ => Name::new("Human"),
        };
        async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Some(type_name)
        }
    });
    let executor = Executor::new(common::schema()).resolvers(resolvers);
    let response = executor
        .execute(Request::new(
            "{ hero { __typename name ... on Droid { primaryFunction } } }",
        ))
        .await
        .into_single()
        .unwrap();

    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({
            "data": {
                "hero": {
                    "__typename": "Droid",
                    "name": "R2-D2",
                    "primaryFunction": "Astromech"
                }
            }
        })
    );
}

#[tokio::test]
async fn default_field_resolver_override_applies() {
    let mut resolvers = Resolvers::default();
    resolvers.default_field_resolver(|_ctx| async move {
        Ok(ResolvedValue::Value(ConstValue::String(
            "overridden".to_string(),
        )))
    });
    let executor = Executor::new(common::schema()).resolvers(resolvers);
    let response = executor
        .execute(Request::new("{ fast slow }"))
        .await
        .into_single()
        .unwrap();

    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({ "data": { "fast": "overridden", "slow": "overridden" } })
    );
}

#[tokio::test]
async fn non_null_errors_propagate_to_the_nearest_nullable_ancestor() {
    let mut resolvers = common::resolvers();
    resolvers.register("Droid", "name", |_ctx| async move {
        Ok(ResolvedValue::Value(ConstValue::Null))
    });
    let executor = Executor::new(common::schema()).resolvers(resolvers);
    let response = executor
        .execute(Request::new("{ hero { id name } }"))
        .await
        .into_single()
        .unwrap();

    let mut actual = serde_json::to_value(&response).unwrap();
    actual["errors"][0]
        .as_object_mut()
        .unwrap()
        .remove("locations");
    assert_eq!(
        actual,
        json!({
            "data": { "hero": null },
            "errors": [{
                "message": "Cannot return null for non-nullable field Droid.name.",
                "path": ["hero", "name"]
            }]
        })
    );
}
