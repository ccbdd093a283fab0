#![allow(dead_code)]

use std::time::Duration;

use futures_util::StreamExt;
use graphflow_executor::{ExecutionResult, Executor, ResolvedValue, Resolvers, StreamingPayload};
use graphflow_schema::Schema;
use serde_json::json;
use value::ConstValue;

pub fn schema() -> Schema {
    Schema::parse(include_str!("../test.graphql"))
        .unwrap()
        .enable_incremental_delivery()
}

/// Same schema, but without `@defer`/`@stream` in the directive registry.
pub fn schema_without_incremental_delivery() -> Schema {
    Schema::parse(include_str!("../test.graphql")).unwrap()
}

pub fn hero() -> ConstValue {
    ConstValue::from_json(json!({
        "__typename": "Droid",
        "id": "2001",
        "name": "R2-D2",
        "primaryFunction": "Astromech",
        "friends": [
            { "__typename": "Human", "id": "1000", "name": "Luke Skywalker" },
            { "__typename": "Human", "id": "1002", "name": "Han Solo" },
            { "__typename": "Human", "id": "1003", "name": "Leia Organa" },
        ],
    }))
    .unwrap()
}

pub fn resolvers() -> Resolvers {
    let mut resolvers = Resolvers::default();
    resolvers.register("Query", "hero", |_ctx| async move {
        Ok(ResolvedValue::Value(hero()))
    });
    resolvers.register("Query", "human", |ctx| async move {
        let value = match ctx.arg("id") {
            Some(ConstValue::String(id)) if id == "1000" => ConstValue::from_json(json!({
                "__typename": "Human",
                "id": "1000",
                "name": "Luke Skywalker",
                "homePlanet": "Tatooine",
            }))
            .unwrap(),
            _ => ConstValue::Null,
        };
        Ok(ResolvedValue::Value(value))
    });
    resolvers.register("Droid", "slowName", |ctx| async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let name = match &ctx.source {
            ConstValue::Object(object) => object.get("name").cloned().unwrap_or(ConstValue::Null),
            _ => ConstValue::Null,
        };
        Ok(ResolvedValue::Value(name))
    });
    for type_name in ["Human", "Droid"] {
        resolvers.register(type_name, "secretFriend", |_ctx| async move {
            Err(anyhow::anyhow!("secretFriend is secret."))
        });
    }
    resolvers.register("Query", "planets", |_ctx| async move {
        Ok(ResolvedValue::Stream(
            futures_util::stream::iter(
                ["Tatooine", "Alderaan", "Hoth", "Dagobah"]
                    .map(|planet| Ok(ConstValue::String(planet.to_string()))),
            )
            .boxed(),
        ))
    });
    resolvers
}

pub fn executor() -> Executor {
    Executor::new(schema()).resolvers(resolvers())
}

/// Runs an incremental result to completion and returns every payload as
/// JSON, in emission order.
pub async fn collect_payloads(result: ExecutionResult) -> Vec<serde_json::Value> {
    match result {
        ExecutionResult::Incremental(stream) => {
            stream
                .collect::<Vec<StreamingPayload>>()
                .await
                .iter()
                .map(|payload| serde_json::to_value(payload).unwrap())
                .collect()
        }
        ExecutionResult::Single(_) => panic!("expected an incremental result"),
    }
}

/// Strips `locations` from every error so expectations stay independent of
/// query formatting.
pub fn without_locations(mut payloads: Vec<serde_json::Value>) -> Vec<serde_json::Value> {
    for payload in &mut payloads {
        if let Some(errors) = payload.get_mut("errors").and_then(|errors| errors.as_array_mut()) {
            for error in errors {
                if let Some(error) = error.as_object_mut() {
                    error.remove("locations");
                }
            }
        }
    }
    payloads
}
