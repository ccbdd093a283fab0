use futures_util::StreamExt;
use graphflow_executor::{Executor, Request, ResolvedValue, Resolvers};
use serde_json::json;
use value::ConstValue;

mod common;

#[tokio::test]
async fn stream_without_schema_support_is_unknown() {
    let executor = Executor::new(common::schema_without_incremental_delivery())
        .resolvers(common::resolvers());
    let response = executor
        .execute(Request::new(
            r#"{ hero { friends @stream(initialCount: 0, label: "HeroFriends") { id name } } }"#,
        ))
        .await
        .into_single()
        .unwrap();

    assert!(response.data.is_none());
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "Unknown directive \"@stream\".");
    assert!(!response.errors[0].locations.is_empty());
}

#[tokio::test]
async fn streamed_items_carry_their_own_errors() {
    let executor = common::executor();
    let result = executor
        .execute(Request::new(
            r#"
            {
                hero {
                    friends @stream(initialCount: 0, label: "F") {
                        secretFriend {
                            name
                        }
                    }
                }
            }
            "#,
        ))
        .await;

    let payloads = common::without_locations(common::collect_payloads(result).await);
    assert_eq!(payloads.len(), 4);
    assert_eq!(
        payloads[0],
        json!({ "data": { "hero": { "friends": [] } }, "hasNext": true })
    );
    for (i, payload) in payloads[1..].iter().enumerate() {
        assert_eq!(
            *payload,
            json!({
                "data": { "secretFriend": null },
                "path": ["hero", "friends", i],
                "label": "F",
                "errors": [{
                    "message": "secretFriend is secret.",
                    "path": ["hero", "friends", i, "secretFriend"]
                }],
                "hasNext": i < 2
            })
        );
    }

    // The terminal flag appears exactly once, on the last payload.
    let terminal = payloads
        .iter()
        .filter(|payload| payload["hasNext"] == json!(false))
        .count();
    assert_eq!(terminal, 1);
    assert_eq!(payloads.last().unwrap()["hasNext"], json!(false));
}

fn failing_planets(items: Vec<anyhow::Result<ConstValue>>) -> Resolvers {
    let mut resolvers = Resolvers::default();
    let items = std::sync::Mutex::new(Some(items));
    resolvers.register("Query", "planets", move |_ctx| {
        let items = items.lock().unwrap().take().expect("planets resolved twice");
        async move { Ok(ResolvedValue::Stream(futures_util::stream::iter(items).boxed())) }
    });
    resolvers
}

#[tokio::test]
async fn iterator_failure_after_initial_count_ends_the_stream() {
    let executor = Executor::new(common::schema()).resolvers(failing_planets(vec![
        Ok(ConstValue::String("Tatooine".to_string())),
        Err(anyhow::anyhow!("planet database unavailable")),
    ]));
    let result = executor
        .execute(Request::new(
            r#"{ planets @stream(initialCount: 1, label: "p") }"#,
        ))
        .await;

    let payloads = common::without_locations(common::collect_payloads(result).await);
    assert_eq!(
        payloads,
        vec![
            json!({ "data": { "planets": ["Tatooine"] }, "hasNext": true }),
            json!({
                "data": null,
                "path": ["planets", 1],
                "label": "p",
                "errors": [{
                    "message": "planet database unavailable",
                    "path": ["planets", 1]
                }],
                "hasNext": false
            }),
        ]
    );
}

#[tokio::test]
async fn iterator_failure_during_initial_draw_nulls_the_field() {
    let executor = Executor::new(common::schema()).resolvers(failing_planets(vec![
        Ok(ConstValue::String("Tatooine".to_string())),
        Err(anyhow::anyhow!("planet database unavailable")),
    ]));
    let response = executor
        .execute(Request::new("{ planets @stream(initialCount: 2) }"))
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
            "data": { "planets": null },
            "errors": [{
                "message": "planet database unavailable",
                "path": ["planets"]
            }]
        })
    );
}

#[tokio::test]
async fn conflicting_stream_directives_fail_validation() {
    let executor = common::executor();
    let response = executor
        .execute(Request::new(
            r#"
            {
                hero {
                    friends @stream(initialCount: 1, label: "a") { id }
                    friends @stream(initialCount: 2, label: "b") { id }
                }
            }
            "#,
        ))
        .await
        .into_single()
        .unwrap();

    assert!(response.data.is_none());
    assert_eq!(response.errors.len(), 1);
    assert!(response.errors[0]
        .message
        .contains("differing stream directives"));
    assert_eq!(response.errors[0].locations.len(), 2);
}
