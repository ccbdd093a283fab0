use std::fs;

use futures_util::StreamExt;
use globset::GlobBuilder;
use graphflow_executor::{ExecutionResult, Request, StreamingPayload};

mod common;

#[tokio::test]
async fn test() {
    let executor = common::executor();
    let glob = GlobBuilder::new("./tests/incremental/*.txt")
        .literal_separator(true)
        .build()
        .unwrap()
        .compile_matcher();

    for entry in fs::read_dir("./tests/incremental").unwrap() {
        let entry = entry.unwrap();
        if !glob.is_match(entry.path()) {
            continue;
        }

        println!("{}", entry.path().display());

        let data = fs::read_to_string(entry.path()).unwrap();
        let mut s = data.split("---");
        let mut n = 1;

        loop {
            println!("\tIndex: {}", n);
            let graphql = match s.next() {
                Some(graphql) if !graphql.trim().is_empty() => graphql,
                _ => break,
            };
            let expected: serde_json::Value = serde_json::from_str(s.next().unwrap()).unwrap();

            let actual = match executor.execute(Request::new(graphql)).await {
                ExecutionResult::Single(response) => serde_json::to_value(&response).unwrap(),
                ExecutionResult::Incremental(stream) => {
                    let payloads = stream.collect::<Vec<StreamingPayload>>().await;
                    serde_json::to_value(&payloads).unwrap()
                }
            };
            assert_eq!(actual, expected);

            n += 1;
        }
    }
}
