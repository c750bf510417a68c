//! Mocked tests for running many queries through the bounded worker pool

mod common;

use std::time::Duration;

use common::{create_mock_client, esearch_body, esummary_body};
use eutils_retrieval::{Database, RetrievalError, run, run_collecting};
use tracing_test::traced_test;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const QUERIES: [&str; 5] = [
    "(\"pacemaker\") AND (\"infection\")",
    "(\"stent\") AND (\"thrombosis\")",
    "(\"broken\") AND (\"query\")",
    "(\"insulin pump\") AND (\"recall\")",
    "(\"catheter\") AND (\"sepsis\")",
];

async fn mount_happy_path(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(esearch_body(2)))
        .with_priority(5)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/esummary.fcgi"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(esummary_body(Database::Pmc, &[11, 12])),
        )
        .mount(server)
        .await;
}

async fn mount_broken_query(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/esearch.fcgi"))
        .and(body_string_contains("broken"))
        .respond_with(ResponseTemplate::new(400))
        .with_priority(1)
        .expect(1)
        .mount(server)
        .await;
}

/// Test that one failing query does not stop its siblings
#[tokio::test]
#[traced_test]
async fn test_failure_is_reported_after_all_queries_finish() {
    let server = MockServer::start().await;
    mount_broken_query(&server).await;
    mount_happy_path(&server).await;

    let client = create_mock_client(&server);
    let report = run_collecting(&client, &QUERIES, Database::Pmc, 2).await;

    assert_eq!(report.total, 5);
    assert_eq!(report.results.len(), 4);
    assert_eq!(report.failures.len(), 1);
    assert!(!report.is_success());

    let failure = &report.failures[0];
    assert_eq!(failure.index, 2);
    assert_eq!(failure.query, QUERIES[2]);
    assert!(matches!(
        failure.error,
        RetrievalError::ClientError { status: 400, .. }
    ));

    // successes keep submission order
    let queries: Vec<&str> = report.results.iter().map(|r| r.query.as_str()).collect();
    assert_eq!(queries, vec![QUERIES[0], QUERIES[1], QUERIES[3], QUERIES[4]]);

    assert!(logs_contain("Query failed"));
    assert!(logs_contain("Run completed"));
}

/// Test that `run` turns failures into one aggregate error
#[tokio::test]
#[traced_test]
async fn test_run_aggregates_failures() {
    let server = MockServer::start().await;
    mount_broken_query(&server).await;
    mount_happy_path(&server).await;

    let client = create_mock_client(&server);
    let err = run(&client, &QUERIES, Database::Pmc, 3).await.unwrap_err();

    match &err {
        RetrievalError::AggregateFetchError { total, failures } => {
            assert_eq!(*total, 5);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].index, 2);
        }
        other => panic!("expected AggregateFetchError, got {other:?}"),
    }

    let message = err.to_string();
    assert!(message.contains("1 of 5 queries failed"));
    assert!(message.contains("[pmc #2]"));
}

/// Test that a fully successful run returns results in submission order
#[tokio::test]
#[traced_test]
async fn test_all_queries_succeed() {
    let server = MockServer::start().await;
    mount_happy_path(&server).await;

    let queries = ["\"a\"", "\"b\"", "\"c\"", "\"d\"", "\"e\"", "\"f\""];
    let client = create_mock_client(&server);
    let results = run(&client, &queries, Database::Pmc, 4).await.unwrap();

    assert_eq!(results.len(), 6);
    for (result, query) in results.iter().zip(queries) {
        assert_eq!(result.query, query);
        assert_eq!(result.ids.len(), 2);
    }
}

/// Test that a pool size of zero still makes progress
#[tokio::test]
#[traced_test]
async fn test_zero_pool_size_runs_sequentially() {
    let server = MockServer::start().await;
    mount_happy_path(&server).await;

    let client = create_mock_client(&server);
    let results = run(&client, &["\"x\"", "\"y\""], Database::Pmc, 0)
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
}

/// Test that an empty query list finishes without requests
#[tokio::test]
#[traced_test]
async fn test_no_queries() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = create_mock_client(&server);
    let queries: [&str; 0] = [];
    let results = run(&client, &queries, Database::PubMed, 3).await.unwrap();
    assert!(results.is_empty());
}

/// Test that cancelling mid-run reports cancellation instead of a failure list
#[tokio::test]
#[traced_test]
async fn test_cancelled_run() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/esearch.fcgi"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(esearch_body(0))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let client = create_mock_client(&server);
    let canceller = client.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let err = run(&client, &QUERIES, Database::PubMed, 2).await.unwrap_err();
    assert!(matches!(err, RetrievalError::Cancelled));
}
