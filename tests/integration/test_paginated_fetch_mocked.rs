//! Mocked tests for history-server pagination
//!
//! Every test runs against a wiremock server serving canned ESearch and ESummary
//! payloads; no network access is needed.

mod common;

use common::{PMID_OFFSET, create_mock_client, esearch_body, esummary_body, mock_config};
use eutils_retrieval::{Database, EutilsClient, RetrievalError};
use tracing_test::traced_test;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_search(server: &MockServer, count: usize) {
    Mock::given(method("POST"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(esearch_body(count)))
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, database: Database, retstart: usize, articles: &[u32]) {
    Mock::given(method("GET"))
        .and(path("/esummary.fcgi"))
        .and(query_param("retstart", retstart.to_string()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(esummary_body(database, articles)),
        )
        .expect(1)
        .mount(server)
        .await;
}

fn paged_client(server: &MockServer, page_size: usize) -> EutilsClient {
    EutilsClient::with_config(mock_config(server).with_page_size(page_size))
        .expect("client should build")
}

/// Test that all pages are fetched with retstart advancing by page length
#[tokio::test]
#[traced_test]
async fn test_fetch_all_pages_through_history() {
    let server = MockServer::start().await;
    mount_search(&server, 7).await;
    mount_page(&server, Database::Pmc, 0, &[1, 2, 3]).await;
    mount_page(&server, Database::Pmc, 3, &[4, 5, 6]).await;
    mount_page(&server, Database::Pmc, 6, &[7]).await;

    let client = paged_client(&server, 3);
    let result = client
        .fetch_all("(\"pacemaker\") AND (\"infection\")", Database::Pmc)
        .await
        .unwrap();

    assert_eq!(result.total_count, 7);
    assert_eq!(result.database, Database::Pmc);
    assert_eq!(result.ids.len(), 7);

    let pmcids: Vec<u32> = result
        .ids
        .iter()
        .map(|ids| ids.pmcid.unwrap().numeric_part())
        .collect();
    assert_eq!(pmcids, vec![1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(result.ids[0].pmid.unwrap().as_u32(), 1 + PMID_OFFSET);

    assert!(logs_contain("Fetched all identifiers for query"));
}

/// Test that short pages advance the offset by what was actually returned
#[tokio::test]
#[traced_test]
async fn test_short_pages_advance_by_returned_count() {
    let server = MockServer::start().await;
    mount_search(&server, 5).await;
    // page size is 3 but the server hands back two records at a time
    mount_page(&server, Database::PubMed, 0, &[1, 2]).await;
    mount_page(&server, Database::PubMed, 2, &[3, 4]).await;
    mount_page(&server, Database::PubMed, 4, &[5]).await;

    let client = paged_client(&server, 3);
    let result = client.fetch_all("\"stent\"", Database::PubMed).await.unwrap();

    assert_eq!(result.ids.len(), 5);
    assert!(result.ids.iter().all(|ids| ids.is_complete()));
}

/// Test that a query without hits never calls ESummary
#[tokio::test]
#[traced_test]
async fn test_zero_hits_skip_summary() {
    let server = MockServer::start().await;
    mount_search(&server, 0).await;

    Mock::given(method("GET"))
        .and(path("/esummary.fcgi"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = create_mock_client(&server);
    let result = client.fetch_all("\"nothing\"", Database::PubMed).await.unwrap();

    assert_eq!(result.total_count, 0);
    assert!(result.ids.is_empty());
    assert!(logs_contain("No results found"));
}

/// Test that results shrinking between search and summary is reported
#[tokio::test]
#[traced_test]
async fn test_result_drift_is_incomplete_fetch() {
    let server = MockServer::start().await;
    mount_search(&server, 5).await;
    mount_page(&server, Database::Pmc, 0, &[1, 2]).await;
    mount_page(&server, Database::Pmc, 2, &[]).await;

    let client = paged_client(&server, 3);
    let err = client
        .fetch_all("\"drifting\"", Database::Pmc)
        .await
        .unwrap_err();

    match err {
        RetrievalError::IncompleteFetch {
            database,
            expected,
            retrieved,
            ..
        } => {
            assert_eq!(database, Database::Pmc);
            assert_eq!(expected, 5);
            assert_eq!(retrieved, 2);
        }
        other => panic!("expected IncompleteFetch, got {other:?}"),
    }
    assert!(logs_contain("Retrieved identifier count differs from reported total"));
}

/// Test that a history session replaying the same page is not counted as complete
#[tokio::test]
#[traced_test]
async fn test_repeated_page_is_incomplete_fetch() {
    let server = MockServer::start().await;
    mount_search(&server, 4).await;

    Mock::given(method("GET"))
        .and(path("/esummary.fcgi"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(esummary_body(Database::Pmc, &[1, 2])),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = paged_client(&server, 2);
    let err = client.fetch_all("\"x\"", Database::Pmc).await.unwrap_err();

    match err {
        RetrievalError::IncompleteFetch {
            expected, retrieved, ..
        } => {
            assert_eq!(expected, 4);
            assert_eq!(retrieved, 2);
        }
        other => panic!("expected IncompleteFetch, got {other:?}"),
    }
    assert!(logs_contain("Summary page repeated already fetched records"));
}

/// Test that overlapping pages keep each identifier once
#[tokio::test]
#[traced_test]
async fn test_overlapping_pages_are_deduplicated() {
    let server = MockServer::start().await;
    mount_search(&server, 4).await;
    mount_page(&server, Database::Pmc, 0, &[1, 2, 3]).await;
    mount_page(&server, Database::Pmc, 3, &[3, 4]).await;

    let client = paged_client(&server, 3);
    let result = client.fetch_all("\"overlap\"", Database::Pmc).await.unwrap();

    let pmcids: Vec<u32> = result
        .ids
        .iter()
        .map(|ids| ids.pmcid.unwrap().numeric_part())
        .collect();
    assert_eq!(pmcids, vec![1, 2, 3, 4]);
    assert!(logs_contain("Summary page overlapped earlier pages"));
}

/// Test that an ESearch ERROR field becomes an API error
#[tokio::test]
#[traced_test]
async fn test_esearch_error_field() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "esearchresult": {"ERROR": "Invalid query syntax"}
        })))
        .mount(&server)
        .await;

    let client = create_mock_client(&server);
    let err = client
        .fetch_all("((unbalanced", Database::PubMed)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RetrievalError::ApiError { ref message, .. } if message.contains("Invalid query syntax")
    ));
}

/// Test that the search is a POST form and summaries carry the history session
#[tokio::test]
#[traced_test]
async fn test_request_parameters() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/esearch.fcgi"))
        .and(body_string_contains("db=pubmed"))
        .and(body_string_contains("usehistory=y"))
        .and(body_string_contains("retmax=0"))
        .and(body_string_contains("retmode=json"))
        .and(body_string_contains("tool=eutils-retrieval"))
        .respond_with(ResponseTemplate::new(200).set_body_json(esearch_body(2)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/esummary.fcgi"))
        .and(query_param("db", "pubmed"))
        .and(query_param("query_key", "1"))
        .and(query_param("WebEnv", "MCID_test_session"))
        .and(query_param("retstart", "0"))
        .and(query_param("retmax", "500"))
        .and(query_param("retmode", "json"))
        .and(query_param("email", "test@example.com"))
        .and(query_param("tool", "eutils-retrieval"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(esummary_body(Database::PubMed, &[8, 9])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = create_mock_client(&server);
    let result = client.fetch_all("\"catheter\"", Database::PubMed).await.unwrap();
    assert_eq!(result.ids.len(), 2);
}

/// Test that the API key rides along with every request
#[tokio::test]
#[traced_test]
async fn test_api_key_parameter() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/esearch.fcgi"))
        .and(body_string_contains("api_key=secret-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(esearch_body(1)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/esummary.fcgi"))
        .and(query_param("api_key", "secret-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(esummary_body(Database::Pmc, &[42])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client =
        EutilsClient::with_config(mock_config(&server).with_api_key("secret-key")).unwrap();
    let result = client.fetch_all("\"implant\"", Database::Pmc).await.unwrap();
    assert_eq!(result.ids[0].pmcid.unwrap().to_string(), "PMC42");
}

/// Test that a summary page failing past its retry budget fails the query
#[tokio::test]
#[traced_test]
async fn test_summary_retries_exhausted() {
    let server = MockServer::start().await;
    mount_search(&server, 3).await;

    Mock::given(method("GET"))
        .and(path("/esummary.fcgi"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let client = create_mock_client(&server);
    let err = client.fetch_all("\"valve\"", Database::Pmc).await.unwrap_err();

    match err {
        RetrievalError::RetryExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, RetrievalError::ApiError { status: 502, .. }));
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
}

/// Test that a malformed summary payload is a parse error, not retried
#[tokio::test]
#[traced_test]
async fn test_malformed_summary() {
    let server = MockServer::start().await;
    mount_search(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/esummary.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "result": {"uids": ["77"]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_mock_client(&server);
    let err = client.fetch_all("\"sensor\"", Database::Pmc).await.unwrap_err();
    assert!(matches!(err, RetrievalError::ParseError { .. }));
}
