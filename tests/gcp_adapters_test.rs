use httpmock::prelude::*;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use survey_etl::core::pipeline::response_schema;
use survey_etl::domain::model::{Record, RowFilter, SurveyType, TableId};
use survey_etl::domain::ports::{Storage, Warehouse};
use survey_etl::{BigQueryClient, EtlError, GcsStorage, TokenProvider};

fn auth() -> Arc<TokenProvider> {
    Arc::new(TokenProvider::fixed("test-token"))
}

fn bigquery(server: &MockServer) -> BigQueryClient {
    BigQueryClient::new(reqwest::Client::new(), server.base_url(), "proj", auth())
        .with_polling(Duration::from_millis(10), Duration::from_secs(5))
}

fn record(pairs: &[(&str, Value)]) -> Record {
    Record {
        data: pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
    }
}

#[tokio::test]
async fn test_gcs_download_and_missing_object() {
    let server = MockServer::start();
    let found = server.mock(|when, then| {
        when.method(GET)
            .path_matches(Regex::new(r"^/storage/v1/b/uploads/o/exports(%2F|/)a\.zip$").unwrap())
            .query_param("alt", "media")
            .header("authorization", "Bearer test-token");
        then.status(200).body("zip-bytes");
    });
    server.mock(|when, then| {
        when.method(GET).path("/storage/v1/b/uploads/o/gone.zip");
        then.status(404).body("No such object");
    });

    let storage = GcsStorage::new(reqwest::Client::new(), server.base_url(), auth());
    assert_eq!(
        storage.fetch_object("uploads", "exports/a.zip").await.unwrap(),
        Some(b"zip-bytes".to_vec())
    );
    assert_eq!(storage.fetch_object("uploads", "gone.zip").await.unwrap(), None);
    found.assert();
}

#[tokio::test]
async fn test_gcs_server_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/storage/v1/b/uploads/o/a.zip");
        then.status(503).body("backend unavailable");
    });

    let storage = GcsStorage::new(reqwest::Client::new(), server.base_url(), auth());
    let err = storage.fetch_object("uploads", "a.zip").await.unwrap_err();
    assert!(matches!(err, EtlError::StorageError { .. }));
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn test_load_job_polls_until_done() {
    let server = MockServer::start();
    let insert = server.mock(|when, then| {
        when.method(POST)
            .path("/upload/bigquery/v2/projects/proj/jobs")
            .query_param("uploadType", "multipart")
            .header("authorization", "Bearer test-token")
            .body_contains("\"writeDisposition\":\"WRITE_APPEND\"")
            .body_contains("\"createDisposition\":\"CREATE_IF_NEEDED\"")
            .body_contains("\"sourceFormat\":\"NEWLINE_DELIMITED_JSON\"")
            .body_contains("\"name\":\"session_weight\",\"type\":\"FLOAT\"")
            .body_contains("{\"filename\":\"a.csv\"}");
        then.status(200).json_body(json!({
            "jobReference": { "projectId": "proj", "jobId": "job_1", "location": "US" },
            "status": { "state": "RUNNING" }
        }));
    });
    let poll = server.mock(|when, then| {
        when.method(GET)
            .path("/bigquery/v2/projects/proj/jobs/job_1")
            .query_param("location", "US");
        then.status(200).json_body(json!({
            "jobReference": { "projectId": "proj", "jobId": "job_1", "location": "US" },
            "status": { "state": "DONE" },
            "statistics": { "load": { "outputRows": "2" } }
        }));
    });

    let client = bigquery(&server);
    let table = TableId::new("proj", "brand_ds", "brand_responses");
    let schema = response_schema(SurveyType::BrandTracker);
    let rows = vec![
        record(&[("filename", json!("a.csv"))]),
        record(&[("filename", json!("b.csv"))]),
    ];

    let loaded = client.load_rows(&table, &rows, Some(&schema)).await.unwrap();
    assert_eq!(loaded, 2);
    insert.assert();
    poll.assert();
}

#[tokio::test]
async fn test_load_job_autodetect_and_error_result() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path("/upload/bigquery/v2/projects/proj/jobs")
            .body_contains("\"autodetect\":true");
        then.status(200).json_body(json!({
            "jobReference": { "projectId": "proj", "jobId": "job_2" },
            "status": {
                "state": "DONE",
                "errorResult": { "reason": "invalid", "message": "Provided Schema does not match Table" }
            }
        }));
    });

    let client = bigquery(&server);
    let table = TableId::new("proj", "brand_ds", "awareness");
    let err = client
        .load_rows(&table, &[record(&[("age", json!("25-34"))])], None)
        .await
        .unwrap_err();

    assert!(matches!(err, EtlError::WarehouseError { .. }));
    assert!(err.to_string().contains("Provided Schema does not match Table"));
}

#[tokio::test]
async fn test_load_of_no_rows_makes_no_request() {
    let server = MockServer::start();
    let any = server.mock(|when, then| {
        when.any_request();
        then.status(500);
    });

    let table = TableId::new("proj", "brand_ds", "awareness");
    assert_eq!(bigquery(&server).load_rows(&table, &[], None).await.unwrap(), 0);
    any.assert_hits(0);
}

#[tokio::test]
async fn test_read_rows_uses_named_parameter() {
    let server = MockServer::start();
    let query = server.mock(|when, then| {
        when.method(POST)
            .path("/bigquery/v2/projects/proj/queries")
            .json_body_partial(
                r#"{
                    "query": "SELECT * FROM `proj.brand_ds.processed_brand_surveys` WHERE `filename` = @filename",
                    "useLegacySql": false,
                    "parameterMode": "NAMED",
                    "queryParameters": [{
                        "name": "filename",
                        "parameterType": { "type": "STRING" },
                        "parameterValue": { "value": "it's a.csv" }
                    }]
                }"#,
            );
        then.status(200).json_body(json!({
            "jobReference": { "projectId": "proj", "jobId": "q_1", "location": "US" },
            "jobComplete": true,
            "schema": { "fields": [{ "name": "filename", "type": "STRING" }] },
            "rows": [{ "f": [{ "v": "it's a.csv" }] }]
        }));
    });

    let table = TableId::new("proj", "brand_ds", "processed_brand_surveys");
    let rows = bigquery(&server)
        .read_rows(&table, Some(&RowFilter::eq("filename", "it's a.csv")))
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_str("filename"), Some("it's a.csv"));
    query.assert();
}

#[tokio::test]
async fn test_query_waits_for_completion_and_follows_pages() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/bigquery/v2/projects/proj/queries");
        then.status(200).json_body(json!({
            "jobReference": { "projectId": "proj", "jobId": "q_2", "location": "EU" },
            "jobComplete": false
        }));
    });
    let first_page = server.mock(|when, then| {
        when.method(GET)
            .path("/bigquery/v2/projects/proj/queries/q_2")
            .query_param("location", "EU")
            .matches(|req| {
                !req.query_params
                    .as_ref()
                    .map(|params| params.iter().any(|(k, _)| k == "pageToken"))
                    .unwrap_or(false)
            });
        then.status(200).json_body(json!({
            "jobReference": { "projectId": "proj", "jobId": "q_2", "location": "EU" },
            "jobComplete": true,
            "schema": { "fields": [
                { "name": "answer", "type": "STRING" },
                { "name": "count_response", "type": "INTEGER" },
                { "name": "Weighted_Response", "type": "FLOAT" }
            ]},
            "rows": [{ "f": [{ "v": "Geico" }, { "v": "3" }, { "v": "4.5" }] }],
            "pageToken": "page-2"
        }));
    });
    let second_page = server.mock(|when, then| {
        when.method(GET)
            .path("/bigquery/v2/projects/proj/queries/q_2")
            .query_param("pageToken", "page-2");
        then.status(200).json_body(json!({
            "jobComplete": true,
            "rows": [{ "f": [{ "v": "USAA" }, { "v": null }, { "v": "1.0" }] }]
        }));
    });

    let rows = bigquery(&server)
        .query("SELECT answer, count_response, Weighted_Response FROM t", &[])
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].data["count_response"], json!(3));
    assert_eq!(rows[0].data["Weighted_Response"], json!(4.5));
    assert_eq!(rows[1].get_str("answer"), Some("USAA"));
    assert_eq!(rows[1].data["count_response"], Value::Null);
    first_page.assert();
    second_page.assert();
}

#[tokio::test]
async fn test_upsert_stages_merges_and_drops() {
    let server = MockServer::start();
    let stage = server.mock(|when, then| {
        when.method(POST)
            .path("/upload/bigquery/v2/projects/proj/jobs")
            .body_contains("\"tableId\":\"respondents_staging\"")
            .body_contains("\"writeDisposition\":\"WRITE_TRUNCATE\"");
        then.status(200).json_body(json!({
            "jobReference": { "projectId": "proj", "jobId": "job_3" },
            "status": { "state": "DONE" }
        }));
    });
    let merge = server.mock(|when, then| {
        when.method(POST)
            .path("/bigquery/v2/projects/proj/queries")
            .body_contains("MERGE `proj.ds.respondents` AS t USING `proj.ds.respondents_staging` AS s");
        then.status(200).json_body(json!({
            "jobReference": { "projectId": "proj", "jobId": "q_3" },
            "jobComplete": true
        }));
    });
    let drop = server.mock(|when, then| {
        when.method(POST)
            .path("/bigquery/v2/projects/proj/queries")
            .body_contains("DROP TABLE IF EXISTS `proj.ds.respondents_staging`");
        then.status(200).json_body(json!({
            "jobReference": { "projectId": "proj", "jobId": "q_4" },
            "jobComplete": true
        }));
    });

    let mut keys = HashMap::new();
    keys.insert("respondents".to_string(), vec!["study_number".to_string()]);
    let client = bigquery(&server).with_primary_keys(keys);

    let schema = survey_etl::adapters::bigquery::schema_from_type_names(&[
        ("study_number", "string"),
        ("count_response", "int"),
    ]);
    let rows = vec![record(&[("study_number", json!("id_1")), ("count_response", json!(4))])];
    let target = TableId::new("proj", "ds", "respondents");

    assert_eq!(client.upsert(&target, &rows, &schema).await.unwrap(), 1);
    stage.assert();
    merge.assert();
    drop.assert();
}
