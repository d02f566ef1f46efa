use httpmock::prelude::*;
use survey_etl::{SlackNotifier, SurveyType, ZipReport};

fn report() -> ZipReport {
    let mut report = ZipReport::default();
    report.csv_files_processed.push("Responses [Study 1].csv".to_string());
    report.csv_files_skipped.push("Responses [Study 0].csv".to_string());
    report.record_upload("brand_responses", 2500);
    report.record_upload("awareness", 40);
    report
}

#[tokio::test]
async fn test_success_notification_is_posted() {
    let server = MockServer::start();
    let hook = server.mock(|when, then| {
        when.method(POST)
            .path("/services/T000/B000/XXX")
            .header("content-type", "application/json")
            .body_contains("Survey Processing Completed Successfully")
            .body_contains("\"value\":\"2,540\"")
            .body_contains("\"value\":\"brand_responses, awareness\"")
            .body_contains("Lemonade Survey Processor");
        then.status(200).body("ok");
    });

    let notifier = SlackNotifier::new(Some(server.url("/services/T000/B000/XXX")));
    assert!(notifier.is_enabled());
    assert!(
        notifier
            .send_success("a.zip", SurveyType::BrandTracker, &report(), Some(3.2))
            .await
    );
    hook.assert();
}

#[tokio::test]
async fn test_failure_and_skipped_notifications() {
    let server = MockServer::start();
    let failure = server.mock(|when, then| {
        when.method(POST)
            .path("/hook")
            .body_contains("\"color\":\"danger\"")
            .body_contains("file_not_found");
        then.status(200);
    });
    let skipped = server.mock(|when, then| {
        when.method(POST)
            .path("/hook")
            .body_contains("\"color\":\"warning\"")
            .body_contains("not_zip_file");
        then.status(200);
    });

    let notifier = SlackNotifier::new(Some(server.url("/hook")));
    assert!(
        notifier
            .send_failure("a.zip", "file_not_found", Some(SurveyType::Custom), None)
            .await
    );
    assert!(notifier.send_skipped("a.txt", "not_zip_file", None).await);
    failure.assert();
    skipped.assert();
}

#[tokio::test]
async fn test_rejected_webhook_returns_false() {
    let server = MockServer::start();
    let hook = server.mock(|when, then| {
        when.method(POST).path("/hook");
        then.status(403).body("invalid_token");
    });

    let notifier = SlackNotifier::new(Some(server.url("/hook")));
    assert!(!notifier.test_notification().await);
    hook.assert();
}

#[tokio::test]
async fn test_test_notification() {
    let server = MockServer::start();
    let hook = server.mock(|when, then| {
        when.method(POST)
            .path("/hook")
            .body_contains("Test notification from Lemonade Survey Processor");
        then.status(200);
    });

    assert!(SlackNotifier::new(Some(server.url("/hook"))).test_notification().await);
    hook.assert();
}
