//! Incoming-webhook notifications for processing results.

use crate::domain::model::{SurveyType, ZipReport};
use serde_json::{json, Value};
use std::time::Duration;

const FOOTER: &str = "Lemonade Survey Processor";
const LISTED_FILES: usize = 5;

/// `1234567` -> `1,234,567`
pub fn format_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn field(title: &str, value: impl Into<String>, short: bool) -> Value {
    json!({ "title": title, "value": value.into(), "short": short })
}

fn timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

fn attachment(color: &str, title: &str, fields: Vec<Value>) -> Value {
    json!({
        "attachments": [{
            "color": color,
            "title": title,
            "fields": fields,
            "footer": FOOTER,
            "ts": timestamp(),
        }]
    })
}

/// Processing time is only reported when it is non-zero.
fn processing_time_field(processing_time: Option<f64>) -> Option<Value> {
    processing_time
        .filter(|secs| *secs > 0.0)
        .map(|secs| field("Processing Time", format!("{:.1}s", secs), true))
}

pub fn success_message(
    file_name: &str,
    survey_type: SurveyType,
    report: &ZipReport,
    processing_time: Option<f64>,
) -> Value {
    let mut fields = vec![
        field("File", format!("`{}`", file_name), true),
        field("Survey Type", survey_type.as_str(), true),
        field(
            "CSV Files Processed",
            report.csv_files_processed.len().to_string(),
            true,
        ),
        field(
            "CSV Files Skipped",
            report.csv_files_skipped.len().to_string(),
            true,
        ),
        field(
            "Total Records Added",
            format_thousands(report.total_records()),
            true,
        ),
        field("Tables Updated", report.tables_updated.join(", "), true),
    ];

    fields.extend(processing_time_field(processing_time));

    if !report.csv_files_processed.is_empty() {
        let mut listed = report
            .csv_files_processed
            .iter()
            .take(LISTED_FILES)
            .map(|f| format!("• {}", f))
            .collect::<Vec<_>>()
            .join("\n");
        if report.csv_files_processed.len() > LISTED_FILES {
            listed.push_str(&format!(
                "\n... and {} more",
                report.csv_files_processed.len() - LISTED_FILES
            ));
        }
        fields.push(field("Files Processed", format!("```{}```", listed), false));
    }

    attachment("good", "✅ Survey Processing Completed Successfully", fields)
}

pub fn failure_message(
    file_name: &str,
    error: &str,
    survey_type: Option<SurveyType>,
    processing_time: Option<f64>,
) -> Value {
    let mut fields = vec![field("File", format!("`{}`", file_name), true)];
    if let Some(survey_type) = survey_type {
        fields.push(field("Survey Type", survey_type.as_str(), true));
    }
    fields.push(field("Error", format!("```{}```", error), false));
    fields.extend(processing_time_field(processing_time));

    attachment("danger", "❌ Survey Processing Failed", fields)
}

pub fn skipped_message(file_name: &str, reason: &str, survey_type: Option<SurveyType>) -> Value {
    let mut fields = vec![
        field("File", format!("`{}`", file_name), true),
        field("Reason", reason, true),
    ];
    if let Some(survey_type) = survey_type {
        fields.push(field("Survey Type", survey_type.as_str(), true));
    }

    attachment("warning", "⏭️ Survey Processing Skipped", fields)
}

pub fn test_message() -> Value {
    json!({
        "text": "🧪 Test notification from Lemonade Survey Processor",
        "attachments": [{
            "color": "good",
            "title": "✅ Slack Integration Test",
            "text": "If you see this message, Slack notifications are working correctly!",
            "footer": FOOTER,
            "ts": timestamp(),
        }]
    })
}

/// Posts processing summaries to a Slack webhook. Without a webhook every send is a no-op
/// returning `false`.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl SlackNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        let webhook_url = webhook_url.filter(|url| !url.trim().is_empty());
        if webhook_url.is_some() {
            tracing::info!("✅ Slack notifications enabled");
        } else {
            tracing::warn!("⚠️ Slack notifications disabled - no webhook URL provided");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            webhook_url,
        }
    }

    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    pub async fn send_success(
        &self,
        file_name: &str,
        survey_type: SurveyType,
        report: &ZipReport,
        processing_time: Option<f64>,
    ) -> bool {
        if !self.is_enabled() {
            return false;
        }
        self.send_message(&success_message(file_name, survey_type, report, processing_time))
            .await
    }

    pub async fn send_failure(
        &self,
        file_name: &str,
        error: &str,
        survey_type: Option<SurveyType>,
        processing_time: Option<f64>,
    ) -> bool {
        if !self.is_enabled() {
            return false;
        }
        self.send_message(&failure_message(file_name, error, survey_type, processing_time))
            .await
    }

    pub async fn send_skipped(
        &self,
        file_name: &str,
        reason: &str,
        survey_type: Option<SurveyType>,
    ) -> bool {
        if !self.is_enabled() {
            return false;
        }
        self.send_message(&skipped_message(file_name, reason, survey_type))
            .await
    }

    pub async fn test_notification(&self) -> bool {
        if !self.is_enabled() {
            tracing::warn!("⚠️ Slack notifications disabled - cannot send test");
            return false;
        }

        let sent = self.send_message(&test_message()).await;
        if sent {
            tracing::info!("✅ Slack test notification sent successfully");
        } else {
            tracing::error!("❌ Slack test notification failed");
        }
        sent
    }

    async fn send_message(&self, message: &Value) -> bool {
        let Some(url) = self.webhook_url.as_deref() else {
            return false;
        };

        match self.client.post(url).json(message).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                tracing::info!("📤 Slack notification sent successfully");
                true
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                tracing::error!("❌ Slack notification failed: {} - {}", status, body);
                false
            }
            Err(e) => {
                tracing::error!("❌ Error sending Slack message: {}", e);
                false
            }
        }
    }
}
