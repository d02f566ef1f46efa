//! BigQuery REST client: multipart load jobs, parameterized queries and MERGE upserts.

use crate::adapters::gcp_auth::TokenProvider;
use crate::domain::model::{FieldType, Record, RowFilter, SchemaField, TableId};
use crate::domain::ports::Warehouse;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::validate_identifier;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_BIGQUERY_ENDPOINT: &str = "https://bigquery.googleapis.com";

const BOUNDARY: &str = "survey_etl_load_boundary";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDisposition {
    Append,
    Truncate,
}

impl WriteDisposition {
    fn as_str(&self) -> &'static str {
        match self {
            WriteDisposition::Append => "WRITE_APPEND",
            WriteDisposition::Truncate => "WRITE_TRUNCATE",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    reason: Option<String>,
    message: Option<String>,
}

impl ErrorProto {
    fn describe(&self) -> String {
        format!(
            "{}: {}",
            self.reason.as_deref().unwrap_or("error"),
            self.message.as_deref().unwrap_or("no message")
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    state: String,
    error_result: Option<ErrorProto>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadStatistics {
    output_rows: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct JobStatistics {
    load: Option<LoadStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Job {
    job_reference: JobReference,
    status: JobStatus,
    #[serde(default)]
    statistics: JobStatistics,
}

#[derive(Debug, Deserialize)]
struct ResultField {
    name: String,
    #[serde(rename = "type", default)]
    field_type: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResultSchema {
    #[serde(default)]
    fields: Vec<ResultField>,
}

#[derive(Debug, Deserialize)]
struct ResultCell {
    #[serde(default)]
    v: Value,
}

#[derive(Debug, Deserialize)]
struct ResultRow {
    #[serde(default)]
    f: Vec<ResultCell>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    job_reference: Option<JobReference>,
    #[serde(default)]
    job_complete: bool,
    schema: Option<ResultSchema>,
    #[serde(default)]
    rows: Vec<ResultRow>,
    page_token: Option<String>,
}

/// Query cells arrive as strings; convert them back using the result schema.
fn typed_cell(value: Value, field_type: &str) -> Value {
    let raw = match value {
        Value::String(raw) => raw,
        other => return other,
    };
    match field_type {
        "INTEGER" | "INT64" => raw.parse::<i64>().map(Value::from).unwrap_or(Value::String(raw)),
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => raw
            .parse::<f64>()
            .map(Value::from)
            .unwrap_or(Value::String(raw)),
        "BOOLEAN" | "BOOL" => match raw.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw),
        },
        _ => Value::String(raw),
    }
}

fn rows_to_records(schema: &ResultSchema, rows: Vec<ResultRow>) -> Vec<Record> {
    rows.into_iter()
        .map(|row| Record {
            data: schema
                .fields
                .iter()
                .zip(row.f)
                .map(|(field, cell)| (field.name.clone(), typed_cell(cell.v, &field.field_type)))
                .collect(),
        })
        .collect()
}

/// Maps loose `(column, type name)` pairs to schema fields, dropping unknown types.
pub fn schema_from_type_names(columns: &[(&str, &str)]) -> Vec<SchemaField> {
    columns
        .iter()
        .filter_map(|(name, type_name)| {
            FieldType::from_type_name(type_name).map(|t| SchemaField::new(name, t))
        })
        .collect()
}

/// NULL-safe equality: both sides fall back to a per-type sentinel.
fn null_safe_equality(field: &SchemaField) -> Result<String> {
    let sentinel = match field.field_type {
        FieldType::String => "CAST(-9999999 AS STRING)",
        FieldType::Bytes => "CAST('' AS BYTES)",
        FieldType::Integer | FieldType::Float => "-999999",
        FieldType::Boolean => "TRUE",
        FieldType::Datetime => "DATETIME '1998-10-18 00:00:00'",
        FieldType::Date => "DATE '1998-10-18'",
        FieldType::Time => "TIME '13:45:55'",
        FieldType::Record => {
            return Err(EtlError::ValidationError {
                message: format!("RECORD column '{}' cannot be used as a merge key", field.name),
            })
        }
    };
    Ok(format!(
        "IFNULL(t.`{name}`, {s}) = IFNULL(s.`{name}`, {s})",
        name = field.name,
        s = sentinel
    ))
}

#[derive(Debug, Clone)]
pub struct BigQueryClient {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    auth: Arc<TokenProvider>,
    /// Tables that merge on a primary key; every other table is insert-only on upsert.
    primary_keys: HashMap<String, Vec<String>>,
    poll_interval: Duration,
    max_wait: Duration,
}

impl BigQueryClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        auth: Arc<TokenProvider>,
    ) -> Self {
        tracing::info!("Created BigQuery client successfully!");
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            auth,
            primary_keys: HashMap::new(),
            poll_interval: Duration::from_secs(1),
            max_wait: Duration::from_secs(300),
        }
    }

    pub fn with_primary_keys(mut self, primary_keys: HashMap<String, Vec<String>>) -> Self {
        self.primary_keys = primary_keys;
        self
    }

    pub fn with_polling(mut self, poll_interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.max_wait = max_wait;
        self
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/bigquery/v2/projects/{}/{}", self.base_url, self.project_id, path)
    }

    async fn check(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(EtlError::warehouse(format!("{} failed with {}: {}", action, status, body)))
    }

    fn deadline_error(&self, what: &str) -> EtlError {
        EtlError::warehouse(format!(
            "{} did not finish within {}s",
            what,
            self.max_wait.as_secs()
        ))
    }

    /// Starts a load job from newline-delimited JSON and waits for it to finish.
    pub async fn load_job(
        &self,
        table: &TableId,
        rows: &[Record],
        schema: Option<&[SchemaField]>,
        disposition: WriteDisposition,
    ) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut load = json!({
            "destinationTable": {
                "projectId": table.project,
                "datasetId": table.dataset,
                "tableId": table.table,
            },
            "sourceFormat": "NEWLINE_DELIMITED_JSON",
            "writeDisposition": disposition.as_str(),
            "createDisposition": "CREATE_IF_NEEDED",
        });
        match schema {
            Some(fields) => load["schema"] = json!({ "fields": fields }),
            None => load["autodetect"] = Value::Bool(true),
        }
        let metadata = json!({ "configuration": { "load": load } });

        let mut ndjson = String::new();
        for row in rows {
            ndjson.push_str(&serde_json::to_string(&row.data)?);
            ndjson.push('\n');
        }

        let body = format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n\
             --{b}\r\nContent-Type: application/octet-stream\r\n\r\n{data}\r\n--{b}--\r\n",
            b = BOUNDARY,
            meta = metadata,
            data = ndjson
        );

        let url = format!(
            "{}/upload/bigquery/v2/projects/{}/jobs?uploadType=multipart",
            self.base_url, self.project_id
        );
        let token = self.auth.token().await?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", BOUNDARY),
            )
            .body(body)
            .send()
            .await?;
        let job: Job = Self::check(response, "load job insert").await?.json().await?;

        let job = self.wait_for_job(job).await?;
        let loaded = job
            .statistics
            .load
            .and_then(|l| l.output_rows)
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(rows.len());

        tracing::debug!("{} inserted to BigQuery ({} rows)", table, loaded);
        Ok(loaded)
    }

    async fn wait_for_job(&self, mut job: Job) -> Result<Job> {
        let started = Instant::now();
        loop {
            if job.status.state == "DONE" {
                if let Some(error) = &job.status.error_result {
                    return Err(EtlError::warehouse(format!(
                        "job {} failed: {}",
                        job.job_reference.job_id,
                        error.describe()
                    )));
                }
                return Ok(job);
            }

            if started.elapsed() >= self.max_wait {
                return Err(self.deadline_error(&format!("job {}", job.job_reference.job_id)));
            }
            tokio::time::sleep(self.poll_interval).await;

            let reference = job.job_reference.clone();
            let mut request = self
                .client
                .get(self.api_url(&format!("jobs/{}", reference.job_id)))
                .bearer_auth(self.auth.token().await?);
            if let Some(location) = &reference.location {
                request = request.query(&[("location", location)]);
            }
            job = Self::check(request.send().await?, "job status").await?.json().await?;
        }
    }

    /// Runs a standard-SQL query with named STRING parameters and collects every page.
    pub async fn query(&self, sql: &str, params: &[(&str, &str)]) -> Result<Vec<Record>> {
        let parameters: Vec<Value> = params
            .iter()
            .map(|(name, value)| {
                json!({
                    "name": name,
                    "parameterType": { "type": "STRING" },
                    "parameterValue": { "value": value },
                })
            })
            .collect();

        let mut body = json!({ "query": sql, "useLegacySql": false });
        if !parameters.is_empty() {
            body["parameterMode"] = Value::from("NAMED");
            body["queryParameters"] = Value::Array(parameters);
        }

        let token = self.auth.token().await?;
        let response = self
            .client
            .post(self.api_url("queries"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let mut page: QueryResponse = Self::check(response, "query").await?.json().await?;

        let started = Instant::now();
        let mut schema = ResultSchema::default();
        let mut records = Vec::new();

        loop {
            if page.job_complete {
                if let Some(page_schema) = page.schema.take() {
                    schema = page_schema;
                }
                records.extend(rows_to_records(&schema, std::mem::take(&mut page.rows)));
                if page.page_token.is_none() {
                    return Ok(records);
                }
            } else {
                if started.elapsed() >= self.max_wait {
                    return Err(self.deadline_error("query"));
                }
                tokio::time::sleep(self.poll_interval).await;
            }

            let reference = page
                .job_reference
                .clone()
                .ok_or_else(|| EtlError::warehouse("query response has no job reference"))?;

            let mut query: Vec<(&str, String)> = Vec::new();
            if let Some(location) = &reference.location {
                query.push(("location", location.clone()));
            }
            if let Some(token) = page.page_token.take() {
                query.push(("pageToken", token));
            }

            let response = self
                .client
                .get(self.api_url(&format!("queries/{}", reference.job_id)))
                .bearer_auth(self.auth.token().await?)
                .query(&query)
                .send()
                .await?;
            let next: QueryResponse = Self::check(response, "query results").await?.json().await?;
            page = QueryResponse {
                job_reference: next.job_reference.or(Some(reference)),
                ..next
            };
        }
    }

    /// Executes a statement whose result rows are not needed.
    pub async fn run_query(&self, sql: &str, log_msg: &str) -> Result<()> {
        self.query(sql, &[]).await?;
        tracing::info!("{}", log_msg);
        Ok(())
    }

    /// MERGE statement from `source` into `target`. Tables with a primary key update their
    /// non-key columns on match; all other tables only insert unmatched rows.
    pub fn build_upsert_query(
        &self,
        table_name: &str,
        target: &TableId,
        source: &TableId,
        columns: &[SchemaField],
    ) -> Result<String> {
        if columns.is_empty() {
            return Err(EtlError::ValidationError {
                message: format!("no columns to merge for {}", table_name),
            });
        }

        let statement = match self.primary_keys.get(table_name) {
            Some(keys) => {
                let key_fields = keys
                    .iter()
                    .map(|key| {
                        columns.iter().find(|c| &c.name == key).ok_or_else(|| {
                            EtlError::ValidationError {
                                message: format!("primary key '{}' missing from {}", key, table_name),
                            }
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                let on_clause = key_fields
                    .into_iter()
                    .map(null_safe_equality)
                    .collect::<Result<Vec<_>>>()?
                    .join(" AND ");
                let update_clause = columns
                    .iter()
                    .filter(|c| !keys.contains(&c.name))
                    .map(|c| format!("t.`{0}` = s.`{0}`", c.name))
                    .collect::<Vec<_>>()
                    .join(", ");

                if update_clause.is_empty() {
                    format!(
                        "MERGE `{}` AS t USING `{}` AS s ON {} WHEN NOT MATCHED THEN INSERT ROW",
                        target, source, on_clause
                    )
                } else {
                    format!(
                        "MERGE `{}` AS t USING `{}` AS s ON {} \
                         WHEN MATCHED THEN UPDATE SET {} WHEN NOT MATCHED THEN INSERT ROW",
                        target, source, on_clause, update_clause
                    )
                }
            }
            None => {
                let on_clause = columns
                    .iter()
                    .map(null_safe_equality)
                    .collect::<Result<Vec<_>>>()?
                    .join(" AND ");
                format!(
                    "MERGE `{}` AS t USING `{}` AS s ON {} WHEN NOT MATCHED THEN INSERT ROW",
                    target, source, on_clause
                )
            }
        };

        Ok(statement)
    }

    /// Stages `rows` next to `target`, merges them in, then drops the staging table.
    pub async fn upsert(
        &self,
        target: &TableId,
        rows: &[Record],
        schema: &[SchemaField],
    ) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let staging = TableId::new(
            &target.project,
            &target.dataset,
            &format!("{}_staging", target.table),
        );
        let loaded = self
            .load_job(&staging, rows, Some(schema), WriteDisposition::Truncate)
            .await?;

        let statement = self.build_upsert_query(&target.table, target, &staging, schema)?;
        let merged = self
            .run_query(&statement, &format!("Upserted {} rows into {}", loaded, target))
            .await;

        let dropped = self
            .run_query(
                &format!("DROP TABLE IF EXISTS `{}`", staging),
                &format!("Dropped staging table {}", staging),
            )
            .await;
        if let Err(e) = dropped {
            tracing::warn!("⚠️ Could not drop staging table {}: {}", staging, e);
        }

        merged.map(|_| loaded)
    }
}

impl Warehouse for BigQueryClient {
    async fn load_rows(
        &self,
        table: &TableId,
        rows: &[Record],
        schema: Option<&[SchemaField]>,
    ) -> Result<usize> {
        self.load_job(table, rows, schema, WriteDisposition::Append).await
    }

    async fn read_rows(&self, table: &TableId, filter: Option<&RowFilter>) -> Result<Vec<Record>> {
        let mut sql = format!("SELECT * FROM `{}`", table);
        match filter {
            Some(filter) => {
                validate_identifier("filter.column", &filter.column)?;
                sql.push_str(&format!(" WHERE `{0}` = @{0}", filter.column));
                self.query(&sql, &[(filter.column.as_str(), filter.value.as_str())])
                    .await
            }
            None => self.query(&sql, &[]).await,
        }
    }
}
