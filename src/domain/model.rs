use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::utils::error::{EtlError, Result};

/// One warehouse row: column name to JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub data: HashMap<String, serde_json::Value>,
}

impl Record {
    /// Flattens any serializable struct into a record. Non-object values are rejected.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        match serde_json::to_value(value)? {
            serde_json::Value::Object(map) => Ok(Self {
                data: map.into_iter().collect(),
            }),
            other => Err(EtlError::processing(format!(
                "expected an object row, got {}",
                other
            ))),
        }
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.data.get(column).and_then(|v| v.as_str())
    }

    /// Keeps only the listed columns.
    pub fn project(&self, columns: &[&str]) -> Self {
        Self {
            data: columns
                .iter()
                .filter_map(|c| self.data.get(*c).map(|v| (c.to_string(), v.clone())))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurveyType {
    #[serde(rename = "BRAND_TRACKER")]
    BrandTracker,
    #[serde(rename = "CUSTOM")]
    Custom,
}

impl SurveyType {
    /// Archives whose name mentions "Brand Tracker" are brand tracker exports; everything else is custom.
    pub fn from_archive_name(name: &str) -> Self {
        if name.contains("Brand Tracker") {
            SurveyType::BrandTracker
        } else {
            SurveyType::Custom
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SurveyType::BrandTracker => "BRAND_TRACKER",
            SurveyType::Custom => "CUSTOM",
        }
    }

    pub fn responses_table(&self) -> &'static str {
        match self {
            SurveyType::BrandTracker => "brand_responses",
            SurveyType::Custom => "custom_responses",
        }
    }

    pub fn tracking_table(&self) -> &'static str {
        match self {
            SurveyType::BrandTracker => "processed_brand_surveys",
            SurveyType::Custom => "processed_custom_surveys",
        }
    }
}

impl fmt::Display for SurveyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Test/control assignment of a market area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmaInfo {
    pub group_type: String,
    pub group: String,
}

impl DmaInfo {
    pub fn unknown() -> Self {
        Self {
            group_type: "UNKNOWN".to_string(),
            group: "UNKNOWN".to_string(),
        }
    }
}

/// Columns shared by every response row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Respondent {
    pub age: String,
    pub gender: String,
    pub geo: String,
    pub client_type: String,
    pub recorded_timestamp: String,
    pub session_weight: f64,
    pub survey_date: String,
    pub processed_date: String,
    pub study_number: String,
    #[serde(rename = "Group_type")]
    pub group_type: String,
    #[serde(rename = "Group")]
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrandResponse {
    #[serde(flatten)]
    pub respondent: Respondent,
    pub q1_answer: String,
    pub q2_answer: String,
    pub q3_answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomResponse {
    #[serde(flatten)]
    pub respondent: Respondent,
    pub q1_answer: String,
    pub q2_answer: String,
    pub q1_cleaned: String,
    pub q2_cleaned: String,
}

/// Count of identical (respondent dimensions, answer) combinations for one question.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionCount {
    pub age: String,
    pub gender: String,
    pub geo: String,
    pub client_type: String,
    pub session_weight: f64,
    pub survey_date: String,
    pub processed_date: String,
    pub study_number: String,
    pub group_type: String,
    pub group: String,
    pub answer_column: &'static str,
    pub answer: String,
    pub count_response: u64,
    pub weighted_response: f64,
}

impl QuestionCount {
    pub fn to_record(&self) -> Record {
        use serde_json::Value;

        let mut data = HashMap::new();
        data.insert("age".to_string(), Value::from(self.age.clone()));
        data.insert("gender".to_string(), Value::from(self.gender.clone()));
        data.insert("geo".to_string(), Value::from(self.geo.clone()));
        data.insert("client_type".to_string(), Value::from(self.client_type.clone()));
        data.insert("session_weight".to_string(), Value::from(self.session_weight));
        data.insert("survey_dates".to_string(), Value::from(self.survey_date.clone()));
        data.insert("survey_date".to_string(), Value::from(self.survey_date.clone()));
        data.insert("processed_date".to_string(), Value::from(self.processed_date.clone()));
        data.insert("study_number".to_string(), Value::from(self.study_number.clone()));
        data.insert(self.answer_column.to_string(), Value::from(self.answer.clone()));
        data.insert("Group_type".to_string(), Value::from(self.group_type.clone()));
        data.insert("Group".to_string(), Value::from(self.group.clone()));
        data.insert("count_response".to_string(), Value::from(self.count_response));
        data.insert("Weighted_Response".to_string(), Value::from(self.weighted_response));
        Record { data }
    }
}

/// Parsed CSV export: header row plus string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurveyTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SurveyTable {
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

        let headers = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell value; a missing column or short row reads as empty.
    pub fn cell<'a>(&'a self, row: &'a [String], column: Option<usize>) -> &'a str {
        column
            .and_then(|idx| row.get(idx))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// `project.dataset.table`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableId {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableId {
    pub fn new(project: &str, dataset: &str, table: &str) -> Self {
        Self {
            project: project.to_string(),
            dataset: dataset.to_string(),
            table: table.to_string(),
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    String,
    Bytes,
    Integer,
    Float,
    Boolean,
    Datetime,
    Date,
    Time,
    Record,
}

impl FieldType {
    /// Maps loose type names ("string", "int", "datetime.date", ...) to warehouse column types.
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "string" | "str" => Some(FieldType::String),
            "bytes" => Some(FieldType::Bytes),
            "int" => Some(FieldType::Integer),
            "float" => Some(FieldType::Float),
            "bool" => Some(FieldType::Boolean),
            "datetime" => Some(FieldType::Datetime),
            "datetime.date" => Some(FieldType::Date),
            "datetime.time" => Some(FieldType::Time),
            "dict" => Some(FieldType::Record),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl SchemaField {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
        }
    }
}

/// Equality filter on one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFilter {
    pub column: String,
    pub value: String,
}

impl RowFilter {
    pub fn eq(column: &str, value: &str) -> Self {
        Self {
            column: column.to_string(),
            value: value.to_string(),
        }
    }
}

/// Rows bound for one warehouse table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableBatch {
    pub dataset: String,
    pub table: &'static str,
    pub rows: Vec<Record>,
    /// `None` lets the warehouse infer column types.
    pub schema: Option<Vec<SchemaField>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformResult {
    pub batches: Vec<TableBatch>,
}

/// A CSV entry pulled out of an uploaded archive.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvExport {
    /// Base file name, without the directory inside the archive.
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZipReport {
    pub csv_files_processed: Vec<String>,
    pub csv_files_skipped: Vec<String>,
    pub tables_updated: Vec<String>,
    pub records_added: BTreeMap<String, usize>,
}

impl ZipReport {
    pub fn record_upload(&mut self, table: &str, count: usize) {
        if !self.records_added.contains_key(table) {
            self.tables_updated.push(table.to_string());
        }
        *self.records_added.entry(table.to_string()).or_insert(0) += count;
    }

    pub fn total_records(&self) -> usize {
        self.records_added.values().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProcessOutcome {
    Success {
        survey_type: SurveyType,
        #[serde(flatten)]
        report: ZipReport,
    },
    Skipped {
        reason: String,
    },
    Error {
        reason: String,
    },
}

impl ProcessOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        ProcessOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        ProcessOutcome::Error {
            reason: reason.into(),
        }
    }
}
