//! Per-respondent rows and per-question answer counts.

use crate::core::cleaner;
use crate::domain::model::{BrandResponse, CustomResponse, DmaInfo, QuestionCount, Respondent, SurveyTable};
use std::collections::BTreeMap;

pub const BRAND_Q1: &str = "Q[1] - CHOOSE_MULTIPLE - Which of the following insurance companies have you heard of?";
pub const BRAND_Q2: &str = "Q[2] - CHOOSE_MULTIPLE - Which of the following insurance companies would you consider purchasing?";
pub const BRAND_Q3: &str = "Q[3] - CHOOSE_ONE - Which of the following insurance companies are you most likely to purchase in the next 3 months?";

pub const CUSTOM_Q1: &str = "Q[1] - OPEN_ENDED - When you think of an online insurance brand, what is the first brand that comes to mind? (please only indicate one brand)";
pub const CUSTOM_Q2: &str = "Q[2] - OPEN_ENDED - What other online insurance brands do you know?";

const UNMAPPED: &str = "UNMAPPED_RESPONSE";

const CANONICAL_BRANDS: &[(&str, &str)] = &[
    ("allstate", "Allstate"),
    ("geico", "Geico"),
    ("progressive", "Progressive"),
    ("state farm", "State Farm"),
    ("liberty mutual", "Liberty Mutual"),
    ("farmers", "Farmers"),
    ("usaa", "USAA"),
    ("nationwide", "Nationwide"),
    ("american family", "American Family"),
    ("the general", "The General"),
    ("esurance", "Esurance"),
    ("travelers", "Travelers"),
    ("safeco", "Safeco"),
    ("hartford", "Hartford"),
];

/// Values shared by every row produced from one CSV export.
#[derive(Debug, Clone)]
pub struct ExportContext<'a> {
    pub dma: &'a str,
    pub dma_info: &'a DmaInfo,
    pub study_id: &'a str,
    pub survey_date: &'a str,
    pub processed_date: &'a str,
}

/// Missing, empty or unparsable weights count as 1.0.
fn parse_weight(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|w| w.is_finite())
        .unwrap_or(1.0)
}

struct DemographicColumns {
    age: Option<usize>,
    gender: Option<usize>,
    client_type: Option<usize>,
    recorded_timestamp: Option<usize>,
    session_weight: Option<usize>,
}

impl DemographicColumns {
    fn locate(table: &SurveyTable) -> Self {
        Self {
            age: table.column("Age"),
            gender: table.column("Gender"),
            client_type: table.column("Client Type"),
            recorded_timestamp: table.column("Recorded Timestamp"),
            session_weight: table.column("Session Weight"),
        }
    }

    fn respondent(&self, table: &SurveyTable, row: &[String], ctx: &ExportContext<'_>) -> Respondent {
        Respondent {
            age: table.cell(row, self.age).to_string(),
            gender: table.cell(row, self.gender).to_string(),
            geo: ctx.dma.to_string(),
            client_type: table.cell(row, self.client_type).to_string(),
            recorded_timestamp: table.cell(row, self.recorded_timestamp).to_string(),
            session_weight: parse_weight(table.cell(row, self.session_weight)),
            survey_date: ctx.survey_date.to_string(),
            processed_date: ctx.processed_date.to_string(),
            study_number: ctx.study_id.to_string(),
            group_type: ctx.dma_info.group_type.clone(),
            group: ctx.dma_info.group.clone(),
        }
    }
}

pub fn brand_responses(table: &SurveyTable, ctx: &ExportContext<'_>) -> Vec<BrandResponse> {
    let demographics = DemographicColumns::locate(table);
    let (q1, q2, q3) = (table.column(BRAND_Q1), table.column(BRAND_Q2), table.column(BRAND_Q3));

    table
        .rows
        .iter()
        .map(|row| BrandResponse {
            respondent: demographics.respondent(table, row, ctx),
            q1_answer: table.cell(row, q1).to_string(),
            q2_answer: table.cell(row, q2).to_string(),
            q3_answer: table.cell(row, q3).to_string(),
        })
        .collect()
}

pub fn custom_responses(table: &SurveyTable, ctx: &ExportContext<'_>) -> Vec<CustomResponse> {
    let demographics = DemographicColumns::locate(table);
    let (q1, q2) = (table.column(CUSTOM_Q1), table.column(CUSTOM_Q2));

    table
        .rows
        .iter()
        .map(|row| {
            let q1_answer = table.cell(row, q1);
            let q2_answer = table.cell(row, q2);
            CustomResponse {
                respondent: demographics.respondent(table, row, ctx),
                q1_answer: q1_answer.to_string(),
                q2_answer: q2_answer.to_string(),
                q1_cleaned: cleaner::clean_brand_response(q1_answer),
                q2_cleaned: cleaner::split_multiple_brands(q2_answer)
                    .into_iter()
                    .filter(|b| !b.is_empty())
                    .collect::<Vec<_>>()
                    .join(", "),
            }
        })
        .collect()
}

/// Canonical spelling for the multiple-choice brand labels; unknown labels pass through trimmed.
pub fn clean_brand_name(brand: &str) -> String {
    if brand.is_empty() || brand == "nan" {
        return brand.to_string();
    }

    let brand = brand.trim();
    let lowered = brand.to_lowercase();
    CANONICAL_BRANDS
        .iter()
        .find(|(key, _)| lowered.contains(key))
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| brand.to_string())
}

fn is_answered(answer: &str) -> bool {
    !answer.is_empty() && answer != "nan"
}

/// Splits a multiple-choice cell and drops blank choices.
fn split_choices(answer: &str, delimiter: char) -> impl Iterator<Item = &str> {
    answer
        .split(delimiter)
        .map(str::trim)
        .filter(|choice| is_answered(choice))
}

/// Group key; the weight is keyed by its bit pattern so identical weights group together.
type GroupKey = (
    String,
    String,
    String,
    String,
    u64,
    String,
    String,
    String,
    String,
    String,
    String,
);

/// Blank demographic cells form their own group instead of dropping the respondent.
struct Counter {
    answer_column: &'static str,
    groups: BTreeMap<GroupKey, (f64, u64)>,
}

impl Counter {
    fn new(answer_column: &'static str) -> Self {
        Self {
            answer_column,
            groups: BTreeMap::new(),
        }
    }

    fn add(&mut self, respondent: &Respondent, answer: &str) {
        let key = (
            respondent.age.clone(),
            respondent.gender.clone(),
            respondent.geo.clone(),
            respondent.client_type.clone(),
            respondent.session_weight.to_bits(),
            respondent.survey_date.clone(),
            respondent.processed_date.clone(),
            respondent.study_number.clone(),
            answer.to_string(),
            respondent.group_type.clone(),
            respondent.group.clone(),
        );
        let entry = self.groups.entry(key).or_insert((respondent.session_weight, 0));
        entry.1 += 1;
    }

    fn finish(self) -> Vec<QuestionCount> {
        let answer_column = self.answer_column;
        self.groups
            .into_iter()
            .map(|(key, (weight, count))| {
                let (age, gender, geo, client_type, _, survey_date, processed_date, study_number, answer, group_type, group) =
                    key;
                QuestionCount {
                    age,
                    gender,
                    geo,
                    client_type,
                    session_weight: weight,
                    survey_date,
                    processed_date,
                    study_number,
                    group_type,
                    group,
                    answer_column,
                    answer,
                    count_response: count,
                    weighted_response: weight * count as f64,
                }
            })
            .collect()
    }
}

/// `awareness`, `consideration` and `intent` tables; tables without answers are omitted.
pub fn brand_question_tables(responses: &[BrandResponse]) -> Vec<(&'static str, Vec<QuestionCount>)> {
    if responses.is_empty() {
        tracing::warn!("❌ Brand responses are empty, no question tables");
        return Vec::new();
    }

    tracing::info!("🔍 Creating question tables from {} brand responses", responses.len());

    let questions: [(&'static str, &'static str, bool, fn(&BrandResponse) -> &str); 3] = [
        ("awareness", "q1_answer", true, |r| r.q1_answer.as_str()),
        ("consideration", "q2_answer", true, |r| r.q2_answer.as_str()),
        ("intent", "q3_answer", false, |r| r.q3_answer.as_str()),
    ];

    let mut tables = Vec::new();
    for (table_name, answer_column, multiple_choice, answer_of) in questions {
        let answered: Vec<&BrandResponse> =
            responses.iter().filter(|r| is_answered(answer_of(r))).collect();

        if answered.is_empty() {
            tracing::warn!("❌ No valid data for {} (column: {})", table_name, answer_column);
            continue;
        }
        tracing::info!("✅ Found {} valid responses for {}", answered.len(), table_name);

        let mut counter = Counter::new(answer_column);
        for response in answered {
            let answer = answer_of(response);
            if multiple_choice {
                for choice in split_choices(answer, ';') {
                    counter.add(&response.respondent, &clean_brand_name(choice));
                }
            } else {
                counter.add(&response.respondent, &clean_brand_name(answer));
            }
        }

        let counts = counter.finish();
        if !counts.is_empty() {
            tables.push((table_name, counts));
        }
    }

    tables
}

/// `top_of_mind` (cleaned Q1) and `knowledge` (individual cleaned Q2 brands).
pub fn custom_question_tables(responses: &[CustomResponse]) -> Vec<(&'static str, Vec<QuestionCount>)> {
    let mut tables = Vec::new();
    if responses.is_empty() {
        return tables;
    }

    let mut top_of_mind = Counter::new("q1_cleaned");
    for response in responses {
        if !response.q1_cleaned.is_empty() && response.q1_cleaned != UNMAPPED {
            top_of_mind.add(&response.respondent, &response.q1_cleaned);
        }
    }
    let top_of_mind = top_of_mind.finish();
    if !top_of_mind.is_empty() {
        tables.push(("top_of_mind", top_of_mind));
    }

    let mut knowledge = Counter::new("q2_individual");
    for response in responses {
        if response.q2_cleaned.is_empty() || response.q2_cleaned == UNMAPPED {
            continue;
        }
        for brand in response.q2_cleaned.split(',').map(str::trim) {
            if !brand.is_empty() && brand != UNMAPPED {
                knowledge.add(&response.respondent, brand);
            }
        }
    }
    let knowledge = knowledge.finish();
    if !knowledge.is_empty() {
        tables.push(("knowledge", knowledge));
    }

    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(info: &'a DmaInfo) -> ExportContext<'a> {
        ExportContext {
            dma: "Austin, TX",
            dma_info: info,
            study_id: "id_1",
            survey_date: "2025-03-17",
            processed_date: "2025-03-18",
        }
    }

    fn brand_table(rows: &[[&str; 5]]) -> SurveyTable {
        SurveyTable {
            headers: vec![
                "Age".to_string(),
                "Session Weight".to_string(),
                BRAND_Q1.to_string(),
                BRAND_Q2.to_string(),
                BRAND_Q3.to_string(),
            ],
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    fn info() -> DmaInfo {
        DmaInfo {
            group_type: "TEST".to_string(),
            group: "1".to_string(),
        }
    }

    #[test]
    fn test_brand_responses_read_fixed_columns() {
        let info = info();
        let table = brand_table(&[["25-34", "1.5", "Geico;Progressive", "Geico", "Lemonade"]]);
        let responses = brand_responses(&table, &ctx(&info));

        assert_eq!(responses.len(), 1);
        let r = &responses[0];
        assert_eq!(r.respondent.age, "25-34");
        assert_eq!(r.respondent.gender, "");
        assert_eq!(r.respondent.geo, "Austin, TX");
        assert_eq!(r.respondent.session_weight, 1.5);
        assert_eq!(r.respondent.group_type, "TEST");
        assert_eq!(r.q1_answer, "Geico;Progressive");
        assert_eq!(r.q3_answer, "Lemonade");
    }

    #[test]
    fn test_missing_weight_defaults_to_one() {
        assert_eq!(parse_weight(""), 1.0);
        assert_eq!(parse_weight("abc"), 1.0);
        assert_eq!(parse_weight("NaN"), 1.0);
        assert_eq!(parse_weight(" 0.75 "), 0.75);
    }

    #[test]
    fn test_clean_brand_name() {
        assert_eq!(clean_brand_name(" state farm insurance "), "State Farm");
        assert_eq!(clean_brand_name("GEICO"), "Geico");
        assert_eq!(clean_brand_name(" Lemonade "), "Lemonade");
        assert_eq!(clean_brand_name("nan"), "nan");
    }

    #[test]
    fn test_brand_question_tables_explode_and_count() {
        let info = info();
        let table = brand_table(&[
            ["25-34", "2.0", "Geico; Progressive", "Geico", "Lemonade"],
            ["25-34", "2.0", "geico", "", "nan"],
        ]);
        let responses = brand_responses(&table, &ctx(&info));
        let tables = brand_question_tables(&responses);

        let names: Vec<&str> = tables.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["awareness", "consideration", "intent"]);

        let awareness = &tables[0].1;
        assert_eq!(awareness.len(), 2);
        let geico = awareness.iter().find(|c| c.answer == "Geico").unwrap();
        assert_eq!(geico.count_response, 2);
        assert_eq!(geico.weighted_response, 4.0);
        assert_eq!(geico.answer_column, "q1_answer");

        let consideration = &tables[1].1;
        assert_eq!(consideration.len(), 1);
        assert_eq!(consideration[0].count_response, 1);

        let intent = &tables[2].1;
        assert_eq!(intent.len(), 1);
        assert_eq!(intent[0].answer, "Lemonade");

        let record = geico.to_record();
        assert_eq!(record.get_str("q1_answer"), Some("Geico"));
        assert_eq!(record.get_str("survey_dates"), Some("2025-03-17"));
        assert_eq!(record.data["count_response"], serde_json::json!(2));
        assert_eq!(record.data["Weighted_Response"], serde_json::json!(4.0));
    }

    #[test]
    fn test_unanswered_question_produces_no_table() {
        let info = info();
        let table = brand_table(&[["25-34", "1", "Geico", "", ""]]);
        let responses = brand_responses(&table, &ctx(&info));
        let tables = brand_question_tables(&responses);

        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].0, "awareness");
        assert!(brand_question_tables(&[]).is_empty());
    }

    #[test]
    fn test_custom_responses_and_tables() {
        let info = info();
        let table = SurveyTable {
            headers: vec![
                "Age".to_string(),
                CUSTOM_Q1.to_string(),
                CUSTOM_Q2.to_string(),
            ],
            rows: vec![
                vec!["18-24".to_string(), "gieco".to_string(), "usaa and progresive".to_string()],
                vec!["18-24".to_string(), "Geico".to_string(), "idk".to_string()],
            ],
        };

        let responses = custom_responses(&table, &ctx(&info));
        assert_eq!(responses[0].q1_cleaned, "Geico");
        assert_eq!(responses[0].q2_cleaned, "USAA, Progressive");
        assert_eq!(responses[1].q2_cleaned, cleaner::NONE_UNKNOWN);

        let tables = custom_question_tables(&responses);
        assert_eq!(tables.len(), 2);

        let (name, top_of_mind) = &tables[0];
        assert_eq!(*name, "top_of_mind");
        assert_eq!(top_of_mind.len(), 1);
        assert_eq!(top_of_mind[0].count_response, 2);

        let (name, knowledge) = &tables[1];
        assert_eq!(*name, "knowledge");
        let answers: Vec<&str> = knowledge.iter().map(|c| c.answer.as_str()).collect();
        assert_eq!(answers, vec!["None/Unknown", "Progressive", "USAA"]);
        assert_eq!(knowledge[0].answer_column, "q2_individual");
    }
}
