//! Normalizes free-text brand answers from custom surveys into canonical insurer names.

use crate::domain::model::SurveyTable;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

pub const NONE_UNKNOWN: &str = "None/Unknown";
pub const NON_INSURANCE: &str = "Non-Insurance Response";

/// Aliases are matched as substrings of the normalized answer, first brand wins.
const BRAND_ALIASES: &[(&str, &[&str])] = &[
    (
        "State Farm",
        &[
            "state farm", "statefarm", "state farms", "statefarms", "state farn", "state fram",
            "state fatm", "state farme", "state farmm", "state darm", "staye farm", "stte farm",
            "stat farm", "state form", "state far", "st farm", "st farms", "statefarm insurance",
        ],
    ),
    (
        "Geico",
        &[
            "geico", "gieco", "gico", "gyco", "gecko", "geco", "gecio", "giego", "gieko", "geigo",
            "geicho", "geicko", "geicoo", "giceo", "gicko", "gigo", "gaico", "giecco",
            "geico insurance",
        ],
    ),
    (
        "Progressive",
        &[
            "progressive", "progessive", "proggresive", "progresive", "proggressive",
            "pergressive", "progrssive", "progreessive", "prgressiv", "progressiv", "progress",
            "prlogressive", "pergresive", "prgressive",
        ],
    ),
    (
        "Allstate",
        &[
            "allstate", "all state", "all states", "alstate", "alsate", "allstare", "allstaye",
            "alsrate", "alsstate", "allstarte", "allstated", "alllstate", "all stat", "allstars",
            "allstar",
        ],
    ),
    (
        "Liberty Mutual",
        &[
            "liberty", "liberty mutual", "librety", "liberty mitchell", "liberdy", "lirbety",
            "liberty neutral", "liberity", "libery", "bibrety",
        ],
    ),
    (
        "Farmers",
        &[
            "farmers", "farm bureau", "farmer", "farm burau", "farm bearu", "farm beaura",
            "farm beuro", "farm buro", "farm beura", "farm bearo", "farm bearue", "farm beaure",
        ],
    ),
    ("USAA", &["usaa", "ussa"]),
    (
        "Lemonade",
        &[
            "lemonade", "lemona", "lemonde", "lemonaid", "lemonad", "lemonad3", "lemonadr",
            "lemonades", "lemonada", "lemonade pet insurance", "lemonade pet", "pet lemonade",
            "lemonade insurance",
        ],
    ),
    ("The General", &["general", "the general"]),
    ("Nationwide", &["nationwide", "nation wide"]),
    ("Travelers", &["travelers", "travellers"]),
    ("American Family", &["american family", "am fam", "amfam"]),
    ("Root", &["root", "root insurance"]),
    ("Metromile", &["metromile", "metro mile"]),
    ("Clearcover", &["clearcover", "clear cover"]),
    ("Blue Cross Blue Shield", &["blue cross", "bcbs", "blue cross blue shield"]),
    ("Humana", &["humana"]),
    ("Aetna", &["aetna"]),
    ("Cigna", &["cigna"]),
    ("UnitedHealth", &["united", "united health", "unitedhealthcare"]),
    // Hyphens normalize to spaces, so "e-surance" arrives here as "e surance".
    ("Esurance", &["esurance", "e surance"]),
    ("Safe Auto", &["safe auto", "safeauto"]),
    ("Direct Auto", &["direct auto", "direct"]),
    ("Endurance", &["endurance"]),
    ("Aflac", &["aflac"]),
    ("Shelter", &["shelter", "shelter insurance"]),
    ("Erie", &["erie", "erie insurance"]),
    ("AARP", &["aarp"]),
    ("Hartford", &["hartford", "the hartford"]),
    ("Prudential", &["prudential"]),
    ("Auto-Owners", &["auto owners", "autoowners"]),
    ("Western & Southern", &["western and southern", "western southern"]),
    ("Mutual of Omaha", &["mutual of omaha", "mutual omaha"]),
    ("Gerber", &["gerber", "gerber life"]),
    ("Safeco", &["safeco", "safeco insurance"]),
    ("Grange", &["grange", "grange insurance", "grange mutual"]),
    ("Otto", &["otto", "otto insurance"]),
    ("NJM", &["njm", "new jersey manufacturers", "njm insurance"]),
    (
        "Anthem",
        &["anthem", "anthem insurance", "anthem blue cross", "anthem bcbs"],
    ),
    ("Fred Loya", &["fred loya", "fredloya", "fred loya insurance"]),
    ("Pronto", &["pronto", "pronto insurance"]),
    ("Elephant", &["elephant", "elephant insurance"]),
    ("Zebra", &["zebra", "zebra insurance"]),
    ("Amica", &["amica", "amica insurance", "amica mutual"]),
];

/// Exact (normalized) answers that carry no brand.
const NON_ANSWERS: &[&str] = &[
    "", "no", "none", "nothing", "na", "n a", "nada", "nope", "no e", "non", "0", "1",
    "dont know", "don t know", "dont know any", "don t know any", "idk", "i dont know",
    "i don t know", "i dont know any", "i don t know any", "i don t", "i dont", "dont",
    "not sure", "no idea", "unknown", "unsure", "dunno", "no clue", "not interested", "no one",
    "not any", "cant think", "no brand", "dont care", "don t care", "dont use", "not much",
    "not now", "never", "ok", "yes", "hi", "car", "life", "scam",
];

/// Exact answers of at most five characters naming a brand by prefix.
const PARTIAL_NAMES: &[(&str, &str)] = &[
    ("farm", "State Farm"),
    ("state", "State Farm"),
    ("pro", "Progressive"),
    ("prog", "Progressive"),
    ("gei", "Geico"),
    ("all", "Allstate"),
    ("lib", "Liberty Mutual"),
    ("gen", "The General"),
];

const NON_INSURANCE_TERMS: &[&str] = &[
    "nike", "amazon", "apple", "google", "facebook", "microsoft", "walmart", "target",
    "mcdonalds", "starbucks", "coca cola", "pepsi", "ford", "toyota", "honda", "chevrolet", "bmw",
    "obamacare", "medicare", "medicaid", "social security", "zara", "iran", "lemon", "nine",
    "metropolitan", "the duck one", "i love", "bee",
];

const MULTI_BRAND_SEPARATORS: &[&str] = &[",", ".", ";", " and ", "&", " & ", " + ", "|"];

static NON_WORD: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[^\w\s]").ok());

fn normalize(response: &str) -> String {
    let lowered = response.trim().to_lowercase();
    let stripped = match NON_WORD.as_ref() {
        Some(re) => re.replace_all(&lowered, " ").into_owned(),
        None => lowered,
    };
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Capitalizes the first letter of each alphabetic run and lowercases the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_alpha = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if previous_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_alpha = true;
        } else {
            out.push(c);
            previous_alpha = false;
        }
    }
    out
}

pub fn clean_brand_response(response: &str) -> String {
    if response.is_empty() {
        return NONE_UNKNOWN.to_string();
    }

    let normalized = normalize(response);

    if NON_ANSWERS.contains(&normalized.as_str()) {
        return NONE_UNKNOWN.to_string();
    }

    for (brand, aliases) in BRAND_ALIASES {
        if aliases.iter().any(|alias| normalized.contains(alias)) {
            return brand.to_string();
        }
    }

    if normalized.chars().count() <= 5 {
        if let Some((_, brand)) = PARTIAL_NAMES.iter().find(|(partial, _)| *partial == normalized) {
            return brand.to_string();
        }
    }

    if NON_INSURANCE_TERMS.iter().any(|term| normalized.contains(term)) {
        return NON_INSURANCE.to_string();
    }

    title_case(&normalized)
}

/// Splits a list-style answer ("geico, progressive and state farm") into cleaned brands.
pub fn split_multiple_brands(response: &str) -> Vec<String> {
    if response.is_empty() {
        return vec![NONE_UNKNOWN.to_string()];
    }

    let mut unified = response.trim().to_string();
    for separator in MULTI_BRAND_SEPARATORS {
        unified = unified.replace(separator, "|");
    }

    let brands: Vec<String> = unified
        .split('|')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(clean_brand_response)
        .filter(|brand| brand != NONE_UNKNOWN)
        .collect();

    if brands.is_empty() {
        vec![NONE_UNKNOWN.to_string()]
    } else {
        brands
    }
}

/// Open-ended question columns of a custom survey export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenEndedColumns {
    pub first_brand: usize,
    pub other_brands: usize,
}

pub fn find_open_ended_columns(table: &SurveyTable) -> Option<OpenEndedColumns> {
    let mut first_brand = None;
    let mut other_brands = None;

    for (idx, header) in table.headers.iter().enumerate() {
        if header.contains("OPEN_ENDED") && header.contains("first brand") {
            first_brand = Some(idx);
        } else if header.contains("OPEN_ENDED") && header.contains("other") {
            other_brands = Some(idx);
        }
    }

    Some(OpenEndedColumns {
        first_brand: first_brand?,
        other_brands: other_brands?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedAnswers {
    pub q1_cleaned: String,
    /// `; `-joined brand list.
    pub q2_cleaned: String,
}

pub fn clean_custom_table(table: &SurveyTable) -> Option<Vec<CleanedAnswers>> {
    let Some(columns) = find_open_ended_columns(table) else {
        tracing::warn!("Could not find Q1 and Q2 columns");
        return None;
    };

    tracing::debug!(
        "Cleaning Q1: {}...",
        table.headers[columns.first_brand].chars().take(50).collect::<String>()
    );
    tracing::debug!(
        "Cleaning Q2: {}...",
        table.headers[columns.other_brands].chars().take(50).collect::<String>()
    );

    Some(
        table
            .rows
            .iter()
            .map(|row| CleanedAnswers {
                q1_cleaned: clean_brand_response(table.cell(row, Some(columns.first_brand))),
                q2_cleaned: split_multiple_brands(table.cell(row, Some(columns.other_brands)))
                    .join("; "),
            })
            .collect(),
    )
}

/// One entry per individual Q2 brand, excluding `None/Unknown`.
pub fn explode_q2(cleaned: &[CleanedAnswers]) -> Vec<String> {
    cleaned
        .iter()
        .flat_map(|answers| answers.q2_cleaned.split("; "))
        .filter(|brand| *brand != NONE_UNKNOWN)
        .map(str::to_string)
        .collect()
}

/// Most frequent values first; ties keep first-seen order.
fn value_counts<'a>(values: impl Iterator<Item = &'a str>, limit: usize) -> Vec<(&'a str, usize)> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        let count = counts.entry(value).or_insert_with(|| {
            order.push(value);
            0
        });
        *count += 1;
    }

    let mut ranked: Vec<(&str, usize)> = order.into_iter().map(|v| (v, counts[v])).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(limit);
    ranked
}

pub fn cleaning_report(table: &SurveyTable) -> String {
    let Some(columns) = find_open_ended_columns(table) else {
        return "Could not find question columns".to_string();
    };
    let cleaned = clean_custom_table(table).unwrap_or_default();

    let mut report = vec![
        "=== CUSTOM SURVEY CLEANING REPORT ===".to_string(),
        format!("Total responses processed: {}", table.len()),
        String::new(),
        "=== Q1 (First Brand) - BEFORE CLEANING ===".to_string(),
    ];

    let q1_before = table.rows.iter().map(|r| table.cell(r, Some(columns.first_brand)));
    for (brand, count) in value_counts(q1_before, 15) {
        report.push(format!("{}: {}", brand, count));
    }

    report.push(String::new());
    report.push("=== Q1 (First Brand) - AFTER CLEANING ===".to_string());
    for (brand, count) in value_counts(cleaned.iter().map(|c| c.q1_cleaned.as_str()), 15) {
        report.push(format!("{}: {}", brand, count));
    }

    report.push(String::new());
    report.push("=== Q2 (Other Brands) - BEFORE CLEANING ===".to_string());
    let q2_before = table.rows.iter().map(|r| table.cell(r, Some(columns.other_brands)));
    for (brand, count) in value_counts(q2_before, 15) {
        report.push(format!("'{}': {}", brand, count));
    }

    report.push(String::new());
    report.push("=== Q2 (Other Brands) - AFTER CLEANING ===".to_string());
    for (brand, count) in value_counts(cleaned.iter().map(|c| c.q2_cleaned.as_str()), 15) {
        report.push(format!("'{}': {}", brand, count));
    }

    report.join("\n")
}
