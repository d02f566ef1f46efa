//! Market-area (DMA), survey date and study id extraction from export file names.

use crate::domain::model::DmaInfo;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// (DMA name, group type, group)
const DMA_TABLE: &[(&str, &str, &str)] = &[
    ("Austin, TX", "TEST", "1"),
    ("Phoenix et al, AZ", "TEST", "1"),
    ("Denver, CO", "TEST", "1"),
    ("Portland, OR", "TEST", "1"),
    ("San Antonio, TX", "TEST", "1"),
    ("Nashville, TN", "CONTROL", "1"),
    ("Cleveland et al, OH", "CONTROL", "1"),
    ("Waco-Temple-Bryan, TX", "CONTROL", "1"),
    ("Cincinnati, OH", "CONTROL", "both"),
    ("Tucson(Sierra Vista), AZ", "CONTROL", "1"),
    ("Colorado Sprgs et al, CO", "CONTROL", "1"),
    ("Knoxville, TN", "CONTROL", "1"),
    ("Memphis, TN", "CONTROL", "1"),
    ("Eugene, OR", "CONTROL", "1"),
    ("El Paso et al, TX-NM", "CONTROL", "1"),
    ("Spokane, WA", "CONTROL", "1"),
    ("Tyler-Longview et al, TX", "CONTROL", "1"),
    ("Dayton, OH", "CONTROL", "1"),
    ("Lubbock, TX", "CONTROL", "1"),
    ("Chattanooga, TN", "CONTROL", "1"),
    ("Toledo, OH", "CONTROL", "1"),
    ("Yakima et al, WA", "CONTROL", "both"),
    ("Tri-Cities, TN-VA", "CONTROL", "1"),
    ("Rockford, IL", "CONTROL", "1"),
    ("Youngstown, OH", "CONTROL", "both"),
    ("Amarillo, TX", "CONTROL", "both"),
    ("Beaumont-Port Arthur, TX", "CONTROL", "1"),
    ("Abilene-Sweetwater, TX", "CONTROL", "1"),
    ("Sherman-Ada, TX-OK", "CONTROL", "1"),
    ("Wichita Fls et al, TX-OK", "CONTROL", "1"),
    ("San Angelo, TX", "CONTROL", "both"),
    ("Corpus Christi, TX", "CONTROL", "1"),
    ("Grand Junction et al, CO", "CONTROL", "both"),
    ("Laredo, TX", "CONTROL", "1"),
    ("Yuma-El Centro, AZ-CA", "CONTROL", "both"),
    ("Jackson, TN", "CONTROL", "1"),
    ("Victoria, TX", "CONTROL", "1"),
    ("Wheeling et al, WV-OH", "CONTROL", "1"),
    ("Lima, OH", "CONTROL", "1"),
    ("Zanesville, OH", "CONTROL", "both"),
    ("Chicago, IL", "TEST", "2"),
    ("Champaign et al, IL", "CONTROL", "2"),
    ("Peoria-Bloomington, IL", "CONTROL", "2"),
    ("Davenport et al, IA-IL", "CONTROL", "2"),
    ("Minot et al, ND", "CONTROL", "2"),
];

// Export names the survey tool truncated beyond what the patterns can recover.
const MANUAL_NAMES: &[(&str, &str)] = &[
    (
        "[Lemonade] MMM _ Brand Tracker - Colorado Springs,.zip",
        "Colorado Sprgs et al, CO",
    ),
    (
        "[Lemonade] MMM _ Brand Tracker - Corpus Christi, T.zip",
        "Corpus Christi, TX",
    ),
    (
        "[Lemonade] MMM _ Brand Tracker - Grand Junction, C.zip",
        "Grand Junction et al, CO",
    ),
    (
        "[Lemonade] MMM _ Brand Tracker - Tucson(Sierra Vis.zip",
        "Tucson(Sierra Vista), AZ",
    ),
    (
        "[Lemonade] MMM _ Brand Tracker - Wichita Falls, TX.zip",
        "Wichita Fls et al, TX-OK",
    ),
    (
        "[Lemonade] MMM - Colorado Springs, CO (Control).zip",
        "Colorado Sprgs et al, CO",
    ),
    (
        "[Lemonade] MMM - Wichita Falls, TX-OK (Control).zip",
        "Wichita Fls et al, TX-OK",
    ),
];

const TRUNCATION_FIXES: &[(&str, &str)] = &[
    ("wate", "water"),
    (" art", " arthur"),
    ("contr", "control"),
    ("sweetwate", "sweetwater"),
];

static CITY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"([A-Za-z\s\-()]+),\s*([A-Z]{2}(?:-[A-Z]{2})?)",
        r"([A-Za-z\s\-()]+),\s*([A-Z]{2})",
        r"- ([A-Za-z\s\-()]+), ([A-Z]{2})",
        r"- ([A-Za-z\s\-()]+)-([A-Za-z\s]+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static SURVEY_DATE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d{4}-\d{2}-\d{2})T").ok());

static STUDY_ID: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\[Study\s+(\d+)\]").ok());

pub fn dma_info(dma: &str) -> Option<DmaInfo> {
    DMA_TABLE
        .iter()
        .find(|(name, _, _)| *name == dma)
        .map(|(_, group_type, group)| DmaInfo {
            group_type: group_type.to_string(),
            group: group.to_string(),
        })
}

/// Resolves the DMA and its group assignment, falling back to `Unknown DMA`.
pub fn resolve_dma(archive_name: &str) -> (String, DmaInfo) {
    match extract_dma(archive_name) {
        Some(dma) => {
            let info = dma_info(dma).unwrap_or_else(DmaInfo::unknown);
            (dma.to_string(), info)
        }
        None => ("Unknown DMA".to_string(), DmaInfo::unknown()),
    }
}

pub fn extract_dma(filename: &str) -> Option<&'static str> {
    if let Some((_, dma)) = MANUAL_NAMES.iter().find(|(name, _)| *name == filename) {
        return Some(dma);
    }

    for pattern in CITY_PATTERNS.iter() {
        let Some(captures) = pattern.captures(filename) else {
            continue;
        };
        let Some(city_part) = captures.get(1) else {
            continue;
        };

        let city = fix_truncated_city(&city_part.as_str().trim().to_lowercase());
        if let Some(dma) = match_city(&city) {
            return Some(dma);
        }
    }

    tracing::warn!("Could not extract DMA from: {}", filename);
    None
}

/// Archive names are cut off by the export tool, e.g. `abilene-sweetwate`.
fn fix_truncated_city(city: &str) -> String {
    let mut city = city.to_string();
    for (truncated, full) in TRUNCATION_FIXES {
        if city.ends_with(truncated) {
            city = city.replace(truncated, full);
        }
    }
    city
}

fn match_city(city: &str) -> Option<&'static str> {
    DMA_TABLE.iter().map(|(name, _, _)| *name).find(|dma| {
        let Some((dma_city, _)) = dma.split_once(',') else {
            return false;
        };
        let dma_city = dma_city.trim().to_lowercase();

        city == dma_city
            || dma_city.contains(city)
            || city.contains(&dma_city)
            || city
                .split('-')
                .filter(|word| word.chars().count() > 3)
                .any(|word| dma_city.contains(word))
    })
}

/// `2025-03-17` from a name containing `2025-03-17T19:31:41.076Z`.
pub fn extract_survey_date(filename: &str) -> Option<String> {
    let found = SURVEY_DATE
        .as_ref()
        .and_then(|re| re.captures(filename))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    if found.is_none() {
        tracing::warn!("⚠️ Could not extract survey date from filename: {}", filename);
    }
    found
}

pub fn extract_study_id(csv_name: &str) -> String {
    if let Some(number) = STUDY_ID
        .as_ref()
        .and_then(|re| re.captures(csv_name))
        .and_then(|c| c.get(1))
    {
        return format!("id_{}", number.as_str());
    }

    // Stable across processes and toolchains: first 8 bytes of the SHA-256 digest.
    let digest = Sha256::digest(csv_name.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    format!("id_{}", u64::from_be_bytes(prefix) % 10_000_000_000_000_000_000)
}
