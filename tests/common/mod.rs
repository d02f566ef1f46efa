#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;
use std::time::Duration;
use survey_etl::core::aggregate;
use survey_etl::core::ConfigProvider;
use zip::write::{SimpleFileOptions, ZipWriter};

pub const BRAND_ARCHIVE: &str = "[Lemonade] MMM _ Brand Tracker - Austin, TX.zip";
pub const CUSTOM_ARCHIVE: &str = "[Lemonade] MMM - Chicago, IL.zip";
pub const BRAND_CSV_NAME: &str = "Responses 2025-03-17T19:31:41.076Z [Study 555].csv";

pub struct TestConfig;

impl ConfigProvider for TestConfig {
    fn project_id(&self) -> &str {
        "test-project"
    }

    fn brand_dataset(&self) -> &str {
        "brand_ds"
    }

    fn custom_dataset(&self) -> &str {
        "custom_ds"
    }

    fn dedup_window(&self) -> Duration {
        Duration::from_secs(60)
    }
}

pub fn brand_csv() -> String {
    format!(
        "Age,Gender,Client Type,Recorded Timestamp,Session Weight,\"{}\",\"{}\",\"{}\"\n\
         25-34,Female,Mobile,2025-03-17 19:31,2,Geico;Progressive,Geico,Lemonade\n\
         25-34,Female,Mobile,2025-03-17 19:35,2,Geico,Geico,Geico\n\
         35-44,Male,Desktop,2025-03-17 19:40,,State Farm,,\n",
        aggregate::BRAND_Q1,
        aggregate::BRAND_Q2,
        aggregate::BRAND_Q3
    )
}

pub fn custom_csv() -> String {
    format!(
        "Age,Gender,Session Weight,\"{}\",\"{}\"\n\
         18-24,Male,1,gieco,usaa and progresive\n\
         45-54,Female,1.5,idk,\n",
        aggregate::CUSTOM_Q1,
        aggregate::CUSTOM_Q2
    )
}

pub fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Writes `bytes` to `<root>/<bucket>/<name>` for `LocalStorage`.
pub fn put_object(root: &Path, bucket: &str, name: &str, bytes: &[u8]) {
    let dir = root.join(bucket);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(name), bytes).unwrap();
}
