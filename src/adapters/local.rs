use crate::domain::model::{Record, RowFilter, SchemaField, TableId};
use crate::domain::ports::{Storage, Warehouse};
use crate::utils::error::Result;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Objects live at `<base>/<bucket>/<name>`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl Storage for LocalStorage {
    async fn fetch_object(&self, bucket: &str, name: &str) -> Result<Option<Vec<u8>>> {
        let full_path = self.base_path.join(bucket).join(name);
        match fs::read(&full_path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// CSV-file warehouse: `<dir>/<dataset>/<table>.csv`. The first load fixes the columns;
/// later loads drop columns the file does not have.
#[derive(Debug)]
pub struct LocalWarehouse {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalWarehouse {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn table_path(&self, table: &TableId) -> PathBuf {
        self.root
            .join(&table.dataset)
            .join(format!("{}.csv", table.table))
    }

    fn read_header(path: &Path) -> Result<Vec<String>> {
        let mut reader = csv::Reader::from_path(path)?;
        Ok(reader.headers()?.iter().map(str::to_string).collect())
    }

    fn new_header(rows: &[Record], schema: Option<&[SchemaField]>) -> Vec<String> {
        let mut header: Vec<String> = schema
            .map(|fields| fields.iter().map(|f| f.name.clone()).collect())
            .unwrap_or_default();

        let extra: BTreeSet<&String> = rows
            .iter()
            .flat_map(|r| r.data.keys())
            .filter(|k| !header.contains(k))
            .collect();
        header.extend(extra.into_iter().cloned());
        header
    }
}

impl Warehouse for LocalWarehouse {
    async fn load_rows(
        &self,
        table: &TableId,
        rows: &[Record],
        schema: Option<&[SchemaField]>,
    ) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let _guard = self.write_lock.lock().await;
        let path = self.table_path(table);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let exists = path.exists();
        let header = if exists {
            Self::read_header(&path)?
        } else {
            Self::new_header(rows, schema)
        };

        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let mut writer = csv::Writer::from_writer(file);
        if !exists {
            writer.write_record(&header)?;
        }
        for row in rows {
            writer.write_record(header.iter().map(|column| cell_text(row.data.get(column))))?;
        }
        writer.flush()?;

        tracing::debug!("💾 Appended {} rows to {}", rows.len(), path.display());
        Ok(rows.len())
    }

    async fn read_rows(&self, table: &TableId, filter: Option<&RowFilter>) -> Result<Vec<Record>> {
        let path = self.table_path(table);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let data: HashMap<String, Value> = header
                .iter()
                .zip(row.iter())
                .map(|(column, value)| (column.clone(), Value::from(value)))
                .collect();
            let record = Record { data };

            let keep = filter.map_or(true, |f| record.get_str(&f.column) == Some(f.value.as_str()));
            if keep {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::FieldType;
    use tempfile::TempDir;

    fn record(pairs: &[(&str, Value)]) -> Record {
        Record {
            data: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_local_storage_missing_object() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("bucket")).unwrap();
        fs::write(dir.path().join("bucket").join("a.zip"), b"zip").unwrap();

        let storage = LocalStorage::new(dir.path());
        assert_eq!(
            storage.fetch_object("bucket", "a.zip").await.unwrap(),
            Some(b"zip".to_vec())
        );
        assert_eq!(storage.fetch_object("bucket", "b.zip").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_first_load_fixes_columns() {
        let dir = TempDir::new().unwrap();
        let warehouse = LocalWarehouse::new(dir.path());
        let table = TableId::new("p", "ds", "awareness");
        let schema = vec![SchemaField::new("age", FieldType::String)];

        warehouse
            .load_rows(
                &table,
                &[record(&[("age", Value::from("25-34")), ("count_response", Value::from(2))])],
                Some(&schema),
            )
            .await
            .unwrap();
        warehouse
            .load_rows(
                &table,
                &[record(&[("age", Value::from("35-44")), ("extra", Value::from("x"))])],
                None,
            )
            .await
            .unwrap();

        let content = fs::read_to_string(warehouse.table_path(&table)).unwrap();
        assert_eq!(content, "age,count_response\n25-34,2\n35-44,\n");
    }

    #[tokio::test]
    async fn test_read_rows_filters_by_equality() {
        let dir = TempDir::new().unwrap();
        let warehouse = LocalWarehouse::new(dir.path());
        let table = TableId::new("p", "ds", "processed_brand_surveys");

        assert!(warehouse.read_rows(&table, None).await.unwrap().is_empty());

        let rows = vec![
            record(&[("filename", Value::from("a.csv"))]),
            record(&[("filename", Value::from("b.csv"))]),
        ];
        warehouse.load_rows(&table, &rows, None).await.unwrap();

        let found = warehouse
            .read_rows(&table, Some(&RowFilter::eq("filename", "b.csv")))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get_str("filename"), Some("b.csv"));
        assert_eq!(warehouse.read_rows(&table, None).await.unwrap().len(), 2);
    }
}
