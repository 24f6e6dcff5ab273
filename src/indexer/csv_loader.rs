use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::IngestionError;
use crate::models::Document;

#[derive(Debug, Clone)]
pub struct Dataset {
    pub documents: Vec<Document>,
    pub sha256: String,
}

/// Read a CSV file into one `Document` per data row.
///
/// Each row becomes `"<header>: <value>"` lines in column order; `source` is
/// the value of `source_column`.
pub fn load_dataset(path: &Path, source_column: &str) -> Result<Dataset, IngestionError> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => IngestionError::DatasetMissing(path.to_path_buf()),
        _ => IngestionError::Malformed {
            path: path.to_path_buf(),
            source: csv::Error::from(e),
        },
    })?;

    let sha256 = hex::encode(Sha256::digest(&bytes));

    let malformed = |source: csv::Error| IngestionError::Malformed {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes.as_slice());

    let headers: Vec<String> = reader
        .headers()
        .map_err(malformed)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let source_idx = headers
        .iter()
        .position(|h| h == source_column.trim())
        .ok_or_else(|| IngestionError::MissingColumn {
            column: source_column.to_string(),
            available: headers.join(", "),
        })?;

    let mut documents = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(malformed)?;
        let text = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| format!("{}: {}", h, v.trim()))
            .collect::<Vec<_>>()
            .join("\n");
        let source = record.get(source_idx).unwrap_or_default().trim().to_string();
        documents.push(Document { text, source, row });
    }

    if documents.is_empty() {
        return Err(IngestionError::EmptyDataset(path.to_path_buf()));
    }

    Ok(Dataset { documents, sha256 })
}
