//! Symbol list import from CSV (`Code,Name,Market,Industry,Type`).

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::model::{SymbolMetadata, SymbolStatus};
use super::store::SymbolStore;
use crate::errors::{Result, ValidationError};

#[derive(Debug, Deserialize)]
struct SymbolListRecord {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "Market", default)]
    market: Option<String>,
    #[serde(rename = "Industry", default)]
    industry: Option<String>,
    #[serde(rename = "Type", default)]
    security_type: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolListImport {
    pub imported: usize,
    pub skipped: usize,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read symbol rows. Returns the parsed entries and the count of skipped rows.
pub fn parse_symbol_list<R: Read>(reader: R) -> Result<(Vec<(String, SymbolMetadata)>, usize)> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut entries = Vec::new();
    let mut skipped = 0;

    for (line, record) in csv_reader.deserialize::<SymbolListRecord>().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!("Symbol list row {}: {}", line + 2, e);
                skipped += 1;
                continue;
            }
        };

        let code = record.code.trim().to_string();
        if code.is_empty() {
            skipped += 1;
            continue;
        }

        entries.push((
            code,
            SymbolMetadata {
                name: clean(record.name),
                market: clean(record.market).map(|m| m.to_lowercase()),
                industry: clean(record.industry),
                security_type: clean(record.security_type),
                listed_since: None,
                status: Some(SymbolStatus::Active),
            },
        ));
    }

    Ok((entries, skipped))
}

/// Upsert every row of the CSV at `path` into `store`.
pub async fn import_symbol_list(store: &dyn SymbolStore, path: &Path) -> Result<SymbolListImport> {
    let file = File::open(path).map_err(|e| {
        ValidationError::InvalidInput(format!("cannot open {}: {}", path.display(), e))
    })?;
    let (entries, skipped) = parse_symbol_list(file)?;

    let mut imported = 0;
    for (code, metadata) in entries {
        store.upsert_symbol(&code, metadata).await?;
        imported += 1;
    }

    info!(
        "Imported {} symbols from {} ({} skipped)",
        imported,
        path.display(),
        skipped
    );
    Ok(SymbolListImport { imported, skipped })
}
