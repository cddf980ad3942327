use crate::domain::model::Record;
use crate::domain::services::format::{cell_text, parse_date};
use std::collections::HashMap;

fn key_part(record: &Record, column: &str) -> String {
    let text = record.get(column).map(cell_text).unwrap_or_default();
    // Same visit typed as 2025-03-03 in one row and 03-03-2025 in another is one visit.
    parse_date(&text)
        .map(|date| date.to_string())
        .unwrap_or(text)
}

/// A surviving record and the later rows that repeated its key.
#[derive(Debug, Clone, PartialEq)]
pub struct Unique {
    pub record: Record,
    pub duplicates: Vec<Record>,
}

/// Keeps the first record for every distinct key tuple; later rows with the same
/// key are attached to it. An empty key list disables deduplication.
pub fn dedupe(records: Vec<Record>, keys: &[String]) -> Vec<Unique> {
    if keys.is_empty() {
        return records
            .into_iter()
            .map(|record| Unique {
                record,
                duplicates: Vec::new(),
            })
            .collect();
    }

    let mut position: HashMap<Vec<String>, usize> = HashMap::with_capacity(records.len());
    let mut unique: Vec<Unique> = Vec::new();
    for record in records {
        let key: Vec<String> = keys.iter().map(|k| key_part(&record, k)).collect();
        match position.get(&key) {
            Some(&at) => unique[at].duplicates.push(record),
            None => {
                position.insert(key, unique.len());
                unique.push(Unique {
                    record,
                    duplicates: Vec::new(),
                });
            }
        }
    }
    unique
}

pub fn duplicates_removed(unique: &[Unique]) -> usize {
    unique.iter().map(|u| u.duplicates.len()).sum()
}
