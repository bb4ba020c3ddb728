//! Persistent record of convergence studies.
//!
//! Entries are keyed by transducer, acoustic power, harmonic number and
//! tolerance, so studies from different runs can be collected into one
//! JSON document and looked up later.

use serde::{Deserialize, Serialize};

use crate::convergence::ConvergenceRecord;
use crate::error::ResonaError;
use crate::types::AxisLine;
use resona_geometry::IndexBox;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreKey {
    pub transducer_id: String,
    /// Acoustic power (W).
    pub power: f64,
    /// Harmonic number: 1 for the fundamental.
    pub harmonic: usize,
    pub tolerance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub key: StoreKey,
    pub line: AxisLine,
    pub bbox: IndexBox,
    pub extent_min: [f64; 3],
    pub extent_max: [f64; 3],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceStore {
    entries: Vec<StoreEntry>,
}

impl ConvergenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[StoreEntry] {
        &self.entries
    }

    /// Insert an entry, replacing any entry with an equal key.
    pub fn insert(&mut self, entry: StoreEntry) {
        match self.entries.iter_mut().find(|e| e.key == entry.key) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Store the records of one harmonic order (`order` 0 is the fundamental).
    pub fn insert_records(&mut self, transducer_id: &str, power: f64, order: usize, records: &[ConvergenceRecord]) {
        for r in records {
            self.insert(StoreEntry {
                key: StoreKey {
                    transducer_id: transducer_id.to_string(),
                    power,
                    harmonic: order + 1,
                    tolerance: r.tolerance,
                },
                line: r.line.clone(),
                bbox: r.bbox,
                extent_min: r.extent_min,
                extent_max: r.extent_max,
            });
        }
    }

    pub fn get(&self, key: &StoreKey) -> Option<&StoreEntry> {
        self.entries.iter().find(|e| &e.key == key)
    }

    pub fn to_json(&self) -> Result<String, ResonaError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ResonaError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    fn record(tolerance: f64, value: f64) -> ConvergenceRecord {
        ConvergenceRecord {
            tolerance,
            bbox: IndexBox::new([1, 0, 0], [3, 2, 2]).unwrap(),
            extent_min: [0.0; 3],
            extent_max: [1e-3; 3],
            line: AxisLine {
                x: vec![0.0, 1e-4],
                values: vec![Complex64::new(value, -1.0), Complex64::new(0.5, 0.25)],
            },
        }
    }

    #[test]
    fn test_insert_replaces_equal_key() {
        let mut store = ConvergenceStore::new();
        store.insert_records("H101", 100.0, 1, &[record(0.1, 1.0), record(0.01, 2.0)]);
        store.insert_records("H101", 100.0, 1, &[record(0.1, 7.0)]);
        assert_eq!(store.len(), 2);

        let key = StoreKey {
            transducer_id: "H101".into(),
            power: 100.0,
            harmonic: 2,
            tolerance: 0.1,
        };
        assert_eq!(store.get(&key).unwrap().line.values[0].re, 7.0);
    }

    #[test]
    fn test_json_preserves_entries() {
        let mut store = ConvergenceStore::new();
        store.insert_records("H131", 50.0, 0, &[record(0.316, 3.0)]);
        let json = store.to_json().unwrap();
        assert!(json.contains("H131"));
        assert_eq!(ConvergenceStore::from_json(&json).unwrap(), store);
        assert!(matches!(
            ConvergenceStore::from_json("{"),
            Err(ResonaError::Serialization(_))
        ));
    }
}
