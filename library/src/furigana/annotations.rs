use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::furigana::FuriganaError;

/// One surface form (kanji run) together with its kana reading.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReadingAnnotation {
    pub surface: String,
    pub reading: String,
}

/// Lookup structure built once per merge call.
///
/// Surface forms are deduplicated (the first registration wins, so one merge
/// call sees exactly one reading per surface) and ordered by descending
/// character length. Ties keep registration order, which makes matching
/// deterministic instead of depending on hash iteration order.
pub struct AnnotationIndex {
    readings: AHashMap<String, String>,
    keys: Vec<String>,
}

impl AnnotationIndex {
    pub fn build(entries: &[ReadingAnnotation]) -> Self {
        let mut readings = AHashMap::new();
        let mut keys = Vec::new();

        for entry in entries {
            if entry.surface.is_empty() || readings.contains_key(&entry.surface) {
                continue;
            }
            readings.insert(entry.surface.clone(), entry.reading.clone());
            keys.push(entry.surface.clone());
        }

        // Stable sort: equal lengths stay in first-seen order
        keys.sort_by_key(|key| std::cmp::Reverse(key.chars().count()));

        AnnotationIndex { readings, keys }
    }

    /// Like [`AnnotationIndex::build`], for callers that need at least one
    /// usable entry.
    pub fn build_non_empty(entries: &[ReadingAnnotation]) -> Result<Self, FuriganaError> {
        let index = Self::build(entries);
        if index.is_empty() {
            return Err(FuriganaError::EmptyAnnotations);
        }
        Ok(index)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// The longest registered surface form `rest` starts with, and its reading.
    pub fn match_at(&self, rest: &str) -> Option<(&str, &str)> {
        self.keys
            .iter()
            .find(|key| rest.starts_with(key.as_str()))
            .and_then(|key| {
                let reading = self.readings.get(key)?;
                Some((key.as_str(), reading.as_str()))
            })
    }
}
