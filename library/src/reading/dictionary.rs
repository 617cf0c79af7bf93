use itertools::Itertools;
use regex::Regex;

use crate::dictionary::ReadingDictionary;
use crate::furigana::KANJI_PATTERN;
use crate::furigana::annotations::{AnnotationIndex, ReadingAnnotation};
use crate::reading::{ReadingProvider, ReadingResponse};

/// Offline reading provider backed by a [`ReadingDictionary`].
///
/// The submitted text is scanned for registered surface forms, longest match
/// first, and every distinct match is returned with its reading. This is a
/// plain lookup; it does no morphological analysis.
pub struct DictionaryReadingProvider {
    index: AnnotationIndex,
}

impl DictionaryReadingProvider {
    pub fn new(dictionary: &ReadingDictionary) -> Self {
        let kanji = Regex::new(KANJI_PATTERN).unwrap(); // The pattern is a constant

        // Kana-only surface forms need no reading overlay
        let entries: Vec<_> = dictionary
            .entries()
            .filter(|(surface, _)| kanji.is_match(surface))
            .map(|(surface, reading)| ReadingAnnotation {
                surface: surface.to_owned(),
                reading: reading.to_owned(),
            })
            .collect();

        Self {
            index: AnnotationIndex::build(&entries),
        }
    }

    fn scan(&self, text: &str) -> Vec<ReadingAnnotation> {
        let mut found = Vec::new();
        let mut cursor = 0;

        while cursor < text.len() {
            let rest = &text[cursor..];
            if let Some((surface, reading)) = self.index.match_at(rest) {
                found.push(ReadingAnnotation {
                    surface: surface.to_owned(),
                    reading: reading.to_owned(),
                });
                cursor += surface.len();
            } else {
                let Some(next) = rest.chars().next() else {
                    break;
                };
                cursor += next.len_utf8();
            }
        }

        found.into_iter().unique().collect()
    }
}

impl ReadingProvider for DictionaryReadingProvider {
    async fn get_readings(&self, text: &str) -> anyhow::Result<ReadingResponse> {
        Ok(ReadingResponse {
            annotations: self.scan(text),
            html: None,
        })
    }
}
