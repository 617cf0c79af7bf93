use std::{error::Error, fmt::Display};

use regex::Regex;

use crate::fragment::Fragment;
use crate::furigana::{
    annotations::{AnnotationIndex, ReadingAnnotation},
    merge::merge_fragment,
};

pub mod annotations;
pub mod merge;

/// CJK unified ideographs, including extension A.
pub const KANJI_PATTERN: &str = r"[\u{4e00}-\u{9faf}\u{3400}-\u{4dbf}]";

#[derive(Debug)]
pub enum FuriganaError {
    Parse(String),
    EmptyAnnotations,
}

impl Display for FuriganaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FuriganaError::Parse(details) => {
                write!(f, "Failed to parse markup fragment: {details}")
            }
            FuriganaError::EmptyAnnotations => {
                write!(f, "At least one reading annotation is required")
            }
        }
    }
}

impl Error for FuriganaError {}

pub fn contains_kanji(text: &str) -> bool {
    let kanji = Regex::new(KANJI_PATTERN).unwrap(); // The pattern is a constant
    kanji.is_match(text)
}

/// Overlays reading annotations on a styled markup fragment.
///
/// Every occurrence of a registered surface form inside a single text leaf is
/// wrapped in a `ruby`/`rt` pair; all other markup (tags, `style`/`class`
/// attributes, text outside matches) is carried over unchanged. Existing
/// `ruby` subtrees are copied verbatim. An empty annotation list returns the
/// fragment unchanged modulo serialization normalization.
pub fn merge_furigana(
    markup: &str,
    annotations: &[ReadingAnnotation],
) -> Result<String, FuriganaError> {
    let fragment = Fragment::parse(markup)?;
    let index = AnnotationIndex::build(annotations);
    let merged = merge_fragment(&fragment, &index);
    Ok(merged.to_html())
}
