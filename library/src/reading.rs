use log::warn;
use serde::{Deserialize, Serialize};

use crate::fragment::{Fragment, Node};
use crate::furigana::{
    annotations::{AnnotationIndex, ReadingAnnotation},
    contains_kanji,
    merge::merge_fragment,
};
use crate::sanitizer::sanitize;

pub mod cached;
pub mod dictionary;

/// What a reading provider returns for one submitted text: the annotation
/// list and, for providers that also render, pre-built ruby markup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingResponse {
    pub annotations: Vec<ReadingAnnotation>,
    pub html: Option<String>,
}

impl ReadingResponse {
    /// The annotations to merge with. A provider that sent only pre-rendered
    /// ruby markup still contributes: the surface/reading pairs are recovered
    /// from its `ruby` elements.
    pub fn effective_annotations(&self) -> Vec<ReadingAnnotation> {
        if !self.annotations.is_empty() {
            return self.annotations.clone();
        }
        match &self.html {
            Some(markup) => annotations_from_ruby(markup),
            None => Vec::new(),
        }
    }
}

pub trait ReadingProvider {
    fn get_readings(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = anyhow::Result<ReadingResponse>> + Send;
}

/// Extracts surface/reading pairs from ruby markup: for each `ruby` element
/// the surface is its text outside `rt`, the reading is its `rt` text.
pub fn annotations_from_ruby(markup: &str) -> Vec<ReadingAnnotation> {
    let Ok(fragment) = Fragment::parse(markup) else {
        return Vec::new();
    };
    let mut annotations = Vec::new();
    collect_ruby(&fragment.nodes, &mut annotations);
    annotations
}

fn collect_ruby(nodes: &[Node], annotations: &mut Vec<ReadingAnnotation>) {
    for node in nodes {
        let Node::Element(element) = node else {
            continue;
        };

        if element.tag != "ruby" {
            collect_ruby(&element.children, annotations);
            continue;
        }

        let mut surface = String::new();
        let mut reading = String::new();
        for child in &element.children {
            match child {
                Node::Text(text) => surface.push_str(text),
                Node::Element(inner) if inner.tag == "rt" => {
                    flatten_text(&inner.children, &mut reading)
                }
                // rp holds fallback parentheses, part of neither side
                Node::Element(inner) if inner.tag == "rp" => {}
                Node::Element(inner) => flatten_text(&inner.children, &mut surface),
            }
        }

        if !surface.is_empty() && !reading.is_empty() {
            annotations.push(ReadingAnnotation { surface, reading });
        }
    }
}

fn flatten_text(nodes: &[Node], text: &mut String) {
    for node in nodes {
        match node {
            Node::Text(content) => text.push_str(content),
            Node::Element(element) => flatten_text(&element.children, text),
        }
    }
}

/// The full annotation flow for one note fragment: extract the visible text,
/// ask the provider for readings, merge, sanitize.
///
/// Never fails: on unparseable markup, provider failure or an empty
/// annotation set the sanitized original is returned and the note renders
/// without furigana.
pub async fn annotate_html(provider: &impl ReadingProvider, markup: &str) -> String {
    let fragment = match Fragment::parse(markup) {
        Ok(fragment) => fragment,
        Err(err) => {
            warn!("Markup did not parse, rendering without furigana: {err}");
            return sanitize(markup);
        }
    };

    let text = fragment.text();
    if !contains_kanji(&text) {
        return sanitize(markup);
    }

    let response = match provider.get_readings(&text).await {
        Ok(response) => response,
        Err(err) => {
            warn!("Reading provider failed, rendering without furigana: {err}");
            return sanitize(markup);
        }
    };

    let annotations = response.effective_annotations();
    if annotations.is_empty() {
        return sanitize(markup);
    }

    let index = AnnotationIndex::build(&annotations);
    let merged = merge_fragment(&fragment, &index);
    sanitize(&merged.to_html())
}

#[cfg(test)]
mod reading_tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProvider {
        response: ReadingResponse,
        calls: AtomicUsize,
    }

    impl FixedProvider {
        fn new(annotations: Vec<ReadingAnnotation>) -> Self {
            Self {
                response: ReadingResponse {
                    annotations,
                    html: None,
                },
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ReadingProvider for FixedProvider {
        async fn get_readings(&self, _text: &str) -> anyhow::Result<ReadingResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    struct FailingProvider;

    impl ReadingProvider for FailingProvider {
        async fn get_readings(&self, _text: &str) -> anyhow::Result<ReadingResponse> {
            anyhow::bail!("reading service unavailable")
        }
    }

    fn annotation(surface: &str, reading: &str) -> ReadingAnnotation {
        ReadingAnnotation {
            surface: surface.to_owned(),
            reading: reading.to_owned(),
        }
    }

    #[test]
    fn response_wire_format() {
        let response: ReadingResponse = serde_json::from_str(
            r#"{"annotations":[{"surface":"猫","reading":"ねこ"}],"html":null}"#,
        )
        .unwrap();
        assert_eq!(response.annotations, vec![annotation("猫", "ねこ")]);
        assert!(response.html.is_none());
    }

    #[test]
    fn recovers_annotations_from_ruby_markup() {
        let annotations =
            annotations_from_ruby("<ruby>猫<rt>ねこ</rt></ruby>と<ruby>犬<rt>いぬ</rt></ruby>");
        assert_eq!(
            annotations,
            vec![annotation("猫", "ねこ"), annotation("犬", "いぬ")]
        );
    }

    #[test]
    fn ruby_recovery_ignores_incomplete_pairs() {
        let annotations = annotations_from_ruby("<ruby>猫</ruby>と<ruby><rt>ねこ</rt></ruby>");
        assert!(annotations.is_empty());
    }

    #[test]
    fn effective_annotations_prefer_the_list() {
        let response = ReadingResponse {
            annotations: vec![annotation("猫", "ねこ")],
            html: Some("<ruby>犬<rt>いぬ</rt></ruby>".to_owned()),
        };
        assert_eq!(response.effective_annotations(), vec![annotation("猫", "ねこ")]);
    }

    #[test]
    fn effective_annotations_fall_back_to_markup() {
        let response = ReadingResponse {
            annotations: Vec::new(),
            html: Some("<ruby>犬<rt>いぬ</rt></ruby>".to_owned()),
        };
        assert_eq!(response.effective_annotations(), vec![annotation("犬", "いぬ")]);
    }

    #[tokio::test]
    async fn annotates_and_keeps_styles() {
        let provider = FixedProvider::new(vec![annotation("電車", "でんしゃ")]);
        let annotated = annotate_html(&provider, "<span style=\"color:red\">電車</span>").await;
        assert_eq!(
            annotated,
            "<span style=\"color:red\"><ruby>電車<rt>でんしゃ</rt></ruby></span>"
        );
    }

    #[tokio::test]
    async fn kanji_free_text_skips_the_provider() {
        let provider = FixedProvider::new(vec![annotation("猫", "ねこ")]);
        let annotated = annotate_html(&provider, "これはテストです").await;
        assert_eq!(annotated, "これはテストです");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_failure_falls_back_to_plain_rendering() {
        let annotated = annotate_html(&FailingProvider, "<b>電車</b>に乗る").await;
        assert_eq!(annotated, "<b>電車</b>に乗る");
    }

    #[tokio::test]
    async fn empty_annotation_set_falls_back_to_plain_rendering() {
        let provider = FixedProvider::new(Vec::new());
        let annotated = annotate_html(&provider, "電車に乗る").await;
        assert_eq!(annotated, "電車に乗る");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn output_is_sanitized() {
        let provider = FixedProvider::new(vec![annotation("猫", "ねこ")]);
        let annotated = annotate_html(
            &provider,
            "<span onclick=\"steal()\">猫</span><script>alert(1)</script>",
        )
        .await;
        assert_eq!(annotated, "<span><ruby>猫<rt>ねこ</rt></ruby></span>");
    }
}
