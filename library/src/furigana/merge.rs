use crate::fragment::{Element, Fragment, Node};
use crate::furigana::annotations::AnnotationIndex;

/// Produces an annotated copy of the fragment. The input is never mutated.
pub fn merge_fragment(fragment: &Fragment, index: &AnnotationIndex) -> Fragment {
    Fragment {
        nodes: merge_nodes(&fragment.nodes, index),
    }
}

fn merge_nodes(nodes: &[Node], index: &AnnotationIndex) -> Vec<Node> {
    let mut merged = Vec::with_capacity(nodes.len());

    for node in nodes {
        match node {
            Node::Text(content) => merged.extend(annotate_text(content, index)),
            Node::Element(element) if element.tag == "ruby" => {
                // Already annotated: copied verbatim, never re-scanned
                merged.push(node.clone());
            }
            Node::Element(element) => {
                merged.push(Node::Element(Element {
                    tag: element.tag.clone(),
                    attributes: element.attributes.clone(),
                    children: merge_nodes(&element.children, index),
                }));
            }
        }
    }

    merged
}

/// Greedy left-to-right scan of a single text leaf.
///
/// At each position the longest registered surface form wins; unmatched
/// characters accumulate into plain-text runs which are flushed before each
/// ruby node and at the end. Matching never crosses node boundaries, so a
/// compound split across two elements stays unannotated.
fn annotate_text(content: &str, index: &AnnotationIndex) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut pending = String::new();
    let mut cursor = 0;

    while cursor < content.len() {
        let rest = &content[cursor..];
        if let Some((surface, reading)) = index.match_at(rest) {
            if !pending.is_empty() {
                nodes.push(Node::Text(std::mem::take(&mut pending)));
            }
            nodes.push(Node::ruby(surface, reading));
            cursor += surface.len();
        } else {
            let next = rest.chars().next().unwrap(); // The cursor only ever rests on a char boundary
            pending.push(next);
            cursor += next.len_utf8();
        }
    }

    if !pending.is_empty() {
        nodes.push(Node::Text(pending));
    }

    nodes
}

#[cfg(test)]
mod merge_tests {
    use super::*;
    use crate::furigana::annotations::ReadingAnnotation;

    fn index(entries: &[(&str, &str)]) -> AnnotationIndex {
        let entries: Vec<_> = entries
            .iter()
            .map(|(surface, reading)| ReadingAnnotation {
                surface: (*surface).to_owned(),
                reading: (*reading).to_owned(),
            })
            .collect();
        AnnotationIndex::build(&entries)
    }

    #[test]
    fn empty_content_yields_no_nodes() {
        assert!(annotate_text("", &index(&[("猫", "ねこ")])).is_empty());
    }

    #[test]
    fn unmatched_content_stays_one_text_node() {
        let nodes = annotate_text("これはテストです", &index(&[("試験", "しけん")]));
        assert_eq!(nodes, vec![Node::Text("これはテストです".to_owned())]);
    }

    #[test]
    fn match_at_start_middle_and_end() {
        let nodes = annotate_text("猫と犬と猫", &index(&[("猫", "ねこ"), ("犬", "いぬ")]));
        assert_eq!(
            nodes,
            vec![
                Node::ruby("猫", "ねこ"),
                Node::Text("と".to_owned()),
                Node::ruby("犬", "いぬ"),
                Node::Text("と".to_owned()),
                Node::ruby("猫", "ねこ"),
            ]
        );
    }

    #[test]
    fn adjacent_matches_produce_no_empty_text_runs() {
        let nodes = annotate_text("電車猫", &index(&[("電車", "でんしゃ"), ("猫", "ねこ")]));
        assert_eq!(
            nodes,
            vec![Node::ruby("電車", "でんしゃ"), Node::ruby("猫", "ねこ")]
        );
    }

    #[test]
    fn longest_match_beats_prefix() {
        let nodes = annotate_text(
            "日本語",
            &index(&[("日本", "にほん"), ("日本語", "にほんご")]),
        );
        assert_eq!(nodes, vec![Node::ruby("日本語", "にほんご")]);
    }

    #[test]
    fn nested_elements_keep_structure() {
        let fragment =
            Fragment::parse("<p><span style=\"color:red\">猫</span>が<b>走る</b></p>").unwrap();
        let merged = merge_fragment(&fragment, &index(&[("猫", "ねこ"), ("走", "はし")]));
        assert_eq!(
            merged.to_html(),
            "<p><span style=\"color:red\"><ruby>猫<rt>ねこ</rt></ruby></span>が<b><ruby>走<rt>はし</rt></ruby>る</b></p>"
        );
    }

    #[test]
    fn ruby_subtree_is_copied_verbatim() {
        let fragment = Fragment::parse("<ruby>猫<rt>ねこ</rt></ruby>猫").unwrap();
        let merged = merge_fragment(&fragment, &index(&[("猫", "にゃん")]));
        assert_eq!(
            merged.to_html(),
            "<ruby>猫<rt>ねこ</rt></ruby><ruby>猫<rt>にゃん</rt></ruby>"
        );
    }

    #[test]
    fn merge_does_not_mutate_input() {
        let fragment = Fragment::parse("猫と犬").unwrap();
        let before = fragment.clone();
        let _ = merge_fragment(&fragment, &index(&[("猫", "ねこ")]));
        assert_eq!(fragment, before);
    }
}
