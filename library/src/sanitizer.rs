use scraper::{ElementRef, Html, Node as ParsedNode};

use crate::fragment::{Element, Fragment, Node};

const ALLOWED_TAGS: &[&str] = &[
    "b", "br", "div", "em", "i", "p", "rb", "rp", "rt", "ruby", "s", "span", "strong", "sub",
    "sup", "u",
];
const ALLOWED_ATTRIBUTES: &[&str] = &["style", "class"];
// Executable or metadata content that disappears wholly, children included
const DROPPED_TAGS: &[&str] = &[
    "head", "iframe", "link", "meta", "noscript", "object", "script", "style", "template", "title",
];

/// Strips everything but a small set of inline and ruby tags with their
/// `style`/`class` attributes. Applied to the final merged markup before it
/// reaches a live DOM; it is the last line of defense, so malformed input is
/// handled leniently instead of failing.
pub fn sanitize(markup: &str) -> String {
    let document = Html::parse_fragment(markup);
    let mut fragment = Fragment::default();
    collect_sanitized(document.root_element(), &mut fragment.nodes);
    fragment.to_html()
}

fn collect_sanitized(element: ElementRef, sanitized: &mut Vec<Node>) {
    for child in element.children() {
        match child.value() {
            ParsedNode::Text(text) => sanitized.push(Node::Text(text.to_string())),
            ParsedNode::Element(_) => {
                let Some(child_element) = ElementRef::wrap(child) else {
                    continue;
                };
                let tag = child_element.value().name().to_lowercase();

                if DROPPED_TAGS.contains(&tag.as_str()) {
                    continue;
                }

                if !ALLOWED_TAGS.contains(&tag.as_str()) {
                    // Unknown container: keep the content, drop the tag
                    collect_sanitized(child_element, sanitized);
                    continue;
                }

                let attributes = child_element
                    .value()
                    .attrs()
                    .filter(|(name, _)| ALLOWED_ATTRIBUTES.contains(&name.to_lowercase().as_str()))
                    .map(|(name, value)| (name.to_lowercase(), value.to_string()))
                    .collect();

                let mut children = Vec::new();
                collect_sanitized(child_element, &mut children);
                sanitized.push(Node::Element(Element {
                    tag,
                    attributes,
                    children,
                }));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod sanitizer_tests {
    use super::*;

    #[test]
    fn keeps_allowed_markup() {
        let markup = "<p>これは<span style=\"color:red\" class=\"jp\">赤い</span>文です</p>";
        assert_eq!(sanitize(markup), markup);
    }

    #[test]
    fn keeps_ruby_annotations() {
        let markup = "<ruby>猫<rt>ねこ</rt></ruby>と犬";
        assert_eq!(sanitize(markup), markup);
    }

    #[test]
    fn drops_scripts_wholly() {
        assert_eq!(sanitize("猫<script>alert(1)</script>犬"), "猫犬");
    }

    #[test]
    fn drops_style_elements_wholly() {
        assert_eq!(sanitize("<style>ruby { display: none }</style>猫"), "猫");
    }

    #[test]
    fn strips_event_handler_attributes() {
        assert_eq!(
            sanitize("<span onclick=\"steal()\" style=\"color:red\">猫</span>"),
            "<span style=\"color:red\">猫</span>"
        );
    }

    #[test]
    fn unwraps_unknown_containers() {
        assert_eq!(
            sanitize("<article><span>猫</span>と犬</article>"),
            "<span>猫</span>と犬"
        );
    }

    #[test]
    fn anchors_lose_their_tag_but_keep_text() {
        assert_eq!(
            sanitize("<a href=\"javascript:alert(1)\">リンク</a>"),
            "リンク"
        );
    }

    #[test]
    fn empty_input() {
        assert_eq!(sanitize(""), "");
    }
}
