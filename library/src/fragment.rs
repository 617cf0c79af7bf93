use htmlentity::entity::{CharacterSet, EncodeType, ICodedDataTrait, encode};
use scraper::{ElementRef, Html, Node as ParsedNode};

use crate::furigana::FuriganaError;

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// A parsed styled-text fragment: text leaves mixed with inline containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Element(Element),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Node {
    /// A `ruby` annotation node: the surface text followed by its `rt` reading.
    pub fn ruby(surface: &str, reading: &str) -> Node {
        Node::Element(Element {
            tag: "ruby".to_owned(),
            attributes: Vec::new(),
            children: vec![
                Node::Text(surface.to_owned()),
                Node::Element(Element {
                    tag: "rt".to_owned(),
                    attributes: Vec::new(),
                    children: vec![Node::Text(reading.to_owned())],
                }),
            ],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fragment {
    pub nodes: Vec<Node>,
}

impl Fragment {
    pub fn parse(markup: &str) -> Result<Fragment, FuriganaError> {
        let document = Html::parse_fragment(markup);
        if !document.errors.is_empty() {
            return Err(FuriganaError::Parse(document.errors.join("; ")));
        }

        Ok(Fragment {
            nodes: convert_children(document.root_element()),
        })
    }

    /// The visible text of the fragment: text leaves concatenated in document
    /// order. Subtrees under `rt` are excluded so reading annotations never
    /// leak into the text handed to a reading provider.
    pub fn text(&self) -> String {
        let mut text = String::new();
        collect_text(&self.nodes, &mut text);
        text
    }

    pub fn to_html(&self) -> String {
        let mut markup = String::new();
        for node in &self.nodes {
            write_node(node, &mut markup);
        }
        markup
    }
}

fn convert_children(element: ElementRef) -> Vec<Node> {
    let mut nodes = Vec::new();

    for child in element.children() {
        match child.value() {
            ParsedNode::Text(text) => nodes.push(Node::Text(text.to_string())),
            ParsedNode::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    nodes.push(Node::Element(Element {
                        tag: child_element.value().name().to_string(),
                        attributes: child_element
                            .value()
                            .attrs()
                            .map(|(name, value)| (name.to_string(), value.to_string()))
                            .collect(),
                        children: convert_children(child_element),
                    }));
                }
            }
            // Comments, doctypes and processing instructions carry no content
            _ => {}
        }
    }

    nodes
}

fn collect_text(nodes: &[Node], text: &mut String) {
    for node in nodes {
        match node {
            Node::Text(content) => text.push_str(content),
            Node::Element(element) => {
                if element.tag == "rt" {
                    continue;
                }
                collect_text(&element.children, text);
            }
        }
    }
}

fn write_node(node: &Node, markup: &mut String) {
    match node {
        Node::Text(content) => markup.push_str(&escape(content)),
        Node::Element(element) => {
            markup.push('<');
            markup.push_str(&element.tag);
            for (name, value) in &element.attributes {
                markup.push(' ');
                markup.push_str(name);
                markup.push_str("=\"");
                markup.push_str(&escape(value));
                markup.push('"');
            }
            markup.push('>');

            if VOID_TAGS.contains(&element.tag.as_str()) {
                return;
            }

            for child in &element.children {
                write_node(child, markup);
            }
            markup.push_str("</");
            markup.push_str(&element.tag);
            markup.push('>');
        }
    }
}

fn escape(text: &str) -> String {
    encode(
        text.as_bytes(),
        &EncodeType::Named,
        &CharacterSet::SpecialChars,
    )
    .to_string()
    .unwrap_or("&lt;err&gt;".to_owned())
}
