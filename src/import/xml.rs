//! Minimal element tree on top of the quick-xml pull reader
//!
//! Both XML dialects are small enough to hold in memory, and a tree makes the
//! nested lap/track/extension lookups much easier to follow than a state
//! machine. Namespace prefixes are dropped: nodes are keyed by local name.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ImportError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub text: String,
}

impl XmlNode {
    /// Parses a document and returns its root element
    pub fn parse(document: &str) -> Result<XmlNode, ImportError> {
        let mut reader = Reader::from_str(document);
        reader.trim_text(true);

        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => stack.push(Self::open(&start)?),
                Ok(Event::Empty(start)) => {
                    let node = Self::open(&start)?;
                    Self::attach(&mut stack, &mut root, node);
                }
                Ok(Event::Text(text)) => {
                    let text = text.unescape().map_err(|e| ImportError::Xml(e.to_string()))?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                Ok(Event::CData(data)) => {
                    if let Some(current) = stack.last_mut() {
                        current
                            .text
                            .push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Ok(Event::End(_)) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| ImportError::Xml("unbalanced end tag".to_string()))?;
                    Self::attach(&mut stack, &mut root, node);
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(ImportError::Xml(format!(
                        "at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
            }
        }

        if !stack.is_empty() {
            return Err(ImportError::Xml("unexpected end of document".to_string()));
        }
        root.ok_or_else(|| ImportError::Xml("document has no root element".to_string()))
    }

    fn open(start: &BytesStart<'_>) -> Result<XmlNode, ImportError> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();

        for attr in start.attributes() {
            let attr = attr.map_err(|e| ImportError::Xml(e.to_string()))?;
            if attr.key.as_ref().starts_with(b"xmlns") {
                continue;
            }
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| ImportError::Xml(e.to_string()))?
                .into_owned();
            attributes.push((key, value));
        }

        Ok(XmlNode {
            name,
            attributes,
            ..XmlNode::default()
        })
    }

    fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => {
                if root.is_none() {
                    *root = Some(node);
                }
            }
        }
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Trimmed text content, `None` when blank
    pub fn text(&self) -> Option<&str> {
        let text = self.text.trim();
        (!text.is_empty()).then_some(text)
    }

    pub fn path(&self, path: &[&str]) -> Option<&XmlNode> {
        path.iter().try_fold(self, |node, name| node.child(name))
    }

    pub fn path_text(&self, path: &[&str]) -> Option<&str> {
        self.path(path).and_then(XmlNode::text)
    }

    pub fn path_f64(&self, path: &[&str]) -> Option<f64> {
        self.path_text(path).and_then(parse_number)
    }

    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(XmlNode::text)
    }

    pub fn child_f64(&self, name: &str) -> Option<f64> {
        self.child_text(name).and_then(parse_number)
    }

    /// First descendant (depth-first) with this local name
    pub fn descendant(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find_map(|child| {
            if child.name == name {
                Some(child)
            } else {
                child.descendant(name)
            }
        })
    }

    pub fn descendant_f64(&self, name: &str) -> Option<f64> {
        self.descendant(name)
            .and_then(XmlNode::text)
            .and_then(parse_number)
    }
}

/// Decimal text to a finite number; `NaN` and `inf` spellings are rejected
pub(crate) fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_and_namespaces() {
        let doc = r#"<?xml version="1.0"?>
            <root xmlns:ns3="urn:x" version="2">
              <a><b>1.5</b></a>
              <ns3:TPX><ns3:Speed>3.2</ns3:Speed></ns3:TPX>
              <empty flag="yes"/>
              <text><![CDATA[raw & text]]></text>
            </root>"#;
        let root = XmlNode::parse(doc).unwrap();

        assert_eq!(root.name, "root");
        assert_eq!(root.attribute("version"), Some("2"));
        assert!(root.attribute("ns3").is_none());
        assert_eq!(root.path_f64(&["a", "b"]), Some(1.5));
        assert_eq!(root.descendant_f64("Speed"), Some(3.2));
        assert_eq!(root.child("empty").and_then(|n| n.attribute("flag")), Some("yes"));
        assert_eq!(root.child_text("text"), Some("raw & text"));
    }

    #[test]
    fn test_non_finite_numbers_are_absent() {
        let root = XmlNode::parse(
            "<r><hr>NaN</hr><ele>inf</ele><cad>-Infinity</cad><w> 250 </w><x><y>nan</y></x></r>",
        )
        .unwrap();

        assert_eq!(root.child_f64("hr"), None);
        assert_eq!(root.child_f64("ele"), None);
        assert_eq!(root.descendant_f64("cad"), None);
        assert_eq!(root.path_f64(&["x", "y"]), None);
        assert_eq!(root.child_f64("w"), Some(250.0));
    }

    #[test]
    fn test_malformed_document() {
        assert!(XmlNode::parse("<root><a></root>").is_err());
        assert!(XmlNode::parse("").is_err());
    }
}
