//! Generic XML tree used for every decoded SOAP response.
//!
//! Tag names are stored without their namespace prefix so that lookups do not
//! depend on which prefix a given device picked (`tt:`, `tds:`, `ns2:`, ...).
//! Attribute names are kept exactly as they appear on the wire.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;

use crate::onvif::error::{OnvifError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    name: String,
    attributes: BTreeMap<String, String>,
    text: String,
    children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parses a document and returns its root element.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    if root.is_some() {
                        return Err(OnvifError::Parse("content after the root element".into()));
                    }
                    stack.push(Self::from_start(&e)?);
                }
                Ok(Event::Empty(e)) => {
                    if root.is_some() {
                        return Err(OnvifError::Parse("content after the root element".into()));
                    }
                    let node = Self::from_start(&e)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => root = Some(node),
                    }
                }
                Ok(Event::End(_)) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| OnvifError::Parse("unbalanced closing tag".into()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => root = Some(node),
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = e
                        .unescape()
                        .map_err(|e| OnvifError::Parse(e.to_string()))?;
                    match stack.last_mut() {
                        Some(node) => node.text.push_str(&text),
                        None if text.trim().is_empty() => {}
                        None => return Err(OnvifError::Parse("text outside of the root element".into())),
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(OnvifError::Parse(e.to_string())),
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(OnvifError::Parse("unexpected end of document".into()));
        }
        root.ok_or_else(|| OnvifError::Parse("document has no root element".into()))
    }

    fn from_start(e: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
        let mut attributes = BTreeMap::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|e| OnvifError::Parse(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| OnvifError::Parse(e.to_string()))?
                .to_string();
            attributes.insert(key, value);
        }
        Ok(Self {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        self.text.trim()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.text().is_empty()
    }

    /// First direct child with the given local name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Walks down a chain of child names starting below this node.
    pub fn path(&self, path: &[&str]) -> Option<&XmlNode> {
        path.iter().try_fold(self, |node, name| node.child(name))
    }

    /// Trimmed text at `path`, `None` when the node is missing or blank.
    pub fn text_at(&self, path: &[&str]) -> Option<&str> {
        self.path(path).map(XmlNode::text).filter(|t| !t.is_empty())
    }

    pub fn push_child(&mut self, child: XmlNode) {
        self.children.push(child);
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_prefixes_and_keeps_attributes() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://www.w3.org/2003/05/soap-envelope" xmlns:tt="http://www.onvif.org/ver10/schema">
  <SOAP-ENV:Body>
    <trt:GetProfilesResponse>
      <trt:Profiles token="000" fixed="true">
        <tt:Name>mainStream</tt:Name>
      </trt:Profiles>
    </trt:GetProfilesResponse>
  </SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#;

        let root = XmlNode::parse(xml).unwrap();
        assert_eq!(root.name(), "Envelope");
        assert_eq!(
            root.attribute("xmlns:tt"),
            Some("http://www.onvif.org/ver10/schema")
        );

        let profile = root
            .path(&["Body", "GetProfilesResponse", "Profiles"])
            .unwrap();
        assert_eq!(profile.attribute("token"), Some("000"));
        assert_eq!(profile.text_at(&["Name"]), Some("mainStream"));
    }

    #[test]
    fn test_repeated_children() {
        let root = XmlNode::parse("<a><b>1</b><c/><b>2</b></a>").unwrap();
        let values: Vec<&str> = root.children_named("b").map(XmlNode::text).collect();
        assert_eq!(values, vec!["1", "2"]);
        assert!(root.child("c").unwrap().is_empty());
    }

    #[test]
    fn test_unescapes_text() {
        let root = XmlNode::parse("<a><b>rtsp://h/s?a=1&amp;b=2</b></a>").unwrap();
        assert_eq!(root.text_at(&["b"]), Some("rtsp://h/s?a=1&b=2"));
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(XmlNode::parse("<a><b></a>"), Err(OnvifError::Parse(_))));
        assert!(matches!(XmlNode::parse("<a><b>"), Err(OnvifError::Parse(_))));
        assert!(matches!(XmlNode::parse(""), Err(OnvifError::Parse(_))));
        assert!(matches!(XmlNode::parse("not xml at all"), Err(OnvifError::Parse(_))));
    }
}
