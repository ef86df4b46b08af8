//! XML serialization of the semantic tree
//!
//! The semantic tree round-trips through XML for saving, loading and
//! undo-exactness checks. Namespaced attributes are written in
//! `prefix:name` form, matching the path grammar's attribute segments.

use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

use crate::models::{NodeId, NodeKind, Snapshot, Tree};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum XmlError {
    #[error("malformed XML: {0}")]
    Parse(String),
    #[error("XML write failed: {0}")]
    Write(String),
    #[error("document has no root element")]
    NoRoot,
}

/// Serialize a subtree to an XML string
pub fn to_xml(tree: &Tree, node: NodeId) -> Result<String, XmlError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    write_node(tree, node, &mut writer)?;
    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| XmlError::Write(e.to_string()))
}

fn write_node(
    tree: &Tree,
    node: NodeId,
    writer: &mut Writer<Cursor<Vec<u8>>>,
) -> Result<(), XmlError> {
    match tree.kind(node) {
        NodeKind::Text => writer
            .write_event(Event::Text(BytesText::new(tree.value(node))))
            .map_err(|e| XmlError::Write(e.to_string())),
        NodeKind::Element => {
            let name = tree.name(node).to_string();
            let mut start = BytesStart::new(name.clone());
            for attr in tree.attrs(node) {
                let key = match &attr.ns {
                    Some(ns) => format!("{}:{}", ns, attr.name),
                    None => attr.name.clone(),
                };
                start.push_attribute((key.as_str(), attr.value.as_str()));
            }
            if tree.child_count(node) == 0 {
                writer
                    .write_event(Event::Empty(start))
                    .map_err(|e| XmlError::Write(e.to_string()))
            } else {
                writer
                    .write_event(Event::Start(start))
                    .map_err(|e| XmlError::Write(e.to_string()))?;
                for &child in tree.children(node) {
                    write_node(tree, child, writer)?;
                }
                writer
                    .write_event(Event::End(BytesEnd::new(name)))
                    .map_err(|e| XmlError::Write(e.to_string()))
            }
        }
    }
}

/// Parse an XML document into a snapshot of its root element.
/// Comments, processing instructions and text outside the root are
/// dropped.
pub fn from_xml(xml: &str) -> Result<Snapshot, XmlError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Snapshot> = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(element_from_start(&e)?),
            Ok(Event::Empty(e)) => {
                let elem = element_from_start(&e)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(elem),
                    None => return finish(elem, &mut reader),
                }
            }
            Ok(Event::Text(t)) => {
                let value = t
                    .unescape()
                    .map_err(|e| XmlError::Parse(e.to_string()))?
                    .into_owned();
                if let Some(parent) = stack.last_mut() {
                    if !value.is_empty() {
                        parent.children.push(Snapshot::text(&value));
                    }
                }
            }
            Ok(Event::End(_)) => {
                let done = stack.pop().ok_or_else(|| {
                    XmlError::Parse("close tag without matching open tag".to_string())
                })?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(done),
                    None => return finish(done, &mut reader),
                }
            }
            Ok(Event::Eof) => return Err(XmlError::NoRoot),
            Ok(_) => {}
            Err(e) => return Err(XmlError::Parse(e.to_string())),
        }
    }
}

/// Consume the trailing events after the root element closed
fn finish(root: Snapshot, reader: &mut Reader<&[u8]>) -> Result<Snapshot, XmlError> {
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => return Ok(root),
            Ok(Event::Start(_)) | Ok(Event::Empty(_)) => {
                return Err(XmlError::Parse(
                    "content after the root element".to_string(),
                ))
            }
            Ok(_) => {}
            Err(e) => return Err(XmlError::Parse(e.to_string())),
        }
    }
}

fn element_from_start(e: &BytesStart<'_>) -> Result<Snapshot, XmlError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut snap = Snapshot::element(&name);
    for attr in e.attributes() {
        let attr = attr.map_err(|e| XmlError::Parse(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::Parse(e.to_string()))?
            .into_owned();
        let (ns, local) = match key.split_once(':') {
            Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
            None => (None, key),
        };
        snap.attrs.push(crate::models::Attribute {
            ns,
            name: local,
            value,
        });
    }
    Ok(snap)
}
