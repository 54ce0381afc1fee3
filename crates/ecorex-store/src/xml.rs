//! XML encoding of document trees
//!
//! Elements map one-to-one onto [`DocNode`]s: the qualified tag, attributes
//! in document order, the unescaped character content and child elements.
//! Every node read from XML records the line its start tag opens on, so
//! deserializer errors can point back into the file.
//!
//! Whitespace between child elements is layout and is dropped; the text of a
//! leaf element is kept verbatim.

use ecorex_core::errors::{ModelError, Result};
use ecorex_core::persistence::{DocNode, DocumentFormat, SaveOptions};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::errors::xml_error;

#[derive(Debug, Clone, Copy, Default)]
pub struct XmlFormat;

impl DocumentFormat for XmlFormat {
    fn name(&self) -> &str {
        "xml"
    }

    fn parse(&self, bytes: &[u8]) -> Result<DocNode> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            let line = LineIndex::new(bytes).line_of(e.valid_up_to());
            xml_error(format!("invalid UTF-8: {}", e), Some(line))
        })?;
        parse_tree(text)
    }

    fn write(&self, root: &DocNode, options: &SaveOptions) -> Result<Vec<u8>> {
        let mut writer = if options.indent > 0 {
            Writer::new_with_indent(Vec::new(), b' ', options.indent)
        } else {
            Writer::new(Vec::new())
        };
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(write_failure)?;
        write_node(&mut writer, root)?;
        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// Byte offsets of every newline, for offset → line lookups
struct LineIndex {
    newlines: Vec<usize>,
}

impl LineIndex {
    fn new(bytes: &[u8]) -> Self {
        LineIndex {
            newlines: bytes
                .iter()
                .enumerate()
                .filter(|(_, b)| **b == b'\n')
                .map(|(i, _)| i)
                .collect(),
        }
    }

    /// 1-based line containing byte `offset`
    fn line_of(&self, offset: usize) -> usize {
        self.newlines.partition_point(|nl| *nl < offset) + 1
    }
}

fn parse_tree(input: &str) -> Result<DocNode> {
    let lines = LineIndex::new(input.as_bytes());
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<DocNode> = Vec::new();
    let mut root: Option<DocNode> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            let line = lines.line_of(reader.error_position() as usize);
            xml_error(e.to_string(), Some(line))
        })?;
        let end = reader.buffer_position() as usize;
        match event {
            Event::Start(ref e) => {
                let line = lines.line_of(tag_start(input, end));
                stack.push(open_node(e, line)?);
            }
            Event::Empty(ref e) => {
                let line = lines.line_of(tag_start(input, end));
                let node = open_node(e, line)?;
                close_node(&mut stack, &mut root, node, lines.line_of(end))?;
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| xml_error("unbalanced end tag", Some(lines.line_of(end))))?;
                close_node(&mut stack, &mut root, node, lines.line_of(end))?;
            }
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map_err(|err| xml_error(err.to_string(), Some(lines.line_of(end))))?;
                append_text(&mut stack, &text, lines.line_of(end))?;
            }
            Event::CData(e) => {
                let raw = e.into_inner();
                append_text(&mut stack, &String::from_utf8_lossy(&raw), lines.line_of(end))?;
            }
            Event::Eof => break,
            // Declaration, comments, processing instructions, doctype
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(xml_error(format!("unclosed element <{}>", open.tag), open.line));
    }
    root.ok_or_else(|| xml_error("document has no root element", None))
}

/// Offset of the `<` that opened the tag ending just before `end`
fn tag_start(input: &str, end: usize) -> usize {
    let end = end.min(input.len());
    input.as_bytes()[..end]
        .iter()
        .rposition(|b| *b == b'<')
        .unwrap_or(0)
}

fn open_node(start: &BytesStart<'_>, line: usize) -> Result<DocNode> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut node = DocNode::new(tag).with_line(line);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| xml_error(e.to_string(), Some(line)))?;
        let name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| xml_error(e.to_string(), Some(line)))?;
        node.attributes.push((name, value.into_owned()));
    }
    Ok(node)
}

fn close_node(stack: &mut Vec<DocNode>, root: &mut Option<DocNode>, mut node: DocNode, line: usize) -> Result<()> {
    if !node.children.is_empty() && node.text.as_deref().is_some_and(|t| t.trim().is_empty()) {
        node.text = None;
    }
    match stack.last_mut() {
        Some(parent) => parent.push(node),
        None if root.is_none() => *root = Some(node),
        None => return Err(xml_error("more than one root element", Some(line))),
    }
    Ok(())
}

fn append_text(stack: &mut [DocNode], text: &str, line: usize) -> Result<()> {
    match stack.last_mut() {
        Some(node) => {
            node.text.get_or_insert_with(String::new).push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(xml_error("text outside the root element", Some(line))),
    }
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &DocNode) -> Result<()> {
    let mut start = BytesStart::new(node.tag.as_str());
    for (name, value) in &node.attributes {
        start.push_attribute((name.as_str(), value.as_str()));
    }

    let text = node.text.as_deref().filter(|t| !t.is_empty());
    if node.children.is_empty() && text.is_none() {
        return writer.write_event(Event::Empty(start)).map_err(write_failure);
    }

    writer.write_event(Event::Start(start)).map_err(write_failure)?;
    if let Some(text) = text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(write_failure)?;
    }
    for child in &node.children {
        write_node(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(node.tag.as_str())))
        .map_err(write_failure)
}

fn write_failure(err: impl std::fmt::Display) -> ModelError {
    ModelError::Serialization {
        message: err.to_string(),
    }
}
