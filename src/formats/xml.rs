//! OSCAL XML (markup) format handler

use crate::document::{CanonicalDocument, Node};
use crate::errors::ConverterError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fmt::Display;

/// Parse an OSCAL document from XML
pub fn parse(content: &str) -> Result<CanonicalDocument, ConverterError> {
    let mut reader = Reader::from_str(content);
    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        let position = reader.buffer_position();
        let event = reader
            .read_event()
            .map_err(|e| parse_error(position, e))?;

        match event {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(parse_error(position, "multiple root elements"));
                }
                stack.push(start_to_node(&start, position)?);
            }
            Event::Empty(start) => {
                if root.is_some() {
                    return Err(parse_error(position, "multiple root elements"));
                }
                let node = start_to_node(&start, position)?;
                close_node(node, &mut stack, &mut root);
            }
            Event::End(end) => {
                let name = utf8(end.name().as_ref(), position)?;
                let node = stack.pop().ok_or_else(|| {
                    parse_error(position, format!("unexpected closing tag </{}>", name))
                })?;
                if node.name != name {
                    return Err(parse_error(
                        position,
                        format!("expected </{}>, found </{}>", node.name, name),
                    ));
                }
                close_node(node, &mut stack, &mut root);
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| parse_error(position, e))?;
                append_text(&mut stack, &text, position)?;
            }
            Event::CData(cdata) => {
                let text = String::from_utf8(cdata.into_inner().into_owned())
                    .map_err(|e| parse_error(position, e))?;
                append_text(&mut stack, &text, position)?;
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions and doctypes
            // carry no document content.
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ConverterError::Parse(format!(
            "Failed to parse OSCAL XML: unexpected end of document, <{}> is not closed",
            open.name
        )));
    }

    root.map(CanonicalDocument::new).ok_or_else(|| {
        ConverterError::Parse("Failed to parse OSCAL XML: no root element found".to_string())
    })
}

fn start_to_node(
    start: &BytesStart<'_>,
    position: impl Display + Copy,
) -> Result<Node, ConverterError> {
    let mut node = Node::new(utf8(start.name().as_ref(), position)?);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| parse_error(position, e))?;
        let key = utf8(attr.key.as_ref(), position)?;
        let value = attr.unescape_value().map_err(|e| parse_error(position, e))?;
        node.set_attribute(key, value.into_owned());
    }
    Ok(node)
}

fn close_node(mut node: Node, stack: &mut Vec<Node>, root: &mut Option<Node>) {
    node.settle_text();
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => *root = Some(node),
    }
}

fn append_text(
    stack: &mut [Node],
    text: &str,
    position: impl Display + Copy,
) -> Result<(), ConverterError> {
    match stack.last_mut() {
        Some(node) => {
            node.push_text(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(parse_error(position, "text content outside of the root element")),
    }
}

fn utf8(bytes: &[u8], position: impl Display + Copy) -> Result<String, ConverterError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| parse_error(position, e))
}

fn parse_error(position: impl Display, cause: impl Display) -> ConverterError {
    ConverterError::Parse(format!(
        "Failed to parse OSCAL XML at byte {}: {}",
        position, cause
    ))
}

/// Write an OSCAL document as indented XML with a UTF-8 declaration
pub fn write(doc: &CanonicalDocument) -> Result<String, ConverterError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| {
            ConverterError::Serialization(format!("Failed to write XML declaration: {}", e))
        })?;

    write_node(&mut writer, &doc.root)?;

    String::from_utf8(writer.into_inner()).map_err(|e| {
        ConverterError::Serialization(format!("Failed to write OSCAL XML: {}", e))
    })
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<(), ConverterError> {
    let write_err = |e| write_error(&node.name, e);

    let mut start = BytesStart::new(node.name.as_str());
    for (key, value) in &node.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if node.text.is_none() && node.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(write_err);
    }

    writer.write_event(Event::Start(start)).map_err(write_err)?;
    if node.is_mixed() {
        // A text event between siblings, even an empty one, keeps the indenting
        // writer from breaking lines inside prose.
        write_text(writer, node.text.as_deref(), &node.name)?;
        for child in &node.children {
            write_node(writer, child)?;
            write_text(writer, child.tail.as_deref(), &node.name)?;
        }
    } else {
        if let Some(text) = &node.text {
            write_text(writer, Some(text), &node.name)?;
        }
        for child in &node.children {
            write_node(writer, child)?;
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(node.name.as_str())))
        .map_err(write_err)
}

fn write_text(
    writer: &mut Writer<Vec<u8>>,
    text: Option<&str>,
    parent: &str,
) -> Result<(), ConverterError> {
    writer
        .write_event(Event::Text(BytesText::new(text.unwrap_or_default())))
        .map_err(|e| write_error(parent, e))
}

fn write_error(name: &str, cause: impl Display) -> ConverterError {
    ConverterError::Serialization(format!("Failed to write <{}>: {}", name, cause))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CATALOG_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- sample -->
<catalog xmlns="http://csrc.nist.gov/ns/oscal/1.0" uuid="74c8ba1e-5cd4-4ad1-bbfd-d888e2f6c724">
  <metadata>
    <title>Test &amp; Catalog</title>
    <version>1.0</version>
  </metadata>
  <group id="ac">
    <title>Access Control</title>
    <control id="ac-1"><title>Policy</title></control>
    <control id="ac-2"/>
  </group>
</catalog>"#;

    #[test]
    fn test_parse_catalog() {
        let doc = parse(CATALOG_XML).unwrap();
        assert_eq!(doc.root_name(), "catalog");
        assert_eq!(
            doc.root.attribute("xmlns"),
            Some("http://csrc.nist.gov/ns/oscal/1.0")
        );
        assert_eq!(
            doc.root.child("metadata").unwrap().field("title"),
            Some("Test & Catalog")
        );
        let group = doc.root.child("group").unwrap();
        assert_eq!(group.children_named("control").count(), 2);
    }

    #[test]
    fn test_parse_rejects_mismatched_tags() {
        assert!(parse("<catalog><metadata></catalog>").is_err());
    }

    #[test]
    fn test_parse_rejects_unclosed_root() {
        let err = parse("<catalog><metadata/>").unwrap_err();
        assert!(matches!(err, ConverterError::Parse(_)));
    }

    #[test]
    fn test_parse_rejects_multiple_roots_and_stray_text() {
        assert!(parse("<catalog/><profile/>").is_err());
        assert!(parse("hello <catalog/>").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_parse_reads_cdata() {
        let doc = parse("<catalog><remarks><![CDATA[a < b]]></remarks></catalog>").unwrap();
        assert_eq!(doc.root.field("remarks"), Some("a < b"));
    }

    #[test]
    fn test_write_escapes_and_round_trips() {
        let doc = parse(CATALOG_XML).unwrap();
        let written = write(&doc).unwrap();
        assert!(written.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(written.contains("Test &amp; Catalog"));
        assert!(written.contains("<control id=\"ac-2\"/>"));
        assert_eq!(parse(&written).unwrap(), doc);
    }

    #[test]
    fn test_inline_markup_keeps_its_place_in_prose() {
        let prose = concat!(
            r#"<p>The organization <insert type="param" id-ref="ac-1_prm_1"/> develops "#,
            "<em>and</em> <strong>documents</strong> a policy.</p>",
        );
        let xml = format!("<catalog><part>{}</part></catalog>", prose);
        let doc = parse(&xml).unwrap();
        let p = doc.root.child("part").unwrap().child("p").unwrap();
        assert_eq!(p.text.as_deref(), Some("The organization "));
        assert_eq!(p.children[0].tail.as_deref(), Some(" develops "));
        assert_eq!(p.children[1].tail.as_deref(), Some(" "));
        assert_eq!(p.children[2].tail.as_deref(), Some(" a policy."));

        let written = write(&doc).unwrap();
        assert!(written.contains(prose));
        assert_eq!(parse(&written).unwrap(), doc);
    }
}
