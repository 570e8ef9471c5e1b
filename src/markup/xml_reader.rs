//! Builds [`MarkupNode`] trees from XML/XHTML fragments with `quick-xml`.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{Element, MarkupNode};
use crate::errors::MarkupError;

/// Parses a fragment that may hold several top-level nodes.
///
/// Text is kept verbatim (no trimming); whitespace-only runs are the
/// converter's business, not the reader's.
pub fn read_fragment(source: &str) -> Result<Vec<MarkupNode>, MarkupError> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(false);

    let mut roots: Vec<MarkupNode> = Vec::new();
    let mut stack: Vec<Element> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => stack.push(start_element(&e)?),
            Event::Empty(e) => {
                let el = start_element(&e)?;
                attach(&mut stack, &mut roots, MarkupNode::Element(el));
            }
            Event::End(_) => {
                let Some(el) = stack.pop() else {
                    return Err(MarkupError::Unbalanced);
                };
                attach(&mut stack, &mut roots, MarkupNode::Element(el));
            }
            Event::Text(e) => {
                let text = String::from_utf8(e.as_ref().to_vec())?;
                push_text(&mut stack, &mut roots, &text);
            }
            Event::GeneralRef(e) => {
                let entity = String::from_utf8(e.as_ref().to_vec())?;
                let resolved = resolve_entity(&entity).unwrap_or_else(|| format!("&{entity};"));
                push_text(&mut stack, &mut roots, &resolved);
            }
            Event::CData(e) => {
                let text = String::from_utf8(e.into_inner().to_vec())?;
                attach(&mut stack, &mut roots, MarkupNode::CData(text));
            }
            Event::Comment(e) => {
                let text = String::from_utf8(e.as_ref().to_vec())?;
                attach(&mut stack, &mut roots, MarkupNode::Comment(text));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(MarkupError::Unclosed(open.name().to_string()));
    }
    Ok(roots)
}

/// Parses a fragment and wraps its top-level nodes in a synthetic root element.
pub fn read_rooted(source: &str, root_name: &str) -> Result<Element, MarkupError> {
    let mut root = Element::new(root_name);
    for node in read_fragment(source)? {
        root.push_child(node);
    }
    Ok(root)
}

fn start_element(e: &BytesStart) -> Result<Element, MarkupError> {
    let name = String::from_utf8(e.name().as_ref().to_vec())?;
    let mut el = Element::new(name);
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8(attr.key.as_ref().to_vec())?;
        let raw = String::from_utf8(attr.value.to_vec())?;
        let value = quick_xml::escape::unescape(&raw)?.into_owned();
        el.set_attr(key, value);
    }
    Ok(el)
}

fn attach(stack: &mut [Element], roots: &mut Vec<MarkupNode>, node: MarkupNode) {
    match stack.last_mut() {
        Some(parent) => parent.push_child(node),
        None => roots.push(node),
    }
}

/// Text and entity events arrive split; adjacent pieces are merged.
fn push_text(stack: &mut [Element], roots: &mut Vec<MarkupNode>, text: &str) {
    let siblings = match stack.last_mut() {
        Some(parent) => &mut parent.children,
        None => roots,
    };
    if let Some(MarkupNode::Text(prev)) = siblings.last_mut() {
        prev.push_str(text);
    } else {
        siblings.push(MarkupNode::Text(text.to_string()));
    }
}

fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        "nbsp" => return Some('\u{a0}'.to_string()),
        _ => {}
    }

    let code = if let Some(hex) = entity.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse::<u32>().ok()
    } else {
        None
    };
    code.and_then(char::from_u32).map(|c| c.to_string())
}
