//! Generic markup tree consumed by the converter.
//!
//! Trees are produced by any external parser (or by [`xml_reader::read_fragment`])
//! and are read-only afterwards. Elements do not own a parent pointer; the
//! converter hands the resolver an explicit [`Ancestry`] chain instead.

pub mod xml_reader;

use indexmap::IndexMap;

pub use xml_reader::read_fragment;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkupNode {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

impl MarkupNode {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            MarkupNode::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Concatenated text of this node and all of its descendants.
    pub fn text(&self) -> String {
        let mut buf = String::new();
        self.collect_text(&mut buf, &[]);
        buf
    }

    fn collect_text(&self, buf: &mut String, skip: &[&str]) {
        match self {
            MarkupNode::Text(t) | MarkupNode::CData(t) => buf.push_str(t),
            MarkupNode::Comment(_) => {}
            MarkupNode::Element(el) => {
                if skip.iter().any(|s| el.name.eq_ignore_ascii_case(s)) {
                    return;
                }
                for child in &el.children {
                    child.collect_text(buf, skip);
                }
            }
        }
    }
}

impl From<Element> for MarkupNode {
    fn from(value: Element) -> Self {
        MarkupNode::Element(value)
    }
}

/// A markup element: tag name, insertion-ordered attributes and ordered children.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: IndexMap<String, String>,
    children: Vec<MarkupNode>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: impl Into<MarkupNode>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(MarkupNode::Text(text.into()));
        self
    }

    pub fn push_child(&mut self, child: MarkupNode) {
        self.children.push(child);
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &IndexMap<String, String> {
        &self.attributes
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn children(&self) -> &[MarkupNode] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Element children only, in document order.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(MarkupNode::as_element)
    }

    /// Whitespace separated values of the `class` attribute.
    pub fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn text(&self) -> String {
        self.text_excluding(&[])
    }

    /// Flattened text, skipping the subtrees of the named tags (e.g. `rt`).
    pub fn text_excluding(&self, skip: &[&str]) -> String {
        let mut buf = String::new();
        for child in &self.children {
            child.collect_text(&mut buf, skip);
        }
        buf
    }

    /// First descendant element with the given tag name, depth first.
    pub fn find(&self, name: &str) -> Option<&Element> {
        for child in self.child_elements() {
            if child.name.eq_ignore_ascii_case(name) {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }
}

/// Borrowed chain of ancestors, nearest first.
///
/// Built on the stack while the converter descends, so it costs nothing to
/// create and never outlives the walk.
#[derive(Clone, Copy, Debug)]
pub struct Ancestry<'a> {
    pub element: &'a Element,
    pub parent: Option<&'a Ancestry<'a>>,
}

impl<'a> Ancestry<'a> {
    pub fn root(element: &'a Element) -> Self {
        Self {
            element,
            parent: None,
        }
    }

    pub fn child_of(element: &'a Element, parent: Option<&'a Ancestry<'a>>) -> Self {
        Self { element, parent }
    }

    /// Iterates from this element outwards to the root.
    pub fn iter(&self) -> AncestryIter<'_> {
        AncestryIter { next: Some(self) }
    }
}

pub struct AncestryIter<'a> {
    next: Option<&'a Ancestry<'a>>,
}

impl<'a> Iterator for AncestryIter<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent;
        Some(current.element)
    }
}
