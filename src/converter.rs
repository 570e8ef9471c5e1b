//! Recursive markup -> structured-content conversion.

use std::collections::HashSet;

use crate::markup::{Ancestry, Element, MarkupNode};
use crate::strategies::{DefaultImageStrategy, DefaultLinkStrategy, ImageStrategy, LinkStrategy};
use crate::structured_content::{ContentItem, ContentNode, DataMap, HtmlTag};
use crate::tag_mapping::{effective_classes, TagMapping, TagResolver};

/// Builds the `data` map of an element: a flag for its own tag and for each
/// class, then its attributes. `-` becomes `_` in every key.
///
/// `class` itself is carried by the flags, so it is not repeated as an
/// attribute.
pub fn data_map(element: &Element, classes: &[String]) -> DataMap {
    let mut data = DataMap::new();
    data.insert(element.name().to_string(), String::new());
    for class in classes {
        data.insert(class.replace('-', "_"), String::new());
    }
    for (key, value) in element.attributes() {
        if key == "class" {
            continue;
        }
        data.insert(key.replace('-', "_"), value.clone());
    }
    data
}

/// Converted children, or a finished node that replaces the element.
enum Children {
    Items(Vec<ContentItem>),
    Finished(ContentNode),
}

/// Walks markup trees and emits [`ContentNode`]s.
///
/// Holds everything immutable for the life of one dictionary: the tag
/// resolver, the ignore set and the two strategies.
pub struct HtmlConverter {
    resolver: TagResolver,
    ignored_elements: HashSet<String>,
    expression_element: Option<String>,
    link_strategy: Box<dyn LinkStrategy>,
    image_strategy: Box<dyn ImageStrategy>,
}

impl Default for HtmlConverter {
    fn default() -> Self {
        Self::new(TagMapping::default())
    }
}

impl HtmlConverter {
    pub fn new(mapping: TagMapping) -> Self {
        Self {
            resolver: TagResolver::new(mapping),
            ignored_elements: HashSet::new(),
            expression_element: None,
            link_strategy: Box::new(DefaultLinkStrategy),
            image_strategy: Box::new(DefaultImageStrategy),
        }
    }

    pub fn with_ignored_elements<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ignored_elements
            .extend(tags.into_iter().map(|t| t.as_ref().to_lowercase()));
        self
    }

    /// The element holding the headword inside an entry body, dropped when
    /// converting with `ignore_expressions`.
    pub fn with_expression_element(mut self, tag: impl AsRef<str>) -> Self {
        self.expression_element = Some(tag.as_ref().to_lowercase());
        self
    }

    pub fn with_link_strategy(mut self, strategy: impl LinkStrategy + 'static) -> Self {
        self.link_strategy = Box::new(strategy);
        self
    }

    pub fn with_image_strategy(mut self, strategy: impl ImageStrategy + 'static) -> Self {
        self.image_strategy = Box::new(strategy);
        self
    }

    pub fn resolver(&self) -> &TagResolver {
        &self.resolver
    }

    /// Converts a detached element; the resolver sees no ancestors.
    pub fn convert(
        &self,
        element: Option<&Element>,
        ignore_expressions: bool,
    ) -> Option<ContentNode> {
        self.convert_with_ancestry(element?, None, ignore_expressions)
    }

    /// Converts every element child of `root`, in document order, with
    /// `root` as their parent. Text directly under `root` is not content.
    pub fn convert_children(
        &self,
        root: &Element,
        ignore_expressions: bool,
    ) -> Vec<Option<ContentNode>> {
        let parent = Ancestry::root(root);
        root.child_elements()
            .map(|child| self.convert_with_ancestry(child, Some(&parent), ignore_expressions))
            .collect()
    }

    pub fn convert_with_ancestry(
        &self,
        element: &Element,
        parents: Option<&Ancestry<'_>>,
        ignore_expressions: bool,
    ) -> Option<ContentNode> {
        let tag = element.name().to_lowercase();
        if self.ignored_elements.contains(&tag) {
            return None;
        }
        if ignore_expressions && self.expression_element.as_deref() == Some(tag.as_str()) {
            return None;
        }

        let classes = effective_classes(element);
        let data = data_map(element, &classes);

        let children = match self.convert_children_of(
            element,
            &tag,
            parents,
            &data,
            &classes,
            ignore_expressions,
        ) {
            Children::Finished(node) => return Some(node),
            Children::Items(items) => items,
        };
        if children.iter().all(ContentItem::is_blank) {
            return None;
        }

        if HtmlTag::is_native(&tag) {
            return Some(ContentNode::element(tag, children, Some(data)));
        }

        let target = self.resolver.resolve(element.name(), &classes, parents);

        if tag == HtmlTag::Img.as_str() {
            if let Some(node) = self
                .image_strategy
                .handle_image(element, children.clone(), data.clone(), &classes)
            {
                return Some(node);
            }
        }

        let has_href = element.attr("href").is_some_and(|href| !href.is_empty());
        if tag == HtmlTag::A.as_str() || has_href {
            if let Some(node) = self
                .link_strategy
                .handle_link(element, children.clone(), data.clone(), &classes)
            {
                return Some(node);
            }
        }

        Some(ContentNode::element(target, children, Some(data)))
    }

    fn convert_children_of(
        &self,
        element: &Element,
        tag: &str,
        parents: Option<&Ancestry<'_>>,
        data: &DataMap,
        classes: &[String],
        ignore_expressions: bool,
    ) -> Children {
        if !element.has_children() {
            if tag == HtmlTag::Img.as_str() {
                if let Some(node) = self
                    .image_strategy
                    .handle_image(element, Vec::new(), data.clone(), classes)
                {
                    return Children::Finished(node);
                }
            }
            return Children::Items(Vec::new());
        }

        let here = Ancestry::child_of(element, parents);
        let mut items = Vec::with_capacity(element.children().len());
        for child in element.children() {
            match child {
                MarkupNode::Text(text) | MarkupNode::CData(text) => {
                    items.push(ContentNode::text(text.as_str()).into())
                }
                MarkupNode::Comment(_) => {}
                MarkupNode::Element(el) => {
                    let node = self.convert_with_ancestry(el, Some(&here), ignore_expressions);
                    if let Some(node) = node {
                        items.push(node.into());
                    }
                }
            }
        }
        Children::Items(items)
    }
}

#[cfg(test)]
mod converter_tests {
    use super::*;
    use crate::markup::read_fragment;
    use crate::structured_content::Content;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(xml: &str) -> Element {
        read_fragment(xml)
            .unwrap()
            .into_iter()
            .find_map(|n| match n {
                MarkupNode::Element(el) => Some(el),
                _ => None,
            })
            .unwrap()
    }

    fn convert(converter: &HtmlConverter, xml: &str) -> serde_json::Value {
        let root = parse(xml);
        serde_json::to_value(converter.convert(Some(&root), false)).unwrap()
    }

    #[test]
    fn native_tags_pass_through_with_data() {
        let converter = HtmlConverter::default();
        assert_eq!(
            convert(&converter, r#"<div class="sense-group" data-n="1">意味</div>"#),
            json!({
                "tag": "div",
                "content": [{"tag": "span", "content": "意味"}],
                "data": {"div": "", "sense_group": "", "data_n": "1"}
            })
        );
    }

    #[test]
    fn custom_tags_resolve_through_mapping() {
        let mapping: TagMapping = [("見出", "div"), ("本文 語", "li")].into_iter().collect();
        let converter = HtmlConverter::new(mapping);
        assert_eq!(
            convert(&converter, "<本文><語>悲しぶ</語><注>x</注></本文>"),
            json!({
                "tag": "span",
                "content": [
                    {
                        "tag": "li",
                        "content": [{"tag": "span", "content": "悲しぶ"}],
                        "data": {"語": ""}
                    },
                    {
                        "tag": "span",
                        "content": [{"tag": "span", "content": "x"}],
                        "data": {"注": ""}
                    }
                ],
                "data": {"本文": ""}
            })
        );
    }

    #[test]
    fn whitespace_only_becomes_null() {
        let converter = HtmlConverter::default();
        assert_eq!(converter.convert(Some(&parse("<span>  \n </span>")), false), None);
        assert_eq!(converter.convert(Some(&parse("<div><span> </span></div>")), false), None);
        assert_eq!(converter.convert(None, false), None);
    }

    #[test]
    fn ignored_and_expression_elements_drop() {
        let converter = HtmlConverter::default()
            .with_ignored_elements(["Script"])
            .with_expression_element("midashi");
        let root = parse("<div><script>x</script><midashi>語</midashi><span>本文</span></div>");

        let with_expr = serde_json::to_value(converter.convert(Some(&root), false)).unwrap();
        assert_eq!(with_expr["content"].as_array().unwrap().len(), 2);

        let without = serde_json::to_value(converter.convert(Some(&root), true)).unwrap();
        assert_eq!(
            without["content"],
            json!([{
                "tag": "span",
                "content": [{"tag": "span", "content": "本文"}],
                "data": {"span": ""}
            }])
        );
    }

    #[test]
    fn comments_are_dropped() {
        let converter = HtmlConverter::default();
        let node = converter
            .convert(Some(&parse("<span><!-- note -->語</span>")), false)
            .unwrap();
        assert_eq!(node.content, Some(Content::from(vec![ContentNode::text("語")])));
    }

    #[test]
    fn childless_img_uses_image_strategy() {
        let converter = HtmlConverter::default();
        assert_eq!(
            convert(&converter, r#"<img src="/g/a.png"/>"#),
            json!({
                "tag": "span",
                "content": [{
                    "tag": "img",
                    "path": "g/a.png",
                    "data": {"img": "", "src": "/g/a.png"},
                    "imageRendering": "auto",
                    "appearance": "auto",
                    "collapsible": false,
                    "collapsed": false,
                    "background": false
                }],
                "data": {"img": "", "src": "/g/a.png"}
            })
        );
    }

    #[test]
    fn anchors_and_hrefs_use_link_strategy() {
        let converter = HtmlConverter::default();
        let node = converter
            .convert(Some(&parse(r#"<a href="x.html">哀しぶ</a>"#)), false)
            .unwrap();
        assert_eq!(node.tag, "a");
        assert_eq!(node.href.as_deref(), Some("?query=哀しぶ&wildcards=off"));

        let node = converter
            .convert(Some(&parse(r#"<ref href="x.html">12</ref>"#)), false)
            .unwrap();
        assert_eq!(node.tag, "span");
        assert_eq!(node.href, None);
    }

    #[test]
    fn converted_output_validates() {
        let mapping: TagMapping = [("m", "div"), ("m.sub", "ruby")].into_iter().collect();
        let converter = HtmlConverter::new(mapping);
        let root = parse(
            r#"<entry><m>見出し<a href="y">参照</a></m><m class="sub">語<rt>ご</rt></m><img src="i.png"/></entry>"#,
        );
        for node in converter.convert_children(&root, false).into_iter().flatten() {
            node.validate().unwrap();
        }
    }

    struct NeverLink;

    impl LinkStrategy for NeverLink {
        fn handle_link(
            &self,
            _: &Element,
            _: Vec<ContentItem>,
            _: DataMap,
            _: &[String],
        ) -> Option<ContentNode> {
            None
        }
    }

    #[test]
    fn declined_link_becomes_generic_node() {
        let mapping: TagMapping = [("ref", "div")].into_iter().collect();
        let converter = HtmlConverter::new(mapping).with_link_strategy(NeverLink);
        let node = converter
            .convert(Some(&parse(r#"<ref href="x">語</ref>"#)), false)
            .unwrap();
        assert_eq!(node.tag, "div");
        assert_eq!(node.href, None);
    }
}
