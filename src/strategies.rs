//! Pluggable handling for link-like and image-like elements.
//!
//! The converter never branches on a particular dictionary; anything
//! publisher-specific lives behind these two traits.

pub mod image;
pub mod link;

pub use image::{
    GlyphImageStrategy, GlyphReplacement, ImageDimensions, ImageSize, RemappedImageStrategy,
    SizeClass, SizedImageStrategy, SvgViewBoxDimensions,
};
pub use link::{HeadwordLinkStrategy, MapLinkStrategy, TableLinkStrategy};

use crate::language::ja::japanese::is_numeric_text;
use crate::markup::Element;
use crate::structured_content::{ContentItem, ContentNode, DataMap, HtmlTag};

pub trait LinkStrategy {
    /// `children` are the already converted children of `node`.
    fn handle_link(
        &self,
        node: &Element,
        children: Vec<ContentItem>,
        data: DataMap,
        classes: &[String],
    ) -> Option<ContentNode>;
}

pub trait ImageStrategy {
    /// Also called for an image element without children, in which case
    /// `children` is empty.
    fn handle_image(
        &self,
        node: &Element,
        children: Vec<ContentItem>,
        data: DataMap,
        classes: &[String],
    ) -> Option<ContentNode>;
}

impl<S: LinkStrategy + ?Sized> LinkStrategy for Box<S> {
    fn handle_link(
        &self,
        node: &Element,
        children: Vec<ContentItem>,
        data: DataMap,
        classes: &[String],
    ) -> Option<ContentNode> {
        (**self).handle_link(node, children, data, classes)
    }
}

impl<S: ImageStrategy + ?Sized> ImageStrategy for Box<S> {
    fn handle_image(
        &self,
        node: &Element,
        children: Vec<ContentItem>,
        data: DataMap,
        classes: &[String],
    ) -> Option<ContentNode> {
        (**self).handle_image(node, children, data, classes)
    }
}

/// Links to a dictionary search for the anchor's own text.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultLinkStrategy;

impl LinkStrategy for DefaultLinkStrategy {
    fn handle_link(
        &self,
        node: &Element,
        children: Vec<ContentItem>,
        data: DataMap,
        _classes: &[String],
    ) -> Option<ContentNode> {
        let text = node.text();
        let query = text.trim();
        // bare reference numbers are not worth searching for
        if !query.is_empty() && !is_numeric_text(query) {
            return Some(ContentNode::query_link(query, children));
        }
        Some(span(children, data))
    }
}

/// Prepends an image descriptor for `src` and wraps everything in a span.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultImageStrategy;

impl ImageStrategy for DefaultImageStrategy {
    fn handle_image(
        &self,
        node: &Element,
        mut children: Vec<ContentItem>,
        data: DataMap,
        _classes: &[String],
    ) -> Option<ContentNode> {
        let path = image_source(node);
        if !path.is_empty() {
            children.insert(0, ContentNode::image(path, Some(data.clone())).into());
        }
        Some(span(children, data))
    }
}

/// The `src` attribute without leading slashes.
pub fn image_source(node: &Element) -> &str {
    node.attr("src").unwrap_or_default().trim_start_matches('/')
}

pub(crate) fn span(children: Vec<ContentItem>, data: DataMap) -> ContentNode {
    ContentNode::element(HtmlTag::Span.as_str(), children, Some(data))
}
