use std::path::Path;

use indexmap::IndexMap;

use super::{DefaultLinkStrategy, LinkStrategy};
use crate::errors::ConfigError;
use crate::language::ja::japanese::clean_headword;
use crate::markup::Element;
use crate::structured_content::{ContentItem, ContentNode, DataMap};

pub const APPLE_MAPS_TEMPLATE: &str = "https://maps.apple.com/?ll={lat},{lng}";
const MAP_PREFIX: &str = "map:ll=";

/// Turns `map:ll=<lat>,<lng>` hrefs into a real map URL.
///
/// The template receives `{lat}` and `{lng}`. Anything else (including
/// malformed coordinates) goes to the fallback.
#[derive(Clone, Debug)]
pub struct MapLinkStrategy<F = DefaultLinkStrategy> {
    template: String,
    fallback: F,
}

impl MapLinkStrategy {
    pub fn new() -> Self {
        Self::with_fallback(DefaultLinkStrategy)
    }
}

impl Default for MapLinkStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: LinkStrategy> MapLinkStrategy<F> {
    pub fn with_fallback(fallback: F) -> Self {
        Self {
            template: APPLE_MAPS_TEMPLATE.to_string(),
            fallback,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn map_url(&self, href: &str) -> Option<String> {
        let coords = href.strip_prefix(MAP_PREFIX)?;
        let coords = coords.split('&').next().unwrap_or_default();
        let (lat, lng) = coords.split_once(',')?;
        let (lat, lng) = (lat.trim(), lng.trim());
        if lat.is_empty() || lng.is_empty() {
            return None;
        }
        Some(self.template.replace("{lat}", lat).replace("{lng}", lng))
    }
}

impl<F: LinkStrategy> LinkStrategy for MapLinkStrategy<F> {
    fn handle_link(
        &self,
        node: &Element,
        children: Vec<ContentItem>,
        data: DataMap,
        classes: &[String],
    ) -> Option<ContentNode> {
        let href = node.attr("href").unwrap_or_default();
        if href.starts_with(MAP_PREFIX) {
            match self.map_url(href) {
                Some(url) => return Some(ContentNode::link(url, children)),
                None => log::warn!("malformed map coordinates: {href}"),
            }
        }
        self.fallback.handle_link(node, children, data, classes)
    }
}

/// Resolves internal hrefs (`entry/0123.html#sub`) to the headword they
/// point at, then links to a search for it.
///
/// The `#fragment` is dropped before lookup.
#[derive(Clone, Debug, Default)]
pub struct TableLinkStrategy<F = DefaultLinkStrategy> {
    titles: IndexMap<String, String>,
    fallback: F,
}

impl TableLinkStrategy {
    pub fn new(titles: IndexMap<String, String>) -> Self {
        Self::with_fallback(titles, DefaultLinkStrategy)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::new(ConfigError::read_json(path)?))
    }
}

impl<F: LinkStrategy> TableLinkStrategy<F> {
    pub fn with_fallback(titles: IndexMap<String, String>, fallback: F) -> Self {
        Self { titles, fallback }
    }

    pub fn title_for(&self, href: &str) -> Option<&str> {
        let target = href.split_once('#').map_or(href, |(target, _)| target);
        self.titles
            .get(target)
            .map(String::as_str)
            .filter(|title| !title.is_empty())
    }
}

impl<F: LinkStrategy> LinkStrategy for TableLinkStrategy<F> {
    fn handle_link(
        &self,
        node: &Element,
        children: Vec<ContentItem>,
        data: DataMap,
        classes: &[String],
    ) -> Option<ContentNode> {
        if let Some(title) = node.attr("href").and_then(|href| self.title_for(href)) {
            return Some(ContentNode::query_link(title, children));
        }
        self.fallback.handle_link(node, children, data, classes)
    }
}

/// Queries for the cleaned anchor text, skipping ruby annotations and other
/// configured subtrees.
#[derive(Clone, Debug)]
pub struct HeadwordLinkStrategy<F = DefaultLinkStrategy> {
    skip: Vec<String>,
    fallback: F,
}

impl HeadwordLinkStrategy {
    pub fn new() -> Self {
        Self::with_fallback(DefaultLinkStrategy)
    }
}

impl Default for HeadwordLinkStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: LinkStrategy> HeadwordLinkStrategy<F> {
    pub fn with_fallback(fallback: F) -> Self {
        Self {
            skip: vec!["rt".to_string(), "rp".to_string()],
            fallback,
        }
    }

    pub fn skipping(mut self, tag: impl Into<String>) -> Self {
        self.skip.push(tag.into());
        self
    }
}

impl<F: LinkStrategy> LinkStrategy for HeadwordLinkStrategy<F> {
    fn handle_link(
        &self,
        node: &Element,
        children: Vec<ContentItem>,
        data: DataMap,
        classes: &[String],
    ) -> Option<ContentNode> {
        let skip: Vec<&str> = self.skip.iter().map(String::as_str).collect();
        let headword = clean_headword(node.text_excluding(&skip));
        if headword.is_empty() {
            return self.fallback.handle_link(node, children, data, classes);
        }
        Some(ContentNode::query_link(&headword, children))
    }
}
