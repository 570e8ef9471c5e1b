use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Attribute map attached to a node as `data-*` values.
pub type DataMap = IndexMap<String, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageRendering {
    Auto,
    Pixelated,
    CrispEdges,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageAppearance {
    Auto,
    Monochrome,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerticalAlign {
    Baseline,
    Sub,
    Super,
    TextTop,
    TextBottom,
    Middle,
    Top,
    Bottom,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeUnits {
    Px,
    Em,
}

/// Every tag the viewer renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HtmlTag {
    Br,
    Ruby,
    Rt,
    Rp,
    Table,
    Thead,
    Tbody,
    Tfoot,
    Tr,
    Td,
    Th,
    Span,
    Div,
    Ol,
    Ul,
    Li,
    Img,
    A,
    Details,
    Summary,
}

impl HtmlTag {
    pub const ALL: [HtmlTag; 20] = [
        HtmlTag::Br,
        HtmlTag::Ruby,
        HtmlTag::Rt,
        HtmlTag::Rp,
        HtmlTag::Table,
        HtmlTag::Thead,
        HtmlTag::Tbody,
        HtmlTag::Tfoot,
        HtmlTag::Tr,
        HtmlTag::Td,
        HtmlTag::Th,
        HtmlTag::Span,
        HtmlTag::Div,
        HtmlTag::Ol,
        HtmlTag::Ul,
        HtmlTag::Li,
        HtmlTag::Img,
        HtmlTag::A,
        HtmlTag::Details,
        HtmlTag::Summary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HtmlTag::Br => "br",
            HtmlTag::Ruby => "ruby",
            HtmlTag::Rt => "rt",
            HtmlTag::Rp => "rp",
            HtmlTag::Table => "table",
            HtmlTag::Thead => "thead",
            HtmlTag::Tbody => "tbody",
            HtmlTag::Tfoot => "tfoot",
            HtmlTag::Tr => "tr",
            HtmlTag::Td => "td",
            HtmlTag::Th => "th",
            HtmlTag::Span => "span",
            HtmlTag::Div => "div",
            HtmlTag::Ol => "ol",
            HtmlTag::Ul => "ul",
            HtmlTag::Li => "li",
            HtmlTag::Img => "img",
            HtmlTag::A => "a",
            HtmlTag::Details => "details",
            HtmlTag::Summary => "summary",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(name))
    }

    /// Tags the converter may emit verbatim, without consulting the mapping
    /// table. `img` and `a` need a strategy, so they are not native.
    pub fn is_native(name: &str) -> bool {
        matches!(Self::from_name(name), Some(tag) if !matches!(tag, HtmlTag::Img | HtmlTag::A))
    }

    /// `br` and `img` never carry content.
    pub fn supports_content(&self) -> bool {
        !matches!(self, HtmlTag::Br | HtmlTag::Img)
    }
}

/// `content` of a node: a bare string or a list of children.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Nodes(Vec<ContentItem>),
}

impl From<&str> for Content {
    fn from(value: &str) -> Self {
        Content::Text(value.to_string())
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        Content::Text(value)
    }
}

impl From<Vec<ContentItem>> for Content {
    fn from(value: Vec<ContentItem>) -> Self {
        Content::Nodes(value)
    }
}

impl From<Vec<ContentNode>> for Content {
    fn from(value: Vec<ContentNode>) -> Self {
        Content::Nodes(value.into_iter().map(ContentItem::Node).collect())
    }
}

/// One element of a list `content`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentItem {
    Text(String),
    Node(ContentNode),
}

impl From<ContentNode> for ContentItem {
    fn from(value: ContentNode) -> Self {
        ContentItem::Node(value)
    }
}

impl ContentItem {
    /// Empty or whitespace-only text, either bare or as a plain text span.
    pub fn is_blank(&self) -> bool {
        match self {
            ContentItem::Text(text) => text.trim().is_empty(),
            ContentItem::Node(node) => {
                node.tag == HtmlTag::Span.as_str()
                    && matches!(&node.content, Some(Content::Text(text)) if text.trim().is_empty())
            }
        }
    }
}

/// The structured-content unit consumed by the viewer.
///
/// Optional fields are omitted from the JSON when unset, so `content` is
/// either absent or a real value; it is never `null`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentNode {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DataMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<IndexMap<String, String>>,
    /// Path to the image file in the archive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    /// Preferred width of the image, in `size_units`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Preferred height of the image, in `size_units`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_units: Option<SizeUnits>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_align: Option<VerticalAlign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_rendering: Option<ImageRendering>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appearance: Option<ImageAppearance>,
    /// Whether or not the image can be collapsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collapsible: Option<bool>,
    /// Whether or not the image is collapsed by default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
    /// Whether or not a background color is displayed behind the image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<bool>,
}

impl ContentNode {
    /// Builds a node the way every producer in the crate does: void tags drop
    /// their content and an empty data map is left out.
    pub fn element(
        tag: impl Into<String>,
        content: impl Into<Content>,
        data: Option<DataMap>,
    ) -> Self {
        let tag = tag.into();
        let content = match HtmlTag::from_name(&tag) {
            Some(known) if !known.supports_content() => None,
            _ => Some(content.into()),
        };
        Self {
            tag,
            content,
            data: data.filter(|d| !d.is_empty()),
            ..Default::default()
        }
    }

    /// A plain `span` holding text, used for text leaves.
    pub fn text(text: impl Into<String>) -> Self {
        Self::element(HtmlTag::Span.as_str(), Content::Text(text.into()), None)
    }

    /// An internal search link (`?query=...&wildcards=off`).
    pub fn query_link(query: &str, content: impl Into<Content>) -> Self {
        Self::link(format!("?query={query}&wildcards=off"), content)
    }

    pub fn link(href: impl Into<String>, content: impl Into<Content>) -> Self {
        let mut node = Self::element(HtmlTag::A.as_str(), content, None);
        node.href = Some(href.into());
        node
    }

    /// The image descriptor the default image handling prepends to children.
    pub fn image(path: impl Into<String>, data: Option<DataMap>) -> Self {
        Self {
            tag: HtmlTag::Img.as_str().to_string(),
            path: Some(path.into()),
            collapsible: Some(false),
            collapsed: Some(false),
            background: Some(false),
            appearance: Some(ImageAppearance::Auto),
            image_rendering: Some(ImageRendering::Auto),
            data: data.filter(|d| !d.is_empty()),
            ..Default::default()
        }
    }

    pub fn with_style(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.style
            .get_or_insert_with(IndexMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Checks the node and its whole subtree against what the viewer accepts.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let Some(tag) = HtmlTag::from_name(&self.tag) else {
            return Err(ValidationError::UnsupportedTag {
                tag: self.tag.clone(),
            });
        };
        if self.href.is_some() && tag != HtmlTag::A {
            return Err(ValidationError::HrefOutsideAnchor {
                tag: self.tag.clone(),
            });
        }
        match &self.content {
            Some(_) if !tag.supports_content() => Err(ValidationError::ContentOnVoidElement {
                tag: self.tag.clone(),
            }),
            Some(Content::Nodes(items)) => {
                for (index, item) in items.iter().enumerate() {
                    if let ContentItem::Node(child) = item {
                        child.validate().map_err(|e| ValidationError::Child {
                            tag: self.tag.clone(),
                            index,
                            source: Box::new(e),
                        })?;
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod structured_content_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn native_vocabulary() {
        assert!(HtmlTag::is_native("ruby"));
        assert!(HtmlTag::is_native("SUMMARY"));
        assert!(!HtmlTag::is_native("img"));
        assert!(!HtmlTag::is_native("a"));
        assert!(!HtmlTag::is_native("見出"));
    }

    #[test]
    fn serializes_viewer_shape() {
        let mut data = DataMap::new();
        data.insert("headword".into(), "".into());
        let node = ContentNode::element(
            "div",
            vec![ContentNode::text("見出し"), ContentNode::query_link("語", "語")],
            Some(data),
        );
        assert_eq!(
            serde_json::to_value(&node).unwrap(),
            json!({
                "tag": "div",
                "content": [
                    {"tag": "span", "content": "見出し"},
                    {"tag": "a", "content": "語", "href": "?query=語&wildcards=off"}
                ],
                "data": {"headword": ""}
            })
        );
    }

    #[test]
    fn image_descriptor_shape() {
        let img = ContentNode::image("foo/bar.png", None);
        assert_eq!(
            serde_json::to_value(&img).unwrap(),
            json!({
                "tag": "img",
                "path": "foo/bar.png",
                "imageRendering": "auto",
                "appearance": "auto",
                "collapsible": false,
                "collapsed": false,
                "background": false
            })
        );
    }

    #[test]
    fn void_tags_drop_content() {
        let br = ContentNode::element("br", "ignored", None);
        assert_eq!(br.content, None);
        assert!(br.validate().is_ok());
    }

    #[test]
    fn validation_rejects_href_outside_anchor() {
        let mut span = ContentNode::text("x");
        span.href = Some("?query=x".into());
        let outer = ContentNode::element("div", vec![ContentNode::text("a"), span], None);
        let err = outer.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "In div > content[1]: the 'href' attribute is not allowed in the 'span' element, only <a>"
        );
    }

    #[test]
    fn validation_rejects_unknown_tags() {
        let node = ContentNode::element("p", "text", None);
        assert_eq!(
            node.validate(),
            Err(ValidationError::UnsupportedTag { tag: "p".into() })
        );
    }

    #[test]
    fn blank_items() {
        assert!(ContentItem::Node(ContentNode::text(" \n")).is_blank());
        assert!(ContentItem::Text(String::new()).is_blank());
        assert!(!ContentItem::Node(ContentNode::text("語")).is_blank());
        assert!(!ContentItem::Node(ContentNode::image("a.png", None)).is_blank());
    }
}
