use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use super::{image_source, span, DefaultImageStrategy, ImageStrategy};
use crate::errors::ConfigError;
use crate::markup::Element;
use crate::structured_content::{ContentItem, ContentNode, DataMap, HtmlTag, SizeUnits};

/// Text that replaces a gaiji image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlyphReplacement {
    pub text: String,
    pub class: String,
}

/// Swaps known glyph images for their Unicode text.
///
/// Keys are image file names (`arrow-thin.svg`); the replacement's class is
/// appended to the `class` entry of the data map so it stays styleable.
#[derive(Clone, Debug, Default)]
pub struct GlyphImageStrategy<F = DefaultImageStrategy> {
    glyphs: IndexMap<String, GlyphReplacement>,
    fallback: F,
}

impl GlyphImageStrategy {
    pub fn new(glyphs: IndexMap<String, GlyphReplacement>) -> Self {
        Self::with_fallback(glyphs, DefaultImageStrategy)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::new(ConfigError::read_json(path)?))
    }
}

impl<F: ImageStrategy> GlyphImageStrategy<F> {
    pub fn with_fallback(glyphs: IndexMap<String, GlyphReplacement>, fallback: F) -> Self {
        Self { glyphs, fallback }
    }
}

impl<F: ImageStrategy> ImageStrategy for GlyphImageStrategy<F> {
    fn handle_image(
        &self,
        node: &Element,
        children: Vec<ContentItem>,
        mut data: DataMap,
        classes: &[String],
    ) -> Option<ContentNode> {
        let Some(glyph) = self.glyphs.get(file_name(image_source(node))) else {
            return self.fallback.handle_image(node, children, data, classes);
        };
        data.entry("class".to_string())
            .and_modify(|existing| {
                existing.push(' ');
                existing.push_str(&glyph.class);
            })
            .or_insert_with(|| glyph.class.clone());
        Some(ContentNode::element(
            HtmlTag::Span.as_str(),
            glyph.text.as_str(),
            Some(data),
        ))
    }
}

/// Resolves image paths whose file names were renamed on disk.
///
/// Lookup order: exact name, then the NFC, NFD, NFKC and NFKD forms, then a
/// match ignoring the extension. Afterwards, the extension table rewrites
/// formats the viewer cannot show (`heic` -> `avif`).
#[derive(Clone, Debug, Default)]
pub struct RemappedImageStrategy<F = DefaultImageStrategy> {
    file_map: IndexMap<String, String>,
    extension_map: IndexMap<String, String>,
    fallback: F,
}

impl RemappedImageStrategy {
    pub fn new(file_map: IndexMap<String, String>) -> Self {
        Self::with_fallback(file_map, DefaultImageStrategy)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::new(ConfigError::read_json(path)?))
    }
}

impl<F: ImageStrategy> RemappedImageStrategy<F> {
    pub fn with_fallback(file_map: IndexMap<String, String>, fallback: F) -> Self {
        Self {
            file_map,
            extension_map: IndexMap::new(),
            fallback,
        }
    }

    /// Extensions compare case-insensitively and are given without the dot.
    pub fn with_extension(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.extension_map
            .insert(from.into().to_lowercase(), to.into());
        self
    }

    pub fn remap(&self, path: &str) -> String {
        let (dir, name) = split_file_name(path);
        let name = self.lookup(name).unwrap_or(name);

        let renamed = match name.rsplit_once('.') {
            Some((stem, ext)) => match self.extension_map.get(&ext.to_lowercase()) {
                Some(to) => format!("{stem}.{to}"),
                None => name.to_string(),
            },
            None => name.to_string(),
        };
        format!("{dir}{renamed}")
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        if let Some(found) = self.file_map.get(name) {
            return Some(found.as_str());
        }

        let forms: [String; 4] = [
            name.nfc().collect(),
            name.nfd().collect(),
            name.nfkc().collect(),
            name.nfkd().collect(),
        ];
        if let Some(found) = forms.iter().find_map(|form| self.file_map.get(form)) {
            return Some(found.as_str());
        }

        let stem = file_stem(name);
        self.file_map
            .iter()
            .find(|(key, _)| file_stem(key) == stem)
            .map(|(_, value)| value.as_str())
    }
}

impl<F: ImageStrategy> ImageStrategy for RemappedImageStrategy<F> {
    fn handle_image(
        &self,
        node: &Element,
        children: Vec<ContentItem>,
        data: DataMap,
        classes: &[String],
    ) -> Option<ContentNode> {
        let source = image_source(node);
        if source.is_empty() {
            return self.fallback.handle_image(node, children, data, classes);
        }
        let mut renamed = node.clone();
        renamed.set_attr("src", self.remap(source));
        self.fallback.handle_image(&renamed, children, data, classes)
    }
}

/// Supplies the natural size of a vector image.
pub trait ImageDimensions {
    /// `(width, height)` in the image's own units, `None` when unknown.
    fn dimensions(&self, path: &str) -> Option<(f64, f64)>;
}

impl<T: Fn(&str) -> Option<(f64, f64)>> ImageDimensions for T {
    fn dimensions(&self, path: &str) -> Option<(f64, f64)> {
        self(path)
    }
}

/// Reads dimensions from the `viewBox` (or `width`/`height`) of SVG files
/// under `root`. Results are cached per path.
#[derive(Debug, Default)]
pub struct SvgViewBoxDimensions {
    root: PathBuf,
    cache: RefCell<HashMap<String, Option<(f64, f64)>>>,
}

impl SvgViewBoxDimensions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: RefCell::default(),
        }
    }

    /// Size of the outermost `<svg>` element: the last two `viewBox`
    /// values, else its `width` and `height`.
    pub fn parse(svg: &str) -> Option<(f64, f64)> {
        let mut reader = Reader::from_str(svg);
        loop {
            match reader.read_event() {
                Ok(Event::Start(e) | Event::Empty(e)) if e.local_name().as_ref() == b"svg" => {
                    return svg_size(&e);
                }
                Ok(Event::Eof) | Err(_) => return None,
                Ok(_) => {}
            }
        }
    }
}

fn svg_attr(svg: &BytesStart, name: &[u8]) -> Option<String> {
    svg.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| String::from_utf8(a.value.to_vec()).ok())
}

fn svg_size(svg: &BytesStart) -> Option<(f64, f64)> {
    if let Some(view_box) = svg_attr(svg, b"viewBox") {
        let values: Vec<f64> = view_box
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|v| !v.is_empty())
            .map_while(|v| v.parse().ok())
            .collect();
        if let [_, _, width, height] = values.as_slice() {
            return Some((*width, *height));
        }
    }

    let length = |value: String| value.trim().trim_end_matches("px").parse::<f64>().ok();
    Some((
        length(svg_attr(svg, b"width")?)?,
        length(svg_attr(svg, b"height")?)?,
    ))
}

impl ImageDimensions for SvgViewBoxDimensions {
    fn dimensions(&self, path: &str) -> Option<(f64, f64)> {
        if let Some(cached) = self.cache.borrow().get(path) {
            return *cached;
        }
        let found = match std::fs::read_to_string(self.root.join(path)) {
            Ok(svg) => Self::parse(&svg),
            Err(e) => {
                log::debug!("no svg dimensions for {path}: {e}");
                None
            }
        };
        self.cache.borrow_mut().insert(path.to_string(), found);
        found
    }
}

/// Shape buckets for formula-like images, checked in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizeClass {
    TallWide,
    Tall,
    LongInline,
    Wide,
    Single,
    Regular,
}

impl SizeClass {
    pub fn classify(width: f64, height: f64) -> Self {
        if height > 15.0 && width > 100.0 {
            SizeClass::TallWide
        } else if height > 15.0 {
            SizeClass::Tall
        } else if width > 100.0 && height < 10.0 {
            SizeClass::LongInline
        } else if width > 150.0 {
            SizeClass::Wide
        } else if width < 10.0 && height < 10.0 {
            SizeClass::Single
        } else {
            SizeClass::Regular
        }
    }

    /// Rendered height in `em`.
    pub fn height(&self) -> f64 {
        match self {
            SizeClass::Single => 0.8,
            SizeClass::Regular => 1.2,
            SizeClass::Tall => 3.0,
            SizeClass::TallWide => 4.0,
            SizeClass::LongInline => 1.5,
            SizeClass::Wide => 1.8,
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, SizeClass::Tall | SizeClass::TallWide | SizeClass::Wide)
    }

    /// Block images wider than this are scaled down to it.
    pub fn max_width(&self) -> Option<f64> {
        match self {
            SizeClass::Wide => Some(8.0),
            SizeClass::TallWide => Some(10.0),
            _ => None,
        }
    }
}

/// Display size in `em`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImageSize {
    pub width: f64,
    pub height: f64,
    pub block: bool,
}

impl ImageSize {
    pub const UNKNOWN: ImageSize = ImageSize {
        width: 3.0,
        height: 1.5,
        block: false,
    };
    const MIN_WIDTH: f64 = 0.8;

    pub fn from_dimensions(width: f64, height: f64) -> Self {
        if width <= 0.0 || height <= 0.0 {
            return Self::UNKNOWN;
        }
        let class = SizeClass::classify(width, height);
        let mut em_height = class.height();
        let mut em_width = (em_height * width / height).max(Self::MIN_WIDTH);
        if let Some(max) = class.max_width() {
            if em_width > max {
                em_height *= max / em_width;
                em_width = max;
            }
        }
        Self {
            width: round2(em_width),
            height: round2(em_height),
            block: class.is_block(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Sizes vector images (`.svg`) from their natural dimensions.
///
/// Non-vector images go to the fallback. When `raster_extension` is set the
/// emitted path points at a pre-rendered copy instead of the svg.
#[derive(Debug, Default)]
pub struct SizedImageStrategy<D, F = DefaultImageStrategy> {
    dimensions: D,
    raster_extension: Option<String>,
    fallback: F,
}

impl<D: ImageDimensions> SizedImageStrategy<D> {
    pub fn new(dimensions: D) -> Self {
        Self::with_fallback(dimensions, DefaultImageStrategy)
    }
}

impl<D: ImageDimensions, F: ImageStrategy> SizedImageStrategy<D, F> {
    pub fn with_fallback(dimensions: D, fallback: F) -> Self {
        Self {
            dimensions,
            raster_extension: None,
            fallback,
        }
    }

    pub fn with_raster_extension(mut self, ext: impl Into<String>) -> Self {
        self.raster_extension = Some(ext.into());
        self
    }

    pub fn size_of(&self, path: &str) -> ImageSize {
        self.dimensions
            .dimensions(path)
            .map(|(w, h)| ImageSize::from_dimensions(w, h))
            .unwrap_or(ImageSize::UNKNOWN)
    }
}

impl<D: ImageDimensions, F: ImageStrategy> ImageStrategy for SizedImageStrategy<D, F> {
    fn handle_image(
        &self,
        node: &Element,
        mut children: Vec<ContentItem>,
        data: DataMap,
        classes: &[String],
    ) -> Option<ContentNode> {
        let source = image_source(node);
        let Some(stem) = strip_extension_ci(source, "svg") else {
            return self.fallback.handle_image(node, children, data, classes);
        };

        let size = self.size_of(source);
        let path = match &self.raster_extension {
            Some(ext) => format!("{stem}.{ext}"),
            None => source.to_string(),
        };

        let mut image = ContentNode::image(path, Some(data.clone()));
        image.width = Some(size.width);
        image.height = Some(size.height);
        image.size_units = Some(SizeUnits::Em);
        children.insert(0, image.into());

        if size.block {
            Some(ContentNode::element(HtmlTag::Div.as_str(), children, Some(data)))
        } else {
            Some(span(children, data))
        }
    }
}

fn split_file_name(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => path.split_at(i + 1),
        None => ("", path),
    }
}

fn file_name(path: &str) -> &str {
    split_file_name(path).1
}

fn file_stem(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}

fn strip_extension_ci<'a>(path: &'a str, ext: &str) -> Option<&'a str> {
    let (stem, found) = path.rsplit_once('.')?;
    found.eq_ignore_ascii_case(ext).then_some(stem)
}
