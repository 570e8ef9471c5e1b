use std::path::PathBuf;

use thiserror::Error;

/// All possible `yomitan_converter` [Error] paths
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("(-)[<converter::markup>] -> {0}")]
    Markup(#[from] MarkupError),
    #[error("(-)[<converter::validation>] -> {0}")]
    Validation(#[from] ValidationError),
    #[error("(-)[<converter::config>] -> {0}")]
    Config(#[from] ConfigError),
    #[error("(-)[<converter::manual_match>] -> {0}")]
    ManualMatch(#[from] ManualMatchError),
    #[error("io err: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Custom(String),
}

pub type ConvertResult<T> = Result<T, ConvertError>;

/// A [crate::structured_content::ContentNode] that the viewer would reject.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unsupported html element: {tag}")]
    UnsupportedTag { tag: String },
    #[error("the 'href' attribute is not allowed in the '{tag}' element, only <a>")]
    HrefOutsideAnchor { tag: String },
    #[error("element '{tag}' holds content but does not support children")]
    ContentOnVoidElement { tag: String },
    #[error("In {tag} > content[{index}]: {source}")]
    Child {
        tag: String,
        index: usize,
        #[source]
        source: Box<ValidationError>,
    },
}

#[derive(Error, Debug)]
pub enum MarkupError {
    #[error("xml err: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("attribute err: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),
    #[error("escape err: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),
    #[error("utf8 err: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("closing tag without a matching opening tag")]
    Unbalanced,
    #[error("element <{0}> was never closed")]
    Unclosed(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to open file: {path}\nreason: {reason}")]
    FailedOpen { path: PathBuf, reason: std::io::Error },
    #[error("failed to deserialize file: {path}\nreason: {reason}")]
    InvalidJson {
        path: PathBuf,
        reason: serde_json::Error,
    },
    #[error("json err: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn read_json<T: serde::de::DeserializeOwned>(
        path: impl AsRef<std::path::Path>,
    ) -> Result<T, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|reason| ConfigError::FailedOpen {
            path: path.to_path_buf(),
            reason,
        })?;
        serde_json::from_str(&raw).map_err(|reason| ConfigError::InvalidJson {
            path: path.to_path_buf(),
            reason,
        })
    }
}

#[derive(Error, Debug)]
pub enum ManualMatchError {
    #[error("failed to persist manual mappings to {path}: {reason}")]
    Persist { path: PathBuf, reason: std::io::Error },
    #[error("failed to read manual mappings from {path}: {reason}")]
    Read { path: PathBuf, reason: std::io::Error },
    #[error("json err: {0}")]
    Json(#[from] serde_json::Error),
    #[error("console io err: {0}")]
    Console(#[from] std::io::Error),
}
