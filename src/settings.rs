use std::path::{Path, PathBuf};

use getset::{Getters, MutGetters, Setters};
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::kana_matcher::MatcherOptions;
use crate::tag_mapping::TagMapping;

pub const DEFAULT_BATCH_SIZE: usize = 250;

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_revision() -> String {
    "1".to_string()
}

/// Per-dictionary settings, read from a JSON file.
///
/// Relative paths inside the file are resolved against the file's own
/// directory by [`DictionaryConfig::from_path`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Getters, MutGetters, Setters)]
#[serde(rename_all = "camelCase")]
#[getset(get = "pub", get_mut = "pub", set = "pub")]
pub struct DictionaryConfig {
    dict_name: String,
    #[serde(default = "default_revision")]
    revision: String,
    #[serde(default)]
    tag_map_path: Option<PathBuf>,
    #[serde(default)]
    ignored_elements: Vec<String>,
    #[serde(default)]
    expression_element: Option<String>,
    #[serde(default)]
    manual_mappings_path: Option<PathBuf>,
    #[serde(default = "default_batch_size")]
    batch_size: usize,
    #[serde(default)]
    matcher: MatcherOptions,
}

impl DictionaryConfig {
    pub fn new(dict_name: impl Into<String>) -> Self {
        Self {
            dict_name: dict_name.into(),
            revision: default_revision(),
            tag_map_path: None,
            ignored_elements: Vec::new(),
            expression_element: None,
            manual_mappings_path: None,
            batch_size: DEFAULT_BATCH_SIZE,
            matcher: MatcherOptions::default(),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config: Self = ConfigError::read_json(path)?;
        if let Some(base) = path.parent() {
            config.tag_map_path = config.tag_map_path.map(|p| base.join(p));
            config.manual_mappings_path = config.manual_mappings_path.map(|p| base.join(p));
        }
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// An empty mapping when no table is configured.
    pub fn load_tag_mapping(&self) -> Result<TagMapping, ConfigError> {
        match &self.tag_map_path {
            Some(path) => TagMapping::from_path(path),
            None => Ok(TagMapping::default()),
        }
    }
}
