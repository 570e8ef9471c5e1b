//! Builds dictionary entries from matched keys and markup roots, one file at
//! a time, in batches.

use std::fs;
use std::path::Path;

use log::{error, info, warn};

use crate::converter::HtmlConverter;
use crate::dictionary::{DicEntry, Dictionary};
use crate::errors::{ConvertResult, ManualMatchError};
use crate::kana_matcher::{KanaKanjiMatcher, MatchPair};
use crate::language::ja::japanese::{
    convert_hiragana_to_katakana, convert_katakana_to_hiragana, is_string_entirely_kana,
    is_string_entirely_katakana,
};
use crate::manual_match::{resolve_unmatched, ManualMatchStore, UnmatchedResolver};
use crate::markup::Element;
use crate::settings::DictionaryConfig;

/// Brings kana keys into the script of the headword reading: katakana when
/// the reading is all katakana, hiragana otherwise. Keys holding ideographs
/// or other characters are left alone.
pub fn normalize_keys<S: AsRef<str>>(reading: &str, keys: &[S]) -> Vec<String> {
    let katakana = !reading.is_empty() && is_string_entirely_katakana(reading);
    keys.iter()
        .map(|key| {
            let key = key.as_ref();
            if !is_string_entirely_kana(key) {
                key.to_string()
            } else if katakana {
                convert_hiragana_to_katakana(key)
            } else {
                convert_katakana_to_hiragana(key)
            }
        })
        .collect()
}

pub struct EntryParser {
    converter: HtmlConverter,
    matcher: KanaKanjiMatcher,
    store: ManualMatchStore,
    dictionary: Dictionary,
}

impl EntryParser {
    pub fn new(converter: HtmlConverter, dictionary: Dictionary) -> Self {
        Self {
            converter,
            matcher: KanaKanjiMatcher::default(),
            store: ManualMatchStore::in_memory(),
            dictionary,
        }
    }

    pub fn with_matcher(mut self, matcher: KanaKanjiMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_store(mut self, store: ManualMatchStore) -> Self {
        self.store = store;
        self
    }

    /// Converter, matcher and manual store as configured. Strategies are
    /// left at their defaults; swap them in with [`EntryParser::converter_mut`].
    pub fn from_config(config: &DictionaryConfig) -> ConvertResult<Self> {
        let mut converter = HtmlConverter::new(config.load_tag_mapping()?)
            .with_ignored_elements(config.ignored_elements());
        if let Some(tag) = config.expression_element() {
            converter = converter.with_expression_element(tag);
        }
        let store = match config.manual_mappings_path() {
            Some(path) => ManualMatchStore::open(path)?,
            None => ManualMatchStore::in_memory(),
        };
        Ok(Self::new(converter, Dictionary::new(config.dict_name(), config.revision()))
            .with_matcher(KanaKanjiMatcher::new(config.matcher().clone()))
            .with_store(store))
    }

    pub fn converter(&self) -> &HtmlConverter {
        &self.converter
    }

    pub fn converter_mut(&mut self) -> &mut HtmlConverter {
        &mut self.converter
    }

    pub fn matcher(&self) -> &KanaKanjiMatcher {
        &self.matcher
    }

    pub fn store(&self) -> &ManualMatchStore {
        &self.store
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub fn into_dictionary(self) -> Dictionary {
        self.dictionary
    }

    /// Converts every element child of `root` into one entry.
    ///
    /// Returns `1` when the entry was added. A child that converts to nothing
    /// or fails validation discards the whole entry and returns `0`; so does a
    /// root without element children.
    #[allow(clippy::too_many_arguments)]
    pub fn parse_entry(
        &mut self,
        key: &str,
        reading: &str,
        root: &Element,
        info_tag: &str,
        pos_tag: &str,
        search_rank: i64,
        ignore_expressions: bool,
    ) -> usize {
        let (term, reading) = if key.is_empty() { (reading, "") } else { (key, reading) };
        let mut entry = DicEntry::new(term, reading)
            .with_tags(info_tag, pos_tag)
            .with_search_rank(search_rank);

        let converted = self.converter.convert_children(root, ignore_expressions);
        if converted.is_empty() {
            warn!("no content for entry: {term}, reading: {reading}");
            return 0;
        }
        for node in converted {
            let Some(node) = node else {
                warn!("failed parsing entry: {term}, reading: {reading}");
                return 0;
            };
            if let Err(e) = entry.add_element(node) {
                warn!("invalid content in entry: {term}, reading: {reading}\n{e}");
                return 0;
            }
        }

        self.dictionary.add_entry(entry);
        1
    }

    /// Normalizes and matches the index keys of one file, lets the manual
    /// store and `resolver` settle what the matcher could not, then parses
    /// one entry per pair.
    ///
    /// Pure kana files rank above files that carry kanji spellings.
    pub fn parse_keyed_entries(
        &mut self,
        file_id: &str,
        headword: &str,
        keys: &[String],
        root: &Element,
        resolver: &mut dyn UnmatchedResolver,
    ) -> Result<usize, ManualMatchError> {
        let keys = normalize_keys(headword, keys);
        let pairs = self.matcher.match_keys(&keys);
        let pairs = resolve_unmatched(file_id, &keys, pairs, &mut self.store, resolver)?;

        let search_rank = if pairs.iter().any(|p| p.expression().is_some()) { 0 } else { 1 };

        let mut count = 0;
        for pair in &pairs {
            count += match pair {
                MatchPair::Paired { expression, reading } => {
                    self.parse_entry(expression, reading, root, "", "", search_rank, false)
                }
                MatchPair::ExpressionOnly(expression) => {
                    self.parse_entry(expression, "", root, "", "", search_rank, false)
                }
                MatchPair::ReadingOnly(reading) => {
                    self.parse_entry(reading, "", root, "", "", search_rank, false)
                }
            };
        }
        if count == 0 {
            info!("no entry was parsed for file {file_id}");
        }
        Ok(count)
    }
}

/// Turns one source file into entries. Implemented once per dictionary
/// format.
pub trait FileProcessor {
    fn process_file(
        &mut self,
        parser: &mut EntryParser,
        name: &str,
        source: &str,
    ) -> ConvertResult<usize>;
}

impl<F> FileProcessor for F
where
    F: FnMut(&mut EntryParser, &str, &str) -> ConvertResult<usize>,
{
    fn process_file(
        &mut self,
        parser: &mut EntryParser,
        name: &str,
        source: &str,
    ) -> ConvertResult<usize> {
        self(parser, name, source)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchRunner {
    batch_size: usize,
}

impl BatchRunner {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_config(config: &DictionaryConfig) -> Self {
        Self::new(*config.batch_size())
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Feeds `(name, source)` pairs to `processor`. A failing file is logged
    /// and skipped; the rest of its batch still runs. Returns the number of
    /// entries added.
    pub fn run<P: FileProcessor + ?Sized>(
        &self,
        processor: &mut P,
        parser: &mut EntryParser,
        files: &[(String, String)],
    ) -> usize {
        let total_files = files.len();
        let mut done = 0;
        let mut count = 0;
        for batch in files.chunks(self.batch_size) {
            for (name, source) in batch {
                match processor.process_file(parser, name, source) {
                    Ok(n) => count += n,
                    Err(e) => error!("error processing file {name}: {e}"),
                }
            }
            done += batch.len();
            info!("processed {done}/{total_files} files, {count} entries");
        }
        count
    }
}

/// Reads every file in `dir` with the given extension, sorted by name.
pub fn read_source_dir(
    dir: impl AsRef<Path>,
    extension: &str,
) -> std::io::Result<Vec<(String, String)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if !path.is_file() || !matches {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        files.push((name.to_string(), fs::read_to_string(&path)?));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}
