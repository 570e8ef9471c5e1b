//! Persistent, user-confirmed matches for keys the matcher could not pair.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::errors::ManualMatchError;
use crate::kana_matcher::MatchPair;
use crate::language::ja::wanakana::reading_from_input;

const GLOBAL_SCOPE: &str = "global";

/// Where a decision applies: every file, or only the file it was made in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MatchScope {
    Global,
    File(String),
}

impl MatchScope {
    pub fn file(file_id: impl Into<String>) -> Self {
        MatchScope::File(file_id.into())
    }

    fn key(&self) -> &str {
        match self {
            MatchScope::Global => GLOBAL_SCOPE,
            MatchScope::File(id) => id,
        }
    }
}

/// Source file name without directory or extension, used as the file scope.
pub fn file_id(filename: impl AsRef<Path>) -> String {
    filename
        .as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    mappings: IndexMap<String, IndexMap<String, String>>,
    #[serde(default)]
    ignored: IndexMap<String, Vec<String>>,
}

/// `{"mappings": {scope: {key: value}}, "ignored": {scope: [key]}}`, with
/// scope `"global"` or a file id. Every mutation is written back at once.
#[derive(Clone, Debug, Default)]
pub struct ManualMatchStore {
    path: Option<PathBuf>,
    data: StoreData,
}

impl ManualMatchStore {
    /// Opens (or starts) the store at `path`. An unreadable JSON body is
    /// logged and replaced by an empty store on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ManualMatchError> {
        let path = path.into();
        let data = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|reason| ManualMatchError::Read {
                path: path.clone(),
                reason,
            })?;
            serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("error reading {}, starting with empty mappings: {e}", path.display());
                StoreData::default()
            })
        } else {
            StoreData::default()
        };
        Ok(Self {
            path: Some(path),
            data,
        })
    }

    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn save(&self) -> Result<(), ManualMatchError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(path, json).map_err(|reason| ManualMatchError::Persist {
            path: path.clone(),
            reason,
        })
    }

    fn is_ignored(&self, key: &str, file_id: &str) -> bool {
        [file_id, GLOBAL_SCOPE].into_iter().any(|scope| {
            self.data
                .ignored
                .get(scope)
                .is_some_and(|keys| keys.iter().any(|k| k == key))
        })
    }

    fn mapped(&self, key: &str, file_id: &str) -> Option<&str> {
        [file_id, GLOBAL_SCOPE]
            .into_iter()
            .find_map(|scope| self.data.mappings.get(scope)?.get(key))
            .map(String::as_str)
    }

    /// True when the key is either mapped or ignored, file scope first.
    pub fn has_mapping(&self, key: &str, file_id: &str) -> bool {
        self.is_ignored(key, file_id) || self.mapped(key, file_id).is_some()
    }

    /// `None` for ignored keys, even if a mapping exists.
    pub fn get_mapping(&self, key: &str, file_id: &str) -> Option<&str> {
        if self.is_ignored(key, file_id) {
            return None;
        }
        self.mapped(key, file_id)
    }

    pub fn add_mapping(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        scope: &MatchScope,
    ) -> Result<(), ManualMatchError> {
        let key = key.into();
        self.unignore(&key, scope);
        self.data
            .mappings
            .entry(scope.key().to_string())
            .or_default()
            .insert(key, value.into());
        self.save()
    }

    pub fn remove_mapping(
        &mut self,
        key: &str,
        scope: &MatchScope,
    ) -> Result<(), ManualMatchError> {
        if let Some(mappings) = self.data.mappings.get_mut(scope.key()) {
            mappings.shift_remove(key);
        }
        self.save()
    }

    pub fn ignore_entry(
        &mut self,
        key: impl Into<String>,
        scope: &MatchScope,
    ) -> Result<(), ManualMatchError> {
        let key = key.into();
        let ignored = self.data.ignored.entry(scope.key().to_string()).or_default();
        if !ignored.contains(&key) {
            ignored.push(key);
        }
        self.save()
    }

    pub fn remove_ignored(
        &mut self,
        key: &str,
        scope: &MatchScope,
    ) -> Result<(), ManualMatchError> {
        self.unignore(key, scope);
        self.save()
    }

    fn unignore(&mut self, key: &str, scope: &MatchScope) {
        if let Some(keys) = self.data.ignored.get_mut(scope.key()) {
            keys.retain(|k| k != key);
        }
    }

    pub fn mappings(&self, scope: &MatchScope) -> Option<&IndexMap<String, String>> {
        self.data.mappings.get(scope.key())
    }

    pub fn ignored(&self, scope: &MatchScope) -> &[String] {
        self.data
            .ignored
            .get(scope.key())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// What the resolver is asked about: one kanji spelling left without a
/// reading.
#[derive(Clone, Copy, Debug)]
pub struct UnmatchedRequest<'a> {
    pub file_id: &'a str,
    pub kanji: &'a str,
    pub entry_keys: &'a [String],
    pub unmatched_kana: &'a [String],
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Match(String, MatchScope),
    Ignore(MatchScope),
    /// Leave the spelling unmatched this run; ask again next time.
    Defer,
}

pub trait UnmatchedResolver {
    fn resolve(&mut self, request: &UnmatchedRequest<'_>) -> Result<Resolution, ManualMatchError>;
}

/// Non-interactive runs: everything stays unmatched.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeferResolver;

impl UnmatchedResolver for DeferResolver {
    fn resolve(&mut self, _request: &UnmatchedRequest<'_>) -> Result<Resolution, ManualMatchError> {
        Ok(Resolution::Defer)
    }
}

/// Asks over a line-based console. Readings may be typed in romaji.
pub struct ConsoleResolver<R, W> {
    input: R,
    output: W,
}

impl ConsoleResolver<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleResolver<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn prompt(&mut self, question: &str) -> Result<String, ManualMatchError> {
        writeln!(self.output, "{question}")?;
        self.output.flush()?;
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim().to_string())
    }

    fn ask_scope(&mut self, question: &str, file_id: &str) -> Result<MatchScope, ManualMatchError> {
        let global = self.prompt(question)?.eq_ignore_ascii_case("y");
        Ok(if global {
            MatchScope::Global
        } else {
            MatchScope::file(file_id)
        })
    }
}

impl<R: BufRead, W: Write> UnmatchedResolver for ConsoleResolver<R, W> {
    fn resolve(&mut self, request: &UnmatchedRequest<'_>) -> Result<Resolution, ManualMatchError> {
        writeln!(self.output, "\nUnmatched kanji: {}", request.kanji)?;
        writeln!(self.output, "Available kana entries: {:?}", request.entry_keys)?;
        writeln!(self.output, "Currently unmatched kana: {:?}", request.unmatched_kana)?;
        writeln!(self.output, "\nOptions:")?;
        writeln!(self.output, "1. Enter a matching kana from the list")?;
        writeln!(self.output, "2. Enter a custom kana (not in the list)")?;
        writeln!(self.output, "3. Ignore this entry (won't be asked again)")?;
        writeln!(self.output, "4. Skip for now (will ask again next time)")?;

        let resolution = match self.prompt("Choose an option (1-4):")?.as_str() {
            "1" => {
                let reading = self.prompt("Enter matching kana entry from the list:")?;
                if request.entry_keys.contains(&reading) {
                    let scope =
                        self.ask_scope("Apply this mapping globally? (y/n):", request.file_id)?;
                    Resolution::Match(reading, scope)
                } else {
                    writeln!(
                        self.output,
                        "'{reading}' is not in the entry list. Skipping for now."
                    )?;
                    Resolution::Defer
                }
            }
            "2" => {
                let reading = reading_from_input(self.prompt("Enter custom kana reading:")?);
                if reading.is_empty() {
                    Resolution::Defer
                } else {
                    let scope =
                        self.ask_scope("Apply this mapping globally? (y/n):", request.file_id)?;
                    Resolution::Match(reading, scope)
                }
            }
            "3" => {
                Resolution::Ignore(self.ask_scope("Ignore globally? (y/n):", request.file_id)?)
            }
            _ => Resolution::Defer,
        };
        Ok(resolution)
    }
}

/// Second chance for keys the matcher left alone.
///
/// Unmatched kanji consult the store, then the resolver; unmatched kana only
/// consult the store. A key disappears only through an ignore marker.
pub fn resolve_unmatched(
    file_id: &str,
    entry_keys: &[String],
    pairs: Vec<MatchPair>,
    store: &mut ManualMatchStore,
    resolver: &mut dyn UnmatchedResolver,
) -> Result<Vec<MatchPair>, ManualMatchError> {
    let mut unmatched_kanji = Vec::new();
    let mut unmatched_kana = Vec::new();
    for pair in &pairs {
        match pair {
            MatchPair::ExpressionOnly(kanji) => unmatched_kanji.push(kanji.clone()),
            MatchPair::ReadingOnly(kana) => unmatched_kana.push(kana.clone()),
            MatchPair::Paired { .. } => {}
        }
    }
    if unmatched_kanji.is_empty() {
        return Ok(pairs);
    }

    let mut updated: Vec<MatchPair> = pairs.iter().filter(|p| p.is_paired()).cloned().collect();

    for kanji in unmatched_kanji {
        if store.has_mapping(&kanji, file_id) {
            match store.get_mapping(&kanji, file_id) {
                Some(reading) => updated.push(MatchPair::paired(kanji.as_str(), reading)),
                None => debug!("skipping ignored entry: {kanji}"),
            }
            continue;
        }

        // a lone spelling has nothing to choose from
        if pairs.len() == 1 {
            return Ok(pairs);
        }

        let request = UnmatchedRequest {
            file_id,
            kanji: &kanji,
            entry_keys,
            unmatched_kana: &unmatched_kana,
        };
        match resolver.resolve(&request)? {
            Resolution::Match(reading, scope) => {
                store.add_mapping(kanji.as_str(), reading.as_str(), &scope)?;
                unmatched_kana.retain(|k| *k != reading);
                updated.push(MatchPair::paired(kanji, reading));
            }
            Resolution::Ignore(scope) => store.ignore_entry(kanji, &scope)?,
            Resolution::Defer => updated.push(MatchPair::ExpressionOnly(kanji)),
        }
    }

    for kana in unmatched_kana {
        if store.has_mapping(&kana, file_id) {
            match store.get_mapping(&kana, file_id) {
                Some(kanji) => updated.push(MatchPair::paired(kanji, kana.as_str())),
                None => debug!("skipping ignored entry: {kana}"),
            }
            continue;
        }
        updated.push(MatchPair::ReadingOnly(kana));
    }

    Ok(updated)
}

#[cfg(test)]
mod manual_match_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    struct Scripted(Vec<Resolution>);

    impl UnmatchedResolver for Scripted {
        fn resolve(
            &mut self,
            _request: &UnmatchedRequest<'_>,
        ) -> Result<Resolution, ManualMatchError> {
            Ok(self.0.remove(0))
        }
    }

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn file_scope_wins_over_global() {
        let mut store = ManualMatchStore::in_memory();
        store.add_mapping("哀しぶ", "かなしぶ", &MatchScope::Global).unwrap();
        store.add_mapping("哀しぶ", "あいしぶ", &MatchScope::file("p001")).unwrap();

        assert_eq!(store.get_mapping("哀しぶ", "p001"), Some("あいしぶ"));
        assert_eq!(store.get_mapping("哀しぶ", "p002"), Some("かなしぶ"));
        assert!(!store.has_mapping("悲しぶ", "p001"));
    }

    #[test]
    fn ignore_markers_hide_mappings() {
        let mut store = ManualMatchStore::in_memory();
        store.add_mapping("哀しぶ", "かなしぶ", &MatchScope::Global).unwrap();
        store.ignore_entry("哀しぶ", &MatchScope::file("p001")).unwrap();

        assert!(store.has_mapping("哀しぶ", "p001"));
        assert_eq!(store.get_mapping("哀しぶ", "p001"), None);

        // mapping again in the same scope lifts the marker
        store.add_mapping("哀しぶ", "かなしぶ", &MatchScope::file("p001")).unwrap();
        assert_eq!(store.get_mapping("哀しぶ", "p001"), Some("かなしぶ"));
        assert!(store.ignored(&MatchScope::file("p001")).is_empty());
    }

    #[test]
    fn every_mutation_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manual_mappings.json");

        let mut store = ManualMatchStore::open(&path).unwrap();
        store.add_mapping("額突き虫", "ぬかづきむし", &MatchScope::Global).unwrap();
        store.ignore_entry("悲しぶ", &MatchScope::file("p9")).unwrap();

        let reopened = ManualMatchStore::open(&path).unwrap();
        assert_eq!(reopened.get_mapping("額突き虫", "p1"), Some("ぬかづきむし"));
        assert!(reopened.has_mapping("悲しぶ", "p9"));
        assert_eq!(reopened.get_mapping("悲しぶ", "p9"), None);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["mappings"]["global"]["額突き虫"], "ぬかづきむし");
        assert_eq!(raw["ignored"]["p9"][0], "悲しぶ");

        let mut store = reopened;
        store.remove_mapping("額突き虫", &MatchScope::Global).unwrap();
        store.remove_ignored("悲しぶ", &MatchScope::file("p9")).unwrap();
        let reopened = ManualMatchStore::open(&path).unwrap();
        assert!(!reopened.has_mapping("額突き虫", "p1"));
        assert!(!reopened.has_mapping("悲しぶ", "p9"));
    }

    #[test]
    fn corrupt_store_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = ManualMatchStore::open(&path).unwrap();
        assert!(store.mappings(&MatchScope::Global).is_none());
    }

    #[test]
    fn nothing_unmatched_is_untouched() {
        let pairs = vec![
            MatchPair::paired("哀しぶ", "かなしぶ"),
            MatchPair::ReadingOnly("かなしび".into()),
        ];
        let mut store = ManualMatchStore::in_memory();
        let out =
            resolve_unmatched("p1", &[], pairs.clone(), &mut store, &mut DeferResolver).unwrap();
        assert_eq!(out, pairs);
    }

    #[test]
    fn resolver_decisions_are_applied_and_stored() {
        let entry_keys = keys(&["かなしぶ", "かなしび", "哀しぶ", "悲しぶ", "愛しぶ"]);
        let pairs = vec![
            MatchPair::paired("哀しぶ", "かなしぶ"),
            MatchPair::ReadingOnly("かなしび".into()),
            MatchPair::ExpressionOnly("悲しぶ".into()),
            MatchPair::ExpressionOnly("愛しぶ".into()),
        ];
        let mut store = ManualMatchStore::in_memory();
        let mut resolver = Scripted(vec![
            Resolution::Match("かなしび".into(), MatchScope::file("p1")),
            Resolution::Ignore(MatchScope::Global),
        ]);

        let out = resolve_unmatched("p1", &entry_keys, pairs, &mut store, &mut resolver).unwrap();
        assert_eq!(
            out,
            vec![MatchPair::paired("哀しぶ", "かなしぶ"), MatchPair::paired("悲しぶ", "かなしび")]
        );
        assert_eq!(store.get_mapping("悲しぶ", "p1"), Some("かなしび"));
        assert!(store.has_mapping("愛しぶ", "p7"));
    }

    #[test]
    fn stored_decisions_skip_the_resolver() {
        let mut store = ManualMatchStore::in_memory();
        store.add_mapping("悲しぶ", "かなしぶ", &MatchScope::Global).unwrap();
        store.add_mapping("かなしべ", "哀しべ", &MatchScope::Global).unwrap();
        let pairs = vec![
            MatchPair::ExpressionOnly("悲しぶ".into()),
            MatchPair::ReadingOnly("かなしべ".into()),
            MatchPair::ReadingOnly("かなしば".into()),
        ];
        let out = resolve_unmatched("p1", &[], pairs, &mut store, &mut Scripted(vec![])).unwrap();
        assert_eq!(
            out,
            vec![
                MatchPair::paired("悲しぶ", "かなしぶ"),
                MatchPair::paired("哀しべ", "かなしべ"),
                MatchPair::ReadingOnly("かなしば".into()),
            ]
        );
    }

    #[test]
    fn lone_spelling_is_returned_as_is() {
        let pairs = vec![MatchPair::ExpressionOnly("哀しぶ".into())];
        let mut store = ManualMatchStore::in_memory();
        let out =
            resolve_unmatched("p1", &[], pairs.clone(), &mut store, &mut Scripted(vec![]))
                .unwrap();
        assert_eq!(out, pairs);
    }

    #[test]
    fn console_accepts_romaji_readings() {
        let input = Cursor::new("2\nkanashibu\ny\n");
        let mut output = Vec::new();
        let mut console = ConsoleResolver::new(input, &mut output);
        let entry_keys = keys(&["哀しぶ"]);
        let request = UnmatchedRequest {
            file_id: "p1",
            kanji: "哀しぶ",
            entry_keys: &entry_keys,
            unmatched_kana: &[],
        };
        assert_eq!(
            console.resolve(&request).unwrap(),
            Resolution::Match("かなしぶ".into(), MatchScope::Global)
        );
        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("Unmatched kanji: 哀しぶ"));
    }

    #[test]
    fn console_rejects_unknown_list_choice_and_eof_defers() {
        let entry_keys = keys(&["かなしぶ"]);
        let request = UnmatchedRequest {
            file_id: "p1",
            kanji: "哀しぶ",
            entry_keys: &entry_keys,
            unmatched_kana: &entry_keys,
        };

        let mut console = ConsoleResolver::new(Cursor::new("1\nかなしび\n"), Vec::new());
        assert_eq!(console.resolve(&request).unwrap(), Resolution::Defer);

        let mut console = ConsoleResolver::new(Cursor::new("1\nかなしぶ\nn\n"), Vec::new());
        assert_eq!(
            console.resolve(&request).unwrap(),
            Resolution::Match("かなしぶ".into(), MatchScope::file("p1"))
        );

        let mut console = ConsoleResolver::new(Cursor::new(""), Vec::new());
        assert_eq!(console.resolve(&request).unwrap(), Resolution::Defer);
    }

    #[test]
    fn console_ignore_choice_asks_for_scope() {
        let entry_keys = keys(&["あ", "漢字語"]);
        let request = UnmatchedRequest {
            file_id: "p1",
            kanji: "漢字語",
            entry_keys: &entry_keys,
            unmatched_kana: &[],
        };

        let mut output = Vec::new();
        let mut console = ConsoleResolver::new(Cursor::new("3\nn\n"), &mut output);
        assert_eq!(
            console.resolve(&request).unwrap(),
            Resolution::Ignore(MatchScope::file("p1"))
        );
        assert!(String::from_utf8(output).unwrap().contains("Ignore globally? (y/n):"));

        let pairs = vec![
            MatchPair::ReadingOnly("あ".into()),
            MatchPair::ExpressionOnly("漢字語".into()),
        ];
        let mut store = ManualMatchStore::in_memory();
        let mut console = ConsoleResolver::new(Cursor::new("3\ny\n"), Vec::new());
        let out = resolve_unmatched("p1", &entry_keys, pairs, &mut store, &mut console).unwrap();
        assert_eq!(out, vec![MatchPair::ReadingOnly("あ".into())]);
        assert_eq!(store.ignored(&MatchScope::Global), &["漢字語".to_string()]);
        assert!(store.has_mapping("漢字語", "p2"));
        assert_eq!(store.get_mapping("漢字語", "p2"), None);
    }

    #[test]
    fn file_ids_drop_directories_and_extensions() {
        assert_eq!(file_id("data/items/p0042.xml"), "p0042");
        assert_eq!(file_id("p1"), "p1");
    }
}
