//! Pairs the kanji spellings of an entry with their kana readings.
//!
//! Index keys arrive as one flat list (`["かなしぶ", "哀しぶ", "悲しぶ"]`);
//! the matcher decides which spelling goes with which reading through a
//! series of ranked passes, each removing what it matched.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::language::ja::japanese::{
    contains_ideograph, ideograph_count, is_string_entirely_kana, longest_common_prefix,
    longest_common_suffix, okurigana_residue,
};

/// One output pair. Never empty on both sides.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MatchPair {
    Paired { expression: String, reading: String },
    /// A kanji spelling no reading could be found for.
    ExpressionOnly(String),
    /// A reading (or a non-Japanese key) standing alone.
    ReadingOnly(String),
}

impl MatchPair {
    pub fn paired(expression: impl Into<String>, reading: impl Into<String>) -> Self {
        MatchPair::Paired {
            expression: expression.into(),
            reading: reading.into(),
        }
    }

    pub fn expression(&self) -> Option<&str> {
        match self {
            MatchPair::Paired { expression, .. } | MatchPair::ExpressionOnly(expression) => {
                Some(expression)
            }
            MatchPair::ReadingOnly(_) => None,
        }
    }

    pub fn reading(&self) -> Option<&str> {
        match self {
            MatchPair::Paired { reading, .. } | MatchPair::ReadingOnly(reading) => Some(reading),
            MatchPair::ExpressionOnly(_) => None,
        }
    }

    pub fn is_paired(&self) -> bool {
        matches!(self, MatchPair::Paired { .. })
    }
}

/// Decides whether an all-ideograph spelling can be read as `kana`.
pub trait ReadingPlausibility {
    fn is_plausible(&self, kana: &str, kanji: &str) -> bool;
}

/// Accepts readings between `min_ratio` and `max_ratio` kana per ideograph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LengthRatioPlausibility {
    pub min_ratio: usize,
    pub max_ratio: usize,
}

impl Default for LengthRatioPlausibility {
    fn default() -> Self {
        Self {
            min_ratio: 1,
            max_ratio: 5,
        }
    }
}

impl ReadingPlausibility for LengthRatioPlausibility {
    fn is_plausible(&self, kana: &str, kanji: &str) -> bool {
        let ideographs = ideograph_count(kanji);
        let len = kana.chars().count();
        len >= ideographs * self.min_ratio && len <= ideographs * self.max_ratio
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatcherOptions {
    /// Endings that only ever pair with each other (`るる`).
    pub fixed_suffixes: Vec<String>,
    pub max_depth: usize,
    pub min_suffix_len: usize,
    pub min_prefix_len: usize,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self {
            fixed_suffixes: vec!["るる".to_string()],
            max_depth: 8,
            min_suffix_len: 1,
            min_prefix_len: 3,
        }
    }
}

/// Kanji spellings sharing the same okurigana.
struct ResidueGroup<'a> {
    residue: String,
    members: Vec<&'a str>,
}

#[derive(Clone, Debug, Default)]
pub struct KanaKanjiMatcher<P = LengthRatioPlausibility> {
    options: MatcherOptions,
    plausibility: P,
}

impl KanaKanjiMatcher {
    pub fn new(options: MatcherOptions) -> Self {
        Self::with_plausibility(options, LengthRatioPlausibility::default())
    }
}

impl<P: ReadingPlausibility> KanaKanjiMatcher<P> {
    pub fn with_plausibility(options: MatcherOptions, plausibility: P) -> Self {
        Self { options, plausibility }
    }

    pub fn options(&self) -> &MatcherOptions {
        &self.options
    }

    /// Every input key shows up on exactly one side of at least one pair,
    /// and the same input always yields the same output.
    pub fn match_keys<S: AsRef<str>>(&self, keys: &[S]) -> Vec<MatchPair> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut kanji = Vec::new();
        let mut kana = Vec::new();

        for key in keys.iter().map(|k| k.as_ref()) {
            if !seen.insert(key) {
                continue;
            }
            if contains_ideograph(key) {
                kanji.push(key);
            } else if is_string_entirely_kana(key) {
                kana.push(key);
            } else {
                out.push(MatchPair::ReadingOnly(key.to_string()));
            }
        }

        self.match_sets(kanji, kana, 0, &mut out);
        out
    }

    fn match_sets<'a>(
        &self,
        kanji: Vec<&'a str>,
        kana: Vec<&'a str>,
        depth: usize,
        out: &mut Vec<MatchPair>,
    ) {
        if kanji.is_empty() || kana.is_empty() {
            emit_unmatched(&kanji, &kana, out);
            return;
        }

        if let [reading] = kana.as_slice() {
            out.extend(kanji.iter().map(|k| MatchPair::paired(*k, *reading)));
            return;
        }

        for suffix in &self.options.fixed_suffixes {
            let (suffixed_kana, rest_kana): (Vec<&str>, Vec<&str>) =
                kana.iter().partition(|k| k.ends_with(suffix.as_str()));
            if suffixed_kana.is_empty() {
                continue;
            }
            let (suffixed_kanji, rest_kanji): (Vec<&str>, Vec<&str>) =
                kanji.iter().partition(|k| k.ends_with(suffix.as_str()));
            if suffixed_kanji.is_empty() {
                continue;
            }
            for reading in &suffixed_kana {
                out.extend(suffixed_kanji.iter().map(|k| MatchPair::paired(*k, *reading)));
            }
            self.match_sets(rest_kanji, rest_kana, depth, out);
            return;
        }

        let groups = group_by_residue(&kanji);
        let mut matched_kanji: HashSet<&'a str> = HashSet::new();
        let mut matched_kana: HashSet<&'a str> = HashSet::new();

        // okurigana identical to a reading
        for group in groups.values() {
            let key = group_key(group);
            if let Some(reading) = kana.iter().find(|k| **k == key) {
                for member in &group.members {
                    out.push(MatchPair::paired(*member, *reading));
                    matched_kanji.insert(*member);
                }
                matched_kana.insert(*reading);
            }
        }

        self.best_affix_pass(
            &kana,
            &groups,
            self.options.min_suffix_len,
            longest_common_suffix,
            &mut matched_kanji,
            &mut matched_kana,
            out,
        );
        self.best_affix_pass(
            &kana,
            &groups,
            self.options.min_prefix_len,
            longest_common_prefix,
            &mut matched_kanji,
            &mut matched_kana,
            out,
        );

        // spellings without okurigana
        for reading in &kana {
            if matched_kana.contains(reading) {
                continue;
            }
            for spelling in &kanji {
                if matched_kanji.contains(spelling) || !okurigana_residue(spelling).is_empty() {
                    continue;
                }
                if self.plausibility.is_plausible(reading, spelling) {
                    out.push(MatchPair::paired(*spelling, *reading));
                    matched_kanji.insert(*spelling);
                    matched_kana.insert(*reading);
                }
            }
        }

        let progressed = !matched_kanji.is_empty() || !matched_kana.is_empty();
        let rest_kanji: Vec<&str> = kanji
            .into_iter()
            .filter(|k| !matched_kanji.contains(k))
            .collect();
        let rest_kana: Vec<&str> = kana
            .into_iter()
            .filter(|k| !matched_kana.contains(k))
            .collect();

        if progressed && depth < self.options.max_depth {
            self.match_sets(rest_kanji, rest_kana, depth + 1, out);
        } else {
            emit_unmatched(&rest_kanji, &rest_kana, out);
        }
    }

    /// For each unmatched reading, pairs the still unmatched spellings of the
    /// residue groups sharing the longest affix with it. Ties all pair.
    #[allow(clippy::too_many_arguments)]
    fn best_affix_pass<'a>(
        &self,
        kana: &[&'a str],
        groups: &IndexMap<String, ResidueGroup<'a>>,
        min_len: usize,
        common_len: fn(&str, &str) -> usize,
        matched_kanji: &mut HashSet<&'a str>,
        matched_kana: &mut HashSet<&'a str>,
        out: &mut Vec<MatchPair>,
    ) {
        for reading in kana {
            if matched_kana.contains(reading) {
                continue;
            }

            let mut best: Vec<&str> = Vec::new();
            let mut best_len = 0;
            for group in groups.values() {
                if group.residue.is_empty() {
                    continue;
                }
                let len = common_len(reading, &group.residue);
                if len < min_len {
                    continue;
                }
                let unmatched = group.members.iter().filter(|m| !matched_kanji.contains(*m));
                if len > best_len {
                    best_len = len;
                    best = unmatched.copied().collect();
                } else if len == best_len {
                    best.extend(unmatched);
                }
            }

            if best.is_empty() {
                continue;
            }
            for spelling in best {
                out.push(MatchPair::paired(spelling, *reading));
                matched_kanji.insert(spelling);
            }
            matched_kana.insert(*reading);
        }
    }
}

fn group_by_residue<'a>(kanji: &[&'a str]) -> IndexMap<String, ResidueGroup<'a>> {
    let mut groups: IndexMap<String, ResidueGroup<'a>> = IndexMap::new();
    for spelling in kanji {
        let residue = okurigana_residue(spelling);
        let key = if residue.is_empty() {
            spelling.to_string()
        } else {
            residue.clone()
        };
        groups
            .entry(key)
            .or_insert_with(|| ResidueGroup {
                residue,
                members: Vec::new(),
            })
            .members
            .push(*spelling);
    }
    groups
}

/// Residue, or the spelling itself when it is all ideographs.
fn group_key<'g>(group: &'g ResidueGroup<'_>) -> &'g str {
    if group.residue.is_empty() {
        group.members.first().copied().unwrap_or_default()
    } else {
        &group.residue
    }
}

fn emit_unmatched(kanji: &[&str], kana: &[&str], out: &mut Vec<MatchPair>) {
    out.extend(kana.iter().map(|k| MatchPair::ReadingOnly(k.to_string())));
    out.extend(kanji.iter().map(|k| MatchPair::ExpressionOnly(k.to_string())));
}

#[cfg(test)]
mod kana_matcher_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn matcher() -> KanaKanjiMatcher {
        KanaKanjiMatcher::new(MatcherOptions::default())
    }

    fn pairs(keys: &[&str]) -> Vec<(Option<String>, Option<String>)> {
        matcher()
            .match_keys(keys)
            .iter()
            .map(|p| (p.expression().map(String::from), p.reading().map(String::from)))
            .collect()
    }

    fn p(expression: Option<&str>, reading: Option<&str>) -> (Option<String>, Option<String>) {
        (expression.map(String::from), reading.map(String::from))
    }

    #[test]
    fn okurigana_suffixes_pick_their_reading() {
        assert_eq!(
            pairs(&["かなしび", "かなしぶ", "哀しび", "哀しぶ", "悲しぶ"]),
            vec![
                p(Some("哀しび"), Some("かなしび")),
                p(Some("哀しぶ"), Some("かなしぶ")),
                p(Some("悲しぶ"), Some("かなしぶ")),
            ]
        );
    }

    #[test]
    fn single_reading_takes_every_spelling() {
        assert_eq!(
            pairs(&["ぬかづきむし", "額突き虫"]),
            vec![p(Some("額突き虫"), Some("ぬかづきむし"))]
        );
        assert_eq!(
            pairs(&["スティック糊", "スティックノリ", "スティックノリ"]),
            vec![p(Some("スティック糊"), Some("スティックノリ"))]
        );
    }

    #[test]
    fn non_japanese_keys_stand_alone() {
        assert_eq!(pairs(&["123"]), vec![p(None, Some("123"))]);
        assert_eq!(pairs(&[]), vec![]);
    }

    #[test]
    fn fixed_suffix_pairs_first() {
        assert_eq!(
            pairs(&["みるる", "見るる", "みる", "見る"]),
            vec![p(Some("見るる"), Some("みるる")), p(Some("見る"), Some("みる"))]
        );
    }

    #[test]
    fn exact_residue_match() {
        assert_eq!(
            pairs(&["しぶ", "かなしぶ", "哀しぶ", "悲しぶ"]),
            vec![p(Some("哀しぶ"), Some("しぶ")), p(Some("悲しぶ"), Some("しぶ")), p(None, Some("かなしぶ"))]
        );
    }

    #[test]
    fn prefix_pass_needs_three_characters() {
        assert_eq!(
            pairs(&["ぴかぴかこう", "いぬ", "ぴかぴか光"]),
            vec![p(Some("ぴかぴか光"), Some("ぴかぴかこう")), p(None, Some("いぬ"))]
        );
    }

    #[test]
    fn spellings_without_okurigana_use_plausibility() {
        assert_eq!(
            pairs(&["さんだい", "さんたい", "三台"]),
            vec![p(Some("三台"), Some("さんだい")), p(None, Some("さんたい"))]
        );
        // one kana for a three-ideograph spelling is implausible
        assert_eq!(
            pairs(&["あ", "い", "漢字語"]),
            vec![p(None, Some("あ")), p(None, Some("い")), p(Some("漢字語"), None)]
        );
    }

    struct Anything;

    impl ReadingPlausibility for Anything {
        fn is_plausible(&self, _: &str, _: &str) -> bool {
            true
        }
    }

    #[test]
    fn plausibility_is_pluggable() {
        let matcher = KanaKanjiMatcher::with_plausibility(MatcherOptions::default(), Anything);
        let out = matcher.match_keys(&["あ", "い", "漢字語"]);
        assert_eq!(out[0], MatchPair::paired("漢字語", "あ"));
        assert_eq!(out[1], MatchPair::ReadingOnly("い".into()));
    }

    #[test]
    fn depth_bound_emits_leftovers_unmatched() {
        let keys = ["かなしぶ", "あ", "哀しぶ", "漢字語"];
        // the second sweep pairs the lone leftover reading
        assert_eq!(
            matcher().match_keys(&keys),
            vec![MatchPair::paired("哀しぶ", "かなしぶ"), MatchPair::paired("漢字語", "あ")]
        );

        let shallow = KanaKanjiMatcher::new(MatcherOptions {
            max_depth: 0,
            ..MatcherOptions::default()
        });
        let out = shallow.match_keys(&keys);
        assert_eq!(
            out,
            vec![
                MatchPair::paired("哀しぶ", "かなしぶ"),
                MatchPair::ReadingOnly("あ".into()),
                MatchPair::ExpressionOnly("漢字語".into()),
            ]
        );
        let seen: HashSet<&str> = out
            .iter()
            .flat_map(|p| p.expression().into_iter().chain(p.reading()))
            .collect();
        assert_eq!(seen, keys.iter().copied().collect::<HashSet<_>>());
    }

    #[test]
    fn every_key_survives_and_output_is_stable() {
        let keys = [
            "かなしば", "かなしび", "かなしびよ", "かなしぶ", "かなしぶる", "かなしぶれ", "かなしべ", "哀しば",
            "哀しびよ", "哀しび", "哀しぶる", "哀しぶれ", "哀しぶ", "悲しぶ", "愛しぶ", "哀しべ", "abc",
        ];
        let first = matcher().match_keys(&keys);
        assert_eq!(first, matcher().match_keys(&keys));

        let mut seen: HashSet<&str> = HashSet::new();
        for pair in &first {
            assert!(pair.expression().is_some() || pair.reading().is_some());
            seen.extend(pair.expression());
            seen.extend(pair.reading());
        }
        assert_eq!(seen, keys.iter().copied().collect::<HashSet<_>>());
    }
}
