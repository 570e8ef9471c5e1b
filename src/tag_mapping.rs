//! Context-sensitive tag resolution.
//!
//! Publisher markup reuses generic tags whose role depends on where they sit.
//! The mapping table approximates CSS descendant selectors with four key
//! shapes: `tag`, `tag.class`, `ancestor.class tag` and `ancestor tag`.

use std::path::Path;

use derive_more::derive::{Deref, From};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::markup::{Ancestry, Element};
use crate::structured_content::HtmlTag;

pub const DEFAULT_TARGET_TAG: &str = "span";

/// How many ancestors above the parent the resolver may climb.
pub const MAX_ANCESTOR_DEPTH: usize = 5;

/// Immutable source-tag -> target-tag table, loaded once per dictionary.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Deref, From)]
#[serde(transparent)]
pub struct TagMapping(IndexMap<String, String>);

impl TagMapping {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        ConfigError::read_json(path)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// The class list used for both data flags and selector keys.
///
/// An element without classes whose tag the viewer does not know stands in
/// for its own class, so `<見出>` behaves like `<span class="見出">`.
pub fn effective_classes(element: &Element) -> Vec<String> {
    let classes: Vec<String> = element.classes().into_iter().map(String::from).collect();
    if classes.is_empty() && !HtmlTag::is_native(element.name()) {
        return vec![element.name().to_string()];
    }
    classes
}

#[derive(Clone, Debug, Default)]
pub struct TagResolver {
    mapping: TagMapping,
}

impl TagResolver {
    pub fn new(mapping: TagMapping) -> Self {
        Self { mapping }
    }

    pub fn mapping(&self) -> &TagMapping {
        &self.mapping
    }

    /// Resolves the output tag for `tag_name`.
    ///
    /// `parents` starts at the element's parent. First match wins:
    /// ancestor rules (nearest ancestor first, at most the parent plus
    /// [`MAX_ANCESTOR_DEPTH`] more), then `tag.class`, then `tag`, then
    /// [`DEFAULT_TARGET_TAG`].
    ///
    /// A parent rule is taken as is. Rules on higher ancestors only count
    /// when they map to something other than [`DEFAULT_TARGET_TAG`].
    pub fn resolve(
        &self,
        tag_name: &str,
        classes: &[String],
        parents: Option<&Ancestry<'_>>,
    ) -> &str {
        let ancestors = parents
            .into_iter()
            .flat_map(|chain| chain.iter())
            .take(MAX_ANCESTOR_DEPTH + 1);

        for (depth, ancestor) in ancestors.enumerate() {
            match self.ancestor_rule(ancestor, tag_name) {
                Some(target) if depth == 0 || target != DEFAULT_TARGET_TAG => return target,
                _ => {}
            }
        }

        for class in classes {
            if let Some(target) = self.mapping.lookup(&format!("{tag_name}.{class}")) {
                return target;
            }
        }

        self.mapping.lookup(tag_name).unwrap_or(DEFAULT_TARGET_TAG)
    }

    fn ancestor_rule(&self, ancestor: &Element, tag_name: &str) -> Option<&str> {
        let name = ancestor.name();
        effective_classes(ancestor)
            .iter()
            .find_map(|class| self.mapping.lookup(&format!("{name}.{class} {tag_name}")))
            .or_else(|| self.mapping.lookup(&format!("{name} {tag_name}")))
    }
}

#[cfg(test)]
mod tag_mapping_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resolver(pairs: &[(&str, &str)]) -> TagResolver {
        TagResolver::new(pairs.iter().copied().collect())
    }

    #[test]
    fn ancestor_rule_beats_plain_tag() {
        let r = resolver(&[("div.x span", "A"), ("span", "B")]);
        let div = Element::new("div").with_attr("class", "x");
        let parent = Ancestry::root(&div);
        assert_eq!(r.resolve("span", &[], Some(&parent)), "A");
        assert_eq!(r.resolve("span", &[], None), "B");

        let other = Element::new("div").with_attr("class", "y");
        let parent = Ancestry::root(&other);
        assert_eq!(r.resolve("span", &[], Some(&parent)), "B");
    }

    #[test]
    fn closer_ancestor_wins() {
        let r = resolver(&[("section 語", "div"), ("block 語", "li")]);
        let outer = Element::new("section");
        let inner = Element::new("block");
        let root = Ancestry::root(&outer);
        let chain = Ancestry::child_of(&inner, Some(&root));
        assert_eq!(r.resolve("語", &[], Some(&chain)), "li");
    }

    #[test]
    fn default_from_higher_ancestor_falls_through() {
        let r = resolver(&[("top x", "span"), ("x.c", "div")]);
        let top = Element::new("top");
        let mid = Element::new("mid");
        let other = Element::new("other");
        let classes = ["c".to_string()];

        let root = Ancestry::root(&top);
        let under_other = Ancestry::child_of(&other, Some(&root));
        assert_eq!(r.resolve("x", &classes, Some(&under_other)), "div");
        assert_eq!(r.resolve("x", &[], Some(&under_other)), DEFAULT_TARGET_TAG);

        // the parent's own rule is honored even when it maps to span
        let r = resolver(&[("mid x", "span"), ("x.c", "div")]);
        let under_mid = Ancestry::child_of(&mid, Some(&root));
        assert_eq!(r.resolve("x", &classes, Some(&under_mid)), "span");
    }

    #[test]
    fn untagged_ancestor_uses_its_name_as_class() {
        let r = resolver(&[("見出G.見出G 表記", "div")]);
        let heading = Element::new("見出G");
        let parent = Ancestry::root(&heading);
        assert_eq!(r.resolve("表記", &[], Some(&parent)), "div");
    }

    #[test]
    fn class_rule_then_plain_then_default() {
        let r = resolver(&[("m.sub", "rt"), ("m", "div")]);
        assert_eq!(r.resolve("m", &["sub".to_string()], None), "rt");
        assert_eq!(r.resolve("m", &["other".to_string()], None), "div");
        assert_eq!(r.resolve("z", &[], None), DEFAULT_TARGET_TAG);
    }

    #[test]
    fn walk_is_bounded() {
        let r = resolver(&[("top x", "div")]);
        let elements: Vec<Element> = std::iter::once(Element::new("top"))
            .chain((0..7).map(|i| Element::new(format!("level{i}"))))
            .collect();

        // top is 6 levels above the parent: out of reach
        let chain = Ancestry::root(&elements[0]);
        let too_deep = build_chain(&elements[1..7], &chain, |c| {
            r.resolve("x", &[], Some(c)).to_string()
        });
        assert_eq!(too_deep, DEFAULT_TARGET_TAG);

        // top is 5 levels above the parent: still reachable
        let chain = Ancestry::root(&elements[0]);
        let in_reach = build_chain(&elements[1..6], &chain, |c| {
            r.resolve("x", &[], Some(c)).to_string()
        });
        assert_eq!(in_reach, "div");
    }

    fn build_chain<'a>(
        rest: &'a [Element],
        parent: &Ancestry<'a>,
        f: impl Fn(&Ancestry<'_>) -> String,
    ) -> String {
        match rest.split_first() {
            None => f(parent),
            Some((first, tail)) => {
                let here = Ancestry::child_of(first, Some(parent));
                build_chain(tail, &here, f)
            }
        }
    }

    #[test]
    fn loads_from_json() {
        let mapping = TagMapping::from_json_str(r#"{"見出": "div", "a.ref": "span"}"#).unwrap();
        assert_eq!(mapping.lookup("見出"), Some("div"));
        assert_eq!(mapping.len(), 2);
    }
}
