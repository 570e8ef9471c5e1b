use getset::{Getters, Setters};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::ValidationError;
use crate::structured_content::{ContentNode, HtmlTag};

/// Rows per `term_bank_N.json`.
pub const TERM_BANK_SIZE: usize = 10_000;
pub const INDEX_FORMAT: u8 = 3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EntryContent {
    /// Plain glossary strings.
    Simple(Vec<String>),
    /// Validated nodes, wrapped as one `structured-content` glossary.
    Structured(Vec<ContentNode>),
}

impl Default for EntryContent {
    fn default() -> Self {
        EntryContent::Simple(Vec::new())
    }
}

impl EntryContent {
    fn to_glossary(&self) -> Value {
        match self {
            EntryContent::Simple(lines) => json!(lines),
            EntryContent::Structured(nodes) => json!([{
                "type": "structured-content",
                "content": nodes,
            }]),
        }
    }
}

/// One term-bank row: `[term, reading, info, pos, rank, glossary, sequence, ""]`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TermBankRow(String, String, String, String, i64, Value, u64, String);

impl TermBankRow {
    pub fn term(&self) -> &str {
        &self.0
    }

    pub fn reading(&self) -> &str {
        &self.1
    }

    pub fn sequence(&self) -> u64 {
        self.6
    }
}

#[derive(Clone, Debug, Default, PartialEq, Getters, Setters)]
#[getset(get = "pub")]
pub struct DicEntry {
    term: String,
    reading: String,
    #[getset(set = "pub")]
    info_tag: String,
    #[getset(set = "pub")]
    pos_tag: String,
    #[getset(set = "pub")]
    search_rank: i64,
    #[getset(set = "pub")]
    sequence: u64,
    content: EntryContent,
}

impl DicEntry {
    pub fn new(term: impl Into<String>, reading: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            reading: reading.into(),
            ..Default::default()
        }
    }

    pub fn with_tags(mut self, info_tag: impl Into<String>, pos_tag: impl Into<String>) -> Self {
        self.info_tag = info_tag.into();
        self.pos_tag = pos_tag.into();
        self
    }

    pub fn with_search_rank(mut self, rank: i64) -> Self {
        self.search_rank = rank;
        self
    }

    /// Validates `element`, then appends it. Plain content set earlier is
    /// replaced by the structured list.
    pub fn add_element(&mut self, element: ContentNode) -> Result<(), ValidationError> {
        element.validate()?;
        match &mut self.content {
            EntryContent::Structured(nodes) => nodes.push(element),
            simple => *simple = EntryContent::Structured(vec![element]),
        }
        Ok(())
    }

    pub fn set_simple_content<I, S>(&mut self, definitions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.content = EntryContent::Simple(definitions.into_iter().map(Into::into).collect());
    }

    /// A definition line followed by a `⧉`-bulleted link to `link`.
    pub fn set_link_content(&mut self, definition: &str, link: &str) {
        let ul = HtmlTag::Ul.as_str();
        let li = HtmlTag::Li.as_str();
        let definition =
            ContentNode::element(ul, vec![ContentNode::element(li, definition, None)], None);
        let link = ContentNode::element(
            ul,
            vec![ContentNode::element(li, vec![ContentNode::link(link, link)], None)],
            None,
        )
        .with_style("listStyleType", "\"⧉\"");
        self.content = EntryContent::Structured(vec![definition, link]);
    }

    pub fn to_term_bank_row(&self) -> TermBankRow {
        TermBankRow(
            self.term.clone(),
            self.reading.clone(),
            self.info_tag.clone(),
            self.pos_tag.clone(),
            self.search_rank,
            self.content.to_glossary(),
            self.sequence,
            String::new(),
        )
    }
}

#[derive(Clone, Debug, Default, Getters)]
#[getset(get = "pub")]
pub struct Dictionary {
    title: String,
    revision: String,
    entries: Vec<DicEntry>,
}

impl Dictionary {
    pub fn new(title: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            revision: revision.into(),
            entries: Vec::new(),
        }
    }

    pub fn add_entry(&mut self, entry: DicEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index_json(&self) -> Value {
        json!({
            "title": self.title,
            "format": INDEX_FORMAT,
            "revision": self.revision,
        })
    }

    /// Rows in insertion order, numbered from 0, split into banks of
    /// [`TERM_BANK_SIZE`].
    pub fn term_banks(&self) -> Vec<Vec<TermBankRow>> {
        self.entries
            .chunks(TERM_BANK_SIZE)
            .enumerate()
            .map(|(bank, entries)| {
                entries
                    .iter()
                    .enumerate()
                    .map(|(i, entry)| {
                        let mut row = entry.to_term_bank_row();
                        row.6 = (bank * TERM_BANK_SIZE + i) as u64;
                        row
                    })
                    .collect()
            })
            .collect()
    }
}
