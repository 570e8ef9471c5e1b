pub mod converter;
pub mod dictionary;
pub mod errors;
pub mod kana_matcher;
pub mod language;
pub mod manual_match;
pub mod markup;
pub mod parser;
pub mod settings;
pub mod strategies;
pub mod structured_content;
pub mod tag_mapping;

pub use converter::HtmlConverter;
pub use dictionary::{DicEntry, Dictionary, TermBankRow};
pub use errors::{ConvertError, ConvertResult, ValidationError};
pub use kana_matcher::{KanaKanjiMatcher, MatchPair, MatcherOptions};
pub use manual_match::{ManualMatchStore, MatchScope};
pub use markup::{Ancestry, Element, MarkupNode};
pub use parser::{BatchRunner, EntryParser, FileProcessor};
pub use settings::DictionaryConfig;
pub use structured_content::{Content, ContentItem, ContentNode, HtmlTag};
pub use tag_mapping::{TagMapping, TagResolver};
