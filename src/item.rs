use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// One memorizable unit: a two-digit string (`"00"`..`"99"`) or a word.
pub type Item = String;

/// Which game a session, record or export row belongs to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GameKind {
    Pairs,
    Words,
}

/// Items for one round plus their display grouping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generated {
    pub items: Vec<Item>,
    pub chunked: Vec<Vec<Item>>,
}

/// Capabilities that make a session engine out of an item kind.
pub trait ItemKind: Debug {
    fn kind(&self) -> GameKind;

    /// Produce `count` items (or fewer, if the kind runs out) grouped by `layout`.
    fn generate<R: Rng + ?Sized>(&self, rng: &mut R, count: usize, layout: usize) -> Generated;

    /// Kind-specific equality between an expected item and a provided answer.
    fn matches(&self, expected: &str, provided: &str) -> bool;

    /// How many input units a complete answer for `item_count` items has.
    fn expected_len(&self, item_count: usize) -> usize;

    /// Input units currently present in a (formatted) buffer.
    fn measure(&self, buffer: &str) -> usize;

    /// Split a complete buffer into one answer per item.
    fn split(&self, buffer: &str) -> Vec<Item>;

    /// Items of a buffer submitted explicitly, including any entry still being typed.
    fn submission(&self, buffer: &str) -> Vec<Item> {
        self.split(buffer)
    }

    /// Normalize raw typed text into the buffer the session keeps.
    fn format_buffer(&self, raw: &str, item_count: usize) -> String;

    /// Whether verified attempts feed the session's high score.
    fn tracks_high_score(&self) -> bool {
        false
    }

    /// Number of items a round asking for `count` would actually get.
    fn available(&self, count: usize) -> usize {
        count
    }
}

/// Random two-digit numbers, recalled by typing the digits.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigitPairs;

impl DigitPairs {
    pub const DIGITS_PER_ITEM: usize = 2;
}

impl ItemKind for DigitPairs {
    fn kind(&self) -> GameKind {
        GameKind::Pairs
    }

    fn generate<R: Rng + ?Sized>(&self, rng: &mut R, count: usize, layout: usize) -> Generated {
        let items: Vec<Item> = (0..count)
            .map(|_| format!("{:02}", rng.gen_range(0..100u8)))
            .collect();
        let chunked = chunk_rows(&items, layout);

        Generated { items, chunked }
    }

    fn matches(&self, expected: &str, provided: &str) -> bool {
        expected == provided
    }

    fn expected_len(&self, item_count: usize) -> usize {
        item_count * Self::DIGITS_PER_ITEM
    }

    fn measure(&self, buffer: &str) -> usize {
        buffer.chars().filter(char::is_ascii_digit).count()
    }

    fn split(&self, buffer: &str) -> Vec<Item> {
        let digits: Vec<char> = buffer.chars().filter(char::is_ascii_digit).collect();
        digits
            .chunks(Self::DIGITS_PER_ITEM)
            .map(|group| group.iter().collect())
            .collect()
    }

    fn format_buffer(&self, raw: &str, item_count: usize) -> String {
        let max_digits = self.expected_len(item_count);
        let digits: Vec<char> = raw
            .chars()
            .filter(char::is_ascii_digit)
            .take(max_digits)
            .collect();

        digits
            .chunks(Self::DIGITS_PER_ITEM)
            .map(|group| group.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn tracks_high_score(&self) -> bool {
        true
    }
}

/// Words sampled from a dictionary, recalled by typing them separated by whitespace.
#[derive(Debug, Clone, Default)]
pub struct Words {
    dictionary: Vec<String>,
}

impl Words {
    pub fn new(dictionary: Vec<String>) -> Self {
        Self { dictionary }
    }

    pub fn dictionary(&self) -> &[String] {
        &self.dictionary
    }

    /// Entries followed by whitespace; a trailing word still being typed is not complete.
    fn completed_entries(buffer: &str) -> Vec<&str> {
        let mut entries: Vec<&str> = buffer.split_whitespace().collect();
        let ends_open = buffer.chars().last().is_some_and(|c| !c.is_whitespace());
        if ends_open {
            entries.pop();
        }
        entries
    }
}

impl ItemKind for Words {
    fn kind(&self) -> GameKind {
        GameKind::Words
    }

    fn generate<R: Rng + ?Sized>(&self, rng: &mut R, count: usize, layout: usize) -> Generated {
        let take = self.available(count);
        let mut pool = self.dictionary.clone();
        let (chosen, _) = pool.partial_shuffle(rng, take);
        let items = chosen.to_vec();
        let chunked = chunk_columns(&items, layout);

        Generated { items, chunked }
    }

    fn matches(&self, expected: &str, provided: &str) -> bool {
        expected.to_lowercase() == provided.to_lowercase()
    }

    fn expected_len(&self, item_count: usize) -> usize {
        item_count
    }

    fn measure(&self, buffer: &str) -> usize {
        Self::completed_entries(buffer).len()
    }

    fn split(&self, buffer: &str) -> Vec<Item> {
        Self::completed_entries(buffer)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn submission(&self, buffer: &str) -> Vec<Item> {
        buffer.split_whitespace().map(str::to_string).collect()
    }

    fn format_buffer(&self, raw: &str, item_count: usize) -> String {
        let entries = Self::completed_entries(raw);
        if entries.len() >= item_count {
            let mut kept = entries[..item_count].join(" ");
            kept.push(' ');
            kept
        } else {
            raw.to_string()
        }
    }

    fn available(&self, count: usize) -> usize {
        count.min(self.dictionary.len())
    }
}

/// Consecutive rows of `size` items; the last row may be shorter.
pub fn chunk_rows(items: &[Item], size: usize) -> Vec<Vec<Item>> {
    items.chunks(size.max(1)).map(<[Item]>::to_vec).collect()
}

/// Exactly `columns` columns of `ceil(len / columns)` items; trailing columns may be short or empty.
pub fn chunk_columns(items: &[Item], columns: usize) -> Vec<Vec<Item>> {
    let columns = columns.max(1);
    let per_column = items.len().div_ceil(columns);

    (0..columns)
        .map(|col| {
            let start = (col * per_column).min(items.len());
            let end = (start + per_column).min(items.len());
            items[start..end].to_vec()
        })
        .collect()
}
