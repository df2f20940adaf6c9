use crate::item::{Item, ItemKind};
use crate::util::percent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of comparing one submission against the expected items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub correct: usize,
    pub total: usize,
    pub percent: u8,
}

impl Score {
    pub fn new(correct: usize, total: usize) -> Self {
        Self {
            correct,
            total,
            percent: percent(correct, total),
        }
    }

    pub fn is_perfect(&self) -> bool {
        self.total > 0 && self.correct == self.total
    }
}

/// Positional comparison over the expected items.
///
/// Missing answers are wrong and extra answers are ignored, so scoring never fails.
pub fn score<K: ItemKind + ?Sized>(kind: &K, expected: &[Item], provided: &[Item]) -> Score {
    let correct = marks(kind, expected, provided)
        .filter(|&correct| correct)
        .count();

    Score::new(correct, expected.len())
}

/// Per-position correctness, one entry per expected item.
pub fn marks<'a, K: ItemKind + ?Sized>(
    kind: &'a K,
    expected: &'a [Item],
    provided: &'a [Item],
) -> impl Iterator<Item = bool> + 'a {
    expected.iter().enumerate().map(move |(idx, want)| {
        provided
            .get(idx)
            .is_some_and(|given| kind.matches(want, given))
    })
}

/// Best verified result so far, with the round settings it was achieved under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighScore {
    pub percent: u8,
    pub correct: usize,
    pub total: usize,
    #[serde(alias = "pairsCount", alias = "wordsCount", default)]
    pub item_count: usize,
    #[serde(alias = "memorizeTime", default)]
    pub memorize_seconds: u32,
    pub date: DateTime<Utc>,
}

impl HighScore {
    /// Only a strictly better percentage replaces a high score.
    pub fn is_beaten_by(&self, percent: u8) -> bool {
        percent > self.percent
    }
}

/// Replace `current` with `candidate` if it is the first score or strictly better.
pub fn update_high_score(current: &mut Option<HighScore>, candidate: HighScore) -> bool {
    let improves = current
        .as_ref()
        .map_or(true, |best| best.is_beaten_by(candidate.percent));
    if improves {
        *current = Some(candidate);
    }
    improves
}
