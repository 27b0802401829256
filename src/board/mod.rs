//! Board model: tiles, branches and the predicates the engine builds on.
//!
//! A branch is a stack whose *end* is the top. Only the top run (the maximal
//! suffix sharing the top tile's kana) can be lifted, and a branch is complete
//! once it holds exactly one group of identical kana.

use serde::{Deserialize, Serialize};

use crate::color::ColorToken;

pub mod generator;

pub use generator::{GeneratedBoard, generate};

/// One kana instance. Never mutated after generation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KanaTile {
    pub id: String,
    pub kana: String,
    pub romaji: String,
    pub color: ColorToken,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BranchType {
    Normal,
    /// Retired slot: keeps its position, never holds tiles again.
    Wave,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: String,
    pub tiles: Vec<KanaTile>,
    pub max_capacity: usize,
    #[serde(rename = "type")]
    pub kind: BranchType,
}

impl Branch {
    pub fn new(id: impl Into<String>, max_capacity: usize) -> Self {
        Self {
            id: id.into(),
            tiles: Vec::new(),
            max_capacity,
            kind: BranchType::Normal,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn is_wave(&self) -> bool {
        self.kind == BranchType::Wave
    }

    pub fn top(&self) -> Option<&KanaTile> {
        self.tiles.last()
    }

    pub fn top_kana(&self) -> Option<&str> {
        self.top().map(|t| t.kana.as_str())
    }

    /// Length of the maximal run at the top sharing the top tile's kana.
    pub fn top_run(&self) -> usize {
        match self.top_kana() {
            Some(kana) => self.tiles.iter().rev().take_while(|t| t.kana == kana).count(),
            None => 0,
        }
    }

    pub fn room(&self) -> usize {
        self.max_capacity.saturating_sub(self.tiles.len())
    }

    /// Exactly `tiles_per_kana` tiles, all the same kana.
    pub fn is_complete(&self, tiles_per_kana: usize) -> bool {
        match self.tiles.first() {
            Some(first) => {
                self.tiles.len() == tiles_per_kana
                    && self.tiles.iter().all(|t| t.kana == first.kana)
            }
            None => false,
        }
    }

    /// An empty normal branch: a free destination for any run.
    pub fn is_open(&self) -> bool {
        self.kind == BranchType::Normal && self.tiles.is_empty()
    }
}

/// Ids of branches currently satisfying the completion predicate.
pub fn completed_branch_ids(branches: &[Branch], tiles_per_kana: usize) -> Vec<String> {
    branches
        .iter()
        .filter(|b| b.is_complete(tiles_per_kana))
        .map(|b| b.id.clone())
        .collect()
}

pub fn total_tiles(branches: &[Branch]) -> usize {
    branches.iter().map(|b| b.tiles.len()).sum()
}

/// Number of distinct kana still on the board.
pub fn distinct_kana(branches: &[Branch]) -> usize {
    let mut seen: Vec<&str> = branches
        .iter()
        .flat_map(|b| b.tiles.iter().map(|t| t.kana.as_str()))
        .collect();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}

/// Whether at least one legal move exists.
///
/// Any empty normal branch is a legal destination. Otherwise every ordered
/// pair is checked with the source's *full* top run against the target's
/// remaining room. A shorter partial run that would fit is not considered;
/// level tuning assumes this conservative check.
pub fn has_valid_moves(branches: &[Branch]) -> bool {
    if branches.iter().any(Branch::is_open) {
        return true;
    }
    for (si, source) in branches.iter().enumerate() {
        let Some(kana) = source.top_kana() else {
            continue;
        };
        let run = source.top_run();
        for (ti, target) in branches.iter().enumerate() {
            if si == ti || target.is_wave() {
                continue;
            }
            if target.top_kana() == Some(kana) && target.room() >= run {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn tile(id: String, kana: &str) -> KanaTile {
        KanaTile {
            id,
            kana: kana.to_string(),
            romaji: crate::kana::find(kana).unwrap_or("?").to_string(),
            color: ColorToken::Solid {
                color: "#000".into(),
            },
        }
    }

    /// Builds a branch from a bottom-to-top string of kana.
    pub fn branch(id: &str, capacity: usize, kana: &[&str]) -> Branch {
        let mut b = Branch::new(id, capacity);
        b.tiles = kana
            .iter()
            .enumerate()
            .map(|(i, k)| tile(format!("{id}:{i}"), k))
            .collect();
        b
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::branch;
    use super::*;

    #[test]
    fn top_run_stops_at_first_mismatch() {
        let b = branch("b0", 4, &["あ", "い", "い", "い"]);
        assert_eq!(b.top_run(), 3);
        let b = branch("b1", 4, &["い", "い", "あ"]);
        assert_eq!(b.top_run(), 1);
        assert_eq!(Branch::new("e", 4).top_run(), 0);
    }

    #[test]
    fn completion_requires_exact_group() {
        assert!(branch("b", 5, &["あ"; 4]).is_complete(4));
        assert!(!branch("b", 5, &["あ"; 3]).is_complete(4));
        assert!(!branch("b", 5, &["あ"; 5]).is_complete(4));
        assert!(!branch("b", 4, &["あ", "あ", "あ", "い"]).is_complete(4));
        assert!(!Branch::new("b", 4).is_complete(4));
    }

    #[test]
    fn valid_moves_with_empty_branch() {
        let branches = vec![
            branch("b0", 4, &["あ", "い", "あ", "い"]),
            Branch::new("b1", 4),
        ];
        assert!(has_valid_moves(&branches));
    }

    #[test]
    fn exactly_one_legal_move_then_none() {
        // b1's top "い" fits onto b2 (one slot free, top "い").
        let branches = vec![
            branch("b0", 4, &["あ", "い", "あ", "う"]),
            branch("b1", 4, &["う", "あ", "う", "い"]),
            branch("b2", 4, &["い", "あ", "い"]),
        ];
        assert!(has_valid_moves(&branches));

        // Same board with the landing slot blocked by a mismatching kana.
        let blocked = vec![
            branch("b0", 4, &["あ", "い", "あ", "う"]),
            branch("b1", 4, &["う", "あ", "う", "い"]),
            branch("b2", 4, &["い", "あ", "い", "あ"]),
        ];
        assert!(!has_valid_moves(&blocked));

        // Same board with the kana matching but the target too small.
        let capped = vec![
            branch("b0", 4, &["あ", "い", "あ", "う"]),
            branch("b1", 4, &["う", "あ", "い", "い"]),
            branch("b2", 4, &["う", "あ", "い"]),
        ];
        assert!(!has_valid_moves(&capped));
    }

    #[test]
    fn wave_branches_are_not_destinations() {
        let mut wave = Branch::new("w", 4);
        wave.kind = BranchType::Wave;
        let branches = vec![
            branch("b0", 4, &["あ", "い", "あ", "い"]),
            branch("b1", 4, &["い", "あ", "い", "あ"]),
            wave,
        ];
        assert!(!has_valid_moves(&branches));
    }

    #[test]
    fn distinct_kana_counts_remaining_types() {
        let branches = vec![
            branch("b0", 4, &["あ", "い"]),
            branch("b1", 4, &["い", "い"]),
            Branch::new("b2", 4),
        ];
        assert_eq!(distinct_kana(&branches), 2);
        assert_eq!(total_tiles(&branches), 4);
    }
}
