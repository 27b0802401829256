//! Level catalog. Each entry names a kana subset (fixed or drawn at random),
//! the group size that completes a branch, and the branch layout.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::LevelError;
use crate::kana::{self, BASIC_KANA_COUNT, KANA};

/// Where a level's kana come from.
#[derive(Clone, Copy, Debug)]
pub enum KanaPool {
    Fixed(&'static [&'static str]),
    /// `count` kana drawn from the basic hiragana block on every lookup.
    Random { count: usize },
}

/// Static level descriptor (immutable).
#[derive(Clone, Copy, Debug)]
pub struct LevelDef {
    pub name: &'static str,
    pub kana: KanaPool,
    pub tiles_per_kana: usize,
    pub branch_count: usize,
    pub branch_capacity: usize,
}

/// Concrete level parameters with randomness already resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelConfig {
    pub level: u32,
    pub name: String,
    pub kana_subset: Vec<String>,
    pub tiles_per_kana: usize,
    pub branch_count: usize,
    pub branch_capacity: usize,
}

impl LevelConfig {
    pub fn total_tiles(&self) -> usize {
        self.kana_subset.len() * self.tiles_per_kana
    }

    /// Rejects configurations the board generator cannot honour.
    pub fn validate(&self) -> Result<(), LevelError> {
        let level = self.level;
        if self.kana_subset.is_empty() {
            return Err(LevelError::EmptySubset { level });
        }
        for (i, k) in self.kana_subset.iter().enumerate() {
            if kana::find(k).is_none() {
                return Err(LevelError::UnknownKana { level, kana: k.clone() });
            }
            if self.kana_subset[..i].contains(k) {
                return Err(LevelError::DuplicateKana { level, kana: k.clone() });
            }
        }
        if self.tiles_per_kana < 2 {
            return Err(LevelError::GroupTooSmall {
                level,
                tiles_per_kana: self.tiles_per_kana,
            });
        }
        if self.branch_capacity < self.tiles_per_kana {
            return Err(LevelError::CapacityBelowGroup {
                level,
                capacity: self.branch_capacity,
                tiles_per_kana: self.tiles_per_kana,
            });
        }
        if self.branch_count < 2 {
            return Err(LevelError::TooFewBranches {
                level,
                branch_count: self.branch_count,
            });
        }
        let slots = self.branch_count * self.branch_capacity;
        if self.total_tiles() > slots {
            return Err(LevelError::Overfull {
                level,
                tiles: self.total_tiles(),
                slots,
            });
        }
        Ok(())
    }
}

pub static LEVELS: [LevelDef; 12] = [
    LevelDef {
        name: "First Steps",
        kana: KanaPool::Fixed(&["あ", "い"]),
        tiles_per_kana: 4,
        branch_count: 4,
        branch_capacity: 4,
    },
    LevelDef {
        name: "Three Sounds",
        kana: KanaPool::Fixed(&["あ", "い", "う"]),
        tiles_per_kana: 4,
        branch_count: 5,
        branch_capacity: 4,
    },
    LevelDef {
        name: "Vowel Garden",
        kana: KanaPool::Fixed(&["あ", "い", "う", "え", "お"]),
        tiles_per_kana: 4,
        branch_count: 7,
        branch_capacity: 4,
    },
    LevelDef {
        name: "K Row",
        kana: KanaPool::Fixed(&["か", "き", "く", "け", "こ"]),
        tiles_per_kana: 4,
        branch_count: 7,
        branch_capacity: 4,
    },
    LevelDef {
        name: "S Row",
        kana: KanaPool::Fixed(&["さ", "し", "す", "せ", "そ"]),
        tiles_per_kana: 4,
        branch_count: 7,
        branch_capacity: 4,
    },
    LevelDef {
        name: "T Row",
        kana: KanaPool::Fixed(&["た", "ち", "つ", "て", "と"]),
        tiles_per_kana: 4,
        branch_count: 7,
        branch_capacity: 4,
    },
    LevelDef {
        name: "N Row",
        kana: KanaPool::Fixed(&["な", "に", "ぬ", "ね", "の"]),
        tiles_per_kana: 5,
        branch_count: 7,
        branch_capacity: 5,
    },
    LevelDef {
        name: "H Row",
        kana: KanaPool::Fixed(&["は", "ひ", "ふ", "へ", "ほ"]),
        tiles_per_kana: 5,
        branch_count: 7,
        branch_capacity: 5,
    },
    LevelDef {
        name: "M and Y Rows",
        kana: KanaPool::Fixed(&["ま", "み", "む", "め", "も", "や", "ゆ", "よ"]),
        tiles_per_kana: 4,
        branch_count: 10,
        branch_capacity: 4,
    },
    LevelDef {
        name: "R and W Rows",
        kana: KanaPool::Fixed(&["ら", "り", "る", "れ", "ろ", "わ", "を", "ん"]),
        tiles_per_kana: 4,
        branch_count: 10,
        branch_capacity: 4,
    },
    LevelDef {
        name: "Mixed Bag",
        kana: KanaPool::Random { count: 6 },
        tiles_per_kana: 4,
        branch_count: 7,
        branch_capacity: 5,
    },
    LevelDef {
        name: "Grand Review",
        kana: KanaPool::Random { count: 8 },
        tiles_per_kana: 5,
        branch_count: 10,
        branch_capacity: 5,
    },
];

/// Resolves level `level` (1-based) into a [`LevelConfig`]. Random levels draw
/// a fresh subset on every call; callers that need a stable subset keep the
/// returned config around.
pub fn get_level_config<R: Rng + ?Sized>(level: u32, rng: &mut R) -> Option<LevelConfig> {
    let def = LEVELS.get((level as usize).checked_sub(1)?)?;
    let kana_subset: Vec<String> = match def.kana {
        KanaPool::Fixed(kana) => kana.iter().map(|k| k.to_string()).collect(),
        KanaPool::Random { count } => {
            let pool = &KANA[..BASIC_KANA_COUNT];
            if count > pool.len() {
                log::error!(
                    "{}",
                    LevelError::PoolTooSmall {
                        level,
                        requested: count,
                        available: pool.len(),
                    }
                );
                return None;
            }
            pool.choose_multiple(rng, count)
                .map(|(k, _)| k.to_string())
                .collect()
        }
    };
    Some(LevelConfig {
        level,
        name: def.name.to_string(),
        kana_subset,
        tiles_per_kana: def.tiles_per_kana,
        branch_count: def.branch_count,
        branch_capacity: def.branch_capacity,
    })
}

pub fn level_count() -> u32 {
    LEVELS.len() as u32
}
