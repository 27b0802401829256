//! Kana colour assignment. The palette is shuffled with a generator seeded
//! from the kana subset itself, so a given combination always looks the same
//! while different combinations differ.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Visual token for a kana tile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ColorToken {
    Solid { color: String },
    Gradient { from: String, to: String },
}

const SOLIDS: [&str; 10] = [
    "#e4572e", "#29335c", "#f3a712", "#a8c686", "#669bbc", "#8e6c8a", "#d1495b", "#00798c",
    "#edae49", "#3d5a80",
];

const GRADIENTS: [(&str, &str); 6] = [
    ("#ff9a9e", "#fad0c4"),
    ("#a18cd1", "#fbc2eb"),
    ("#84fab0", "#8fd3f4"),
    ("#f6d365", "#fda085"),
    ("#5ee7df", "#b490ca"),
    ("#c79081", "#dfa579"),
];

pub type ColorMap = BTreeMap<String, ColorToken>;

fn palette() -> Vec<ColorToken> {
    let solids = SOLIDS.iter().map(|c| ColorToken::Solid { color: c.to_string() });
    let gradients = GRADIENTS.iter().map(|(from, to)| ColorToken::Gradient {
        from: from.to_string(),
        to: to.to_string(),
    });
    solids.chain(gradients).collect()
}

// FNV-1a over the sorted subset; stable across builds unlike std's hasher.
fn subset_seed(sorted: &[&str]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for kana in sorted {
        for byte in kana.as_bytes().iter().chain(std::iter::once(&0u8)) {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }
    hash
}

/// Deterministic colour per kana for `kana_subset`. Kana beyond the palette
/// size reuse colours in order.
pub fn generate_color_map(kana_subset: &[String]) -> ColorMap {
    let mut sorted: Vec<&str> = kana_subset.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut colors = palette();
    let mut rng = StdRng::seed_from_u64(subset_seed(&sorted));
    colors.shuffle(&mut rng);

    sorted
        .iter()
        .enumerate()
        .map(|(i, kana)| (kana.to_string(), colors[i % colors.len()].clone()))
        .collect()
}
