//! Board generation: materialize, shuffle, distribute densely, then repair
//! any branch that would start out already complete.

use rand::Rng;
use rand::seq::SliceRandom;

use super::{Branch, KanaTile, completed_branch_ids, total_tiles};
use crate::color::{ColorMap, ColorToken};
use crate::error::GenerationIssue;
use crate::kana;
use crate::level::LevelConfig;

/// Generated branches plus any defect found on the way. A board with issues
/// is still playable and is returned as-is.
#[derive(Clone, Debug)]
pub struct GeneratedBoard {
    pub branches: Vec<Branch>,
    pub issues: Vec<GenerationIssue>,
}

fn fallback_color() -> ColorToken {
    ColorToken::Solid {
        color: "#777777".into(),
    }
}

fn materialize(config: &LevelConfig, colors: &ColorMap) -> Vec<KanaTile> {
    let mut tiles = Vec::with_capacity(config.total_tiles());
    for k in &config.kana_subset {
        let romaji = kana::find(k).unwrap_or_default().to_string();
        let color = colors.get(k).cloned().unwrap_or_else(fallback_color);
        for i in 0..config.tiles_per_kana {
            tiles.push(KanaTile {
                id: format!("{k}{i}"),
                kana: k.clone(),
                romaji: romaji.clone(),
                color: color.clone(),
            });
        }
    }
    tiles
}

/// Fills the first `n - 1` branches to capacity, then spreads leftovers
/// round-robin over any branch with room. Returns tiles that did not fit.
fn distribute(branches: &mut [Branch], tiles: Vec<KanaTile>) -> Vec<KanaTile> {
    let mut pending = tiles.into_iter();
    let dense = branches.len().saturating_sub(1);
    for branch in branches.iter_mut().take(dense) {
        while branch.room() > 0 {
            match pending.next() {
                Some(tile) => branch.tiles.push(tile),
                None => return Vec::new(),
            }
        }
    }
    let mut rest: Vec<KanaTile> = pending.collect();
    rest.reverse();
    while !rest.is_empty() {
        let mut placed = false;
        for branch in branches.iter_mut() {
            if branch.room() == 0 {
                continue;
            }
            match rest.pop() {
                Some(tile) => {
                    branch.tiles.push(tile);
                    placed = true;
                }
                None => break,
            }
        }
        if !placed {
            break;
        }
    }
    rest
}

/// Swaps the top of `idx` with the top of another branch whose top kana
/// differs. Returns false when no such partner exists.
fn swap_tops(branches: &mut [Branch], idx: usize) -> bool {
    let Some(kana) = branches[idx].top_kana().map(str::to_owned) else {
        return false;
    };
    let partner = branches
        .iter()
        .enumerate()
        .find(|(i, b)| *i != idx && b.top_kana().is_some_and(|k| k != kana))
        .map(|(i, _)| i);
    let Some(partner) = partner else {
        return false;
    };
    let (Some(a), Some(b)) = (branches[idx].tiles.pop(), branches[partner].tiles.pop()) else {
        return false;
    };
    branches[idx].tiles.push(b);
    branches[partner].tiles.push(a);
    true
}

/// Reshuffles every tile while keeping each branch's tile count.
fn reshuffle_preserving_counts<R: Rng + ?Sized>(branches: &mut [Branch], rng: &mut R) {
    let counts: Vec<usize> = branches.iter().map(|b| b.tiles.len()).collect();
    let mut all: Vec<KanaTile> = branches
        .iter_mut()
        .flat_map(|b| std::mem::take(&mut b.tiles))
        .collect();
    all.shuffle(rng);
    let mut rest = all.into_iter();
    for (branch, count) in branches.iter_mut().zip(counts) {
        branch.tiles.extend(rest.by_ref().take(count));
    }
}

/// Builds the opening board for `config`.
pub fn generate<R: Rng + ?Sized>(
    config: &LevelConfig,
    colors: &ColorMap,
    max_repairs: usize,
    rng: &mut R,
) -> GeneratedBoard {
    let mut issues = Vec::new();

    let mut tiles = materialize(config, colors);
    let generated = tiles.len();
    tiles.shuffle(rng);

    let mut branches: Vec<Branch> = (0..config.branch_count)
        .map(|i| Branch::new(format!("branch-{i}"), config.branch_capacity))
        .collect();
    let leftover = distribute(&mut branches, tiles);

    let placed = total_tiles(&branches);
    if placed != generated || !leftover.is_empty() {
        let issue = GenerationIssue::TileCountMismatch { generated, placed };
        log::error!("level {}: {issue}", config.level);
        issues.push(issue);
    }

    let mut attempts = 0;
    loop {
        let completed = completed_branch_ids(&branches, config.tiles_per_kana);
        let Some(first) = completed.first() else {
            break;
        };
        if attempts >= max_repairs {
            let issue = GenerationIssue::PreCompleted { attempts };
            log::warn!("level {}: {issue}", config.level);
            issues.push(issue);
            break;
        }
        attempts += 1;
        let idx = branches
            .iter()
            .position(|b| &b.id == first)
            .unwrap_or_default();
        if !swap_tops(&mut branches, idx) {
            reshuffle_preserving_counts(&mut branches, rng);
        }
    }
    if attempts > 0 {
        log::debug!("level {}: completion repair took {attempts} steps", config.level);
    }

    GeneratedBoard { branches, issues }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::test_support::branch;
    use crate::color::generate_color_map;
    use crate::level::{get_level_config, level_count};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn config(kana: &[&str], per: usize, count: usize, cap: usize) -> LevelConfig {
        LevelConfig {
            level: 1,
            name: "test".into(),
            kana_subset: kana.iter().map(|k| k.to_string()).collect(),
            tiles_per_kana: per,
            branch_count: count,
            branch_capacity: cap,
        }
    }

    #[test]
    fn conserves_tiles_for_every_level() {
        let mut rng = SmallRng::seed_from_u64(2024);
        for n in 1..=level_count() {
            let cfg = get_level_config(n, &mut rng).unwrap();
            let colors = generate_color_map(&cfg.kana_subset);
            for _ in 0..20 {
                let board = generate(&cfg, &colors, 50, &mut rng);
                assert_eq!(total_tiles(&board.branches), cfg.total_tiles(), "level {n}");
                assert!(board.issues.is_empty(), "level {n}: {:?}", board.issues);
                assert!(board.branches.iter().all(|b| b.tiles.len() <= b.max_capacity));
            }
        }
    }

    #[test]
    fn never_starts_pre_completed() {
        let cfg = config(&["あ", "い"], 4, 4, 4);
        let colors = generate_color_map(&cfg.kana_subset);
        let mut rng = SmallRng::seed_from_u64(5);
        for _ in 0..500 {
            let board = generate(&cfg, &colors, 50, &mut rng);
            assert!(completed_branch_ids(&board.branches, 4).is_empty());
        }
    }

    #[test]
    fn dense_fill_leaves_trailing_branches_empty() {
        let cfg = config(&["あ", "い", "う"], 4, 5, 4);
        let colors = generate_color_map(&cfg.kana_subset);
        let mut rng = SmallRng::seed_from_u64(11);
        let board = generate(&cfg, &colors, 50, &mut rng);
        let lens: Vec<usize> = board.branches.iter().map(|b| b.tiles.len()).collect();
        assert_eq!(lens, vec![4, 4, 4, 0, 0]);
    }

    #[test]
    fn leftovers_go_round_robin_into_reserved_branch() {
        let cfg = config(&["あ", "い", "う"], 4, 3, 6);
        let colors = generate_color_map(&cfg.kana_subset);
        let mut rng = SmallRng::seed_from_u64(3);
        let board = generate(&cfg, &colors, 50, &mut rng);
        let lens: Vec<usize> = board.branches.iter().map(|b| b.tiles.len()).collect();
        assert_eq!(lens, vec![6, 6, 0]);

        let cfg = config(&["あ", "い", "う", "え"], 4, 3, 6);
        let colors = generate_color_map(&cfg.kana_subset);
        let board = generate(&cfg, &colors, 50, &mut rng);
        let lens: Vec<usize> = board.branches.iter().map(|b| b.tiles.len()).collect();
        assert_eq!(lens, vec![6, 6, 4]);
    }

    #[test]
    fn single_kana_degrades_instead_of_looping() {
        let cfg = config(&["あ"], 4, 2, 4);
        let colors = generate_color_map(&cfg.kana_subset);
        let mut rng = SmallRng::seed_from_u64(8);
        let board = generate(&cfg, &colors, 50, &mut rng);
        assert_eq!(total_tiles(&board.branches), 4);
        assert_eq!(
            board.issues,
            vec![GenerationIssue::PreCompleted { attempts: 50 }]
        );
    }

    #[test]
    fn swap_tops_breaks_a_completed_branch() {
        let mut branches = vec![branch("b0", 4, &["あ"; 4]), branch("b1", 4, &["い", "う"])];
        assert!(swap_tops(&mut branches, 0));
        assert_eq!(branches[0].top_kana(), Some("う"));
        assert_eq!(branches[1].top_kana(), Some("あ"));
        assert!(!branches[0].is_complete(4));
    }

    #[test]
    fn tiles_carry_reading_and_color() {
        let cfg = config(&["か", "き"], 4, 3, 4);
        let colors = generate_color_map(&cfg.kana_subset);
        let mut rng = SmallRng::seed_from_u64(1);
        let board = generate(&cfg, &colors, 50, &mut rng);
        let mut ids: Vec<&str> = Vec::new();
        for tile in board.branches.iter().flat_map(|b| &b.tiles) {
            assert_eq!(Some(tile.romaji.as_str()), kana::find(&tile.kana));
            assert_eq!(Some(&tile.color), colors.get(&tile.kana));
            ids.push(&tile.id);
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 8);
    }
}
