//! Which empty branch gets retired to a wave branch.
//!
//! Branches are laid out in two columns: the first half of the list on the
//! left, the rest on the right, row = position within the column. The
//! candidate is the lowest empty normal branch on screen; on a row tie the
//! right column wins.

use crate::board::Branch;

pub fn empty_normal_count(branches: &[Branch]) -> usize {
    branches.iter().filter(|b| b.is_open()).count()
}

/// (column, row) of branch `idx` in a list of `len` branches.
pub fn layout_position(idx: usize, len: usize) -> (usize, usize) {
    let left = len.div_ceil(2);
    if idx < left { (0, idx) } else { (1, idx - left) }
}

/// Index of the empty normal branch to retire.
pub fn pick_candidate(branches: &[Branch]) -> Option<usize> {
    let len = branches.len();
    branches
        .iter()
        .enumerate()
        .filter(|(_, b)| b.is_open())
        .max_by_key(|(i, _)| {
            let (column, row) = layout_position(*i, len);
            (row, column)
        })
        .map(|(i, _)| i)
}
