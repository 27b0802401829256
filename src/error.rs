//! Error taxonomy shared by the level catalog, board generator, engine and
//! persistence adapters.

use thiserror::Error;

/// A level table entry that cannot produce a playable board.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelError {
    #[error("level {level}: kana '{kana}' is not in the kana catalog")]
    UnknownKana { level: u32, kana: String },
    #[error("level {level}: kana '{kana}' appears more than once")]
    DuplicateKana { level: u32, kana: String },
    #[error("level {level}: needs at least one kana")]
    EmptySubset { level: u32 },
    #[error("level {level}: group size {tiles_per_kana} must be at least 2")]
    GroupTooSmall { level: u32, tiles_per_kana: usize },
    #[error("level {level}: branch capacity {capacity} is below group size {tiles_per_kana}")]
    CapacityBelowGroup {
        level: u32,
        capacity: usize,
        tiles_per_kana: usize,
    },
    #[error("level {level}: needs at least 2 branches, got {branch_count}")]
    TooFewBranches { level: u32, branch_count: usize },
    #[error("level {level}: {tiles} tiles do not fit into {slots} slots")]
    Overfull {
        level: u32,
        tiles: usize,
        slots: usize,
    },
    #[error("level {level}: random pool holds {available} kana, {requested} requested")]
    PoolTooSmall {
        level: u32,
        requested: usize,
        available: usize,
    },
}

/// Defects detected while generating a board. The board is still returned so
/// the game stays playable; these are reported, never thrown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationIssue {
    #[error("tile count mismatch after distribution: generated {generated}, placed {placed}")]
    TileCountMismatch { generated: usize, placed: usize },
    #[error("completion-avoidance gave up after {attempts} attempts")]
    PreCompleted { attempts: usize },
}

/// Why a move was refused. The engine state is untouched in every case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("input is not accepted while a completion resolves or the level is cleared")]
    Busy,
    #[error("source and target are the same branch")]
    SameBranch,
    #[error("no branch with id '{0}'")]
    UnknownBranch(String),
    #[error("branch '{0}' has no tiles to move")]
    EmptySource(String),
    #[error("branch '{0}' does not accept tiles")]
    NotInteractive(String),
    #[error("cannot place '{moving}' on top of '{top}'")]
    KanaMismatch { moving: String, top: String },
    #[error("branch '{target}' has room for {room} tiles, {needed} needed")]
    Capacity {
        target: String,
        room: usize,
        needed: usize,
    },
}

impl MoveError {
    /// Placement failures are the ones the player should be told about;
    /// the rest are no-ops from the player's point of view.
    pub fn is_placement(&self) -> bool {
        matches!(self, MoveError::KanaMismatch { .. } | MoveError::Capacity { .. })
    }
}

/// Failures of the key-value persistence adapters.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend unavailable")]
    Unavailable,
    #[error("storage read failed for '{0}'")]
    Read(String),
    #[error("storage write failed for '{0}'")]
    Write(String),
    #[error("stored record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
