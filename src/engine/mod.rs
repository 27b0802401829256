//! Game engine: the single owner of [`GameState`].
//!
//! All player actions go through [`Engine`]. Every operation is a synchronous
//! update of the whole state; the only deferred work (tile reveal, structural
//! removal of completed sets, wave retirement, drop settle) is queued on the
//! [`Sequencer`] and applied when the host advances the clock.
//!
//! Score, learned kana and completed-set bookkeeping change in the same update
//! that detects a completion. The completed tiles stay on the board until the
//! reveal finishes, so a view may briefly show a new score next to tiles that
//! are still present.

use std::collections::BTreeSet;

use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};

use crate::board::{self, Branch, BranchType, completed_branch_ids, has_valid_moves};
use crate::color::{ColorMap, generate_color_map};
use crate::error::{GenerationIssue, LevelError, MoveError};
use crate::level::LevelConfig;
use crate::services::{LevelProgress, Services};
use crate::settings::{DisplayMode, EngineSettings};

pub mod retirement;
pub mod sequencer;

use retirement::{empty_normal_count, pick_candidate};
use sequencer::{Command, Sequencer};

/// Phase of the current level. Only one phase is active at a time and each
/// one decides which operations are accepted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum LevelState {
    /// Nothing selected, waiting for input.
    #[default]
    Idle,
    /// A branch is lifted; the next tap on another branch attempts a move.
    #[serde(rename_all = "camelCase")]
    Picking { branch_id: String, run_length: usize },
    /// Completed sets are being revealed; input is ignored until removal.
    #[serde(rename_all = "camelCase")]
    Resolving { pending_branch_ids: Vec<String> },
    /// Board cleared.
    Celebrating,
}

/// Authoritative snapshot of one level session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub branches: Vec<Branch>,
    pub moves: u32,
    pub score: u32,
    pub is_complete: bool,
    pub learned_kana: BTreeSet<String>,
    pub kana_color_map: ColorMap,
    /// `kana:branch` keys of sets that already scored.
    pub completed_sets: BTreeSet<String>,
    pub level_state: LevelState,
}

/// A set that scored in the current update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedSet {
    pub kana: String,
    pub romaji: String,
    pub branch_id: String,
}

impl GameState {
    fn new(branches: Vec<Branch>, kana_color_map: ColorMap, learned_kana: BTreeSet<String>) -> Self {
        let mut state = Self {
            branches,
            moves: 0,
            score: 0,
            is_complete: false,
            learned_kana,
            kana_color_map,
            completed_sets: BTreeSet::new(),
            level_state: LevelState::Idle,
        };
        state.is_complete = state.board_cleared();
        if state.is_complete {
            state.level_state = LevelState::Celebrating;
        }
        state
    }

    pub fn selected_branch(&self) -> Option<&str> {
        match &self.level_state {
            LevelState::Picking { branch_id, .. } => Some(branch_id),
            _ => None,
        }
    }

    pub fn branch(&self, id: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.id == id)
    }

    fn branch_index(&self, id: &str) -> Option<usize> {
        self.branches.iter().position(|b| b.id == id)
    }

    pub fn board_cleared(&self) -> bool {
        self.branches.iter().all(Branch::is_empty)
    }

    /// Scores every complete branch whose `kana:branch` key has not scored
    /// yet. Running it again on an unchanged board awards nothing.
    pub fn award_completions(&mut self, tiles_per_kana: usize, reward: u32) -> Vec<CompletedSet> {
        let mut fresh = Vec::new();
        for branch in &self.branches {
            if !branch.is_complete(tiles_per_kana) {
                continue;
            }
            let Some(first) = branch.tiles.first() else {
                continue;
            };
            if self.completed_sets.insert(format!("{}:{}", first.kana, branch.id)) {
                fresh.push(CompletedSet {
                    kana: first.kana.clone(),
                    romaji: first.romaji.clone(),
                    branch_id: branch.id.clone(),
                });
            }
        }
        for set in &fresh {
            self.score = self.score.saturating_add(reward);
            self.learned_kana.insert(set.kana.clone());
        }
        fresh
    }
}

/// Notifications for the presentation layer, drained with
/// [`Engine::drain_events`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GameEvent {
    #[serde(rename_all = "camelCase")]
    InvalidMove { reason: String },
    NoMovesAvailable,
    #[serde(rename_all = "camelCase")]
    SetCompleted {
        kana: String,
        romaji: String,
        branch_id: String,
        score: u32,
    },
    #[serde(rename_all = "camelCase")]
    LevelCleared { level: u32, score: u32, moves: u32 },
    #[serde(rename_all = "camelCase")]
    BranchRetired { branch_id: String, collected: u32 },
}

impl GameEvent {
    /// The two conditions the player has to be alerted about.
    pub fn is_alert(&self) -> bool {
        matches!(self, GameEvent::InvalidMove { .. } | GameEvent::NoMovesAvailable)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveReport {
    pub moved: usize,
    pub completed: Vec<CompletedSet>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectOutcome {
    Picked { branch_id: String, run_length: usize },
    Deselected,
    Moved(MoveReport),
    Rejected(MoveError),
    /// Tap had no effect (empty or inactive branch, or input not accepted).
    Ignored,
}

pub struct Engine {
    config: LevelConfig,
    settings: EngineSettings,
    state: GameState,
    history: Vec<GameState>,
    preset: Vec<Branch>,
    generation_issues: Vec<GenerationIssue>,
    sequencer: Sequencer,
    services: Services,
    rng: SmallRng,
    events: Vec<GameEvent>,
    flipping: BTreeSet<String>,
    disappearing: Option<String>,
    landing: Option<String>,
}

impl Engine {
    /// Generates a fresh board for `config`.
    pub fn new(
        config: LevelConfig,
        settings: EngineSettings,
        services: Services,
        rng: SmallRng,
    ) -> Result<Self, LevelError> {
        let mut engine = Self::with_board(config.clone(), Vec::new(), settings, services, rng);
        engine.start_level(config)?;
        Ok(engine)
    }

    /// Starts from a prepared board instead of generating one.
    pub fn with_board(
        config: LevelConfig,
        branches: Vec<Branch>,
        settings: EngineSettings,
        services: Services,
        rng: SmallRng,
    ) -> Self {
        let colors = generate_color_map(&config.kana_subset);
        let mut engine = Self {
            config,
            settings,
            state: GameState::new(Vec::new(), colors, BTreeSet::new()),
            history: Vec::new(),
            preset: branches.clone(),
            generation_issues: Vec::new(),
            sequencer: Sequencer::new(),
            services,
            rng,
            events: Vec::new(),
            flipping: BTreeSet::new(),
            disappearing: None,
            landing: None,
        };
        engine.install_board(branches);
        engine
    }

    /// Switches to another level. Pending timers of the old level are dropped.
    pub fn start_level(&mut self, config: LevelConfig) -> Result<(), LevelError> {
        if let Err(e) = config.validate() {
            log::error!("refusing malformed level: {e}");
            return Err(e);
        }
        self.sequencer.cancel_all();
        self.config = config;
        self.state.kana_color_map = generate_color_map(&self.config.kana_subset);
        let branches = self.generate_board();
        self.preset = branches.clone();
        log::info!(
            "level {} '{}' started with {} kana",
            self.config.level,
            self.config.name,
            self.config.kana_subset.len()
        );
        self.install_board(branches);
        Ok(())
    }

    fn generate_board(&mut self) -> Vec<Branch> {
        let generated = board::generate(
            &self.config,
            &self.state.kana_color_map,
            self.settings.max_repairs,
            &mut self.rng,
        );
        self.generation_issues = generated.issues;
        generated.branches
    }

    fn install_board(&mut self, branches: Vec<Branch>) {
        let learned = std::mem::take(&mut self.state.learned_kana);
        let colors = std::mem::take(&mut self.state.kana_color_map);
        self.state = GameState::new(branches, colors, learned);
        self.history.clear();
        self.flipping.clear();
        self.disappearing = None;
        self.landing = None;
        self.check_retirement();
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn config(&self) -> &LevelConfig {
        &self.config
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        self.settings.display_mode = mode;
    }

    pub fn generation_issues(&self) -> &[GenerationIssue] {
        &self.generation_issues
    }

    pub fn undo_depth(&self) -> usize {
        self.history.len()
    }

    pub fn branches_collected(&self) -> u32 {
        self.services.counter.total()
    }

    pub fn progress(&self) -> Option<LevelProgress> {
        self.services.progress.as_ref().map(|p| p.get(self.config.level))
    }

    /// Tile ids currently showing the reveal effect.
    pub fn flipping_tiles(&self) -> &BTreeSet<String> {
        &self.flipping
    }

    /// Branch currently being retired, if any.
    pub fn disappearing_branch(&self) -> Option<&str> {
        self.disappearing.as_deref()
    }

    /// Target of the last move while its drop animation runs.
    pub fn landing_branch(&self) -> Option<&str> {
        self.landing.as_deref()
    }

    pub fn has_valid_moves(&self) -> bool {
        has_valid_moves(&self.state.branches)
    }

    pub fn pending_timers(&self) -> usize {
        self.sequencer.pending_len()
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    fn accepts_input(&self) -> bool {
        matches!(self.state.level_state, LevelState::Idle | LevelState::Picking { .. })
    }

    fn is_interactive(&self, branch: &Branch) -> bool {
        branch.kind == BranchType::Normal && self.disappearing.as_deref() != Some(branch.id.as_str())
    }

    /// Handles a tap on branch `id`.
    pub fn select_branch(&mut self, id: &str) -> SelectOutcome {
        if !self.accepts_input() {
            return SelectOutcome::Ignored;
        }
        if let LevelState::Picking { branch_id, run_length } = self.state.level_state.clone() {
            self.state.level_state = LevelState::Idle;
            if branch_id == id {
                log::debug!("deselected {id}");
                return SelectOutcome::Deselected;
            }
            return match self.apply_move(&branch_id, id, Some(run_length)) {
                Ok(report) => SelectOutcome::Moved(report),
                Err(e) => SelectOutcome::Rejected(e),
            };
        }

        let Some(branch) = self.state.branch(id) else {
            return SelectOutcome::Ignored;
        };
        if !self.is_interactive(branch) {
            return SelectOutcome::Ignored;
        }
        let Some(top) = branch.top() else {
            return SelectOutcome::Ignored;
        };
        let run_length = branch.top_run();
        self.services.speech.speak(&top.kana, &top.romaji);
        self.state.level_state = LevelState::Picking {
            branch_id: id.to_string(),
            run_length,
        };
        log::debug!("picked {run_length} tile(s) from {id}");
        SelectOutcome::Picked {
            branch_id: id.to_string(),
            run_length,
        }
    }

    /// Moves the whole top run of `source` onto `target`.
    pub fn move_tile(&mut self, source: &str, target: &str) -> Result<MoveReport, MoveError> {
        if !self.accepts_input() {
            return Err(MoveError::Busy);
        }
        self.state.level_state = LevelState::Idle;
        self.apply_move(source, target, None)
    }

    fn validate_move(
        &self,
        source: &str,
        target: &str,
        pick: Option<usize>,
    ) -> Result<(usize, usize, usize), MoveError> {
        if source == target {
            return Err(MoveError::SameBranch);
        }
        let si = self
            .state
            .branch_index(source)
            .ok_or_else(|| MoveError::UnknownBranch(source.to_string()))?;
        let ti = self
            .state
            .branch_index(target)
            .ok_or_else(|| MoveError::UnknownBranch(target.to_string()))?;
        let src = &self.state.branches[si];
        let dst = &self.state.branches[ti];
        let Some(moving) = src.top_kana() else {
            return Err(MoveError::EmptySource(source.to_string()));
        };
        if !self.is_interactive(dst) {
            return Err(MoveError::NotInteractive(target.to_string()));
        }
        let run = src.top_run();
        let n = pick.map_or(run, |p| p.min(run));
        match dst.top_kana() {
            None => Ok((si, ti, n)),
            Some(top) if top != moving => Err(MoveError::KanaMismatch {
                moving: moving.to_string(),
                top: top.to_string(),
            }),
            Some(_) if dst.tiles.len() + n > dst.max_capacity => Err(MoveError::Capacity {
                target: target.to_string(),
                room: dst.room(),
                needed: n,
            }),
            Some(_) => Ok((si, ti, n)),
        }
    }

    fn apply_move(
        &mut self,
        source: &str,
        target: &str,
        pick: Option<usize>,
    ) -> Result<MoveReport, MoveError> {
        let (si, ti, n) = match self.validate_move(source, target, pick) {
            Ok(plan) => plan,
            Err(e) => {
                log::debug!("move {source} -> {target} rejected: {e}");
                if e.is_placement() {
                    self.events.push(GameEvent::InvalidMove {
                        reason: e.to_string(),
                    });
                }
                return Err(e);
            }
        };

        self.history.push(self.state.clone());
        let src = &mut self.state.branches[si];
        let moving = src.tiles.split_off(src.tiles.len() - n);
        self.state.branches[ti].tiles.extend(moving);
        self.state.moves += 1;
        log::debug!("moved {n} tile(s) {source} -> {target}");

        self.landing = Some(target.to_string());
        self.sequencer.schedule(
            self.settings.drop_settle_ms,
            Command::SettleDrop {
                branch_id: target.to_string(),
            },
        );

        let completed = self.resolve_after_move();
        self.check_retirement();
        Ok(MoveReport { moved: n, completed })
    }

    fn resolve_after_move(&mut self) -> Vec<CompletedSet> {
        let tiles_per_kana = self.config.tiles_per_kana;
        let fresh = self
            .state
            .award_completions(tiles_per_kana, self.settings.set_reward);
        for set in &fresh {
            log::debug!("set '{}' completed on {}", set.kana, set.branch_id);
            self.events.push(GameEvent::SetCompleted {
                kana: set.kana.clone(),
                romaji: set.romaji.clone(),
                branch_id: set.branch_id.clone(),
                score: self.state.score,
            });
        }

        let complete = completed_branch_ids(&self.state.branches, tiles_per_kana);
        if complete.is_empty() {
            self.settle_phase();
        } else {
            self.schedule_reveal(&complete);
            self.state.level_state = LevelState::Resolving {
                pending_branch_ids: complete,
            };
        }
        fresh
    }

    /// Leaves the move/removal path in `Idle` or `Celebrating`, reporting a
    /// deadlock if the board is stuck.
    fn settle_phase(&mut self) {
        self.state.is_complete = self.state.board_cleared();
        if self.state.is_complete {
            self.state.level_state = LevelState::Celebrating;
            self.on_level_cleared();
            return;
        }
        self.state.level_state = LevelState::Idle;
        if !has_valid_moves(&self.state.branches) {
            log::debug!("no legal moves left");
            self.events.push(GameEvent::NoMovesAvailable);
        }
    }

    fn on_level_cleared(&mut self) {
        let (level, score, moves) = (self.config.level, self.state.score, self.state.moves);
        log::info!("level {level} cleared: score {score}, {moves} moves");
        if let Some(progress) = &self.services.progress {
            progress.record_clear(level, score, moves);
        }
        self.events.push(GameEvent::LevelCleared { level, score, moves });
    }

    fn schedule_reveal(&mut self, branch_ids: &[String]) {
        let timing = self.settings.reveal();
        let mode = self.settings.display_mode;
        let mut max_tiles = 0;
        for (bi, id) in branch_ids.iter().enumerate() {
            let Some(branch) = self.state.branch(id) else {
                continue;
            };
            max_tiles = max_tiles.max(branch.tiles.len());
            let order: Vec<&str> = match mode {
                DisplayMode::Flip => branch.tiles.iter().rev().map(|t| t.id.as_str()).collect(),
                DisplayMode::Fade => branch.tiles.iter().map(|t| t.id.as_str()).collect(),
            };
            let commands: Vec<(u64, Command)> = order
                .into_iter()
                .enumerate()
                .map(|(ti, tile_id)| {
                    (
                        timing.tile_delay(bi, ti),
                        Command::FlipTile {
                            branch_id: id.clone(),
                            tile_id: tile_id.to_string(),
                        },
                    )
                })
                .collect();
            for (delay, command) in commands {
                self.sequencer.schedule(delay, command);
            }
        }
        self.sequencer.schedule(
            timing.total(branch_ids.len(), max_tiles),
            Command::FinishReveal {
                branch_ids: branch_ids.to_vec(),
            },
        );
    }

    /// Retires one empty branch when too many are open, at most one at a
    /// time, and never once the board is down to a single kana.
    fn check_retirement(&mut self) {
        if self.state.is_complete || self.disappearing.is_some() {
            return;
        }
        let branches = &self.state.branches;
        if empty_normal_count(branches) <= self.settings.empty_branch_cap {
            return;
        }
        if board::distinct_kana(branches) <= 1 {
            return;
        }
        let Some(idx) = pick_candidate(branches) else {
            return;
        };
        let branch_id = branches[idx].id.clone();
        log::debug!("queueing retirement of {branch_id}");
        self.disappearing = Some(branch_id.clone());
        self.sequencer
            .schedule(self.settings.retire_delay_ms, Command::RetireBranch { branch_id });
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::FlipTile { tile_id, .. } => {
                self.flipping.insert(tile_id);
            }
            Command::FinishReveal { branch_ids } => self.finish_reveal(&branch_ids),
            Command::RetireBranch { branch_id } => self.retire(&branch_id),
            Command::FinishRetirement { branch_id } => {
                if self.disappearing.as_deref() == Some(branch_id.as_str()) {
                    self.disappearing = None;
                }
                let collected = self.services.counter.increment(1);
                self.events.push(GameEvent::BranchRetired {
                    branch_id,
                    collected,
                });
                self.check_retirement();
            }
            Command::SettleDrop { branch_id } => {
                if self.landing.as_deref() == Some(branch_id.as_str()) {
                    self.landing = None;
                }
            }
        }
    }

    fn finish_reveal(&mut self, branch_ids: &[String]) {
        for id in branch_ids {
            if let Some(branch) = self.state.branch(id) {
                for tile in &branch.tiles {
                    self.flipping.remove(&tile.id);
                }
            }
        }
        if !matches!(self.state.level_state, LevelState::Resolving { .. }) {
            return;
        }
        // Recompute on the live board rather than trusting the ids captured
        // when the reveal was scheduled.
        let tiles_per_kana = self.config.tiles_per_kana;
        for branch in &mut self.state.branches {
            if branch.is_complete(tiles_per_kana) {
                branch.tiles.clear();
            }
        }
        self.settle_phase();
        self.check_retirement();
    }

    fn retire(&mut self, branch_id: &str) {
        if self.disappearing.as_deref() != Some(branch_id) {
            return;
        }
        let Some(idx) = self.state.branch_index(branch_id) else {
            self.disappearing = None;
            return;
        };
        let branch = &mut self.state.branches[idx];
        if !branch.is_open() {
            // Refilled (e.g. by undo) while the retirement was queued.
            log::debug!("retirement of {branch_id} abandoned");
            self.disappearing = None;
            self.check_retirement();
            return;
        }
        branch.kind = BranchType::Wave;
        branch.tiles.clear();
        self.sequencer.schedule(
            self.settings.retire_flag_clear_ms,
            Command::FinishRetirement {
                branch_id: branch_id.to_string(),
            },
        );
    }

    /// Advances the virtual clock by `elapsed_ms`, applying due commands in
    /// order.
    pub fn advance(&mut self, elapsed_ms: u64) {
        let until = self.sequencer.now_ms().saturating_add(elapsed_ms);
        while let Some(command) = self.sequencer.pop_due(until) {
            self.apply(command);
        }
        self.sequencer.advance_to(until);
    }

    /// Runs every pending and follow-up command to completion.
    pub fn flush(&mut self) {
        while let Some(due) = self.sequencer.next_due() {
            while let Some(command) = self.sequencer.pop_due(due) {
                self.apply(command);
            }
        }
    }

    /// Drops every pending timer and the transient flags they would clear.
    pub fn cancel_timers(&mut self) {
        self.sequencer.cancel_all();
        self.flipping.clear();
        self.disappearing = None;
        self.landing = None;
    }

    /// Restores the state before the last move, minus the undo penalty.
    /// Ignored while a completion is resolving and once the board is cleared.
    pub fn undo_move(&mut self) -> bool {
        if !self.accepts_input() {
            return false;
        }
        let Some(mut previous) = self.history.pop() else {
            return false;
        };
        previous.score = previous.score.saturating_sub(self.settings.undo_penalty);
        previous.level_state = LevelState::Idle;
        self.state = previous;
        self.landing = None;
        // Not an exact inverse: spent even when the undone move retired nothing.
        self.services.counter.increment(-1);
        log::debug!("undo, {} snapshot(s) left", self.history.len());
        self.check_retirement();
        true
    }

    /// Fresh shuffle of the current level.
    pub fn reset_game(&mut self) {
        self.cancel_timers();
        let branches = self.generate_board();
        self.install_board(branches);
        self.services.counter.increment(-1);
        log::debug!("level {} reshuffled", self.config.level);
    }

    /// Back to the board first generated for the current level.
    pub fn restart_preset(&mut self) {
        self.cancel_timers();
        self.install_board(self.preset.clone());
        self.services.counter.increment(-1);
        log::debug!("level {} restarted", self.config.level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::test_support::branch;
    use crate::services::MemoryCounter;
    use rand::SeedableRng;

    fn config(kana: &[&str]) -> LevelConfig {
        LevelConfig {
            level: 1,
            name: "test".into(),
            kana_subset: kana.iter().map(|k| k.to_string()).collect(),
            tiles_per_kana: 4,
            branch_count: 4,
            branch_capacity: 4,
        }
    }

    fn engine(branches: Vec<Branch>) -> Engine {
        let mut services = Services::in_memory();
        services.counter = Box::new(MemoryCounter::new(5));
        Engine::with_board(
            config(&["あ", "い"]),
            branches,
            EngineSettings::default(),
            services,
            SmallRng::seed_from_u64(1),
        )
    }

    fn simple_board() -> Vec<Branch> {
        vec![
            branch("b0", 4, &["い", "あ", "あ", "あ"]),
            branch("b1", 4, &["い", "い", "い", "あ"]),
            Branch::new("b2", 4),
            Branch::new("b3", 4),
        ]
    }

    #[test]
    fn pick_uses_top_run_and_deselect_returns_idle() {
        let mut e = engine(simple_board());
        assert_eq!(
            e.select_branch("b0"),
            SelectOutcome::Picked {
                branch_id: "b0".into(),
                run_length: 3
            }
        );
        assert_eq!(e.state().selected_branch(), Some("b0"));
        assert_eq!(e.select_branch("b0"), SelectOutcome::Deselected);
        assert_eq!(e.state().level_state, LevelState::Idle);
        assert_eq!(e.undo_depth(), 0);
    }

    #[test]
    fn empty_branch_tap_does_nothing() {
        let mut e = engine(simple_board());
        assert_eq!(e.select_branch("b2"), SelectOutcome::Ignored);
        assert_eq!(e.state().level_state, LevelState::Idle);
    }

    #[test]
    fn second_tap_moves_and_clears_selection() {
        let mut e = engine(simple_board());
        e.select_branch("b0");
        let out = e.select_branch("b2");
        assert!(matches!(out, SelectOutcome::Moved(MoveReport { moved: 3, .. })));
        assert_eq!(e.state().branch("b2").unwrap().tiles.len(), 3);
        assert_eq!(e.state().moves, 1);
        assert_eq!(e.state().selected_branch(), None);
    }

    #[test]
    fn failed_move_still_clears_selection_and_signals() {
        let mut e = engine(simple_board());
        e.select_branch("b0");
        let out = e.select_branch("b1");
        // b1 top is あ with no room left.
        assert!(matches!(out, SelectOutcome::Rejected(MoveError::Capacity { .. })));
        assert_eq!(e.state().selected_branch(), None);
        assert_eq!(e.state().moves, 0);
        assert_eq!(e.undo_depth(), 0);
        assert!(e.drain_events().iter().any(GameEvent::is_alert));
    }

    #[test]
    fn same_branch_move_is_a_no_op() {
        let mut e = engine(simple_board());
        let before = e.state().clone();
        assert_eq!(e.move_tile("b0", "b0"), Err(MoveError::SameBranch));
        assert_eq!(e.state(), &before);
        assert_eq!(e.undo_depth(), 0);
        assert!(e.drain_events().is_empty());
    }

    #[test]
    fn completion_scores_immediately_and_removes_after_reveal() {
        let mut e = engine(simple_board());
        e.move_tile("b1", "b0").unwrap_err();
        e.move_tile("b0", "b2").unwrap();
        let report = e.move_tile("b1", "b2").unwrap();
        assert_eq!(report.completed.len(), 1);
        assert_eq!(e.state().score, 100);
        assert!(e.state().learned_kana.contains("あ"));
        assert!(matches!(e.state().level_state, LevelState::Resolving { .. }));
        assert_eq!(e.state().branch("b2").unwrap().tiles.len(), 4);

        // Input is held back while resolving.
        assert_eq!(e.select_branch("b1"), SelectOutcome::Ignored);
        assert!(!e.undo_move());

        e.advance(600);
        assert!(!e.flipping_tiles().is_empty());
        e.flush();
        assert!(e.state().branch("b2").unwrap().tiles.is_empty());
        assert!(e.flipping_tiles().is_empty());
        assert_eq!(e.state().level_state, LevelState::Idle);
        assert_eq!(e.state().score, 100);
    }

    #[test]
    fn sweep_does_not_score_twice() {
        let mut e = engine(simple_board());
        e.move_tile("b0", "b2").unwrap();
        e.move_tile("b1", "b2").unwrap();
        let mut state = e.state().clone();
        assert!(state.award_completions(4, 100).is_empty());
        assert_eq!(state.score, 100);
        assert_eq!(state.completed_sets.len(), 1);
    }

    #[test]
    fn undo_restores_board_and_charges_penalty() {
        let mut e = engine(simple_board());
        e.move_tile("b0", "b2").unwrap();
        let before = e.state().clone();
        e.move_tile("b1", "b3").unwrap();
        assert!(e.undo_move());
        assert_eq!(e.state().branches, before.branches);
        assert_eq!(e.state().moves, before.moves);
        assert_eq!(e.state().score, 0);
        assert_eq!(e.branches_collected(), 4);
        assert!(e.undo_move());
        assert_eq!(e.state().branches, simple_board());
        assert!(!e.undo_move());
    }

    #[test]
    fn fade_mode_reveals_bottom_up() {
        let mut e = engine(simple_board());
        e.set_display_mode(DisplayMode::Fade);
        e.move_tile("b0", "b2").unwrap();
        e.move_tile("b1", "b2").unwrap();
        e.advance(0);
        let bottom = e.state().branch("b2").unwrap().tiles[0].id.clone();
        assert_eq!(e.flipping_tiles().iter().collect::<Vec<_>>(), vec![&bottom]);
    }

    #[test]
    fn clearing_the_board_celebrates() {
        let board = vec![
            branch("b0", 4, &["あ", "あ", "あ"]),
            branch("b1", 4, &["あ"]),
            Branch::new("b2", 4),
        ];
        let mut e = engine(board);
        e.move_tile("b1", "b0").unwrap();
        e.flush();
        assert!(e.state().is_complete);
        assert_eq!(e.state().level_state, LevelState::Celebrating);
        assert_eq!(e.select_branch("b0"), SelectOutcome::Ignored);
        assert!(!e.undo_move());
        let events = e.drain_events();
        assert!(events.iter().any(|ev| matches!(ev, GameEvent::LevelCleared { score: 100, .. })));
    }

    #[test]
    fn deadlock_is_reported_not_resolved() {
        let board = vec![
            branch("b0", 4, &["あ", "い", "あ"]),
            branch("b1", 4, &["い", "あ", "い", "あ"]),
            branch("b2", 4, &["あ", "い", "い", "い"]),
        ];
        let mut e = engine(board);
        // The only legal move fills b0 and leaves nothing else to do.
        assert!(e.has_valid_moves());
        e.move_tile("b1", "b0").unwrap();
        assert!(!e.has_valid_moves());
        assert_eq!(e.drain_events(), vec![GameEvent::NoMovesAvailable]);
        assert_eq!(e.state().level_state, LevelState::Idle);
        assert!(e.undo_move());
        assert!(e.has_valid_moves());
    }

    #[test]
    fn reset_and_restart_cost_one_and_clear_history() {
        let mut services = Services::in_memory();
        services.counter = Box::new(MemoryCounter::new(2));
        let mut e = Engine::new(
            config(&["あ", "い"]),
            EngineSettings::default(),
            services,
            SmallRng::seed_from_u64(42),
        )
        .unwrap();
        let first = e.state().branches.clone();
        let (source, target) = {
            let b = &e.state().branches;
            let s = b.iter().find(|b| !b.is_empty()).unwrap().id.clone();
            let t = b.iter().find(|b| b.is_empty()).unwrap().id.clone();
            (s, t)
        };
        e.move_tile(&source, &target).unwrap();
        e.reset_game();
        assert_eq!(e.state().moves, 0);
        assert_eq!(e.undo_depth(), 0);
        assert_eq!(e.branches_collected(), 1);
        e.restart_preset();
        assert_eq!(e.state().branches, first);
        assert_eq!(e.branches_collected(), 0);
        e.restart_preset();
        assert_eq!(e.branches_collected(), 0);
    }

    #[test]
    fn malformed_level_is_rejected() {
        let mut cfg = config(&["あ", "い"]);
        cfg.branch_capacity = 3;
        let result = Engine::new(
            cfg,
            EngineSettings::default(),
            Services::in_memory(),
            SmallRng::seed_from_u64(0),
        );
        assert!(matches!(result, Err(LevelError::CapacityBelowGroup { .. })));
    }
}
