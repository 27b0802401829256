//! Deferred engine mutations on a virtual clock.
//!
//! The engine never owns real timers. It schedules [`Command`]s here and the
//! host advances the clock (from `requestAnimationFrame` in the browser, by
//! hand in tests). Everything pending can be dropped at once with
//! [`Sequencer::cancel_all`] when the player leaves a level.

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Start the reveal effect on one tile of a completed branch.
    FlipTile { branch_id: String, tile_id: String },
    /// Reveal finished: clear flags and strike completed tiles from state.
    FinishReveal { branch_ids: Vec<String> },
    /// Turn an empty normal branch into a wave branch.
    RetireBranch { branch_id: String },
    /// Clear the "disappearing" flag and credit the collected counter.
    FinishRetirement { branch_id: String },
    /// End the drop micro-animation on a move's target.
    SettleDrop { branch_id: String },
}

#[derive(Clone, Debug)]
struct Scheduled {
    due_ms: u64,
    seq: u64,
    command: Command,
}

#[derive(Debug, Default)]
pub struct Sequencer {
    now_ms: u64,
    next_seq: u64,
    pending: Vec<Scheduled>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn schedule(&mut self, delay_ms: u64, command: Command) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Scheduled {
            due_ms: self.now_ms + delay_ms,
            seq,
            command,
        });
    }

    pub fn cancel_all(&mut self) {
        if !self.pending.is_empty() {
            log::debug!("sequencer: cancelling {} pending commands", self.pending.len());
        }
        self.pending.clear();
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Due time of the earliest pending command.
    pub fn next_due(&self) -> Option<u64> {
        self.pending.iter().map(|s| s.due_ms).min()
    }

    /// Pops the earliest command due at or before `until_ms`, moving the clock
    /// to its due time. Ties run in scheduling order.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<Command> {
        let idx = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, s)| s.due_ms <= until_ms)
            .min_by_key(|(_, s)| (s.due_ms, s.seq))
            .map(|(i, _)| i)?;
        let scheduled = self.pending.swap_remove(idx);
        self.now_ms = self.now_ms.max(scheduled.due_ms);
        Some(scheduled.command)
    }

    /// Moves the clock forward once nothing more is due.
    pub fn advance_to(&mut self, until_ms: u64) {
        self.now_ms = self.now_ms.max(until_ms);
    }
}
