//! Engine tunables. Everything has a default; the web surface may override
//! any subset from a JSON object.

use serde::{Deserialize, Serialize};

/// Visual style of the completion reveal. Scoring is identical in both modes,
/// only the stagger timing and tile traversal differ.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Tiles flip one after another from the top of the branch down.
    #[default]
    Flip,
    /// Tiles fade from the bottom up, faster than flipping.
    Fade,
}

/// Per-mode reveal timing in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealTiming {
    pub branch_step_ms: u64,
    pub tile_step_ms: u64,
    pub settle_ms: u64,
}

impl RevealTiming {
    pub fn tile_delay(&self, branch_idx: usize, tile_idx: usize) -> u64 {
        self.branch_step_ms * branch_idx as u64 + self.tile_step_ms * tile_idx as u64
    }

    /// Time until the structural removal for `branches` completed branches
    /// holding at most `max_tiles` tiles.
    pub fn total(&self, branches: usize, max_tiles: usize) -> u64 {
        self.branch_step_ms * branches as u64 + self.tile_step_ms * max_tiles as u64 + self.settle_ms
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineSettings {
    pub set_reward: u32,
    pub undo_penalty: u32,
    /// Empty normal branches tolerated before one is retired.
    pub empty_branch_cap: usize,
    pub retire_delay_ms: u64,
    pub retire_flag_clear_ms: u64,
    pub drop_settle_ms: u64,
    pub max_repairs: usize,
    pub display_mode: DisplayMode,
    pub flip: RevealTiming,
    pub fade: RevealTiming,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            set_reward: 100,
            undo_penalty: 10,
            empty_branch_cap: 2,
            retire_delay_ms: 350,
            retire_flag_clear_ms: 50,
            drop_settle_ms: 220,
            max_repairs: 50,
            display_mode: DisplayMode::Flip,
            flip: RevealTiming {
                branch_step_ms: 600,
                tile_step_ms: 150,
                settle_ms: 300,
            },
            fade: RevealTiming {
                branch_step_ms: 400,
                tile_step_ms: 80,
                settle_ms: 250,
            },
        }
    }
}

impl EngineSettings {
    pub fn reveal(&self) -> RevealTiming {
        match self.display_mode {
            DisplayMode::Flip => self.flip,
            DisplayMode::Fade => self.fade,
        }
    }

    /// Parses a partial JSON override on top of the defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let s = EngineSettings::from_json(r#"{"undoPenalty": 25, "displayMode": "fade"}"#).unwrap();
        assert_eq!(s.undo_penalty, 25);
        assert_eq!(s.display_mode, DisplayMode::Fade);
        assert_eq!(s.set_reward, 100);
        assert_eq!(s.reveal(), s.fade);
    }

    #[test]
    fn reveal_total_scales_with_branches_and_tiles() {
        let t = EngineSettings::default().flip;
        assert_eq!(t.total(1, 4), 600 + 4 * 150 + 300);
        assert!(t.total(2, 4) > t.total(1, 4));
        assert!(t.total(1, 5) > t.total(1, 4));
        assert!(t.tile_delay(0, 3) < t.total(1, 4));
    }
}
