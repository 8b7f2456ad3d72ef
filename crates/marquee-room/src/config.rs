//! Game rules configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// GameConfig
// ---------------------------------------------------------------------------

/// Tunable rules for every room on a server.
///
/// The defaults are the classic rules: a 30-second guess window, a
/// five-minute session, nine strikes spelling `KOLLYWOOD`, a hint at the
/// fifth strike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Idle time after which a strike is added automatically.
    pub guess_timeout: Duration,

    /// Session length, measured from the first title selection. Checked
    /// whenever the chooser would rotate.
    pub session_duration: Duration,

    /// Strikes are the letters of this word, one per wrong guess. Its
    /// length is the strike budget.
    pub penalty_word: String,

    /// Strike count at which the clue is disclosed.
    pub clue_at_strike: usize,

    /// The hint broadcast at `clue_at_strike`.
    pub clue: String,

    /// Points for a correct, not yet revealed letter.
    pub letter_reward: u32,

    /// Full-title reward is `base - step * strikes`, never below `floor`.
    pub title_reward_base: u32,
    pub title_reward_step: u32,
    pub title_reward_floor: u32,

    /// Text of the `SessionEnded` event.
    pub session_over_message: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            guess_timeout: Duration::from_secs(30),
            session_duration: Duration::from_secs(300),
            penalty_word: "KOLLYWOOD".to_string(),
            clue_at_strike: 5,
            clue: "Hint Example: Hero Vijay".to_string(),
            letter_reward: 10,
            title_reward_base: 100,
            title_reward_step: 10,
            title_reward_floor: 50,
            session_over_message: "Game Over! Session ended.".to_string(),
        }
    }
}

impl GameConfig {
    /// How many wrong guesses end a round.
    pub fn strike_budget(&self) -> usize {
        self.penalty_word.chars().count()
    }

    /// The letter recorded for the strike at position `index` (0-based).
    pub fn strike_letter(&self, index: usize) -> Option<char> {
        self.penalty_word.chars().nth(index)
    }

    /// Points for guessing the whole title after `strikes` wrong guesses.
    pub fn title_reward(&self, strikes: usize) -> u32 {
        let penalty = self
            .title_reward_step
            .saturating_mul(u32::try_from(strikes).unwrap_or(u32::MAX));
        self.title_reward_base
            .saturating_sub(penalty)
            .max(self.title_reward_floor)
    }
}
