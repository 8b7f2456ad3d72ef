//! Per-room session state: who is here, who chooses, the current round,
//! and the score table.
//!
//! Everything in this module is plain data with synchronous mutators.
//! It is owned by one [`RoomController`](crate::RoomController), which in
//! turn lives inside a single room task, so nothing here needs locking.

use std::collections::BTreeSet;
use std::time::Duration;

use marquee_protocol::{Member, PlayerId, RoomId, Scoreboard};
use tokio::time::Instant;

use crate::RoomError;
use crate::mask::{self, fold};

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A room member. Never changes after joining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
}

impl Player {
    pub fn new(id: PlayerId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Round
// ---------------------------------------------------------------------------

/// One secret title and the guessing progress against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    secret: String,
    chooser_id: PlayerId,
    strikes: Vec<char>,
    revealed: BTreeSet<char>,
    clue_revealed: bool,
}

impl Round {
    pub fn new(secret: impl Into<String>, chooser_id: PlayerId) -> Self {
        Self {
            secret: secret.into(),
            chooser_id,
            strikes: Vec::new(),
            revealed: BTreeSet::new(),
            clue_revealed: false,
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn chooser_id(&self) -> PlayerId {
        self.chooser_id
    }

    pub fn strikes(&self) -> &[char] {
        &self.strikes
    }

    pub fn revealed(&self) -> &BTreeSet<char> {
        &self.revealed
    }

    pub fn clue_revealed(&self) -> bool {
        self.clue_revealed
    }

    /// The title as guessers currently see it.
    pub fn masked(&self) -> String {
        mask::mask_with_reveals(&self.secret, &self.revealed)
    }

    /// Whether nothing is hidden any more.
    pub fn is_solved(&self) -> bool {
        mask::is_fully_revealed(&self.secret, &self.revealed)
    }

    /// Case-insensitive letter membership.
    pub fn contains_letter(&self, letter: char) -> bool {
        let letter = fold(letter);
        self.secret.chars().any(|c| fold(c) == letter)
    }

    /// Case-insensitive whole-title comparison. Spaces count.
    pub fn matches_title(&self, guess: &str) -> bool {
        self.secret.to_lowercase() == guess.to_lowercase()
    }

    /// Adds `letter` to the revealed set. Returns `false` if it was
    /// already there.
    pub fn reveal(&mut self, letter: char) -> bool {
        self.revealed.insert(fold(letter))
    }

    /// Records one strike. The caller enforces the budget.
    pub fn push_strike(&mut self, letter: char) {
        self.strikes.push(letter);
    }

    pub fn mark_clue_revealed(&mut self) {
        self.clue_revealed = true;
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Where a room is in its session.
///
/// ```text
/// AwaitingSelection ──select──→ Active ──win/lose──→ AwaitingSelection
///         │                       │
///         └──────(300 s elapsed at rotation)──────→ SessionOver
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// A chooser is set, no secret yet.
    AwaitingSelection,
    /// A round is being guessed.
    Active(Round),
    /// The session ran out of time. Terminal.
    SessionOver,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AwaitingSelection => "AwaitingSelection",
            Self::Active(_) => "Active",
            Self::SessionOver => "SessionOver",
        }
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The in-memory record of one room.
#[derive(Debug, Clone)]
pub struct RoomState {
    room_id: RoomId,
    /// Join order; also the chooser rotation order.
    members: Vec<Player>,
    chooser_index: usize,
    phase: Phase,
    scores: Scoreboard,
    session_started_at: Option<Instant>,
}

impl RoomState {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            members: Vec::new(),
            chooser_index: 0,
            phase: Phase::AwaitingSelection,
            scores: Scoreboard::new(),
            session_started_at: None,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    // -- Membership --

    pub fn members(&self) -> &[Player] {
        &self.members
    }

    /// The membership list in wire form.
    pub fn member_list(&self) -> Vec<Member> {
        self.members
            .iter()
            .map(|p| Member {
                player_id: p.id,
                display_name: p.display_name.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.members.iter().any(|p| p.id == player_id)
    }

    /// Appends a member and opens their score at 0. A player who left
    /// and comes back starts over.
    pub fn add_member(&mut self, player: Player) -> Result<(), RoomError> {
        if self.contains(player.id) {
            return Err(RoomError::AlreadyInRoom(player.id, self.room_id.clone()));
        }
        self.scores.insert(player.id, 0);
        self.members.push(player);
        Ok(())
    }

    /// Removes a member, returning their former position.
    ///
    /// The chooser index is left alone; the controller decides how to
    /// repair it.
    pub fn remove_member(&mut self, player_id: PlayerId) -> Option<(usize, Player)> {
        let index = self.members.iter().position(|p| p.id == player_id)?;
        Some((index, self.members.remove(index)))
    }

    // -- Chooser --

    pub fn chooser_index(&self) -> usize {
        self.chooser_index
    }

    pub fn set_chooser_index(&mut self, index: usize) {
        self.chooser_index = index;
    }

    /// The member at the rotation cursor. Outside an orphaned round this
    /// is the chooser; see [`acting_chooser`](Self::acting_chooser).
    pub fn chooser(&self) -> Option<&Player> {
        self.members.get(self.chooser_index)
    }

    /// Who may select a title right now.
    ///
    /// While a round is running this is the round's chooser, or `None`
    /// once that player has left (the seat stays vacant until the round
    /// resolves). `chooser_index` then marks the successor, who takes
    /// over at resolution.
    pub fn acting_chooser(&self) -> Option<PlayerId> {
        match &self.phase {
            Phase::Active(round) => {
                let id = round.chooser_id();
                self.contains(id).then_some(id)
            }
            Phase::AwaitingSelection => self.chooser().map(|p| p.id),
            Phase::SessionOver => None,
        }
    }

    /// Moves the role one position along membership order, wrapping.
    pub fn advance_chooser(&mut self) -> Option<PlayerId> {
        if self.members.is_empty() {
            return None;
        }
        self.chooser_index = (self.chooser_index + 1) % self.members.len();
        self.chooser().map(|p| p.id)
    }

    // -- Round --

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn round(&self) -> Option<&Round> {
        match &self.phase {
            Phase::Active(round) => Some(round),
            _ => None,
        }
    }

    pub fn round_mut(&mut self) -> Option<&mut Round> {
        match &mut self.phase {
            Phase::Active(round) => Some(round),
            _ => None,
        }
    }

    /// Installs a new round, replacing any round in progress.
    pub fn set_round(&mut self, round: Round) {
        self.phase = Phase::Active(round);
    }

    /// Ends the current round, returning it.
    pub fn clear_round(&mut self) -> Option<Round> {
        match std::mem::replace(&mut self.phase, Phase::AwaitingSelection) {
            Phase::Active(round) => Some(round),
            other => {
                self.phase = other;
                None
            }
        }
    }

    pub fn end_session(&mut self) {
        self.phase = Phase::SessionOver;
    }

    pub fn is_session_over(&self) -> bool {
        matches!(self.phase, Phase::SessionOver)
    }

    // -- Scores --

    pub fn scores(&self) -> &Scoreboard {
        &self.scores
    }

    /// Adds points and returns the new total.
    pub fn award(&mut self, player_id: PlayerId, points: u32) -> u32 {
        let score = self.scores.entry(player_id).or_insert(0);
        *score = score.saturating_add(points);
        *score
    }

    // -- Session clock --

    /// Records the session start. Only the first call has any effect.
    pub fn start_session(&mut self, now: Instant) {
        self.session_started_at.get_or_insert(now);
    }

    pub fn session_started_at(&self) -> Option<Instant> {
        self.session_started_at
    }

    pub fn session_elapsed(&self, now: Instant) -> Option<Duration> {
        self.session_started_at
            .map(|start| now.saturating_duration_since(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomState {
        RoomState::new(RoomId::from("R1"))
    }

    #[test]
    fn test_add_member_opens_score_and_keeps_order() {
        let mut state = room();
        state.add_member(Player::new(PlayerId(1), "A")).unwrap();
        state.add_member(Player::new(PlayerId(2), "B")).unwrap();

        let ids: Vec<_> = state.members().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![PlayerId(1), PlayerId(2)]);
        assert_eq!(state.scores()[&PlayerId(2)], 0);
    }

    #[test]
    fn test_duplicate_member_is_rejected() {
        let mut state = room();
        state.add_member(Player::new(PlayerId(1), "A")).unwrap();
        let err = state.add_member(Player::new(PlayerId(1), "A again")).unwrap_err();
        assert!(matches!(err, RoomError::AlreadyInRoom(PlayerId(1), _)));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_rejoin_resets_score() {
        let mut state = room();
        state.add_member(Player::new(PlayerId(1), "A")).unwrap();
        state.award(PlayerId(1), 30);
        state.remove_member(PlayerId(1));
        state.add_member(Player::new(PlayerId(1), "A")).unwrap();
        assert_eq!(state.scores()[&PlayerId(1)], 0);
    }

    #[test]
    fn test_acting_chooser_follows_phase() {
        let mut state = room();
        for id in 1..=3 {
            state.add_member(Player::new(PlayerId(id), "")).unwrap();
        }
        assert_eq!(state.acting_chooser(), Some(PlayerId(1)));

        state.set_round(Round::new("ET", PlayerId(1)));
        assert_eq!(state.acting_chooser(), Some(PlayerId(1)));

        state.end_session();
        assert_eq!(state.acting_chooser(), None);
    }

    #[test]
    fn test_acting_chooser_vacant_after_round_chooser_leaves() {
        let mut state = room();
        for id in 1..=3 {
            state.add_member(Player::new(PlayerId(id), "")).unwrap();
        }
        state.set_round(Round::new("ET", PlayerId(1)));
        state.remove_member(PlayerId(1));
        // Index 0 now points at player 2, the successor, still a guesser.
        assert_eq!(state.chooser().map(|p| p.id), Some(PlayerId(2)));
        assert_eq!(state.acting_chooser(), None);

        state.clear_round();
        assert_eq!(state.acting_chooser(), Some(PlayerId(2)));
    }

    #[test]
    fn test_advance_chooser_wraps() {
        let mut state = room();
        for id in 1..=3 {
            state.add_member(Player::new(PlayerId(id), "")).unwrap();
        }
        assert_eq!(state.advance_chooser(), Some(PlayerId(2)));
        assert_eq!(state.advance_chooser(), Some(PlayerId(3)));
        assert_eq!(state.advance_chooser(), Some(PlayerId(1)));
    }

    #[test]
    fn test_advance_chooser_on_empty_room() {
        let mut state = room();
        assert_eq!(state.advance_chooser(), None);
    }

    #[test]
    fn test_clear_round_only_from_active() {
        let mut state = room();
        assert_eq!(state.clear_round(), None);

        state.set_round(Round::new("ET", PlayerId(1)));
        let round = state.clear_round().unwrap();
        assert_eq!(round.secret(), "ET");
        assert_eq!(state.phase(), &Phase::AwaitingSelection);

        state.end_session();
        assert_eq!(state.clear_round(), None);
        assert!(state.is_session_over(), "clearing must not reopen a session");
    }

    #[test]
    fn test_session_start_is_recorded_once() {
        let mut state = room();
        let t0 = Instant::now();
        state.start_session(t0);
        state.start_session(t0 + Duration::from_secs(60));
        assert_eq!(state.session_started_at(), Some(t0));
        assert_eq!(
            state.session_elapsed(t0 + Duration::from_secs(90)),
            Some(Duration::from_secs(90))
        );
    }

    #[test]
    fn test_round_letter_checks_are_case_insensitive() {
        let mut round = Round::new("Vikram", PlayerId(1));
        assert!(round.contains_letter('V'));
        assert!(round.contains_letter('k'));
        assert!(!round.contains_letter('z'));

        assert!(round.reveal('K'));
        assert!(!round.reveal('k'), "second reveal of the same letter");
        assert_eq!(round.masked(), "_ i k _ a _");
    }

    #[test]
    fn test_round_title_match_ignores_case_only() {
        let round = Round::new("Jai Bhim", PlayerId(1));
        assert!(round.matches_title("jai bhim"));
        assert!(!round.matches_title("jaibhim"));
    }
}
