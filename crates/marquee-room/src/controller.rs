//! The round state machine for one room.
//!
//! [`RoomController`] owns a room's [`RoomState`] and its [`RoundTimer`]
//! and turns inbound events (join, select, guess, leave, timer expiry)
//! into state changes plus outbound [`ServerEvent`]s. It is synchronous:
//! every call runs to completion, including all of its broadcasts,
//! before the room task looks at the next event.
//!
//! Invalid or stale events (a guess with no round, a selection from
//! someone other than the chooser, an empty guess) are dropped with a
//! `debug!` line and change nothing.

use marquee_protocol::{PlayerId, RoundResult, ServerEvent};
use marquee_timer::RoundTimer;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::mask;
use crate::state::{Phase, Player, RoomState, Round};
use crate::{Broadcaster, GameConfig, RoomError};

/// What a guess string is, once trimmed.
enum Guess {
    Letter(char),
    Title(String),
}

impl Guess {
    fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (None, _) => None,
            (Some(c), None) => Some(Self::Letter(mask::fold(c))),
            _ => Some(Self::Title(trimmed.to_lowercase())),
        }
    }
}

/// Drives one room's session.
#[derive(Debug)]
pub struct RoomController {
    state: RoomState,
    timer: RoundTimer,
    config: GameConfig,
}

impl RoomController {
    pub fn new(state: RoomState, config: GameConfig) -> Self {
        let timer = RoundTimer::new(config.guess_timeout);
        Self {
            state,
            timer,
            config,
        }
    }

    pub fn state(&self) -> &RoomState {
        &self.state
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn timer(&self) -> &RoundTimer {
        &self.timer
    }

    /// The room task polls `timer_mut().expired()` in its event loop.
    pub fn timer_mut(&mut self) -> &mut RoundTimer {
        &mut self.timer
    }

    // ---------------------------------------------------------------------
    // Membership
    // ---------------------------------------------------------------------

    /// Adds a player to the room.
    ///
    /// The first player into an empty, fresh room becomes the chooser.
    /// Later arrivals get a private catch-up of whatever is in progress.
    ///
    /// # Errors
    /// [`RoomError::AlreadyInRoom`] if this connection is already a
    /// member. Nothing is broadcast in that case.
    pub fn join<B>(
        &mut self,
        player_id: PlayerId,
        display_name: String,
        out: &mut B,
    ) -> Result<(), RoomError>
    where
        B: Broadcaster + ?Sized,
    {
        let was_empty = self.state.is_empty();
        self.state
            .add_member(Player::new(player_id, display_name.clone()))?;

        let room_id = self.state.room_id().clone();
        info!(
            %room_id,
            %player_id,
            players = self.state.len(),
            "player joined"
        );

        out.send_to_room(
            &room_id,
            ServerEvent::MembershipChanged {
                members: self.state.member_list(),
            },
        );
        out.send_to_room(&room_id, ServerEvent::MemberJoined { display_name });

        if was_empty && matches!(self.state.phase(), Phase::AwaitingSelection) {
            self.state.set_chooser_index(0);
            info!(%room_id, chooser = %player_id, "initial chooser");
            out.send_to_room(&room_id, ServerEvent::ChooserAdvanced { chooser_id: player_id });
            return Ok(());
        }

        self.catch_up(player_id, out);
        Ok(())
    }

    /// Tells a late joiner what everyone else already knows.
    fn catch_up<B>(&self, player_id: PlayerId, out: &mut B)
    where
        B: Broadcaster + ?Sized,
    {
        match self.state.phase() {
            Phase::AwaitingSelection => {
                if let Some(chooser) = self.state.chooser() {
                    out.send_to_connection(
                        player_id,
                        ServerEvent::ChooserAdvanced { chooser_id: chooser.id },
                    );
                }
            }
            Phase::Active(round) => {
                out.send_to_connection(
                    player_id,
                    ServerEvent::RoundStarted {
                        chooser_id: round.chooser_id(),
                        masked_title: round.masked(),
                        strikes: round.strikes().to_vec(),
                        clue: round.clue_revealed().then(|| self.config.clue.clone()),
                    },
                );
                // The room last heard about the round's chooser, even if
                // they have since left.
                out.send_to_connection(
                    player_id,
                    ServerEvent::ChooserAdvanced { chooser_id: round.chooser_id() },
                );
            }
            Phase::SessionOver => {
                out.send_to_connection(
                    player_id,
                    ServerEvent::SessionEnded {
                        message: self.config.session_over_message.clone(),
                    },
                );
            }
        }
    }

    /// Removes a player from the room.
    ///
    /// Chooser policy on departure:
    /// - someone ahead of the chooser leaves: the index shifts so the
    ///   same player keeps the role;
    /// - the chooser leaves with no round running: the next member takes
    ///   over immediately;
    /// - the chooser leaves mid-round: the round plays out with the seat
    ///   vacant (nobody may select) and, once it resolves, the member who
    ///   followed them takes over.
    ///
    /// # Errors
    /// [`RoomError::NotInRoom`] if the player isn't a member.
    pub fn leave<B>(&mut self, player_id: PlayerId, out: &mut B) -> Result<(), RoomError>
    where
        B: Broadcaster + ?Sized,
    {
        let room_id = self.state.room_id().clone();
        let (index, player) = self
            .state
            .remove_member(player_id)
            .ok_or_else(|| RoomError::NotInRoom(player_id, room_id.clone()))?;

        info!(
            %room_id,
            %player_id,
            players = self.state.len(),
            "player left"
        );

        let remaining = self.state.len();
        let chooser_index = self.state.chooser_index();
        let mut handed_over = None;

        if remaining == 0 {
            self.state.set_chooser_index(0);
            if self.state.clear_round().is_some() {
                debug!(%room_id, "room emptied mid-round, round dropped");
            }
            self.timer.disarm();
        } else if index < chooser_index {
            self.state.set_chooser_index(chooser_index - 1);
        } else if index == chooser_index {
            // The index now points at whoever followed the leaver.
            self.state.set_chooser_index(index % remaining);
            if matches!(self.state.phase(), Phase::AwaitingSelection) {
                handed_over = self.state.chooser().map(|p| p.id);
            }
        }

        out.send_to_room(
            &room_id,
            ServerEvent::MembershipChanged {
                members: self.state.member_list(),
            },
        );
        if !player.display_name.trim().is_empty() {
            out.send_to_room(
                &room_id,
                ServerEvent::MemberLeft {
                    display_name: player.display_name,
                },
            );
        }
        if let Some(chooser_id) = handed_over {
            info!(%room_id, chooser = %chooser_id, "chooser left, role handed over");
            out.send_to_room(&room_id, ServerEvent::ChooserAdvanced { chooser_id });
        }

        Ok(())
    }

    // ---------------------------------------------------------------------
    // Round lifecycle
    // ---------------------------------------------------------------------

    /// The chooser submits the secret for a new round.
    ///
    /// Replaces any round in progress, starts the session clock on the
    /// first selection, and arms the guess timer.
    pub fn select_title<B>(&mut self, player_id: PlayerId, title: &str, now: Instant, out: &mut B)
    where
        B: Broadcaster + ?Sized,
    {
        let room_id = self.state.room_id().clone();

        if self.state.is_session_over() {
            debug!(%room_id, %player_id, "selection after session end, ignoring");
            return;
        }
        let title = title.trim();
        if title.is_empty() {
            debug!(%room_id, %player_id, "empty title, ignoring");
            return;
        }
        let chooser_id = match self.state.acting_chooser() {
            Some(chooser_id) if chooser_id == player_id => chooser_id,
            _ => {
                debug!(%room_id, %player_id, "selection from non-chooser, ignoring");
                return;
            }
        };

        self.state.start_session(now);

        let masked_title = mask::mask(title);
        self.state.set_round(Round::new(title, chooser_id));
        info!(%room_id, chooser = %chooser_id, "round started");

        out.send_to_room(
            &room_id,
            ServerEvent::RoundStarted {
                chooser_id,
                masked_title,
                strikes: Vec::new(),
                clue: None,
            },
        );

        self.timer.arm();
    }

    /// A player guesses a letter (one character) or the whole title.
    pub fn submit_guess<B>(&mut self, player_id: PlayerId, guess: &str, now: Instant, out: &mut B)
    where
        B: Broadcaster + ?Sized,
    {
        let room_id = self.state.room_id().clone();

        let Some(round) = self.state.round() else {
            debug!(%room_id, %player_id, "guess with no active round, ignoring");
            return;
        };
        if round.chooser_id() == player_id {
            debug!(%room_id, %player_id, "chooser guessing own title, ignoring");
            return;
        }
        if !self.state.contains(player_id) {
            debug!(%room_id, %player_id, "guess from non-member, ignoring");
            return;
        }

        // From here on the guess counts as activity: the pending idle
        // penalty is cancelled and only re-armed if the round survives.
        // An empty guess cancels it too, and re-arms nothing.
        self.timer.disarm();

        let Some(guess) = Guess::parse(guess) else {
            debug!(%room_id, %player_id, "empty guess, timer stays disarmed");
            return;
        };

        match guess {
            Guess::Title(title) => {
                if round.matches_title(&title) {
                    let points = self.config.title_reward(round.strikes().len());
                    self.state.award(player_id, points);
                    info!(%room_id, %player_id, points, "title guessed");
                    self.resolve_win(player_id, now, out);
                } else {
                    self.handle_wrong_guess(now, out);
                    self.rearm_if_active();
                }
            }
            Guess::Letter(letter) => {
                if !round.contains_letter(letter) {
                    self.handle_wrong_guess(now, out);
                    self.rearm_if_active();
                    return;
                }

                let Some(round) = self.state.round_mut() else {
                    return;
                };
                if !round.reveal(letter) {
                    debug!(%room_id, %player_id, %letter, "letter already revealed");
                    self.timer.arm();
                    return;
                }
                let masked_title = round.masked();
                let solved = round.is_solved();

                self.state.award(player_id, self.config.letter_reward);
                out.send_to_room(
                    &room_id,
                    ServerEvent::LettersRevealed {
                        masked_title,
                        scores: self.state.scores().clone(),
                    },
                );

                if solved {
                    info!(%room_id, %player_id, "title completed letter by letter");
                    self.resolve_win(player_id, now, out);
                } else {
                    self.timer.arm();
                }
            }
        }
    }

    /// Applies one strike to the active round.
    ///
    /// Shared by wrong guesses and idle timeouts. Saturates at the
    /// strike budget; the strike that reaches the budget loses the round.
    pub fn handle_wrong_guess<B>(&mut self, now: Instant, out: &mut B)
    where
        B: Broadcaster + ?Sized,
    {
        let room_id = self.state.room_id().clone();
        let budget = self.config.strike_budget();
        let clue_at = self.config.clue_at_strike;

        let Some(round) = self.state.round_mut() else {
            return;
        };
        let count = round.strikes().len();
        let Some(letter) = self.config.strike_letter(count).filter(|_| count < budget) else {
            trace!(%room_id, strikes = count, "strike budget exhausted");
            return;
        };

        round.push_strike(letter);
        let strikes = round.strikes().to_vec();
        debug!(%room_id, strikes = strikes.len(), "wrong guess");
        out.send_to_room(&room_id, ServerEvent::StrikesUpdated { strikes: strikes.clone() });

        if strikes.len() == clue_at {
            round.mark_clue_revealed();
            out.send_to_room(
                &room_id,
                ServerEvent::ClueRevealed {
                    clue: self.config.clue.clone(),
                },
            );
        }

        if strikes.len() == budget {
            self.resolve_loss(now, out);
        }
    }

    /// The guess timer ran out: penalise the idle room and count down again.
    pub fn on_timer_expired<B>(&mut self, now: Instant, out: &mut B)
    where
        B: Broadcaster + ?Sized,
    {
        info!(room_id = %self.state.room_id(), "guess timer expired, adding strike");
        self.handle_wrong_guess(now, out);
        self.rearm_if_active();
    }

    /// Hands the chooser role to the next member, or ends the session if
    /// its time is up.
    pub fn rotate_chooser<B>(&mut self, now: Instant, out: &mut B)
    where
        B: Broadcaster + ?Sized,
    {
        self.hand_over(now, true, out);
    }

    /// Ends the session if its time is up, otherwise announces the next
    /// chooser. With `advance` false the seat under the index is already
    /// the successor (its previous holder left mid-round).
    fn hand_over<B>(&mut self, now: Instant, advance: bool, out: &mut B)
    where
        B: Broadcaster + ?Sized,
    {
        let room_id = self.state.room_id().clone();
        if self.state.is_session_over() {
            return;
        }

        let expired = self
            .state
            .session_elapsed(now)
            .is_some_and(|elapsed| elapsed >= self.config.session_duration);
        if expired {
            self.state.end_session();
            self.timer.disarm();
            info!(%room_id, "session over");
            out.send_to_room(
                &room_id,
                ServerEvent::SessionEnded {
                    message: self.config.session_over_message.clone(),
                },
            );
            return;
        }

        let next = if advance {
            self.state.advance_chooser()
        } else {
            self.state.chooser().map(|p| p.id)
        };
        if let Some(chooser_id) = next {
            info!(%room_id, chooser = %chooser_id, "next chooser");
            out.send_to_room(&room_id, ServerEvent::ChooserAdvanced { chooser_id });
        }
    }

    // ---------------------------------------------------------------------
    // Resolution
    // ---------------------------------------------------------------------

    fn resolve_win<B>(&mut self, winner: PlayerId, now: Instant, out: &mut B)
    where
        B: Broadcaster + ?Sized,
    {
        self.resolve(RoundResult::Win, Some(winner), now, out);
    }

    fn resolve_loss<B>(&mut self, now: Instant, out: &mut B)
    where
        B: Broadcaster + ?Sized,
    {
        self.resolve(RoundResult::Lose, None, now, out);
    }

    fn resolve<B>(&mut self, result: RoundResult, winner_id: Option<PlayerId>, now: Instant, out: &mut B)
    where
        B: Broadcaster + ?Sized,
    {
        let Some(round) = self.state.clear_round() else {
            return;
        };
        let room_id = self.state.room_id().clone();
        info!(%room_id, ?result, winner = ?winner_id, "round resolved");

        out.send_to_room(
            &room_id,
            ServerEvent::RoundResolved {
                result,
                winner_id,
                correct_title: round.secret().to_string(),
                scores: self.state.scores().clone(),
            },
        );
        self.timer.disarm();
        let chooser_stayed = self.state.contains(round.chooser_id());
        self.hand_over(now, chooser_stayed, out);
    }

    fn rearm_if_active(&mut self) {
        if self.state.round().is_some() {
            self.timer.arm();
        }
    }
}
