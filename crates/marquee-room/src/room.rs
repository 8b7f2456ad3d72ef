//! Room actor: an isolated Tokio task that owns one room's session.
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel. The task multiplexes two event sources, the
//! command channel and the round timer, so every state change for a
//! room happens on one task, one event at a time.

use std::collections::HashMap;

use marquee_protocol::{PlayerId, RoomId, Scoreboard, ServerEvent};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::state::RoomState;
use crate::{Broadcaster, GameConfig, RoomController, RoomError};

/// An event on its way from a room to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomOutbound {
    /// The room the event came from. A connection may be in several.
    pub room_id: RoomId,
    pub event: ServerEvent,
}

/// Channel sender for delivering outbound events to a connection.
pub type PlayerSender = mpsc::UnboundedSender<RoomOutbound>;

/// Commands sent to a room actor through its channel.
///
/// Variants carrying a `oneshot::Sender` expect a reply; the rest are
/// fire-and-forget.
pub(crate) enum RoomCommand {
    /// Add a connection to the room.
    Join {
        player_id: PlayerId,
        display_name: String,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Remove a connection. Replies with how many members remain.
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<usize, RoomError>>,
    },

    /// The chooser's secret title.
    SelectTitle { player_id: PlayerId, title: String },

    /// A letter or full-title guess.
    SubmitGuess { player_id: PlayerId, guess: String },

    /// Request a snapshot of room metadata.
    GetInfo { reply: oneshot::Sender<RoomInfo> },

    /// Stop the actor.
    Shutdown,
}

/// A snapshot of a room, for queries and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub player_count: usize,
    /// Who may select right now. `None` while a round runs without its
    /// chooser, and after the session ends.
    pub chooser: Option<PlayerId>,
    /// `AwaitingSelection`, `Active` or `SessionOver`.
    pub phase: &'static str,
    /// Masked title of the active round.
    pub masked_title: Option<String>,
    /// Strikes in the active round (0 when there is none).
    pub strikes: usize,
    pub scores: Scoreboard,
    /// Whether the guess countdown is running.
    pub timer_armed: bool,
}

impl RoomInfo {
    fn from_state(state: &RoomState, timer_armed: bool) -> Self {
        let round = state.round();
        Self {
            room_id: state.room_id().clone(),
            player_count: state.len(),
            chooser: state.acting_chooser(),
            phase: state.phase().name(),
            masked_title: round.map(|r| r.masked()),
            strikes: round.map_or(0, |r| r.strikes().len()),
            scores: state.scores().clone(),
            timer_armed,
        }
    }

    pub fn is_round_active(&self) -> bool {
        self.phase == "Active"
    }

    pub fn is_session_over(&self) -> bool {
        self.phase == "SessionOver"
    }
}

/// Handle to a running room actor. Used to send commands to it.
///
/// Cheap to clone: it's just an `mpsc::Sender` wrapper. The
/// [`RoomRegistry`](crate::RoomRegistry) holds one of these per room.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.room_id.clone())
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender.send(cmd).await.map_err(|_| self.unavailable())
    }

    /// Sends a join request to the room.
    pub async fn join(
        &self,
        player_id: PlayerId,
        display_name: String,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Join {
            player_id,
            display_name,
            sender,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Sends a leave request. Returns the number of members left.
    pub async fn leave(&self, player_id: PlayerId) -> Result<usize, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Leave {
            player_id,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Forwards a title selection (fire-and-forget).
    pub async fn select_title(&self, player_id: PlayerId, title: String) -> Result<(), RoomError> {
        self.send(RoomCommand::SelectTitle { player_id, title }).await
    }

    /// Forwards a guess (fire-and-forget).
    pub async fn submit_guess(&self, player_id: PlayerId, guess: String) -> Result<(), RoomError> {
        self.send(RoomCommand::SubmitGuess { player_id, guess }).await
    }

    /// Requests the current room info.
    pub async fn get_info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::GetInfo { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Tells the room to shut down.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.send(RoomCommand::Shutdown).await
    }
}

/// Per-connection delivery for one room's members.
struct Delivery {
    room_id: RoomId,
    senders: HashMap<PlayerId, PlayerSender>,
}

impl Delivery {
    /// Silently drops if the receiver is gone (connection closing).
    fn deliver(sender: &PlayerSender, room_id: &RoomId, event: ServerEvent) {
        let _ = sender.send(RoomOutbound {
            room_id: room_id.clone(),
            event,
        });
    }
}

impl Broadcaster for Delivery {
    fn send_to_room(&mut self, room_id: &RoomId, event: ServerEvent) {
        for sender in self.senders.values() {
            Self::deliver(sender, room_id, event.clone());
        }
    }

    fn send_to_connection(&mut self, player_id: PlayerId, event: ServerEvent) {
        if let Some(sender) = self.senders.get(&player_id) {
            Self::deliver(sender, &self.room_id, event);
        }
    }
}

/// What woke the actor up.
enum Wakeup {
    Command(RoomCommand),
    Timer,
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room_id: RoomId,
    controller: RoomController,
    delivery: Delivery,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop until shutdown or until every handle is dropped.
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id, "room actor started");

        loop {
            let wakeup = tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => Wakeup::Command(cmd),
                    None => break,
                },
                expiry = self.controller.timer_mut().expired() => {
                    tracing::debug!(
                        room_id = %self.room_id,
                        expiration = expiry.expiration,
                        late_ms = expiry.late_by.as_millis() as u64,
                        "guess timer fired"
                    );
                    Wakeup::Timer
                }
            };

            match wakeup {
                Wakeup::Timer => {
                    self.controller
                        .on_timer_expired(Instant::now(), &mut self.delivery);
                }
                Wakeup::Command(RoomCommand::Shutdown) => {
                    tracing::info!(room_id = %self.room_id, "room shutting down");
                    break;
                }
                Wakeup::Command(cmd) => self.handle(cmd),
            }
        }

        tracing::info!(room_id = %self.room_id, "room actor stopped");
    }

    fn handle(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                player_id,
                display_name,
                sender,
                reply,
            } => {
                let _ = reply.send(self.handle_join(player_id, display_name, sender));
            }
            RoomCommand::Leave { player_id, reply } => {
                let _ = reply.send(self.handle_leave(player_id));
            }
            RoomCommand::SelectTitle { player_id, title } => {
                self.controller
                    .select_title(player_id, &title, Instant::now(), &mut self.delivery);
            }
            RoomCommand::SubmitGuess { player_id, guess } => {
                self.controller
                    .submit_guess(player_id, &guess, Instant::now(), &mut self.delivery);
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown => {}
        }
    }

    fn handle_join(
        &mut self,
        player_id: PlayerId,
        display_name: String,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        if self.controller.state().contains(player_id) {
            return Err(RoomError::AlreadyInRoom(player_id, self.room_id.clone()));
        }
        // Registered first so the joiner sees its own join events.
        self.delivery.senders.insert(player_id, sender);
        let result = self
            .controller
            .join(player_id, display_name, &mut self.delivery);
        if result.is_err() {
            self.delivery.senders.remove(&player_id);
        }
        result
    }

    fn handle_leave(&mut self, player_id: PlayerId) -> Result<usize, RoomError> {
        if !self.controller.state().contains(player_id) {
            return Err(RoomError::NotInRoom(player_id, self.room_id.clone()));
        }
        self.delivery.senders.remove(&player_id);
        self.controller.leave(player_id, &mut self.delivery)?;
        Ok(self.controller.state().len())
    }

    fn info(&self) -> RoomInfo {
        RoomInfo::from_state(self.controller.state(), self.controller.timer().is_armed())
    }
}

/// Spawns a new room actor task and returns a handle to communicate with it.
///
/// `channel_size` bounds the command queue; when it fills up, senders
/// wait.
pub(crate) fn spawn_room(room_id: RoomId, config: GameConfig, channel_size: usize) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);

    let actor = RoomActor {
        room_id: room_id.clone(),
        controller: RoomController::new(RoomState::new(room_id.clone()), config),
        delivery: Delivery {
            room_id: room_id.clone(),
            senders: HashMap::new(),
        },
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle { room_id, sender: tx }
}
