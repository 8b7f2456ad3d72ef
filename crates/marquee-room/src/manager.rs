//! Room registry: creates rooms on demand, routes connections to them,
//! and reclaims rooms once their last member leaves.

use std::collections::{HashMap, HashSet};

use marquee_protocol::{PlayerId, RoomId};

use crate::room::spawn_room;
use crate::{GameConfig, PlayerSender, RoomError, RoomHandle, RoomInfo};

/// Default command channel size for room actors.
pub const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Tracks every live room and which rooms each connection belongs to.
///
/// This is the entry point for room operations from the connection
/// handlers. A connection may sit in any number of rooms at once.
pub struct RoomRegistry {
    config: GameConfig,
    channel_size: usize,

    /// Live rooms, keyed by room ID.
    rooms: HashMap<RoomId, RoomHandle>,

    /// Rooms each connection has joined.
    memberships: HashMap<PlayerId, HashSet<RoomId>>,
}

impl RoomRegistry {
    /// Creates an empty registry; rooms it spawns play by `config`.
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            channel_size: DEFAULT_CHANNEL_SIZE,
            rooms: HashMap::new(),
            memberships: HashMap::new(),
        }
    }

    /// Sets the command queue length for rooms created from now on.
    pub fn with_channel_size(mut self, channel_size: usize) -> Self {
        self.channel_size = channel_size.max(1);
        self
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    fn is_member(&self, player_id: PlayerId, room_id: &RoomId) -> bool {
        self.memberships
            .get(&player_id)
            .is_some_and(|rooms| rooms.contains(room_id))
    }

    fn handle(&self, room_id: &RoomId) -> Result<&RoomHandle, RoomError> {
        self.rooms
            .get(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))
    }

    /// Adds a connection to a room, creating the room if it doesn't
    /// exist yet.
    pub async fn join(
        &mut self,
        player_id: PlayerId,
        room_id: RoomId,
        display_name: String,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        if self.is_member(player_id, &room_id) {
            return Err(RoomError::AlreadyInRoom(player_id, room_id));
        }

        let handle = match self.rooms.get(&room_id) {
            Some(handle) => handle.clone(),
            None => {
                let handle =
                    spawn_room(room_id.clone(), self.config.clone(), self.channel_size);
                self.rooms.insert(room_id.clone(), handle.clone());
                tracing::info!(%room_id, "room created");
                handle
            }
        };

        if let Err(err) = handle.join(player_id, display_name, sender).await {
            if matches!(err, RoomError::Unavailable(_)) {
                tracing::warn!(%room_id, "room actor gone, dropping handle");
                self.rooms.remove(&room_id);
            }
            return Err(err);
        }

        self.memberships
            .entry(player_id)
            .or_default()
            .insert(room_id);
        Ok(())
    }

    /// Routes a title selection to a room.
    pub async fn select_title(
        &self,
        player_id: PlayerId,
        room_id: &RoomId,
        title: String,
    ) -> Result<(), RoomError> {
        self.handle(room_id)?.select_title(player_id, title).await
    }

    /// Routes a guess to a room.
    pub async fn submit_guess(
        &self,
        player_id: PlayerId,
        room_id: &RoomId,
        guess: String,
    ) -> Result<(), RoomError> {
        self.handle(room_id)?.submit_guess(player_id, guess).await
    }

    /// Removes a connection from one room. An emptied room is shut down.
    pub async fn leave(&mut self, player_id: PlayerId, room_id: &RoomId) -> Result<(), RoomError> {
        if !self.is_member(player_id, room_id) {
            return Err(RoomError::NotInRoom(player_id, room_id.clone()));
        }
        if let Some(rooms) = self.memberships.get_mut(&player_id) {
            rooms.remove(room_id);
            if rooms.is_empty() {
                self.memberships.remove(&player_id);
            }
        }
        self.leave_room(player_id, room_id).await
    }

    /// Removes a connection from every room it joined. Returns the
    /// rooms it was removed from.
    pub async fn disconnect(&mut self, player_id: PlayerId) -> Vec<RoomId> {
        let mut rooms: Vec<RoomId> = self
            .memberships
            .remove(&player_id)
            .map(|rooms| rooms.into_iter().collect())
            .unwrap_or_default();
        rooms.sort();

        for room_id in &rooms {
            if let Err(err) = self.leave_room(player_id, room_id).await {
                tracing::warn!(%room_id, %player_id, error = %err, "leave on disconnect failed");
            }
        }
        rooms
    }

    async fn leave_room(&mut self, player_id: PlayerId, room_id: &RoomId) -> Result<(), RoomError> {
        let handle = self.handle(room_id)?.clone();
        let remaining = match handle.leave(player_id).await {
            Ok(remaining) => remaining,
            Err(RoomError::Unavailable(_)) => 0,
            Err(err) => return Err(err),
        };
        if remaining == 0 {
            self.reclaim(room_id).await;
        }
        Ok(())
    }

    /// Shuts down an empty room and forgets it.
    async fn reclaim(&mut self, room_id: &RoomId) {
        if let Some(handle) = self.rooms.remove(room_id) {
            let _ = handle.shutdown().await;
            tracing::info!(%room_id, "room reclaimed");
        }
    }

    /// Returns info about a specific room.
    pub async fn room_info(&self, room_id: &RoomId) -> Result<RoomInfo, RoomError> {
        self.handle(room_id)?.get_info().await
    }

    /// Rooms a connection currently belongs to, sorted.
    pub fn rooms_of(&self, player_id: PlayerId) -> Vec<RoomId> {
        let mut rooms: Vec<RoomId> = self
            .memberships
            .get(&player_id)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    /// Returns the number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn contains_room(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Lists all live room IDs, sorted.
    pub fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(GameConfig::default())
    }
}
