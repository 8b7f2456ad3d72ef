//! Integration tests for the room system: registry, actors, timers.
//!
//! Commands are processed in order by each room actor, so a
//! `room_info` round-trip after a fire-and-forget command is enough to
//! know the command has been applied and its events delivered.

use std::time::Duration;

use marquee_protocol::{PlayerId, RoomId, RoundResult, ServerEvent};
use marquee_room::{GameConfig, RoomError, RoomOutbound, RoomRegistry};
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

const A: PlayerId = PlayerId(1);
const B: PlayerId = PlayerId(2);
const C: PlayerId = PlayerId(3);

type Inbox = mpsc::UnboundedReceiver<RoomOutbound>;

fn room(id: &str) -> RoomId {
    RoomId::from(id)
}

/// Joins `player_id` to `room_id` and returns its inbox.
async fn join(registry: &mut RoomRegistry, player_id: PlayerId, room_id: &str) -> Inbox {
    let (tx, rx) = mpsc::unbounded_channel();
    registry
        .join(player_id, room(room_id), format!("{player_id}"), tx)
        .await
        .unwrap();
    rx
}

/// Everything delivered so far, without the room tag.
fn drain(rx: &mut Inbox) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(outbound) = rx.try_recv() {
        events.push(outbound.event);
    }
    events
}

/// Waits until the room has processed everything sent to it so far.
async fn settle(registry: &RoomRegistry, room_id: &str) {
    registry.room_info(&room(room_id)).await.unwrap();
}

// =========================================================================
// Registry
// =========================================================================

#[tokio::test]
async fn test_room_created_on_first_join() {
    let mut registry = RoomRegistry::default();
    assert_eq!(registry.room_count(), 0);

    let _rx = join(&mut registry, A, "R1").await;

    assert!(registry.contains_room(&room("R1")));
    let info = registry.room_info(&room("R1")).await.unwrap();
    assert_eq!(info.player_count, 1);
    assert_eq!(info.chooser, Some(A));
    assert_eq!(info.phase, "AwaitingSelection");
}

#[tokio::test]
async fn test_duplicate_join_rejected() {
    let mut registry = RoomRegistry::default();
    let _rx = join(&mut registry, A, "R1").await;

    let (tx, _rx2) = mpsc::unbounded_channel();
    let err = registry
        .join(A, room("R1"), "A".into(), tx)
        .await
        .unwrap_err();
    assert!(matches!(err, RoomError::AlreadyInRoom(..)));

    let info = registry.room_info(&room("R1")).await.unwrap();
    assert_eq!(info.player_count, 1);
}

#[tokio::test]
async fn test_one_connection_many_rooms() {
    let mut registry = RoomRegistry::default();
    let mut rx1 = join(&mut registry, A, "R1").await;
    let (tx, _) = mpsc::unbounded_channel();
    registry.join(A, room("R2"), "A".into(), tx).await.unwrap();

    assert_eq!(registry.room_count(), 2);
    assert_eq!(registry.rooms_of(A), vec![room("R1"), room("R2")]);

    settle(&registry, "R1").await;
    let tagged: Vec<_> = std::iter::from_fn(|| rx1.try_recv().ok()).collect();
    assert!(tagged.iter().all(|o| o.room_id == room("R1")));
}

#[tokio::test]
async fn test_unknown_room_is_not_found() {
    let registry = RoomRegistry::default();
    let err = registry
        .submit_guess(A, &room("nowhere"), "a".into())
        .await
        .unwrap_err();
    assert!(matches!(err, RoomError::NotFound(_)));

    let err = registry
        .select_title(A, &room("nowhere"), "ET".into())
        .await
        .unwrap_err();
    assert!(matches!(err, RoomError::NotFound(_)));
}

#[tokio::test]
async fn test_leave_not_in_room() {
    let mut registry = RoomRegistry::default();
    let _rx = join(&mut registry, A, "R1").await;
    let err = registry.leave(B, &room("R1")).await.unwrap_err();
    assert!(matches!(err, RoomError::NotInRoom(..)));
}

#[tokio::test]
async fn test_last_leave_reclaims_room() {
    let mut registry = RoomRegistry::default();
    let _a = join(&mut registry, A, "R1").await;
    let _b = join(&mut registry, B, "R1").await;

    registry.leave(A, &room("R1")).await.unwrap();
    assert!(registry.contains_room(&room("R1")));

    registry.leave(B, &room("R1")).await.unwrap();
    assert!(!registry.contains_room(&room("R1")));
    assert!(matches!(
        registry.room_info(&room("R1")).await,
        Err(RoomError::NotFound(_))
    ));
    assert!(registry.rooms_of(B).is_empty());
}

#[tokio::test]
async fn test_rejoin_after_reclaim_starts_fresh() {
    let mut registry = RoomRegistry::default();
    let _a = join(&mut registry, A, "R1").await;
    registry
        .select_title(A, &room("R1"), "ET".into())
        .await
        .unwrap();
    registry.leave(A, &room("R1")).await.unwrap();

    let _b = join(&mut registry, B, "R1").await;
    let info = registry.room_info(&room("R1")).await.unwrap();
    assert_eq!(info.chooser, Some(B));
    assert!(!info.is_round_active());
    assert!(!info.scores.contains_key(&A));
}

#[tokio::test]
async fn test_disconnect_leaves_every_room() {
    let mut registry = RoomRegistry::default();
    let _a1 = join(&mut registry, A, "R1").await;
    let (tx, _a2) = mpsc::unbounded_channel();
    registry.join(A, room("R2"), "A".into(), tx).await.unwrap();
    let mut b = join(&mut registry, B, "R1").await;
    drain(&mut b);

    let left = registry.disconnect(A).await;
    assert_eq!(left, vec![room("R1"), room("R2")]);
    assert!(!registry.contains_room(&room("R2")), "R2 is now empty");
    assert!(registry.rooms_of(A).is_empty());

    settle(&registry, "R1").await;
    let events = drain(&mut b);
    assert!(matches!(&events[0], ServerEvent::MembershipChanged { members } if members.len() == 1));
    assert_eq!(events[1], ServerEvent::MemberLeft { display_name: "P-1".into() });
    assert_eq!(events[2], ServerEvent::ChooserAdvanced { chooser_id: B });
}

#[tokio::test]
async fn test_leaver_stops_receiving() {
    let mut registry = RoomRegistry::default();
    let mut a = join(&mut registry, A, "R1").await;
    let mut b = join(&mut registry, B, "R1").await;
    let _c = join(&mut registry, C, "R1").await;

    registry.leave(B, &room("R1")).await.unwrap();
    settle(&registry, "R1").await;
    drain(&mut a);
    drain(&mut b);

    registry
        .select_title(A, &room("R1"), "ET".into())
        .await
        .unwrap();
    settle(&registry, "R1").await;
    assert_eq!(drain(&mut a).len(), 1);
    assert!(drain(&mut b).is_empty());
}

// =========================================================================
// Rounds over channels
// =========================================================================

#[tokio::test]
async fn test_round_events_reach_every_member() {
    let mut registry = RoomRegistry::default();
    let mut a = join(&mut registry, A, "R1").await;
    let mut b = join(&mut registry, B, "R1").await;

    registry
        .select_title(A, &room("R1"), "ET".into())
        .await
        .unwrap();
    registry
        .submit_guess(B, &room("R1"), "t".into())
        .await
        .unwrap();
    settle(&registry, "R1").await;

    let a_events = drain(&mut a);
    assert_eq!(a_events[2], ServerEvent::ChooserAdvanced { chooser_id: A });
    let b_events = drain(&mut b);
    assert_eq!(
        &b_events[..3],
        &[
            ServerEvent::MembershipChanged {
                members: vec![
                    marquee_protocol::Member { player_id: A, display_name: "P-1".into() },
                    marquee_protocol::Member { player_id: B, display_name: "P-2".into() },
                ],
            },
            ServerEvent::MemberJoined { display_name: "P-2".into() },
            ServerEvent::ChooserAdvanced { chooser_id: A },
        ]
    );

    // From the round start on, both see the same sequence.
    let tail = |events: &[ServerEvent]| -> Vec<ServerEvent> {
        let start = events
            .iter()
            .position(|e| matches!(e, ServerEvent::RoundStarted { .. }))
            .unwrap();
        events[start..].to_vec()
    };
    assert_eq!(tail(&a_events), tail(&b_events));

    let tail = tail(&b_events);
    assert_eq!(
        tail[0],
        ServerEvent::RoundStarted {
            chooser_id: A,
            masked_title: "E _".into(),
            strikes: vec![],
            clue: None,
        }
    );
    assert!(matches!(&tail[1], ServerEvent::LettersRevealed { masked_title, .. } if masked_title == "E T"));
    assert!(matches!(
        &tail[2],
        ServerEvent::RoundResolved { result: RoundResult::Win, winner_id: Some(B), .. }
    ));
    assert_eq!(tail[3], ServerEvent::ChooserAdvanced { chooser_id: B });

    let info = registry.room_info(&room("R1")).await.unwrap();
    assert_eq!(info.scores[&B], 10);
    assert!(!info.timer_armed);
}

#[tokio::test]
async fn test_late_joiner_catches_up() {
    let mut registry = RoomRegistry::default();
    let _a = join(&mut registry, A, "R1").await;
    let _b = join(&mut registry, B, "R1").await;
    registry
        .select_title(A, &room("R1"), "Vikram".into())
        .await
        .unwrap();
    registry
        .submit_guess(B, &room("R1"), "k".into())
        .await
        .unwrap();

    let mut c = join(&mut registry, C, "R1").await;
    let events = drain(&mut c);
    assert_eq!(
        &events[2..],
        &[
            ServerEvent::RoundStarted {
                chooser_id: A,
                masked_title: "_ i k _ a _".into(),
                strikes: vec![],
                clue: None,
            },
            ServerEvent::ChooserAdvanced { chooser_id: A },
        ]
    );
}

// =========================================================================
// Timers (paused clock)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_idle_round_gets_a_strike_every_timeout() {
    let mut registry = RoomRegistry::default();
    let mut a = join(&mut registry, A, "R1").await;
    let _b = join(&mut registry, B, "R1").await;
    registry
        .select_title(A, &room("R1"), "Jai Bhim".into())
        .await
        .unwrap();
    settle(&registry, "R1").await;
    drain(&mut a);

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert_eq!(registry.room_info(&room("R1")).await.unwrap().strikes, 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let info = registry.room_info(&room("R1")).await.unwrap();
    assert_eq!(info.strikes, 1);
    assert!(info.timer_armed);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(registry.room_info(&room("R1")).await.unwrap().strikes, 2);

    assert_eq!(
        drain(&mut a),
        vec![
            ServerEvent::StrikesUpdated { strikes: vec!['K'] },
            ServerEvent::StrikesUpdated { strikes: vec!['K', 'O'] },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_guess_restarts_the_countdown() {
    let mut registry = RoomRegistry::default();
    let _a = join(&mut registry, A, "R1").await;
    let _b = join(&mut registry, B, "R1").await;
    registry
        .select_title(A, &room("R1"), "Jai Bhim".into())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(20)).await;
    registry
        .submit_guess(B, &room("R1"), "j".into())
        .await
        .unwrap();
    settle(&registry, "R1").await;

    // 40 s after selection, but only 20 s after the guess.
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(registry.room_info(&room("R1")).await.unwrap().strikes, 0);

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(registry.room_info(&room("R1")).await.unwrap().strikes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_idle_round_is_lost_after_nine_timeouts() {
    let mut registry = RoomRegistry::default();
    let mut a = join(&mut registry, A, "R1").await;
    let _b = join(&mut registry, B, "R1").await;
    registry
        .select_title(A, &room("R1"), "Jai Bhim".into())
        .await
        .unwrap();
    settle(&registry, "R1").await;
    drain(&mut a);

    tokio::time::sleep(Duration::from_secs(9 * 30 + 1)).await;
    let info = registry.room_info(&room("R1")).await.unwrap();
    assert!(!info.is_round_active());
    assert!(!info.timer_armed);
    assert_eq!(info.chooser, Some(B));

    let events = drain(&mut a);
    let clues = events
        .iter()
        .filter(|e| matches!(e, ServerEvent::ClueRevealed { .. }))
        .count();
    assert_eq!(clues, 1);
    assert!(events.contains(&ServerEvent::RoundResolved {
        result: RoundResult::Lose,
        winner_id: None,
        correct_title: "Jai Bhim".into(),
        scores: [(A, 0), (B, 0)].into_iter().collect(),
    }));
    assert_eq!(events.last(), Some(&ServerEvent::ChooserAdvanced { chooser_id: B }));

    // Nothing further happens while nobody selects.
    tokio::time::sleep(Duration::from_secs(120)).await;
    settle(&registry, "R1").await;
    assert!(drain(&mut a).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_session_ends_at_first_rotation_past_duration() {
    let config = GameConfig {
        session_duration: Duration::from_secs(60),
        ..GameConfig::default()
    };
    let mut registry = RoomRegistry::new(config);
    let mut a = join(&mut registry, A, "R1").await;
    let _b = join(&mut registry, B, "R1").await;
    registry
        .select_title(A, &room("R1"), "ET".into())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(61)).await;
    registry
        .submit_guess(B, &room("R1"), "t".into())
        .await
        .unwrap();
    let info = registry.room_info(&room("R1")).await.unwrap();
    assert!(info.is_session_over());
    assert!(!info.timer_armed);

    let events = drain(&mut a);
    assert_eq!(
        events.last(),
        Some(&ServerEvent::SessionEnded {
            message: "Game Over! Session ended.".into()
        })
    );

    // Terminal: no more timers, selections or guesses.
    registry
        .select_title(A, &room("R1"), "Jailer".into())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(300)).await;
    settle(&registry, "R1").await;
    assert!(drain(&mut a).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_empty_room_drops_its_timer() {
    let mut registry = RoomRegistry::default();
    let _a = join(&mut registry, A, "R1").await;
    let _b = join(&mut registry, B, "R1").await;
    registry
        .select_title(A, &room("R1"), "ET".into())
        .await
        .unwrap();

    registry.disconnect(A).await;
    registry.disconnect(B).await;
    assert_eq!(registry.room_count(), 0);

    // Reclaimed rooms must not fire anything.
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(registry.room_count(), 0);
}
