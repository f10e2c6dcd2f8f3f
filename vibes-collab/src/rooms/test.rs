use std::{sync::Arc, time::Duration};

use tokio::time::advance;
use vibes_core::{Config, PlaybackChange};

use crate::{
    testing::{settle, track, Harness},
    CollabEvent, ConnectionId, Recipients, UserData, Vibe, VibeKind,
};

use super::{Room, RoomError, TimerKind};

const SLUG: &str = "chill-abc123";

/// A room with a host, who joined through the returned connection
async fn hosted_room(h: &Harness) -> (Arc<Room>, ConnectionId, UserData) {
    h.db.insert_room(SLUG, "Chill", None);

    let (connection, user) = h.connect(1, "Host");
    h.collab.rooms.join(connection, SLUG).await.unwrap();

    let room = h.collab.rooms.room_by_slug(SLUG).unwrap();
    (room, connection, user)
}

async fn join_guest(h: &Harness, id: i32, name: &str) -> ConnectionId {
    let (connection, _) = h.connect(id, name);
    h.collab.rooms.join(connection, SLUG).await.unwrap();

    connection
}

/// Adds the tracks as host and lets the first one start.
async fn add_as_host(h: &Harness, room: &Room, host: ConnectionId, ids: &[&str]) {
    let query = ids.join(",");
    h.resolver
        .add(&query, ids.iter().map(|id| track(id, 180)).collect());

    h.collab
        .rooms
        .add_track(host, room.id(), &query)
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_first_join_assigns_host() {
    let h = Harness::new();
    let (room, host, _) = hosted_room(&h).await;

    let outbox = h.drain();
    let names = outbox.names(host);

    assert_eq!(names[0], "roomState");
    assert_eq!(names[1], "hostAssigned");
    assert_eq!(room.host_id(), Some(1));
    assert_eq!(h.db.room_by_id(room.id()).unwrap().host_id, Some(1));
    assert_eq!(
        outbox.announcements(host),
        vec!["Host joined the room".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_second_join_updates_roster_of_others() {
    let h = Harness::new();
    let (room, host, _) = hosted_room(&h).await;
    h.drain();

    let guest = join_guest(&h, 2, "Guest").await;
    let outbox = h.drain();

    assert_eq!(room.host_id(), Some(1));
    assert_eq!(outbox.count(guest, "hostAssigned"), 0);
    assert_eq!(outbox.count(guest, "roomState"), 1);
    assert_eq!(outbox.count(host, "roomState"), 0);

    let counts: Vec<_> = outbox
        .received(host)
        .into_iter()
        .filter_map(|e| match e {
            CollabEvent::UpdateListenerCount(count) => Some(count),
            _ => None,
        })
        .collect();

    assert_eq!(counts, vec![2]);
    assert!(outbox
        .announcements(host)
        .contains(&"Guest joined the room".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_slug_reports_room_not_found() {
    let h = Harness::new();
    let (connection, _) = h.connect(1, "Someone");

    h.collab.rooms.join(connection, "nope").await.unwrap();

    assert_eq!(h.drain().names(connection), vec!["roomNotFound"]);
    assert!(h.collab.rooms.list_all().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_join_refreshes_lobby() {
    let h = Harness::new();
    let (_, host, _) = hosted_room(&h).await;

    let lobby = h
        .drain()
        .received(host)
        .into_iter()
        .find_map(|e| match e {
            CollabEvent::LobbyUpdate(lobby) => Some(lobby),
            _ => None,
        })
        .unwrap();

    assert_eq!(lobby.rooms.len(), 1);
    assert_eq!(lobby.rooms[0].listener_count, 1);
    assert_eq!(lobby.vibes.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_loads_share_one_room() {
    let h = Harness::new();
    h.db.insert_room(SLUG, "Chill", None);

    let (a, b) = tokio::join!(
        h.collab.rooms.get_or_load(SLUG),
        h.collab.rooms.get_or_load(SLUG)
    );

    assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    assert_eq!(h.collab.rooms.list_all().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_create_room_joins_creator_as_host() {
    let h = Harness::new();
    let (connection, _) = h.connect(1, "Creator");

    let vibe = Vibe {
        name: "Study".to_string(),
        kind: VibeKind::Custom,
    };

    let room = h
        .collab
        .rooms
        .create_room(connection, "Late Night", vibe)
        .await
        .unwrap();

    assert!(room.slug().starts_with("late-night-"));
    assert_eq!(room.host_id(), Some(1));
    assert!(h.db.room_by_id(room.id()).is_some());

    let outbox = h.drain();
    assert_eq!(outbox.count(connection, "roomState"), 1);
    assert_eq!(outbox.count(connection, "hostAssigned"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_create_keeps_nothing_in_memory() {
    let h = Harness::new();
    let (connection, _) = h.connect(1, "Creator");
    h.db.fail_writes(true);

    let vibe = Vibe {
        name: "Chill".to_string(),
        kind: VibeKind::Preset,
    };

    let result = h.collab.rooms.create_room(connection, "Broken", vibe).await;

    assert!(matches!(result, Err(RoomError::Database(_))));
    assert!(h.collab.rooms.list_all().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_host_adding_to_empty_playlist_starts_playback() {
    let h = Harness::new();
    let (room, host, _) = hosted_room(&h).await;
    h.drain();

    add_as_host(&h, &room, host, &["a"]).await;

    let outbox = h.drain();
    assert_eq!(outbox.names(host), vec!["playlistUpdated", "newSongPlaying"]);

    let snapshot = room.playback_snapshot().unwrap();
    assert_eq!(snapshot.now_playing_index, 0);
    assert!(snapshot.is_playing);
    assert!(snapshot.position < Duration::from_millis(50));

    let timers = room.pending_timers();
    assert!(timers.contains(&TimerKind::TrackEnd));
    assert!(timers.contains(&TimerKind::Sync));
}

#[tokio::test(start_paused = true)]
async fn test_adding_while_playing_keeps_current_track() {
    let h = Harness::new();
    let (room, host, _) = hosted_room(&h).await;
    add_as_host(&h, &room, host, &["a"]).await;
    h.drain();

    add_as_host(&h, &room, host, &["b", "c"]).await;

    assert_eq!(h.drain().names(host), vec!["playlistUpdated"]);
    assert_eq!(room.playlist().len(), 3);
    assert_eq!(room.now_playing().unwrap().id, "a");
}

#[tokio::test(start_paused = true)]
async fn test_track_end_advances_after_slack() {
    let h = Harness::new();
    let (room, host, _) = hosted_room(&h).await;
    add_as_host(&h, &room, host, &["a", "b"]).await;

    advance(Duration::from_millis(181_499)).await;
    settle().await;
    assert_eq!(room.now_playing().unwrap().id, "a");

    advance(Duration::from_millis(2)).await;
    settle().await;
    assert_eq!(room.now_playing().unwrap().id, "b");

    advance(Duration::from_millis(181_500)).await;
    settle().await;
    assert_eq!(room.now_playing(), None);
    assert!(room.pending_timers().is_empty());

    let exhausted = h
        .drain()
        .received(host)
        .into_iter()
        .filter(|e| matches!(e, CollabEvent::NewSongPlaying(None)))
        .count();

    assert_eq!(exhausted, 1);
}

#[tokio::test(start_paused = true)]
async fn test_scrub_reschedules_track_end_from_scrub_instant() {
    let h = Harness::new();
    let (room, host, _) = hosted_room(&h).await;
    add_as_host(&h, &room, host, &["a"]).await;

    advance(Duration::from_secs(10)).await;
    settle().await;
    h.drain();

    h.collab
        .rooms
        .change_playback(
            host,
            room.id(),
            PlaybackChange {
                position: Some(Duration::from_secs(30)),
                is_playing: None,
            },
        )
        .unwrap();

    let pulse = h
        .drain()
        .received(host)
        .into_iter()
        .find_map(|e| match e {
            CollabEvent::SyncPulse(snapshot) => Some(snapshot),
            _ => None,
        })
        .unwrap();

    assert_eq!(pulse.position, Duration::from_secs(30));

    advance(Duration::from_millis(151_400)).await;
    settle().await;
    assert!(room.now_playing().is_some());

    advance(Duration::from_millis(200)).await;
    settle().await;
    assert!(room.now_playing().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_pause_freezes_position_and_timers() {
    let h = Harness::new();
    let (room, host, _) = hosted_room(&h).await;
    add_as_host(&h, &room, host, &["a"]).await;

    advance(Duration::from_secs(5)).await;
    settle().await;

    let pause = PlaybackChange {
        position: None,
        is_playing: Some(false),
    };
    h.collab.rooms.change_playback(host, room.id(), pause).unwrap();

    assert!(room.pending_timers().is_empty());

    advance(Duration::from_secs(600)).await;
    settle().await;

    let snapshot = room.playback_snapshot().unwrap();
    assert!(!snapshot.is_playing);
    assert_eq!(snapshot.position, Duration::from_secs(5));

    let resume = PlaybackChange {
        position: None,
        is_playing: Some(true),
    };
    h.collab.rooms.change_playback(host, room.id(), resume).unwrap();

    let snapshot = room.playback_snapshot().unwrap();
    assert!(snapshot.is_playing);
    assert_eq!(snapshot.position, Duration::from_secs(5));
    assert!(room.pending_timers().contains(&TimerKind::TrackEnd));
}

#[tokio::test(start_paused = true)]
async fn test_sync_pulses_only_while_playing() {
    let h = Harness::new();
    let (room, host, _) = hosted_room(&h).await;
    add_as_host(&h, &room, host, &["a"]).await;
    h.drain();

    for _ in 0..3 {
        advance(Duration::from_secs(4)).await;
        settle().await;
    }

    assert_eq!(h.drain().count(host, "syncPulse"), 3);

    let pause = PlaybackChange {
        position: None,
        is_playing: Some(false),
    };
    h.collab.rooms.change_playback(host, room.id(), pause).unwrap();
    h.drain();

    advance(Duration::from_secs(20)).await;
    settle().await;

    assert_eq!(h.drain().count(host, "syncPulse"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_deleting_current_track_plays_the_following() {
    let h = Harness::new();
    let (room, host, _) = hosted_room(&h).await;
    add_as_host(&h, &room, host, &["0", "1", "2", "3", "4"]).await;

    let rooms = &h.collab.rooms;
    rooms.play_track_at_index(host, room.id(), Some(2)).unwrap();
    rooms.delete_track(host, room.id(), 2).unwrap();

    let snapshot = room.playback_snapshot().unwrap();
    assert_eq!(snapshot.now_playing_index, 2);
    assert_eq!(snapshot.track.id, "3");
    assert_eq!(room.playlist().len(), 4);

    // Removing an earlier track keeps pointing at the same one
    rooms.delete_track(host, room.id(), 0).unwrap();

    let snapshot = room.playback_snapshot().unwrap();
    assert_eq!(snapshot.now_playing_index, 1);
    assert_eq!(snapshot.track.id, "3");

    // Out of range is ignored
    h.drain();
    rooms.delete_track(host, room.id(), 10).unwrap();
    assert!(h.drain().all().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_previous_and_negative_index() {
    let h = Harness::new();
    let (room, host, _) = hosted_room(&h).await;
    add_as_host(&h, &room, host, &["a", "b"]).await;

    let rooms = &h.collab.rooms;

    rooms.play_previous(host, room.id()).unwrap();
    assert_eq!(room.now_playing().unwrap().id, "a");

    rooms.skip(host, room.id()).unwrap();
    rooms.play_previous(host, room.id()).unwrap();
    assert_eq!(room.now_playing().unwrap().id, "a");

    rooms.play_track_at_index(host, room.id(), None).unwrap();
    assert_eq!(room.now_playing(), None);
    assert!(room.pending_timers().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_guest_tracks_become_suggestions() {
    let h = Harness::new();
    let (room, host, _) = hosted_room(&h).await;
    let guest = join_guest(&h, 2, "Guest").await;
    h.resolver.add("song", vec![track("s", 200)]);
    h.resolver.add("other", vec![track("o", 200)]);
    h.drain();

    let rooms = &h.collab.rooms;
    rooms.add_track(guest, room.id(), "song").await.unwrap();
    rooms.add_track(guest, room.id(), "other").await.unwrap();

    assert!(room.playlist().is_empty());
    assert_eq!(h.drain().count(host, "suggestionsUpdated"), 2);

    let suggestions = room.suggestions();
    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[0].suggested_by.id, 2);

    // Only the host decides
    rooms
        .approve_suggestion(guest, room.id(), suggestions[0].id)
        .unwrap();
    assert_eq!(room.suggestions().len(), 2);

    rooms
        .approve_suggestion(host, room.id(), suggestions[0].id)
        .unwrap();
    rooms
        .reject_suggestion(host, room.id(), suggestions[1].id)
        .unwrap();

    assert!(room.suggestions().is_empty());
    assert_eq!(room.playlist(), vec![track("s", 200)]);
    assert_eq!(room.now_playing().unwrap().id, "s");
}

#[tokio::test(start_paused = true)]
async fn test_host_only_requests_are_ignored_for_guests() {
    let h = Harness::new();
    let (room, host, _) = hosted_room(&h).await;
    add_as_host(&h, &room, host, &["a", "b"]).await;
    let guest = join_guest(&h, 2, "Guest").await;
    h.drain();

    let rooms = &h.collab.rooms;
    rooms.skip(guest, room.id()).unwrap();
    rooms.delete_track(guest, room.id(), 0).unwrap();
    rooms.play_track_at_index(guest, room.id(), Some(1)).unwrap();
    rooms
        .change_playback(
            guest,
            room.id(),
            PlaybackChange {
                position: Some(Duration::from_secs(90)),
                is_playing: None,
            },
        )
        .unwrap();

    assert!(h.drain().all().is_empty());
    assert_eq!(room.now_playing().unwrap().id, "a");
    assert_eq!(room.playlist().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_requests_for_other_rooms_are_rejected() {
    let h = Harness::new();
    let (room, _, _) = hosted_room(&h).await;
    let (outsider, _) = h.connect(9, "Outsider");

    assert!(matches!(
        h.collab.rooms.skip(outsider, room.id()),
        Err(RoomError::NotInRoom)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_resolution_failure_sends_notice() {
    let h = Harness::new();
    let (room, host, _) = hosted_room(&h).await;
    let guest = join_guest(&h, 2, "Guest").await;
    h.drain();

    h.collab
        .rooms
        .add_track(host, room.id(), "does not exist")
        .await
        .unwrap();

    let outbox = h.drain();
    assert_eq!(outbox.names(host), vec!["notice"]);
    assert!(outbox.received(guest).is_empty());
    assert!(room.playlist().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_slow_resolution_times_out() {
    let h = Harness::new();
    let (room, host, _) = hosted_room(&h).await;
    h.resolver.add("slow", vec![track("a", 100)]);
    h.resolver.set_delay(Duration::from_secs(30));
    h.drain();

    h.collab.rooms.add_track(host, room.id(), "slow").await.unwrap();

    let notice = h
        .drain()
        .received(host)
        .into_iter()
        .find_map(|e| match e {
            CollabEvent::Notice { message } => Some(message),
            _ => None,
        })
        .unwrap();

    assert!(notice.contains("took too long"));
    assert!(room.playlist().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_room_deleted_while_resolving() {
    let h = Harness::with_config(Config {
        room_deletion_grace: Duration::from_secs(1),
        ..Default::default()
    });
    let (room, host, _) = hosted_room(&h).await;
    let room_id = room.id();
    drop(room);

    h.resolver.add("slow", vec![track("a", 100)]);
    h.resolver.set_delay(Duration::from_secs(5));

    let collab = h.collab.clone();
    let task = tokio::spawn(async move { collab.rooms.add_track(host, room_id, "slow").await });
    settle().await;

    h.collab.rooms.leave(host, room_id).await.unwrap();

    assert!(task.await.unwrap().is_ok());
    assert!(h.collab.rooms.list_all().is_empty());
    assert!(h.db.room_by_id(room_id).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_chat_messages() {
    let h = Harness::with_config(Config {
        max_message_length: 5,
        ..Default::default()
    });
    let (room, host, user) = hosted_room(&h).await;
    h.drain();

    let rooms = &h.collab.rooms;
    rooms.send_message(host, room.id(), "   ").unwrap();
    rooms.send_message(host, room.id(), "hello world").unwrap();

    let messages: Vec<_> = h
        .drain()
        .received(host)
        .into_iter()
        .filter_map(|e| match e {
            CollabEvent::NewChatMessage(message) => Some(message),
            _ => None,
        })
        .collect();

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text, "hello");
    assert_eq!(messages[0].user, Some(user));
    assert!(!messages[0].system);
}

#[tokio::test(start_paused = true)]
async fn test_search_results_go_to_requester() {
    let h = Harness::new();
    let (_, host, _) = hosted_room(&h).await;
    let guest = join_guest(&h, 2, "Guest").await;
    h.resolver.add("lofi", vec![track("a", 100), track("b", 100)]);
    h.drain();

    h.collab.rooms.search(guest, "lofi").await.unwrap();

    let outbox = h.drain();
    assert!(outbox.received(host).is_empty());

    match &outbox.received(guest)[..] {
        [CollabEvent::SearchResults { query, tracks }] => {
            assert_eq!(query, "lofi");
            assert_eq!(tracks.len(), 2);
        }
        other => panic!("unexpected events {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_leave_is_harmless() {
    let h = Harness::new();
    let (room, host, _) = hosted_room(&h).await;
    let guest = join_guest(&h, 2, "Guest").await;
    h.drain();

    h.collab.rooms.leave(guest, room.id()).await.unwrap();
    h.collab.rooms.leave(guest, room.id()).await.unwrap();
    room.leave(2).await;

    assert_eq!(room.listener_count(), 1);

    let outbox = h.drain();
    assert_eq!(
        outbox.announcements(host),
        vec!["Guest left the room".to_string()]
    );
    assert_eq!(outbox.count(host, "updateListenerCount"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_host_leaving_promotes_earliest_listener() {
    let h = Harness::new();
    let (room, host, _) = hosted_room(&h).await;
    let first = join_guest(&h, 2, "First").await;
    let second = join_guest(&h, 3, "Second").await;
    h.drain();

    h.collab.rooms.leave(host, room.id()).await.unwrap();

    let outbox = h.drain();
    let assignments: Vec<_> = outbox
        .all()
        .iter()
        .filter(|d| matches!(d.event, CollabEvent::HostAssigned))
        .collect();

    assert_eq!(assignments.len(), 1);
    assert_eq!(
        assignments[0].recipients,
        Recipients::Connections(vec![first])
    );
    assert_eq!(outbox.count(second, "hostAssigned"), 0);

    assert_eq!(room.host_id(), Some(2));
    assert_eq!(h.db.room_by_id(room.id()).unwrap().host_id, Some(2));
    assert!(outbox
        .announcements(second)
        .contains(&"First is now the host".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_within_grace_is_silent() {
    let h = Harness::new();
    let (room, host, _) = hosted_room(&h).await;
    let guest = join_guest(&h, 2, "Guest").await;
    h.drain();

    h.collab.rooms.disconnect(guest);
    assert!(room.pending_timers().contains(&TimerKind::Reconnect(2)));

    advance(Duration::from_secs(5)).await;
    settle().await;

    join_guest(&h, 2, "Guest").await;
    assert!(!room.pending_timers().contains(&TimerKind::Reconnect(2)));

    advance(Duration::from_secs(20)).await;
    settle().await;

    assert_eq!(room.listener_count(), 2);
    assert!(h.drain().announcements(host).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_without_reconnect_leaves_after_grace() {
    let h = Harness::new();
    let (room, host, _) = hosted_room(&h).await;
    let guest = join_guest(&h, 2, "Guest").await;
    h.drain();

    h.collab.rooms.disconnect(guest);
    h.collab.rooms.disconnect(guest);

    advance(Duration::from_millis(9_900)).await;
    settle().await;
    assert_eq!(room.listener_count(), 2);

    advance(Duration::from_millis(100)).await;
    settle().await;
    assert_eq!(room.listener_count(), 1);
    assert_eq!(
        h.drain().announcements(host),
        vec!["Guest left the room".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_closing_an_old_connection_keeps_listener() {
    let h = Harness::new();
    let (room, _, _) = hosted_room(&h).await;
    let old = join_guest(&h, 2, "Guest").await;
    join_guest(&h, 2, "Guest").await;

    h.collab.rooms.disconnect(old);

    assert!(!room.pending_timers().contains(&TimerKind::Reconnect(2)));
    assert_eq!(room.listener_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_empty_room_is_deleted_after_grace() {
    let h = Harness::new();
    let (room, host, _) = hosted_room(&h).await;
    add_as_host(&h, &room, host, &["a"]).await;
    let room_id = room.id();
    drop(room);

    h.collab.rooms.leave(host, room_id).await.unwrap();

    advance(Duration::from_secs(29)).await;
    settle().await;
    assert!(h.collab.rooms.room_by_id(room_id).is_some());

    advance(Duration::from_secs(1)).await;
    settle().await;
    assert!(h.collab.rooms.room_by_id(room_id).is_none());
    assert!(h.db.room_by_id(room_id).is_none());

    let lobby = h
        .drain()
        .all()
        .iter()
        .rev()
        .find_map(|d| match &d.event {
            CollabEvent::LobbyUpdate(lobby) => Some(lobby.clone()),
            _ => None,
        })
        .unwrap();

    assert!(lobby.rooms.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_join_while_deleting_finds_no_room() {
    let h = Harness::new();
    let (room, host, _) = hosted_room(&h).await;
    let room_id = room.id();
    drop(room);

    h.db.delay_deletes(Duration::from_secs(1));
    h.collab.rooms.leave(host, room_id).await.unwrap();

    advance(Duration::from_secs(30)).await;
    settle().await;

    // The row is still there, the room is closed but not yet gone
    assert!(h.db.room_by_id(room_id).is_some());
    assert!(h.collab.rooms.room_by_slug(SLUG).is_some());
    assert!(h.collab.rooms.list_all().is_empty());
    h.drain();

    let late = join_guest(&h, 2, "Late").await;
    assert_eq!(h.drain().names(late), vec!["roomNotFound"]);

    advance(Duration::from_secs(1)).await;
    settle().await;

    assert!(h.db.room_by_id(room_id).is_none());
    assert!(h.collab.rooms.room_by_slug(SLUG).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_join_cancels_pending_deletion() {
    let h = Harness::new();
    let (room, host, _) = hosted_room(&h).await;

    h.collab.rooms.leave(host, room.id()).await.unwrap();
    assert!(room.pending_timers().contains(&TimerKind::RoomDeletion));

    advance(Duration::from_secs(20)).await;
    settle().await;

    let newcomer = join_guest(&h, 4, "Newcomer").await;

    advance(Duration::from_secs(60)).await;
    settle().await;

    assert!(h.collab.rooms.room_by_id(room.id()).is_some());
    assert_eq!(room.listener_count(), 1);
    assert_eq!(room.host_id(), Some(4));
    assert_eq!(h.drain().count(newcomer, "hostAssigned"), 1);
}
