//! The websocket gateway. Client events come in as JSON text frames and are routed to the
//! room manager, collab events are pumped out to the sockets they are addressed to.

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::sync::mpsc::{self, UnboundedSender};
use vibes_collab::{
    Collab, CollabEvent, ConnectionId, Dispatch, EventReceiver, Recipients, RoomError,
    SuggestionId,
};
use vibes_core::PlaybackChange;

use crate::{
    auth::Session,
    context::ServerContext,
    schemas::{
        AddTrackSchema, ClientEvent, IndexSchema, JoinRoomSchema, MessageSchema,
        PlaybackChangeSchema, RoomSchema, SearchSchema, SuggestionSchema,
    },
    serialized::ServerEvent,
    Router,
};

/// Keeps the outgoing half of every open socket
#[derive(Default)]
pub struct Gateway {
    sockets: DashMap<ConnectionId, UnboundedSender<String>>,
}

impl Gateway {
    pub fn new() -> Arc<Self> {
        Default::default()
    }

    fn register(&self, connection_id: ConnectionId, sender: UnboundedSender<String>) {
        self.sockets.insert(connection_id, sender);
    }

    fn unregister(&self, connection_id: ConnectionId) {
        self.sockets.remove(&connection_id);
    }

    /// Serializes the event once and queues it on every recipient's socket.
    pub fn deliver(&self, dispatch: Dispatch) {
        let name = dispatch.event.name();

        let text = match serde_json::to_string(&ServerEvent::from(dispatch.event)) {
            Ok(text) => text,
            Err(e) => {
                warn!("Could not serialize {}: {}", name, e);
                return;
            }
        };

        match dispatch.recipients {
            Recipients::Everyone => {
                for socket in self.sockets.iter() {
                    let _ = socket.send(text.clone());
                }
            }
            Recipients::Connections(connections) => {
                for connection_id in connections {
                    if let Some(socket) = self.sockets.get(&connection_id) {
                        let _ = socket.send(text.clone());
                    }
                }
            }
        }
    }

    /// Sends an event to a single connection, outside of the collab system.
    fn send_to(&self, connection_id: ConnectionId, event: CollabEvent) {
        self.deliver(Dispatch {
            recipients: Recipients::Connections(vec![connection_id]),
            event,
        })
    }
}

/// Drains the collab event channel into the sockets.
/// Runs on a blocking thread since the channel is a crossbeam one.
pub fn pump_events(gateway: Arc<Gateway>, events: EventReceiver) {
    tokio::task::spawn_blocking(move || {
        while let Ok(dispatch) = events.recv() {
            gateway.deliver(dispatch);
        }

        debug!("Event channel closed, stopping the pump");
    });
}

async fn upgrade(
    session: Session,
    State(context): State<ServerContext>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, session, context))
}

async fn handle_socket(socket: WebSocket, session: Session, context: ServerContext) {
    let user = session.user();
    let connection_id = context.collab.rooms.connect(user.clone());

    let (sender, mut receiver) = mpsc::unbounded_channel::<String>();
    context.gateway.register(connection_id, sender);

    info!("{} connected to the gateway", user.display_name);

    match context.collab.rooms.lobby().await {
        Ok(lobby) => context
            .gateway
            .send_to(connection_id, CollabEvent::LobbyUpdate(lobby)),
        Err(e) => warn!("Could not load the lobby for {}: {}", user.display_name, e),
    }

    let (mut outgoing, mut incoming) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(text) = receiver.recv().await {
            if outgoing.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let reader = async {
        while let Some(Ok(message)) = incoming.next().await {
            match message {
                Message::Text(text) => handle_text(&context, connection_id, &text).await,
                Message::Close(_) => break,
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = reader => {},
        _ = &mut writer => {},
    }

    writer.abort();
    context.gateway.unregister(connection_id);
    context.collab.rooms.disconnect(connection_id);

    info!("{} disconnected from the gateway", user.display_name);
}

async fn handle_text(context: &ServerContext, connection_id: ConnectionId, text: &str) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            debug!("Connection {} sent an unreadable event: {}", connection_id, e);
            return notice(context, connection_id, "That request could not be understood");
        }
    };

    if let Err(e) = event.validate() {
        debug!("Connection {} sent an invalid event: {}", connection_id, e);
        return notice(context, connection_id, "That request is invalid");
    }

    if let Err(e) = handle_event(&context.collab, connection_id, event).await {
        warn!("Request from connection {} failed: {}", connection_id, e);
    }
}

async fn handle_event(
    collab: &Arc<Collab>,
    connection_id: ConnectionId,
    event: ClientEvent,
) -> Result<(), RoomError> {
    let rooms = &collab.rooms;

    match event {
        ClientEvent::JoinRoom(JoinRoomSchema { slug }) => rooms.join(connection_id, &slug).await,
        ClientEvent::CreateRoom(body) => rooms
            .create_room(connection_id, &body.name, body.vibe.into())
            .await
            .map(|_| ()),
        ClientEvent::LeaveRoom(RoomSchema { room_id }) => {
            rooms.leave(connection_id, room_id).await
        }
        ClientEvent::SendMessage(MessageSchema { room_id, text }) => {
            rooms.send_message(connection_id, room_id, &text)
        }
        ClientEvent::HostPlaybackChange(PlaybackChangeSchema {
            room_id,
            position,
            is_playing,
        }) => {
            let change = PlaybackChange {
                position: position.map(Duration::from_millis),
                is_playing,
            };

            rooms.change_playback(connection_id, room_id, change)
        }
        ClientEvent::SkipTrack(RoomSchema { room_id }) => rooms.skip(connection_id, room_id),
        ClientEvent::PlayPrevTrack(RoomSchema { room_id }) => {
            rooms.play_previous(connection_id, room_id)
        }
        ClientEvent::PlayTrackAtIndex(IndexSchema { room_id, index }) => {
            rooms.play_track_at_index(connection_id, room_id, usize::try_from(index).ok())
        }
        ClientEvent::DeleteTrack(IndexSchema { room_id, index }) => match usize::try_from(index) {
            Ok(index) => rooms.delete_track(connection_id, room_id, index),
            Err(_) => Ok(()),
        },
        ClientEvent::ApproveSuggestion(SuggestionSchema {
            room_id,
            suggestion_id,
        }) => rooms.approve_suggestion(
            connection_id,
            room_id,
            SuggestionId::from_value(suggestion_id),
        ),
        ClientEvent::RejectSuggestion(SuggestionSchema {
            room_id,
            suggestion_id,
        }) => rooms.reject_suggestion(
            connection_id,
            room_id,
            SuggestionId::from_value(suggestion_id),
        ),
        // Lookups can take a while, the connection keeps being served meanwhile
        ClientEvent::AddTrack(AddTrackSchema { room_id, query }) => {
            let collab = collab.clone();

            tokio::spawn(async move {
                if let Err(e) = collab.rooms.add_track(connection_id, room_id, &query).await {
                    warn!("Adding {:?} failed: {}", query, e);
                }
            });

            Ok(())
        }
        ClientEvent::Search(SearchSchema { query }) => {
            let collab = collab.clone();

            tokio::spawn(async move {
                if let Err(e) = collab.rooms.search(connection_id, &query).await {
                    warn!("Searching {:?} failed: {}", query, e);
                }
            });

            Ok(())
        }
    }
}

fn notice(context: &ServerContext, connection_id: ConnectionId, message: &str) {
    context.gateway.send_to(
        connection_id,
        CollabEvent::Notice {
            message: message.to_string(),
        },
    )
}

pub fn router() -> Router {
    Router::new().route("/gateway", get(upgrade))
}
