use axum::extract::ws::WebSocket;
use kameo::actor::{ActorID, ActorRef};

use crate::actor::client::ClientActor;
use crate::auth::Identity;
use crate::protocol::{Channel, ServerEvent};

/// Promote an authorized transport connection to a session.
pub struct CreateClient {
    pub socket: WebSocket,
    pub identity: Identity,
}

/// Add a session to a channel's member set. Idempotent.
pub struct Subscribe {
    pub client: ActorRef<ClientActor>,
    pub channel: Channel,
}

/// Remove a session from one channel. Safe if never subscribed.
pub struct Unsubscribe {
    pub client_id: ActorID,
    pub channel: Channel,
}

/// Remove a session from every channel. Safe and idempotent.
pub struct UnsubscribeAll {
    pub client_id: ActorID,
}

/// Fan an event out to every live member of a channel.
pub struct Publish {
    pub channel: Channel,
    pub event: ServerEvent,
}

/// Number of sessions currently subscribed to a channel.
pub struct SubscriberCount(pub Channel);

/// Push one event down a session's socket.
pub struct Outbound(pub ServerEvent);

/// First message a session handles: register with the hub and push the
/// current snapshots to this connection only.
pub struct SyncOnJoin;
