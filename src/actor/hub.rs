use kameo::{
    actor::{Actor, ActorID, ActorRef},
    error::Infallible,
    message::{Context as KameoContext, Message},
};
use std::collections::HashMap;
use tracing::debug;

use crate::actor::client::ClientActor;
use crate::actor::messages::{Outbound, Publish, Subscribe, SubscriberCount, Unsubscribe, UnsubscribeAll};
use crate::protocol::Channel;

/// Broadcast hub: the per-worker registry of live sessions, keyed by the
/// channel they subscribe to.
///
/// Fan-out is best-effort: publishing to N members is O(N) with no
/// atomicity across them. A member that died mid-publish is skipped; its
/// entry is removed when the session deregisters.
pub struct Hub {
    channels: HashMap<Channel, HashMap<ActorID, ActorRef<ClientActor>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self { channels: HashMap::new() }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Actor for Hub {
    type Args = Self;
    type Error = Infallible;

    async fn on_start(state: Self::Args, _: ActorRef<Self>) -> Result<Self, Self::Error> {
        Ok(state)
    }
}

impl Message<Subscribe> for Hub {
    type Reply = ();

    async fn handle(&mut self, msg: Subscribe, _: &mut KameoContext<Self, Self::Reply>) {
        self.channels
            .entry(msg.channel)
            .or_default()
            .insert(msg.client.id(), msg.client);
    }
}

impl Message<Unsubscribe> for Hub {
    type Reply = ();

    async fn handle(&mut self, msg: Unsubscribe, _: &mut KameoContext<Self, Self::Reply>) {
        if let Some(members) = self.channels.get_mut(&msg.channel) {
            members.remove(&msg.client_id);
        }
    }
}

impl Message<UnsubscribeAll> for Hub {
    type Reply = ();

    async fn handle(&mut self, msg: UnsubscribeAll, _: &mut KameoContext<Self, Self::Reply>) {
        for members in self.channels.values_mut() {
            members.remove(&msg.client_id);
        }
    }
}

impl Message<Publish> for Hub {
    type Reply = ();

    async fn handle(&mut self, msg: Publish, _: &mut KameoContext<Self, Self::Reply>) {
        let Some(members) = self.channels.get(&msg.channel) else { return };
        debug!("publishing on {} to {} sessions", msg.channel, members.len());
        // Deliveries are enqueued member by member so every session observes
        // events in publish order; a dead member's error is dropped without
        // failing the rest of the fan-out.
        for client in members.values() {
            let _ = client.tell(Outbound(msg.event.clone())).send().await;
        }
    }
}

impl Message<SubscriberCount> for Hub {
    type Reply = usize;

    async fn handle(&mut self, SubscriberCount(channel): SubscriberCount, _: &mut KameoContext<Self, Self::Reply>) -> usize {
        self.channels.get(&channel).map_or(0, HashMap::len)
    }
}
