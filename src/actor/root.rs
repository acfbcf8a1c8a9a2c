use kameo::{
    actor::{Actor, ActorID, ActorRef, WeakActorRef},
    error::{ActorStopReason, Infallible},
    message::{Context, Message},
    reply::{Reply, ReplyError},
};
use std::collections::HashMap;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::actor::client::{ClientActor, ClientActorArgs};
use crate::actor::messages::{CreateClient, SubscriberCount, UnsubscribeAll};
use crate::coordinator::WorkerContext;
use crate::protocol::Channel;

/// Worker-level session registry. Spawns-and-links one [`ClientActor`] per
/// authorized connection; its link supervision is the single deregistration
/// path, so a session that dies for any reason (explicit close, transport
/// error, failed send) is removed from the hub exactly once.
pub struct Root {
    ctx: Arc<WorkerContext>,
    clients: HashMap<ActorID, ActorRef<ClientActor>>,
}

impl Root {
    pub fn new(ctx: Arc<WorkerContext>) -> Self {
        Self { ctx, clients: HashMap::new() }
    }
}

impl Actor for Root {
    type Args = Self;
    type Error = Infallible;

    async fn on_start(state: Self::Args, _: ActorRef<Self>) -> Result<Self, Self::Error> {
        Ok(state)
    }

    fn on_link_died(&mut self, _: WeakActorRef<Self>, id: ActorID, _reason: ActorStopReason) -> impl Future<Output = Result<ControlFlow<ActorStopReason>, Self::Error>> + Send {
        if self.clients.remove(&id).is_some() {
            debug!("session {id} disconnected");
            let ctx = Arc::clone(&self.ctx);
            // Deregistration and the ephemeral-chat policy run off the
            // registry loop; an in-flight mutation is never cancelled by a
            // disconnect.
            tokio::spawn(async move {
                let _ = ctx.hub.tell(UnsubscribeAll { client_id: id }).send().await;
                let remaining = ctx.hub.ask(SubscriberCount(Channel::Chat)).send().await.unwrap_or(0);
                if remaining == 0 {
                    // Ephemeral-chat policy: the room's history does not
                    // outlive its last participant.
                    if let Err(e) = ctx.chat.delete_all().await {
                        warn!("failed to clear chat after last session left: {e}");
                    }
                }
            });
        }
        async { Ok(ControlFlow::Continue(())) }
    }
}

impl Message<CreateClient> for Root {
    type Reply = ActorRef<ClientActor>;

    async fn handle(&mut self, msg: CreateClient, ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let args = ClientActorArgs {
            socket: msg.socket,
            identity: msg.identity,
            ctx: Arc::clone(&self.ctx),
        };
        let client = ClientActor::spawn_link(ctx.actor_ref(), args).await;
        debug!("session {} connected", client.id());
        self.clients.insert(client.id(), client.clone());
        client
    }
}

/// Number of live sessions on this worker.
pub struct SessionCount;

impl Message<SessionCount> for Root {
    type Reply = usize;

    async fn handle(&mut self, _: SessionCount, _: &mut Context<Self, Self::Reply>) -> usize {
        self.clients.len()
    }
}
