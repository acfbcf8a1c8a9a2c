use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use kameo::{
    actor::{Actor, ActorRef},
    error::Infallible,
    message::{Context as KameoContext, Message, StreamMessage},
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::actor::messages::{Outbound, Subscribe, SyncOnJoin};
use crate::auth::Identity;
use crate::coordinator::WorkerContext;
use crate::error::Error;
use crate::protocol::{Channel, ClientEvent, ServerEvent};

pub struct ClientActorArgs {
    pub socket: WebSocket,
    pub identity: Identity,
    pub ctx: Arc<WorkerContext>,
}

/// One live connection: owns the socket's send half, receives the receive
/// half as a message stream, and dispatches mutation intents to the
/// coordinators. Authorization happened at upgrade and is immutable here.
pub struct ClientActor {
    sink: SplitSink<WebSocket, WsMessage>,
    identity: Identity,
    ctx: Arc<WorkerContext>,
}

impl Actor for ClientActor {
    type Args = ClientActorArgs;
    type Error = Infallible;

    async fn on_start(args: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        let (sink, stream) = args.socket.split();
        // Enqueued before the stream attaches, so the join snapshot is
        // pushed before any inbound frame is handled.
        let _ = actor_ref.tell(SyncOnJoin).send().await;
        actor_ref.attach_stream(stream, (), "ws");
        Ok(Self { sink, identity: args.identity, ctx: args.ctx })
    }
}

impl Message<SyncOnJoin> for ClientActor {
    type Reply = ();

    async fn handle(&mut self, _: SyncOnJoin, ctx: &mut KameoContext<Self, Self::Reply>) {
        for channel in self.ctx.channels.clone() {
            let _ = self
                .ctx
                .hub
                .tell(Subscribe { client: ctx.actor_ref().clone(), channel })
                .send()
                .await;
        }

        // Sync on join: current snapshots go to this session only. Store
        // trouble degrades to an empty catalog rather than blocking the
        // connection.
        if self.ctx.channels.contains(&Channel::Products) {
            let products = match self.ctx.products.read_all().await {
                Ok(products) => products,
                Err(e) => {
                    warn!("catalog snapshot unavailable on join: {e}");
                    Vec::new()
                }
            };
            self.send_event(ServerEvent::ProductsList(products), ctx).await;
        }

        if self.ctx.channels.contains(&Channel::Chat) {
            match self.ctx.chat.read_all().await {
                Ok(messages) if !messages.is_empty() => {
                    self.send_event(ServerEvent::Chat(messages), ctx).await;
                }
                Ok(_) => {}
                Err(e) => warn!("chat snapshot unavailable on join: {e}"),
            }
        }
    }
}

impl Message<StreamMessage<std::result::Result<WsMessage, axum::Error>, (), &'static str>> for ClientActor {
    type Reply = ();

    async fn handle(&mut self, msg: StreamMessage<std::result::Result<WsMessage, axum::Error>, (), &'static str>, ctx: &mut KameoContext<Self, Self::Reply>) {
        match msg {
            StreamMessage::Next(Ok(WsMessage::Text(text))) => {
                let event = match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        debug!("unrecognized frame from {}: {e}", ctx.actor_ref().id());
                        let err = Error::BadRequest(e.to_string());
                        self.send_event(ServerEvent::error_ack(&err), ctx).await;
                        return;
                    }
                };
                if let Err(e) = dispatch(event, &self.identity, &self.ctx).await {
                    debug!("mutation failed for {}: {e}", ctx.actor_ref().id());
                    self.send_event(ServerEvent::error_ack(&e), ctx).await;
                }
            }
            StreamMessage::Next(Ok(WsMessage::Ping(data))) => {
                if self.sink.send(WsMessage::Pong(data)).await.is_err() {
                    ctx.actor_ref().kill();
                }
            }
            StreamMessage::Next(Ok(WsMessage::Close(_))) | StreamMessage::Finished(_) => {
                ctx.actor_ref().kill();
            }
            StreamMessage::Next(Err(_)) => ctx.actor_ref().kill(),
            _ => {}
        }
    }
}

impl Message<Outbound> for ClientActor {
    type Reply = ();

    async fn handle(&mut self, msg: Outbound, ctx: &mut KameoContext<Self, Self::Reply>) {
        self.send_event(msg.0, ctx).await;
    }
}

impl ClientActor {
    async fn send_event(&mut self, event: ServerEvent, ctx: &mut KameoContext<Self, ()>) {
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("failed to encode outbound event: {e}");
                return;
            }
        };
        if self.sink.send(WsMessage::Text(frame.into())).await.is_err() {
            ctx.actor_ref().kill();
        }
    }
}

/// Event dispatch: one handler per mutation intent. Each handler is a pure
/// function of (session identity, payload, coordinator) so it can be
/// exercised without a socket.
async fn dispatch(event: ClientEvent, identity: &Identity, ctx: &WorkerContext) -> Result<(), Error> {
    match event {
        ClientEvent::AddProduct(fields) => {
            ctx.products.create(fields).await?;
        }
        ClientEvent::EditProduct(edit) => {
            ctx.products.update(edit.id, edit.fields).await?;
        }
        ClientEvent::DeleteProduct(del) => {
            ctx.products.delete(del.id).await?;
        }
        ClientEvent::Msn(mut fields) => {
            // A message from an authenticated session is attributed to that
            // session's user when the payload left the sender blank.
            if !fields.contains_key("email") {
                if let Some(user) = &identity.user {
                    fields.insert("email".into(), serde_json::Value::String(user.clone()));
                }
            }
            ctx.chat.create(fields).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::hub::Hub;
    use crate::coordinator::Coordinator;
    use crate::error::Error;
    use crate::store::MemoryStore;
    use kameo::actor::Actor as _;
    use serde_json::{json, Map};

    fn context() -> (WorkerContext, Arc<MemoryStore>, Arc<MemoryStore>) {
        let hub = Hub::spawn(Hub::new());
        let products_store = Arc::new(MemoryStore::new());
        let chat_store = Arc::new(MemoryStore::new());
        let ctx = WorkerContext {
            hub: hub.clone(),
            products: Coordinator::new(products_store.clone(), hub.clone(), Channel::Products),
            chat: Coordinator::with_announcement(
                chat_store.clone(),
                hub,
                Channel::Chat,
                Channel::ChatSenders,
            ),
            channels: Channel::ALL.to_vec(),
        };
        (ctx, products_store, chat_store)
    }

    fn parse(frame: &str) -> ClientEvent {
        serde_json::from_str(frame).unwrap()
    }

    #[tokio::test]
    async fn add_product_handler_writes_the_catalog() {
        let (ctx, products, _) = context();
        let event = parse(r#"{"event":"addProduct","data":{"title":"A","price":10}}"#);
        dispatch(event, &Identity::default(), &ctx).await.unwrap();

        let all = products.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, 1);
        assert_eq!(all[0].str_field("title"), Some("A"));
    }

    #[tokio::test]
    async fn delete_product_on_missing_id_is_not_found() {
        let (ctx, products, _) = context();
        let event = parse(r#"{"event":"deleteProduct","data":{"id":1}}"#);
        let err = dispatch(event, &Identity::default(), &ctx).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(1)));
        assert!(products.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn msn_handler_appends_in_order() {
        let (ctx, _, chat) = context();
        for (email, message) in [("a@x.com", "hi"), ("b@x.com", "hello")] {
            let mut fields = Map::new();
            fields.insert("email".into(), json!(email));
            fields.insert("message".into(), json!(message));
            dispatch(ClientEvent::Msn(fields), &Identity::default(), &ctx).await.unwrap();
        }
        let all = chat.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].str_field("email"), Some("b@x.com"));
    }

    #[tokio::test]
    async fn msn_handler_fills_sender_from_identity() {
        let (ctx, _, chat) = context();
        let identity = Identity { user: Some("a@x.com".into()) };
        let mut fields = Map::new();
        fields.insert("message".into(), json!("hi"));
        dispatch(ClientEvent::Msn(fields), &identity, &ctx).await.unwrap();

        assert_eq!(chat.all().await.unwrap()[0].str_field("email"), Some("a@x.com"));
    }
}
