//! Wire protocol: event envelopes exchanged over the WebSocket, broadcast
//! channels, and the record shape shared by both collections.
//!
//! Frames are JSON text in an externally tagged envelope:
//! `{"event": "addProduct", "data": {"title": "A", "price": 10}}`.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Store-assigned record identifier. Immutable after create, never reused
/// within a collection during a process lifetime.
pub type RecordId = u64;

/// A single record: opaque JSON fields behind a store-assigned id.
///
/// Serializes flat, with the id merged into the object:
/// `{"id": 1, "title": "A", "price": 10}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// String field accessor, used for the chat sender announcement.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// A named broadcast scope. Events published on one channel are never
/// delivered to subscribers of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Catalog snapshots (`productsList`).
    Products,
    /// Chat snapshots (`chat`).
    Chat,
    /// Lightweight sender announcements (`email`).
    ChatSenders,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Products, Channel::Chat, Channel::ChatSenders];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Products => "products",
            Channel::Chat => "chat",
            Channel::ChatSenders => "chat-senders",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutation intents issued by clients.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// New catalog record, fields only; the store assigns the id.
    AddProduct(Map<String, Value>),
    /// Replace the fields of an existing catalog record.
    EditProduct(EditProduct),
    /// Remove a catalog record.
    DeleteProduct(DeleteProduct),
    /// Append a chat message.
    Msn(Map<String, Value>),
}

#[derive(Debug, Deserialize)]
pub struct EditProduct {
    pub id: RecordId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteProduct {
    pub id: RecordId,
}

/// Events pushed to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Full ordered catalog snapshot.
    ProductsList(Vec<Record>),
    /// Full ordered chat snapshot.
    Chat(Vec<Record>),
    /// Sender announcement: the new message author's email.
    Email(String),
    /// Structured acknowledgment for a failed mutation.
    ErrorAck(ErrorAck),
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorAck {
    pub code: String,
    pub message: String,
}

impl ServerEvent {
    /// Build the error acknowledgment for a failed operation.
    pub fn error_ack(err: &Error) -> Self {
        ServerEvent::ErrorAck(ErrorAck { code: err.code().to_string(), message: err.to_string() })
    }

    /// Serialize to a wire frame.
    pub fn to_frame(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn add_product_frame_parses() {
        let frame = r#"{"event":"addProduct","data":{"title":"A","price":10}}"#;
        match serde_json::from_str::<ClientEvent>(frame).unwrap() {
            ClientEvent::AddProduct(fields) => {
                assert_eq!(fields.get("title"), Some(&json!("A")));
                assert_eq!(fields.get("price"), Some(&json!(10)));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn edit_product_keeps_id_out_of_fields() {
        let frame = r#"{"event":"editProduct","data":{"id":3,"title":"B"}}"#;
        match serde_json::from_str::<ClientEvent>(frame).unwrap() {
            ClientEvent::EditProduct(edit) => {
                assert_eq!(edit.id, 3);
                assert_eq!(edit.fields.get("title"), Some(&json!("B")));
                assert!(edit.fields.get("id").is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn delete_and_msn_frames_parse() {
        let del = r#"{"event":"deleteProduct","data":{"id":7}}"#;
        assert!(matches!(
            serde_json::from_str::<ClientEvent>(del).unwrap(),
            ClientEvent::DeleteProduct(DeleteProduct { id: 7 })
        ));

        let msn = r#"{"event":"msn","data":{"email":"a@x.com","message":"hi"}}"#;
        match serde_json::from_str::<ClientEvent>(msn).unwrap() {
            ClientEvent::Msn(fields) => assert_eq!(fields.get("email"), Some(&json!("a@x.com"))),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn snapshot_serializes_records_flat() {
        let mut fields = Map::new();
        fields.insert("title".into(), json!("A"));
        fields.insert("price".into(), json!(10));
        let event = ServerEvent::ProductsList(vec![Record { id: 1, fields }]);

        let frame: Value = serde_json::from_str(&event.to_frame().unwrap()).unwrap();
        assert_eq!(frame["event"], "productsList");
        assert_eq!(frame["data"], json!([{"id": 1, "title": "A", "price": 10}]));
    }

    #[test]
    fn email_and_error_ack_shapes() {
        let email: Value =
            serde_json::from_str(&ServerEvent::Email("a@x.com".into()).to_frame().unwrap()).unwrap();
        assert_eq!(email, json!({"event": "email", "data": "a@x.com"}));

        let ack = ServerEvent::error_ack(&Error::NotFound(9));
        let frame: Value = serde_json::from_str(&ack.to_frame().unwrap()).unwrap();
        assert_eq!(frame["event"], "errorAck");
        assert_eq!(frame["data"]["code"], "NOT_FOUND");
    }

    #[test]
    fn unknown_event_is_rejected() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"nope","data":{}}"#).is_err());
    }
}
