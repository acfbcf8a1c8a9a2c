//! Connection authorization.
//!
//! A connection is authorized exactly once, during the WebSocket upgrade,
//! against whatever the deployment uses as its session store. A credential
//! that was valid at connect time is treated as valid for the life of the
//! connection; there is no mid-session re-validation.

use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// HTTP request info captured at WebSocket upgrade.
#[derive(Clone, Default)]
pub struct RequestInfo {
    pub headers: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    pub credential: Option<String>,
}

impl RequestInfo {
    /// Capture headers and query params, extracting the session credential:
    /// `token` query parameter, then `sid` session cookie, then bearer token.
    pub fn new(headers: HashMap<String, String>, query_params: HashMap<String, String>) -> Self {
        let credential = query_params
            .get("token")
            .cloned()
            .or_else(|| headers.get("cookie").and_then(|c| cookie_value(c, "sid")))
            .or_else(|| {
                headers
                    .get("authorization")
                    .and_then(|h| h.strip_prefix("Bearer ").map(|t| t.to_string()))
            });
        Self { headers, query_params, credential }
    }
}

fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then(|| v.to_string())
    })
}

/// Who a connection belongs to, as established at connect time.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub user: Option<String>,
}

/// Decides whether an inbound connection may become a session.
///
/// Must complete before the connection is promoted; a denied connection
/// never reaches the mutation path.
#[async_trait]
pub trait AuthGate: Send + Sync {
    async fn authorize(&self, request: &RequestInfo) -> Result<Identity>;
}

/// Accepts every connection. Development default.
pub struct AllowAll;

#[async_trait]
impl AuthGate for AllowAll {
    async fn authorize(&self, _request: &RequestInfo) -> Result<Identity> {
        Ok(Identity::default())
    }
}

/// Credential → user lookup over an in-memory table, standing in for an
/// external session store.
#[derive(Default)]
pub struct SessionTable {
    sessions: RwLock<HashMap<String, String>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a valid session credential.
    pub fn insert(&self, credential: impl Into<String>, user: impl Into<String>) {
        self.sessions.write().insert(credential.into(), user.into());
    }
}

#[async_trait]
impl AuthGate for SessionTable {
    async fn authorize(&self, request: &RequestInfo) -> Result<Identity> {
        let credential = request
            .credential
            .as_deref()
            .ok_or_else(|| Error::Unauthorized("missing session credential".into()))?;
        let user = self
            .sessions
            .read()
            .get(credential)
            .cloned()
            .ok_or_else(|| Error::Unauthorized("unknown or expired session".into()))?;
        Ok(Identity { user: Some(user) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn query_token_wins_over_cookie_and_bearer() {
        let info = RequestInfo::new(
            headers(&[("cookie", "sid=from-cookie"), ("authorization", "Bearer from-bearer")]),
            headers(&[("token", "from-query")]),
        );
        assert_eq!(info.credential.as_deref(), Some("from-query"));
    }

    #[test]
    fn sid_cookie_is_extracted_among_others() {
        let info = RequestInfo::new(
            headers(&[("cookie", "theme=dark; sid=abc123; lang=es")]),
            HashMap::new(),
        );
        assert_eq!(info.credential.as_deref(), Some("abc123"));
    }

    #[test]
    fn bearer_is_the_fallback() {
        let info = RequestInfo::new(headers(&[("authorization", "Bearer tok")]), HashMap::new());
        assert_eq!(info.credential.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn session_table_allows_known_and_denies_unknown() {
        let table = SessionTable::new();
        table.insert("abc", "a@x.com");

        let ok = RequestInfo::new(headers(&[("cookie", "sid=abc")]), HashMap::new());
        let identity = table.authorize(&ok).await.unwrap();
        assert_eq!(identity.user.as_deref(), Some("a@x.com"));

        let bad = RequestInfo::new(headers(&[("cookie", "sid=zzz")]), HashMap::new());
        assert!(matches!(table.authorize(&bad).await, Err(Error::Unauthorized(_))));

        let none = RequestInfo::new(HashMap::new(), HashMap::new());
        assert!(matches!(table.authorize(&none).await, Err(Error::Unauthorized(_))));
    }
}
