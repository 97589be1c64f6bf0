//! # Message Protocol
//!
//! Defines the request and reply shapes exchanged between chat clients and
//! the relay. Every message is a single JSON document carried in one UDP
//! datagram.
//!
//! ## Requests
//!
//! Requests are JSON objects tagged by an `action` field:
//! ```text
//! {"action": "register",      "username": "alice"}
//! {"action": "get_user_id",   "username": "bob"}
//! {"action": "get_user_list"}
//! {"action": "send",          "user_id": 1, "target_user_id": 2, "message": "hi"}
//! {"action": "get",           "user_id": 2}
//! ```
//! Any request may also carry a `request_id` used as an idempotency key.
//!
//! ## Replies
//!
//! The wire keeps the loosely shaped replies older clients expect
//! (`value`, `status_msg`, `status: "error"`, or a bare array), but inside
//! the crate every reply is decoded once into the [`Reply`] enum so callers
//! match exhaustively instead of probing for keys.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// Informational status sent when a username is already registered.
pub const USER_EXISTS: &str = "User already exists";

/// Informational status sent when a queue has nothing left.
pub const NO_MESSAGES: &str = "no messages";

/// Value returned for an accepted `send`.
pub const SEND_ACK: &str = "ok";

/// Prefix of the synthetic error produced for undecodable datagrams.
pub const PARSE_FAILURE: &str = "json could not be parsed";

// ============================================================================
// IDENTITIES
// ============================================================================

/// Opaque identity assigned by the relay when a username registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// REQUESTS
// ============================================================================

/// The five actions understood by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Request {
    /// Create an identity for `username` unless the name is taken.
    Register { username: String },

    /// Look up the identity of an already registered username.
    GetUserId { username: String },

    /// List every registered username.
    GetUserList,

    /// Queue `message` for `target_user_id`, attributed to `user_id`.
    Send {
        user_id: UserId,
        target_user_id: UserId,
        message: String,
    },

    /// Pop the oldest message queued for `user_id`.
    Get { user_id: UserId },
}

impl Request {
    /// Wire name of the action, used in logs and errors.
    pub fn action(&self) -> &'static str {
        match self {
            Request::Register { .. } => "register",
            Request::GetUserId { .. } => "get_user_id",
            Request::GetUserList => "get_user_list",
            Request::Send { .. } => "send",
            Request::Get { .. } => "get",
        }
    }

    /// Whether executing this request twice differs from executing it once.
    ///
    /// Retransmissions of these requests are answered from the relay's
    /// replay cache rather than executed again.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Request::Register { .. } | Request::Send { .. } | Request::Get { .. }
        )
    }
}

/// A request together with its optional idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u64>,
    #[serde(flatten)]
    pub request: Request,
}

impl RequestFrame {
    pub fn new(request: Request) -> Self {
        Self {
            request_id: None,
            request,
        }
    }

    pub fn with_id(request_id: u64, request: Request) -> Self {
        Self {
            request_id: Some(request_id),
            request,
        }
    }

    /// Serialize the frame to JSON bytes for a single datagram.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decode a request datagram.
    ///
    /// On failure the returned message is ready to be sent back as the
    /// `status_msg` of an error reply: syntax errors report a parse failure,
    /// well-formed JSON with missing or mistyped fields reports a malformed
    /// request.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        serde_json::from_slice(bytes).map_err(|e| match e.classify() {
            serde_json::error::Category::Data => format!("malformed request: {}", e),
            _ => format!("{}: {}", PARSE_FAILURE, e),
        })
    }
}

// ============================================================================
// REPLIES
// ============================================================================

/// A message popped from a recipient's queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub sender_id: UserId,
    pub message: String,
}

/// Contents of a successful `value` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// `register` and `get_user_id`
    Identity(UserId),
    /// `get`
    Delivery(Delivery),
    /// `send`
    Ack(String),
}

/// Typed outcome of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Operation succeeded and produced a value.
    Success(Payload),
    /// The `get_user_list` snapshot.
    Listing(Vec<String>),
    /// Non-error informational outcome, e.g. "User already exists".
    Conflict(String),
    /// The queue is empty ("no messages"). Not an error.
    Empty,
    /// The relay (or the decoder) reported an error.
    Error(String),
}

impl Reply {
    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error(message.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

/// A reply as it travels on the wire, with the echoed idempotency key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyFrame {
    pub request_id: Option<u64>,
    pub reply: Reply,
}

impl ReplyFrame {
    pub fn new(request_id: Option<u64>, reply: Reply) -> Self {
        Self { request_id, reply }
    }

    /// Render the reply in its wire shape.
    ///
    /// Listings are bare arrays and cannot carry the echoed `request_id`.
    pub fn to_value(&self) -> Value {
        let mut body = match &self.reply {
            Reply::Listing(names) => return json!(names),
            Reply::Success(payload) => json!({ "value": payload }),
            Reply::Conflict(reason) => json!({ "status_msg": reason }),
            Reply::Empty => json!({ "status_msg": NO_MESSAGES }),
            Reply::Error(message) => json!({ "status": "error", "status_msg": message }),
        };
        if let (Some(id), Some(map)) = (self.request_id, body.as_object_mut()) {
            map.insert("request_id".to_string(), Value::from(id));
        }
        body
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.to_value())
    }

    /// Decode a reply datagram. Never fails: anything that does not decode
    /// becomes a synthetic [`Reply::Error`].
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => Self::from_value(value),
            Err(e) => Self::new(None, Reply::Error(format!("{}: {}", PARSE_FAILURE, e))),
        }
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => {
                let names: Option<Vec<String>> = items
                    .into_iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect();
                let reply = match names {
                    Some(names) => Reply::Listing(names),
                    None => Reply::error("user listing contains a non-string entry"),
                };
                Self::new(None, reply)
            }
            Value::Object(map) => Self::from_object(map),
            other => Self::new(
                None,
                Reply::Error(format!("unexpected reply shape: {}", other)),
            ),
        }
    }

    fn from_object(mut map: Map<String, Value>) -> Self {
        let request_id = map.get("request_id").and_then(Value::as_u64);
        let status_msg = map
            .get("status_msg")
            .and_then(Value::as_str)
            .map(str::to_string);

        let reply = if map.get("status").and_then(Value::as_str) == Some("error") {
            Reply::Error(status_msg.unwrap_or_else(|| "unspecified error".to_string()))
        } else if let Some(status_msg) = status_msg {
            if status_msg == NO_MESSAGES {
                Reply::Empty
            } else {
                Reply::Conflict(status_msg)
            }
        } else if let Some(value) = map.remove("value") {
            match serde_json::from_value::<Payload>(value) {
                Ok(payload) => Reply::Success(payload),
                Err(e) => Reply::Error(format!("unrecognised value: {}", e)),
            }
        } else {
            Reply::error("reply carries neither a value nor a status")
        };

        Self::new(request_id, reply)
    }
}
