//! Message protocol definitions
//!
//! Requests arrive as JSON objects keyed by `action`. They are validated
//! once, at decode time, into a typed [`Request`]; replies and broadcasts
//! are typed [`ServerMessage`] values serialized to the exact wire shapes
//! clients expect.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::error::ProtocolError;

/// One decoded protocol exchange before validation
pub type StructuredMessage = Map<String, Value>;

/// Status code for an accepted presence request
pub const RESPONSE_OK: u16 = 200;

/// Status code for any rejected request
pub const RESPONSE_BAD_REQUEST: u16 = 400;

/// Error text sent with [`RESPONSE_BAD_REQUEST`]
pub const BAD_REQUEST: &str = "Bad Request";

const ACTION_PRESENCE: &str = "presence";
const ACTION_MESSAGE: &str = "message";

/// Client → Server request
///
/// Only structurally valid requests can be represented; anything else is
/// a [`ProtocolError`].
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Client announces itself
    Presence { time: Value, account_name: String },
    /// Chat text to relay to everyone
    Chat {
        time: Value,
        account_name: String,
        message_text: String,
    },
}

impl Request {
    /// Account name the client claimed (not verified)
    pub fn account_name(&self) -> &str {
        match self {
            Request::Presence { account_name, .. } | Request::Chat { account_name, .. } => {
                account_name
            }
        }
    }

    /// Client-supplied timestamp, kept as sent
    ///
    /// Only its presence is checked; broadcasts carry the server's own time.
    pub fn time(&self) -> &Value {
        match self {
            Request::Presence { time, .. } | Request::Chat { time, .. } => time,
        }
    }
}

impl TryFrom<StructuredMessage> for Request {
    type Error = ProtocolError;

    fn try_from(mut fields: StructuredMessage) -> Result<Self, Self::Error> {
        let time = fields
            .remove("time")
            .ok_or(ProtocolError::MissingField("time"))?;

        let action = match fields.remove("action") {
            Some(Value::String(action)) => action,
            Some(_) => return Err(ProtocolError::InvalidField("action")),
            None => return Err(ProtocolError::MissingField("action")),
        };

        let account_name = match fields.remove("account_name") {
            Some(Value::String(name)) if name.is_empty() => {
                return Err(ProtocolError::EmptyAccountName)
            }
            Some(Value::String(name)) => name,
            Some(_) => return Err(ProtocolError::InvalidField("account_name")),
            None => return Err(ProtocolError::MissingField("account_name")),
        };

        match action.as_str() {
            ACTION_PRESENCE => Ok(Request::Presence { time, account_name }),
            ACTION_MESSAGE => match fields.remove("message_text") {
                Some(text) => Ok(Request::Chat {
                    time,
                    account_name,
                    message_text: text_of(text),
                }),
                None => Err(ProtocolError::MissingMessageText),
            },
            _ => Err(ProtocolError::UnsupportedAction(action)),
        }
    }
}

/// Strings are relayed as-is, any other JSON value as its JSON text
fn text_of(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Server → Client message
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// `{response: 200}`
    OkResponse,
    /// `{response: 400, error: <text>}`
    ErrorResponse { error: String },
    /// Chat payload fanned out to every connection
    BroadcastChat {
        sender: String,
        time: f64,
        message_text: String,
    },
}

impl ServerMessage {
    /// The standard 400 reply
    pub fn bad_request() -> Self {
        ServerMessage::ErrorResponse {
            error: BAD_REQUEST.to_string(),
        }
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::OkResponse => "200 response",
            ServerMessage::ErrorResponse { .. } => "400 response",
            ServerMessage::BroadcastChat { .. } => "broadcast",
        }
    }

    /// Build an outbound chat broadcast stamped with `time`
    pub fn broadcast(sender: String, message_text: String, time: f64) -> Self {
        ServerMessage::BroadcastChat {
            sender,
            time,
            message_text,
        }
    }
}

impl Serialize for ServerMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ServerMessage::OkResponse => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("response", &RESPONSE_OK)?;
                map.end()
            }
            ServerMessage::ErrorResponse { error } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("response", &RESPONSE_BAD_REQUEST)?;
                map.serialize_entry("error", error)?;
                map.end()
            }
            ServerMessage::BroadcastChat {
                sender,
                time,
                message_text,
            } => {
                let mut map = serializer.serialize_map(Some(4))?;
                map.serialize_entry("action", ACTION_MESSAGE)?;
                map.serialize_entry("sender", sender)?;
                map.serialize_entry("time", time)?;
                map.serialize_entry("message_text", message_text)?;
                map.end()
            }
        }
    }
}

/// Every protocol violation gets the same 400 reply
impl From<ProtocolError> for ServerMessage {
    fn from(_: ProtocolError) -> Self {
        ServerMessage::bad_request()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fields(value: Value) -> StructuredMessage {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn test_presence_request() {
        let msg = fields(json!({"action": "presence", "time": 1.5, "account_name": "alice"}));
        let request = Request::try_from(msg).unwrap();
        assert_eq!(
            request,
            Request::Presence {
                time: json!(1.5),
                account_name: "alice".to_string()
            }
        );
    }

    #[test]
    fn test_chat_request_with_integer_time() {
        let msg = fields(json!({
            "action": "message",
            "time": 1700000000,
            "account_name": "alice",
            "message_text": "hi"
        }));
        let request = Request::try_from(msg).unwrap();
        assert_eq!(request.account_name(), "alice");
        assert_eq!(request.time(), &json!(1700000000));
        match request {
            Request::Chat { message_text, .. } => assert_eq!(message_text, "hi"),
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_missing_required_fields() {
        let no_time = fields(json!({"action": "presence", "account_name": "a"}));
        assert_eq!(
            Request::try_from(no_time),
            Err(ProtocolError::MissingField("time"))
        );

        let no_action = fields(json!({"time": 1, "account_name": "a"}));
        assert_eq!(
            Request::try_from(no_action),
            Err(ProtocolError::MissingField("action"))
        );

        let no_account = fields(json!({"action": "presence", "time": 1}));
        assert_eq!(
            Request::try_from(no_account),
            Err(ProtocolError::MissingField("account_name"))
        );
    }

    #[test]
    fn test_empty_account_name_rejected() {
        let msg = fields(json!({"action": "presence", "time": 1, "account_name": ""}));
        assert_eq!(Request::try_from(msg), Err(ProtocolError::EmptyAccountName));
    }

    #[test]
    fn test_message_without_text_rejected() {
        let msg = fields(json!({"action": "message", "time": 1, "account_name": "a"}));
        assert_eq!(
            Request::try_from(msg),
            Err(ProtocolError::MissingMessageText)
        );
    }

    #[test]
    fn test_unknown_action_rejected() {
        let msg = fields(json!({"action": "ping", "time": 1, "account_name": "x"}));
        assert_eq!(
            Request::try_from(msg),
            Err(ProtocolError::UnsupportedAction("ping".to_string()))
        );
    }

    #[test]
    fn test_any_time_value_accepted() {
        for time in [json!("2024-01-01"), Value::Null, json!({"unix": 1})] {
            let msg = fields(json!({"action": "presence", "time": time, "account_name": "alice"}));
            let request = Request::try_from(msg).unwrap();
            assert_eq!(request.time(), &time);
            assert_eq!(request.account_name(), "alice");
        }
    }

    #[test]
    fn test_non_string_message_text_relayed_as_json() {
        let msg = fields(json!({
            "action": "message",
            "time": null,
            "account_name": "alice",
            "message_text": 42
        }));
        match Request::try_from(msg).unwrap() {
            Request::Chat { message_text, .. } => assert_eq!(message_text, "42"),
            _ => panic!("Wrong variant"),
        }

        let msg = fields(json!({
            "action": "message",
            "time": 1,
            "account_name": "alice",
            "message_text": ["a", "b"]
        }));
        match Request::try_from(msg).unwrap() {
            Request::Chat { message_text, .. } => assert_eq!(message_text, r#"["a","b"]"#),
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_ok_response_serialize() {
        let value = serde_json::to_value(ServerMessage::OkResponse).unwrap();
        assert_eq!(value, json!({"response": 200}));
    }

    #[test]
    fn test_bad_request_serialize() {
        let msg: ServerMessage = ProtocolError::MissingMessageText.into();
        let value = serde_json::to_value(msg).unwrap();
        assert_eq!(value, json!({"response": 400, "error": "Bad Request"}));
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(ServerMessage::OkResponse.kind(), "200 response");
        assert_eq!(ServerMessage::bad_request().kind(), "400 response");
        let msg = ServerMessage::broadcast("a".to_string(), "b".to_string(), 0.0);
        assert_eq!(msg.kind(), "broadcast");
    }

    #[test]
    fn test_broadcast_serialize() {
        let msg = ServerMessage::broadcast("alice".to_string(), "hi".to_string(), 12.5);
        let value = serde_json::to_value(msg).unwrap();
        assert_eq!(
            value,
            json!({"action": "message", "sender": "alice", "time": 12.5, "message_text": "hi"})
        );
    }
}
