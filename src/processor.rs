//! Request processor
//!
//! Interprets one validated request. Validation is structural only;
//! account names are taken at face value.

use tracing::{debug, warn};

use crate::error::ProtocolError;
use crate::message::{Request, ServerMessage};
use crate::queue::BroadcastQueue;

/// What the event loop must do after processing a request
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Send this reply to the requesting connection
    Reply(ServerMessage),
    /// A chat payload was queued; nothing goes back to the sender directly
    Enqueued,
}

/// Process one request from one connection
pub fn process_request(
    request: Result<Request, ProtocolError>,
    queue: &mut BroadcastQueue,
) -> Outcome {
    match request {
        Ok(Request::Presence { account_name, .. }) => {
            debug!("Presence from '{}'", account_name);
            Outcome::Reply(ServerMessage::OkResponse)
        }
        Ok(Request::Chat {
            account_name,
            message_text,
            ..
        }) => {
            debug!("Chat from '{}' queued for broadcast", account_name);
            queue.enqueue(account_name, message_text);
            Outcome::Enqueued
        }
        Err(e) => {
            warn!("Rejected request: {}", e);
            Outcome::Reply(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn chat(text: &str) -> Request {
        Request::Chat {
            time: json!(1.0),
            account_name: "alice".to_string(),
            message_text: text.to_string(),
        }
    }

    #[test]
    fn test_presence_gets_ok_without_broadcast() {
        let mut queue = BroadcastQueue::new(None);
        let request = Request::Presence {
            time: json!(1.0),
            account_name: "alice".to_string(),
        };

        let outcome = process_request(Ok(request), &mut queue);

        assert_eq!(outcome, Outcome::Reply(ServerMessage::OkResponse));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_chat_is_queued_without_reply() {
        let mut queue = BroadcastQueue::new(None);

        assert_eq!(process_request(Ok(chat("hi")), &mut queue), Outcome::Enqueued);
        assert_eq!(process_request(Ok(chat("again")), &mut queue), Outcome::Enqueued);

        let first = queue.dequeue().unwrap();
        assert_eq!(first.sender, "alice");
        assert_eq!(first.text, "hi");
        assert_eq!(queue.dequeue().unwrap().text, "again");
    }

    #[test]
    fn test_protocol_errors_get_bad_request() {
        let errors = [
            ProtocolError::MissingField("time"),
            ProtocolError::MissingField("action"),
            ProtocolError::EmptyAccountName,
            ProtocolError::MissingMessageText,
            ProtocolError::UnsupportedAction("ping".to_string()),
        ];

        for error in errors {
            let mut queue = BroadcastQueue::new(None);
            let outcome = process_request(Err(error), &mut queue);
            assert_eq!(outcome, Outcome::Reply(ServerMessage::bad_request()));
            assert!(queue.is_empty());
        }
    }
}
