//! Message protocol definitions
//!
//! Inbound frames are JSON objects `{"username": ..., "message": ...}`.
//! Outbound frames are plain text `"username: message"`, no JSON wrapping.

use serde::de::Error as _;
use serde::Deserialize;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

use crate::error::DecodeError;

/// Client → Server chat message
///
/// Both fields are required; extra keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatMessage {
    /// Sender display name
    pub username: String,
    /// Message body
    pub message: String,
}

impl ChatMessage {
    pub fn new(username: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            message: message.into(),
        }
    }

    /// Decode one JSON payload
    ///
    /// Only an object is accepted. The derived impl alone would also take
    /// the array form `["name", "body"]`.
    pub fn from_json(bytes: &[u8]) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_slice(bytes)?;
        if !value.is_object() {
            return Err(serde_json::Error::custom("expected a JSON object").into());
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Render into the outbound wire payload
    pub fn render(&self) -> String {
        format!("{}: {}", self.username, self.message)
    }
}

/// Decode one inbound WebSocket frame
///
/// Returns `Ok(None)` for control frames the read loop should skip.
pub fn decode_frame(frame: Message) -> Result<Option<ChatMessage>, DecodeError> {
    match frame {
        Message::Text(text) => ChatMessage::from_json(text.as_bytes()).map(Some),
        Message::Binary(data) => ChatMessage::from_json(&data).map(Some),
        Message::Close(_) => Err(DecodeError::Closed),
        // Pong is handled automatically by tungstenite
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_deserialize() {
        let json = r#"{"username": "alice", "message": "hi"}"#;
        let msg = ChatMessage::from_json(json.as_bytes()).unwrap();
        assert_eq!(msg, ChatMessage::new("alice", "hi"));
    }

    #[test]
    fn test_render() {
        let msg = ChatMessage::new("alice", "hi");
        assert_eq!(msg.render(), "alice: hi");
    }

    #[test]
    fn test_render_does_not_escape_separator() {
        let msg = ChatMessage::new("a: b", "c: d");
        assert_eq!(msg.render(), "a: b: c: d");
    }

    #[test]
    fn test_rejects_other_shapes() {
        let bad = [
            "not json",
            r#"{"username": "alice"}"#,
            r#"{"username": 1, "message": "hi"}"#,
            r#"["alice", "hi"]"#,
            r#""alice: hi""#,
            "null",
        ];
        for input in bad {
            assert!(
                ChatMessage::from_json(input.as_bytes()).is_err(),
                "accepted {input}"
            );
        }
    }

    #[test]
    fn test_ignores_extra_fields() {
        let json = r#"{"username": "alice", "message": "hi", "ts": 1}"#;
        let msg = ChatMessage::from_json(json.as_bytes()).unwrap();
        assert_eq!(msg, ChatMessage::new("alice", "hi"));
    }

    #[test]
    fn test_decode_array_frame_rejected() {
        let err = decode_frame(Message::text(r#"["alice","hi"]"#)).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn test_decode_text_frame() {
        let frame = Message::text(r#"{"username":"bob","message":"yo"}"#);
        let msg = decode_frame(frame).unwrap();
        assert_eq!(msg, Some(ChatMessage::new("bob", "yo")));
    }

    #[test]
    fn test_decode_binary_frame() {
        let frame = Message::binary(br#"{"username":"bob","message":"yo"}"#.to_vec());
        let msg = decode_frame(frame).unwrap();
        assert_eq!(msg, Some(ChatMessage::new("bob", "yo")));
    }

    #[test]
    fn test_decode_skips_ping() {
        let frame = Message::Ping(Vec::new().into());
        assert!(decode_frame(frame).unwrap().is_none());
    }

    #[test]
    fn test_decode_close_frame() {
        let err = decode_frame(Message::Close(None)).unwrap_err();
        assert!(matches!(err, DecodeError::Closed));
    }

    #[test]
    fn test_decode_malformed_text() {
        let err = decode_frame(Message::text("hello")).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }
}
