//! Message types for actor communication.
//!
//! These types define the protocol between the actors: animation requests
//! flowing through the queue into the render loop, and control commands
//! arriving over the socket.

use crate::animation::TextSegment;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// One queued unit of display work.
#[derive(Debug, Clone, PartialEq)]
pub enum AnimationRequest {
    /// Fireworks show for the given duration.
    Fireworks(Duration),
    /// Scroll text made of colored segments, played to completion.
    Scroll(Vec<TextSegment>),
    /// Pulsing heart for the given duration.
    Heart(Duration),
    /// Smiley face for the given duration.
    Smiley(Duration),
}

impl AnimationRequest {
    /// Short name for logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Fireworks(_) => "fireworks",
            Self::Scroll(_) => "scroll",
            Self::Heart(_) => "heart",
            Self::Smiley(_) => "smiley",
        }
    }
}

/// Raw control message as it appears on the wire.
///
/// `{"command": <name>, "data"?: {<key>: <value>}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    /// Command name.
    pub command: String,
    /// Optional payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CommandMessage {
    /// Create a message.
    pub fn new(command: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            command: command.into(),
            data,
        }
    }
}

/// A decoded control command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Start the event listener.
    Start,
    /// Stop the event listener.
    Stop,
    /// Enqueue fireworks with the configured duration.
    Fireworks,
    /// Enqueue a heart with the configured duration.
    Heart,
    /// Enqueue a smiley with the configured duration.
    Smiley,
    /// Apply parameter updates to the runtime configuration.
    UpdateConfig(Map<String, Value>),
}

impl Command {
    /// Decode one wire message.
    pub fn parse(bytes: &[u8]) -> Result<Self, CommandError> {
        let message: CommandMessage =
            serde_json::from_slice(bytes).map_err(|e| CommandError::Malformed(e.to_string()))?;
        Self::try_from(message)
    }

    /// Wire name of the command.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Fireworks => "fireworks",
            Self::Heart => "heart",
            Self::Smiley => "smiley",
            Self::UpdateConfig(_) => "update_config",
        }
    }
}

impl TryFrom<CommandMessage> for Command {
    type Error = CommandError;

    fn try_from(message: CommandMessage) -> Result<Self, Self::Error> {
        match message.command.as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "fireworks" => Ok(Self::Fireworks),
            "heart" => Ok(Self::Heart),
            "smiley" => Ok(Self::Smiley),
            "update_config" => match message.data {
                Some(Value::Object(map)) => Ok(Self::UpdateConfig(map)),
                Some(other) => Err(CommandError::BadPayload {
                    command: message.command,
                    reason: format!("expected an object, got {other}"),
                }),
                None => Err(CommandError::BadPayload {
                    command: message.command,
                    reason: "missing data".into(),
                }),
            },
            _ => Err(CommandError::Unknown(message.command)),
        }
    }
}

/// Why a control message was dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Not a JSON command object.
    #[error("malformed command: {0}")]
    Malformed(String),

    /// Command name not recognized.
    #[error("unknown command: {0}")]
    Unknown(String),

    /// Recognized command with an unusable payload.
    #[error("bad payload for {command}: {reason}")]
    BadPayload {
        /// Command name.
        command: String,
        /// What was wrong.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Command::parse(br#"{"command":"start"}"#), Ok(Command::Start));
        assert_eq!(Command::parse(br#"{"command":"stop"}"#), Ok(Command::Stop));
        assert_eq!(Command::parse(br#"{"command":"fireworks"}"#), Ok(Command::Fireworks));
        assert_eq!(Command::parse(br#"{"command":"heart","data":{}}"#), Ok(Command::Heart));
        assert_eq!(Command::parse(br#"{"command":"smiley"}"#), Ok(Command::Smiley));
    }

    #[test]
    fn test_parse_update_config() {
        let cmd = Command::parse(br#"{"command":"update_config","data":{"GRAVITY":0.5}}"#).unwrap();
        let Command::UpdateConfig(map) = cmd else {
            panic!("expected update_config");
        };
        assert_eq!(map.get("GRAVITY"), Some(&json!(0.5)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Command::parse(b"not json"),
            Err(CommandError::Malformed(_))
        ));
        assert!(matches!(
            Command::parse(br#"{"data":{}}"#),
            Err(CommandError::Malformed(_))
        ));
        assert_eq!(
            Command::parse(br#"{"command":"dance"}"#),
            Err(CommandError::Unknown("dance".into()))
        );
        assert!(matches!(
            Command::parse(br#"{"command":"update_config"}"#),
            Err(CommandError::BadPayload { .. })
        ));
        assert!(matches!(
            Command::parse(br#"{"command":"update_config","data":[1]}"#),
            Err(CommandError::BadPayload { .. })
        ));
    }

    #[test]
    fn test_message_wire_format() {
        let msg = CommandMessage::new("heart", None);
        assert_eq!(serde_json::to_string(&msg).unwrap(), r#"{"command":"heart"}"#);
        let msg = CommandMessage::new("update_config", Some(json!({"GRAVITY": 0.2})));
        let back: CommandMessage = serde_json::from_str(&serde_json::to_string(&msg).unwrap()).unwrap();
        assert_eq!(back, msg);
    }
}
