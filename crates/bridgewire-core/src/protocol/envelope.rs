//! Envelope framing.
//!
//! Every message on the socket is one JSON object:
//!
//! ```json
//! {"op": 4, "operation": "RUN_COMMAND", "callback_id": "…", "command": "list"}
//! ```
//!
//! `op`, `operation` and `callback_id` are lifted into typed fields; every
//! other key is kept in [`Envelope::payload`].

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ProtocolError;

/// Top-level message kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum OpCode {
    /// Server greeting; starts the handshake.
    Hello,
    /// Client credentials.
    Identify,
    /// Handshake accepted.
    IdentifySuccess,
    /// Keep-alive.
    HeartBeat,
    /// Named operation.
    Packet,
    /// Correlated reply.
    CallBack,
}

impl OpCode {
    /// Numeric wire value.
    #[must_use]
    pub fn code(self) -> u64 {
        match self {
            Self::Hello => 0,
            Self::Identify => 1,
            Self::IdentifySuccess => 2,
            Self::HeartBeat => 3,
            Self::Packet => 4,
            Self::CallBack => 5,
        }
    }

    /// Name used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hello => "Hello",
            Self::Identify => "Identify",
            Self::IdentifySuccess => "IdentifySuccess",
            Self::HeartBeat => "HeartBeat",
            Self::Packet => "Packet",
            Self::CallBack => "CallBack",
        }
    }
}

impl TryFrom<u64> for OpCode {
    type Error = ProtocolError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Hello),
            1 => Ok(Self::Identify),
            2 => Ok(Self::IdentifySuccess),
            3 => Ok(Self::HeartBeat),
            4 => Ok(Self::Packet),
            5 => Ok(Self::CallBack),
            other => Err(ProtocolError::UnknownOpCode(other)),
        }
    }
}

impl From<OpCode> for u64 {
    fn from(op: OpCode) -> Self {
        op.code()
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message exchanged over the connection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message kind.
    pub op: OpCode,
    /// Operation name, only meaningful for [`OpCode::Packet`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Correlation token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
    /// All remaining fields.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Envelope {
    /// Create an envelope with an empty payload.
    #[must_use]
    pub fn new(op: OpCode) -> Self {
        Self {
            op,
            operation: None,
            callback_id: None,
            payload: Map::new(),
        }
    }

    /// Create a `Packet` envelope for a named operation.
    #[must_use]
    pub fn packet(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Self::new(OpCode::Packet)
        }
    }

    /// Create a fire-and-forget `Packet` envelope.
    ///
    /// Notifications carry an empty `callback_id` so the server knows no reply
    /// is awaited.
    #[must_use]
    pub fn notification(operation: impl Into<String>) -> Self {
        Self::packet(operation).with_callback_id(String::new())
    }

    /// Create a `HeartBeat` envelope.
    #[must_use]
    pub fn heartbeat() -> Self {
        Self::new(OpCode::HeartBeat)
    }

    /// Create the `CallBack` skeleton answering `request`.
    ///
    /// Carries the request's `callback_id` and echoes its operation as
    /// `exec_op`.
    #[must_use]
    pub fn callback_reply(request: &Self) -> Self {
        let mut reply = Self::new(OpCode::CallBack);
        reply.callback_id.clone_from(&request.callback_id);
        let exec_op = request
            .operation
            .clone()
            .map_or(Value::Null, Value::String);
        let _ = reply.payload.insert("exec_op".into(), exec_op);
        reply
    }

    /// Set the correlation token.
    #[must_use]
    pub fn with_callback_id(mut self, callback_id: impl Into<String>) -> Self {
        self.callback_id = Some(callback_id.into());
        self
    }

    /// Set a payload field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self.payload.insert(key.into(), value.into());
        self
    }

    /// Serialize `value` and merge its fields into the payload.
    ///
    /// Existing keys are overwritten. Values that do not serialize to a JSON
    /// object are rejected.
    pub fn merge<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ProtocolError> {
        match serde_json::to_value(value)? {
            Value::Object(map) => {
                self.payload.extend(map);
                Ok(())
            }
            Value::Null => Ok(()),
            _ => Err(ProtocolError::MissingField("object payload")),
        }
    }

    /// Decode the payload into a typed packet.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        Ok(serde_json::from_value(Value::Object(self.payload.clone()))?)
    }

    /// Look up a payload field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Look up a string payload field.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Whether this is a keep-alive.
    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        self.op == OpCode::HeartBeat
    }

    /// Non-empty correlation token, if any.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        self.callback_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Decode an envelope from socket text.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Decode an envelope from a parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Value::Object(map) = value else {
            return Err(ProtocolError::MissingField("op"));
        };
        match map.get("op") {
            None | Some(Value::Null) => return Err(ProtocolError::MissingField("op")),
            Some(op) => {
                if let Some(code) = op.as_u64() {
                    let _ = OpCode::try_from(code)?;
                }
            }
        }
        Ok(serde_json::from_value(Value::Object(map))?)
    }

    /// Encode to socket text.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Convert to a JSON object value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn opcode_codes_roundtrip() {
        for op in [
            OpCode::Hello,
            OpCode::Identify,
            OpCode::IdentifySuccess,
            OpCode::HeartBeat,
            OpCode::Packet,
            OpCode::CallBack,
        ] {
            assert_eq!(OpCode::try_from(op.code()).unwrap(), op);
        }
    }

    #[test]
    fn decode_packet_lifts_known_fields() {
        let env = Envelope::decode(
            r#"{"op":4,"operation":"RUN_COMMAND","callback_id":"c1","command":"list"}"#,
        )
        .unwrap();
        assert_eq!(env.op, OpCode::Packet);
        assert_eq!(env.operation.as_deref(), Some("RUN_COMMAND"));
        assert_eq!(env.callback_id.as_deref(), Some("c1"));
        assert_eq!(env.str_field("command"), Some("list"));
        assert!(env.field("op").is_none());
    }

    #[test]
    fn decode_rejects_missing_op() {
        let err = Envelope::decode(r#"{"operation":"X"}"#).unwrap_err();
        assert_matches!(err, ProtocolError::MissingField("op"));
    }

    #[test]
    fn decode_rejects_unknown_op() {
        let err = Envelope::decode(r#"{"op":42}"#).unwrap_err();
        assert_matches!(err, ProtocolError::UnknownOpCode(42));
    }

    #[test]
    fn decode_rejects_non_object() {
        assert!(Envelope::decode("[1,2]").is_err());
        assert!(Envelope::decode("not json").is_err());
    }

    #[test]
    fn encode_omits_absent_fields() {
        let text = Envelope::heartbeat().encode().unwrap();
        assert_eq!(text, r#"{"op":3}"#);
    }

    #[test]
    fn notification_has_empty_callback_id() {
        let env = Envelope::notification("REPORT_PLAYER");
        assert_eq!(env.callback_id.as_deref(), Some(""));
        assert!(env.correlation_id().is_none());
        let value = env.to_value();
        assert_eq!(value["callback_id"], "");
        assert_eq!(value["op"], 4);
    }

    #[test]
    fn callback_reply_copies_correlation() {
        let request = Envelope::packet("PLAYER_LIST").with_callback_id("cb-9");
        let reply = Envelope::callback_reply(&request);
        assert_eq!(reply.op, OpCode::CallBack);
        assert_eq!(reply.callback_id.as_deref(), Some("cb-9"));
        assert_eq!(reply.str_field("exec_op"), Some("PLAYER_LIST"));
    }

    #[test]
    fn merge_extends_payload() {
        let mut env = Envelope::packet("X").with_field("a", 1);
        env.merge(&json!({"b": 2, "a": 3})).unwrap();
        assert_eq!(env.field("a"), Some(&json!(3)));
        assert_eq!(env.field("b"), Some(&json!(2)));
    }

    #[test]
    fn merge_rejects_scalars() {
        let mut env = Envelope::packet("X");
        assert!(env.merge(&5).is_err());
    }

    #[test]
    fn payload_as_typed() {
        #[derive(Deserialize)]
        struct Cmd {
            command: String,
        }
        let env = Envelope::packet("RUN_COMMAND").with_field("command", "list");
        let cmd: Cmd = env.payload_as().unwrap();
        assert_eq!(cmd.command, "list");
    }
}
