//! Text-frame codec
//!
//! Protocol content travels as JSON text frames. Binary frames are not part
//! of the protocol: the receiver answers one with [`UNSUPPORTED_SENTINEL`]
//! and processes it no further.

use crate::message::Message;

/// Fixed 4-byte reply to a binary frame, signaling "operation not supported".
pub const UNSUPPORTED_SENTINEL: [u8; 4] = [0x00, 0x00, 0xE0, 0x80];

/// A raw frame as seen by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    Text(String),
    Binary(Vec<u8>),
}

impl WireFrame {
    /// The sentinel frame sent in reply to unsupported binary input
    pub fn sentinel() -> Self {
        WireFrame::Binary(UNSUPPORTED_SENTINEL.to_vec())
    }
}

/// Serialize a message into a text frame
pub fn encode(msg: &Message) -> Result<String, serde_json::Error> {
    serde_json::to_string(msg)
}

/// Parse a text frame into a message
pub fn decode(text: &str) -> Result<Message, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Kind;

    #[test]
    fn sentinel_bytes_are_fixed() {
        assert_eq!(UNSUPPORTED_SENTINEL, [0x00, 0x00, 0xE0, 0x80]);
        assert_eq!(WireFrame::sentinel(), WireFrame::Binary(vec![0, 0, 0xE0, 0x80]));
    }

    #[test]
    fn encode_decode_roundtrip() {
        let msg = Message::request(Kind::Put, Some(4), "mode", Some(serde_json::json!(true)));
        let text = encode(&msg).unwrap();
        let back = decode(&text).unwrap();
        assert_eq!(back.kind, Kind::Put);
        assert_eq!(back.id, Some(4));
        assert_eq!(back.body, Some(serde_json::json!(true)));
    }

    #[test]
    fn malformed_frame_is_an_error() {
        assert!(decode("{not json").is_err());
        assert!(decode(r#"{"id":1}"#).is_err());
    }
}
