//! The packet serialization contract: typed payloads bound to fixed topics

use crate::error::{Result, ServiceError};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A typed, serializable payload bound to exactly one bus topic.
///
/// The topic is an associated constant, so every instance of a packet type
/// maps to the same topic. The wire form is flat JSON text: field-stable,
/// human-readable, no framing and no version header. Any structural change
/// to a packet shape breaks compatibility with existing subscribers.
pub trait Packet: Serialize + DeserializeOwned + Send {
    /// The topic this packet type is published to and received from
    const TOPIC: &'static str;

    /// Encode the packet's public fields to their UTF-8 wire form
    fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ServiceError::serialization(e.to_string()))
    }

    /// Decode a packet from its wire form.
    ///
    /// Fails with [`ServiceError::Decode`] when the text is not well-formed
    /// for this shape (missing required field, wrong field type).
    fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| ServiceError::decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct ProbePacket {
        sequence: u64,
        note: String,
    }

    impl Packet for ProbePacket {
        const TOPIC: &'static str = "PROBE";
    }

    #[test]
    fn test_encode_is_field_stable() {
        let packet = ProbePacket {
            sequence: 7,
            note: "steady".to_string(),
        };

        let first = packet.encode().unwrap();
        let second = packet.encode().unwrap();
        assert_eq!(first, second);
        assert_eq!(first, r#"{"sequence":7,"note":"steady"}"#);
    }

    #[test]
    fn test_decode_round_trip() {
        let packet = ProbePacket {
            sequence: u64::MAX,
            note: String::new(),
        };

        let raw = packet.encode().unwrap();
        let decoded = ProbePacket::decode(&raw).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_decode_rejects_missing_field() {
        let result = ProbePacket::decode(r#"{"sequence":7}"#);
        assert!(matches!(result, Err(ServiceError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_wrong_field_type() {
        let result = ProbePacket::decode(r#"{"sequence":"seven","note":"x"}"#);
        assert!(matches!(result, Err(ServiceError::Decode(_))));
    }
}
