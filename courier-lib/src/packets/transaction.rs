//! Transaction pipeline packets

use crate::packet::Packet;
use serde::{Deserialize, Serialize};

/// A raw transaction submitted to the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPacket {
    /// Opaque transaction payload, as received from the originating system
    pub transaction: String,
}

impl Packet for TransactionPacket {
    const TOPIC: &'static str = "TRANSACTION";
}

/// Outcome of an authorization pass over a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionAuthStatus {
    /// Cleared for settlement
    Approved,
    /// Refused
    Rejected,
    /// Awaiting a downstream scoring decision
    Pending,
}

/// Authorization verdict for a transaction.
///
/// Carries its own copy of the transaction rather than referencing the
/// originating [`TransactionPacket`], so the wire shape stays flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionAuthPacket {
    /// The transaction this verdict applies to
    pub transaction: String,
    /// Authorization outcome
    pub status: TransactionAuthStatus,
    /// Scoring confidence in `[0.0, 1.0]`
    pub confidence_score: f32,
}

impl Packet for TransactionAuthPacket {
    const TOPIC: &'static str = "TRANSACTION_AUTH";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_packet_round_trip() {
        let packet = TransactionPacket {
            transaction: "txn-2041;amount=12.50;currency=EUR".to_string(),
        };
        let decoded = TransactionPacket::decode(&packet.encode().unwrap()).unwrap();
        assert_eq!(decoded, packet);

        let empty = TransactionPacket {
            transaction: String::new(),
        };
        let decoded = TransactionPacket::decode(&empty.encode().unwrap()).unwrap();
        assert_eq!(decoded, empty);
    }

    #[test]
    fn test_auth_packet_round_trip_all_statuses() {
        for status in [
            TransactionAuthStatus::Approved,
            TransactionAuthStatus::Rejected,
            TransactionAuthStatus::Pending,
        ] {
            let packet = TransactionAuthPacket {
                transaction: "txn-2041".to_string(),
                status,
                confidence_score: 0.5,
            };
            let decoded = TransactionAuthPacket::decode(&packet.encode().unwrap()).unwrap();
            assert_eq!(decoded, packet);
        }
    }

    #[test]
    fn test_auth_packet_confidence_boundaries() {
        for score in [0.0_f32, 1.0_f32] {
            let packet = TransactionAuthPacket {
                transaction: String::new(),
                status: TransactionAuthStatus::Pending,
                confidence_score: score,
            };
            let decoded = TransactionAuthPacket::decode(&packet.encode().unwrap()).unwrap();
            assert_eq!(decoded.confidence_score, score);
        }
    }

    #[test]
    fn test_topics_are_distinct() {
        assert_eq!(TransactionPacket::TOPIC, "TRANSACTION");
        assert_eq!(TransactionAuthPacket::TOPIC, "TRANSACTION_AUTH");
    }
}
