//! Structured log records published to the bus.
//!
//! The `LOG` topic is the system's only runtime error channel after startup;
//! any subscriber to it observes diagnostics from every connected service.

use crate::packet::Packet;
use serde::{Deserialize, Serialize};

/// Severity of a bus log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    /// Verbose diagnostic detail
    Debug,
    /// Normal operational events
    Info,
    /// Recoverable faults, including contained handler failures
    Warning,
    /// Faults that degrade the service
    Error,
}

/// A structured log record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPacket {
    /// Record severity
    pub level: LogLevel,
    /// Human-readable description of the event
    pub message: String,
    /// Failure context, empty when none is available
    pub stack_trace: String,
}

impl Packet for LogPacket {
    const TOPIC: &'static str = "LOG";
}

impl LogPacket {
    /// Create a new log record
    pub fn new(level: LogLevel, message: impl Into<String>, stack_trace: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            stack_trace: stack_trace.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_packet_round_trip() {
        for level in [
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warning,
            LogLevel::Error,
        ] {
            let packet = LogPacket::new(level, "collector offline", "at poll_loop");
            let decoded = LogPacket::decode(&packet.encode().unwrap()).unwrap();
            assert_eq!(decoded, packet);
        }
    }

    #[test]
    fn test_log_packet_round_trip_empty_fields() {
        let packet = LogPacket::new(LogLevel::Info, "", "");
        let decoded = LogPacket::decode(&packet.encode().unwrap()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_log_topic_is_fixed() {
        assert_eq!(LogPacket::TOPIC, "LOG");
    }
}
