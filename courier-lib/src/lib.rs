//! # Courier
//!
//! A minimal framework for long-lived services that communicate exclusively
//! over an MQTT publish/subscribe bus. A service subscribes to named topics,
//! decodes textual payloads into typed packets, and reacts; it publishes
//! typed packets, including structured log records, back onto the bus.
//!
//! ## Features
//!
//! - **Typed packets**: every payload shape is bound to one fixed topic and
//!   a flat, field-stable JSON wire form
//! - **Single managed connection**: one MQTT session per service, connected
//!   at construction and released by an explicit shutdown
//! - **Topic registry**: one handler per topic, first registration wins,
//!   subscribed at the broker exactly once
//! - **Contained dispatch**: a failing handler becomes one `Warning` log
//!   packet on the bus; the delivery stream stays live
//! - **Bus-published diagnostics**: after startup, the `LOG` topic is the
//!   only runtime error channel
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use courier_lib::{Config, LogLevel, Packet, Service, TransactionPacket};
//!
//! #[tokio::main]
//! async fn main() -> courier_lib::Result<()> {
//!     let config = Config::default();
//!     let service = Service::connect("transaction-monitor", &config).await?;
//!
//!     let publisher = service.publisher();
//!     service
//!         .register(TransactionPacket::TOPIC, move |raw| {
//!             let publisher = publisher.clone();
//!             async move {
//!                 let packet = TransactionPacket::decode(&raw)?;
//!                 publisher
//!                     .log(LogLevel::Info, format!("saw {}", packet.transaction), "")
//!                     .await?;
//!                 Ok(())
//!             }
//!         })
//!         .await?;
//!
//!     // ... block until told to stop, then release the connection
//!     service.shutdown().await
//! }
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod link;
pub mod packet;
pub mod packets;
pub mod service;

// Re-export main types for convenience
pub use config::{BrokerConfig, Config, ConfigError, ConfigLoader, LoggingConfig};
pub use error::{Result, ServiceError};
pub use link::{BrokerLink, DeliveryGuarantee, InboundMessage, MqttLink};
pub use packet::Packet;
pub use packets::{
    LogLevel, LogPacket, TransactionAuthPacket, TransactionAuthStatus, TransactionPacket,
};
pub use service::{BusService, HandlerFuture, Publisher, Service, ServiceStats};
