//! Concrete packet shapes shared across courier services

pub mod log;
pub mod transaction;

pub use log::{LogLevel, LogPacket};
pub use transaction::{TransactionAuthPacket, TransactionAuthStatus, TransactionPacket};
