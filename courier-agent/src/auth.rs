//! Transaction authorization service.
//!
//! Subscribes to `TRANSACTION`, strictly decodes each inbound packet, and
//! publishes an authorization verdict on `TRANSACTION_AUTH`. Malformed
//! transactions surface on the bus `LOG` topic through the framework's
//! dispatch containment.

use async_trait::async_trait;
use courier_lib::{
    BusService, Packet, Publisher, Result, Service, TransactionAuthPacket, TransactionAuthStatus,
    TransactionPacket,
};
use tracing::debug;

pub struct TransactionAuthService;

#[async_trait]
impl BusService for TransactionAuthService {
    fn name(&self) -> &'static str {
        "transaction-auth"
    }

    async fn setup(&self, service: &Service) -> Result<()> {
        let publisher = service.publisher();
        service
            .register(TransactionPacket::TOPIC, move |raw| {
                let publisher = publisher.clone();
                async move { authorize(&publisher, &raw).await }
            })
            .await?;
        Ok(())
    }
}

async fn authorize(publisher: &Publisher, raw: &str) -> anyhow::Result<()> {
    let packet = TransactionPacket::decode(raw)?;
    let verdict = assess(&packet);
    debug!(transaction = %verdict.transaction, status = ?verdict.status, "publishing verdict");
    publisher.publish(&verdict).await?;
    Ok(())
}

/// First-pass gate ahead of the scoring stage: empty transactions are
/// refused outright, everything else is handed downstream as pending.
fn assess(packet: &TransactionPacket) -> TransactionAuthPacket {
    if packet.transaction.is_empty() {
        return TransactionAuthPacket {
            transaction: packet.transaction.clone(),
            status: TransactionAuthStatus::Rejected,
            confidence_score: 1.0,
        };
    }
    TransactionAuthPacket {
        transaction: packet.transaction.clone(),
        status: TransactionAuthStatus::Pending,
        confidence_score: 0.0,
    }
}
