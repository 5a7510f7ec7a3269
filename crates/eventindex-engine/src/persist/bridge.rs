//! Persister for bridge `MessageSent` events.

use eventindex_core::error::IndexerError;
use eventindex_core::repo::EventRepository;
use eventindex_core::types::{EventKind, NewEvent};

use crate::events::{LogMeta, MessageSentData};
use crate::persist::{Persisted, Persisters};

impl Persisters {
    /// Persist a bridge message. Messages below the configured minimum
    /// value are skipped silently — dust transfers are not interesting
    /// to downstream consumers.
    pub(crate) async fn persist_message_sent(
        &self,
        meta: &LogMeta,
        data: &MessageSentData,
    ) -> Result<Persisted, IndexerError> {
        let min_value: u128 = self.config.min_message_value.parse().unwrap_or(0);
        let value: u128 = match data.value.parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::debug!(msg_hash = %data.msg_hash, "unparseable message value, skipping");
                return Ok(Persisted::Skipped);
            }
        };
        if value < min_value {
            return Ok(Persisted::Skipped);
        }

        self.guard_chain_reorg(EventKind::MessageSent, meta.block_id).await?;

        let transacted_at = self.block_timestamp(meta.block_id).await?;

        let mut event = NewEvent::new(
            EventKind::MessageSent,
            self.chain_id,
            meta.block_id,
            &meta.address,
            serde_json::json!({
                "msgHash": data.msg_hash,
                "from": data.from,
                "to": data.to,
                "value": data.value,
            }),
        );
        event.amount = Some(data.value.clone());
        event.transacted_at = Some(transacted_at);

        self.events.save(event).await?;
        Ok(Persisted::Saved)
    }
}
