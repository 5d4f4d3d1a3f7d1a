//! Seams to the device-side protocols an install drives.
//!
//! The session only talks to these traits; framing, chunking and timeouts are
//! the implementor's business.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use uuid::Uuid;

use crate::core::error::LinkError;
use crate::core::model::{BlobDatabase, BlobStatus, Inbound, InboundKind, InstallId, Outbound, PartKind, TransferTick};

/// Progress callback handed to a transfer for the duration of one part.
pub type ProgressFn<'a> = &'a mut (dyn FnMut(TransferTick) + Send);

#[async_trait]
pub trait DeviceLink: Send + Sync {
    /// Fire-and-forget; returns once the message has been handed to the link.
    async fn send(&self, message: Outbound) -> Result<(), LinkError>;

    /// Waits for the next inbound message of `kind`.
    async fn await_message(&self, kind: InboundKind) -> Result<Inbound, LinkError>;
}

#[async_trait]
pub trait RegistrationClient: Send + Sync {
    /// Inserts `value` under `key` and waits for the device's verdict.
    /// Implementations give up after `timeout` with [`LinkError::Timeout`].
    async fn put(
        &self,
        database: BlobDatabase,
        key: Uuid,
        value: Bytes,
        timeout: Duration,
    ) -> Result<BlobStatus, LinkError>;
}

#[async_trait]
pub trait TransferClient: Send + Sync {
    fn name(&self) -> &'static str;

    /// Streams one part to the device, reporting each acknowledged chunk
    /// through `progress`. Returns once the device has committed the part.
    async fn transfer(
        &self,
        payload: Bytes,
        kind: PartKind,
        install_id: InstallId,
        progress: ProgressFn<'_>,
    ) -> anyhow::Result<()>;
}
