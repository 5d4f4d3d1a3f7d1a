use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::bundle::{BundleError, BundleReader, PbwBundle};
use crate::core::error::InstallError;
use crate::core::events::{EventSink, InstallEvent, ProgressEvent};
use crate::core::model::*;
use crate::core::record::AppRecord;
use crate::device::{DeviceLink, RegistrationClient, TransferClient};

/// Parts an install sends, in transfer order, with their sizes.
pub fn planned_parts(bundle: &dyn BundleReader) -> Result<Vec<(PartKind, u64)>, BundleError> {
    TRANSFER_ORDER
        .into_iter()
        .filter(|kind| bundle.has_part(*kind))
        .map(|kind| Ok((kind, bundle.part_size(kind)?)))
        .collect()
}

/// Sum of planned part sizes; archive headers are untrusted, so this is checked.
pub fn planned_total(parts: &[(PartKind, u64)]) -> Result<u64, BundleError> {
    parts
        .iter()
        .try_fold(0u64, |acc, (_, size)| acc.checked_add(*size))
        .ok_or(BundleError::SizeOverflow)
}

#[derive(Debug, Clone)]
pub struct InstallContext {
    pub registration_timeout: Duration,
}

impl Default for InstallContext {
    fn default() -> Self {
        Self { registration_timeout: Duration::from_secs(30) }
    }
}

/// The device-side collaborators one install talks to.
#[derive(Clone)]
pub struct DeviceServices {
    pub link: Arc<dyn DeviceLink>,
    pub registration: Arc<dyn RegistrationClient>,
    pub transfer: Arc<dyn TransferClient>,
}

/// One attempt at installing one bundle. Not reusable: once it reaches a
/// terminal stage a retry needs a fresh session.
pub struct InstallSession {
    services: DeviceServices,
    sink: Arc<dyn EventSink>,
    bundle: Box<dyn BundleReader>,
    ctx: InstallContext,
    stage: InstallStage,
    identity: Option<InstallIdentity>,
    total_size: u64,
    total_sent: u64,
}

impl InstallSession {
    pub fn new(
        services: DeviceServices,
        sink: Arc<dyn EventSink>,
        bundle: Box<dyn BundleReader>,
        ctx: InstallContext,
    ) -> Result<Self, InstallError> {
        if !bundle.is_app_bundle() {
            return Err(InstallError::InvalidBundle("bundle has no application".to_string()));
        }

        let total_size = planned_total(&planned_parts(bundle.as_ref())?)?;

        Ok(Self {
            services,
            sink,
            bundle,
            ctx,
            stage: InstallStage::Ready,
            identity: None,
            total_size,
            total_sent: 0,
        })
    }

    /// Opens a `.pbw` from disk and builds a session over it.
    pub fn open(
        services: DeviceServices,
        sink: Arc<dyn EventSink>,
        path: &Path,
        platform: Option<&str>,
        ctx: InstallContext,
    ) -> Result<Self, InstallError> {
        let bundle = PbwBundle::open(path, platform)?;
        Self::new(services, sink, Box::new(bundle), ctx)
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn total_sent(&self) -> u64 {
        self.total_sent
    }

    pub fn stage(&self) -> InstallStage {
        self.stage
    }

    pub fn identity(&self) -> Option<InstallIdentity> {
        self.identity
    }

    pub async fn install(&mut self) -> Result<(), InstallError> {
        if self.stage.is_terminal() {
            return Err(InstallError::AlreadyFinished(self.stage));
        }

        let r = self.run().await;
        self.stage = if r.is_ok() { InstallStage::Completed } else { InstallStage::Failed };
        if let Err(e) = &r {
            warn!(error = %e, sent = self.total_sent, total = self.total_size, "install failed");
        }
        r
    }

    async fn run(&mut self) -> Result<(), InstallError> {
        let metadata = self.bundle.metadata()?;
        let uuid = metadata.uuid;
        self.identity = Some(InstallIdentity { uuid, install_id: None });
        let record = AppRecord::from_metadata(&metadata).serialise();

        self.stage = InstallStage::Registering;
        info!(%uuid, name = %metadata.app_name, "registering app");
        let status = self
            .services
            .registration
            .put(BlobDatabase::App, uuid, record, self.ctx.registration_timeout)
            .await?;
        if status != BlobStatus::Success {
            return Err(InstallError::RegistrationFailed(status));
        }

        self.stage = InstallStage::RequestingRun;
        self.services.link.send(Outbound::AppRunStart { uuid }).await?;

        self.stage = InstallStage::AwaitingFetch;
        let Inbound::AppFetchRequest { uuid: got, app_id } =
            self.services.link.await_message(InboundKind::AppFetchRequest).await?;
        if got != uuid {
            let reject = Outbound::AppFetchResponse { status: FetchStatus::InvalidUuid };
            if let Err(e) = self.services.link.send(reject).await {
                warn!(error = %e, "could not reject fetch request");
            }
            return Err(InstallError::UnexpectedFetchTarget { got, want: uuid });
        }
        self.identity = Some(InstallIdentity { uuid, install_id: Some(app_id) });
        debug!(app_id, total = self.total_size, "device fetch accepted");
        self.emit_progress(0);

        for kind in TRANSFER_ORDER {
            if !self.bundle.has_part(kind) {
                continue;
            }
            let payload = self.bundle.part_bytes(kind)?;
            self.send_part(kind, payload, app_id).await?;
        }

        if self.total_sent != self.total_size {
            warn!(sent = self.total_sent, total = self.total_size, "transferred byte count differs from bundle size");
        }
        info!(%uuid, bytes = self.total_sent, "install complete");
        Ok(())
    }

    async fn send_part(&mut self, kind: PartKind, payload: Bytes, install_id: InstallId) -> Result<(), InstallError> {
        self.stage = InstallStage::Transferring(kind);
        info!(part = %kind, bytes = payload.len(), client = self.services.transfer.name(), "sending part");

        let total_size = self.total_size;
        let sink = &self.sink;
        let total_sent = &mut self.total_sent;
        let mut on_progress = |tick: TransferTick| {
            *total_sent += tick.sent;
            sink.emit(InstallEvent::Progress(ProgressEvent {
                delta: tick.sent,
                cumulative: *total_sent,
                total: total_size,
            }));
        };

        self.services
            .transfer
            .transfer(payload, kind, install_id, &mut on_progress)
            .await
            .map_err(|cause| InstallError::TransferFailed { part: kind, cause })
    }

    fn emit_progress(&self, delta: u64) {
        self.sink.emit(InstallEvent::Progress(ProgressEvent {
            delta,
            cumulative: self.total_sent,
            total: self.total_size,
        }));
    }
}
