//! Installs `.pbw` application bundles onto a device: registers the app,
//! asks the device to run it, answers its fetch request and streams the
//! binary, resources and worker while reporting cumulative progress.

pub mod bundle;
pub mod core;
pub mod device;
pub mod fetch;

pub use crate::bundle::{BundleError, BundleReader, PbwBundle};
pub use crate::core::error::{InstallError, LinkError};
pub use crate::core::events::{EventSink, InstallEvent, ProgressEvent};
pub use crate::core::model::{InstallIdentity, InstallStage, PartKind};
pub use crate::core::session::{planned_parts, planned_total, DeviceServices, InstallContext, InstallSession};
pub use crate::device::{DeviceLink, RegistrationClient, TransferClient};
