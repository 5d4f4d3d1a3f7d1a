use std::fmt;
use uuid::Uuid;

/// Device-assigned id tagging every transfer of one install.
pub type InstallId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    Binary,
    Resources,
    Worker,
}

/// Order in which the device expects the parts to arrive.
pub const TRANSFER_ORDER: [PartKind; 3] = [PartKind::Binary, PartKind::Resources, PartKind::Worker];

impl PartKind {
    /// Payload-type tag understood by the transfer protocol.
    pub fn transfer_tag(self) -> u8 {
        match self {
            PartKind::Binary => 5,
            PartKind::Resources => 4,
            PartKind::Worker => 7,
        }
    }

    pub fn is_mandatory(self) -> bool {
        matches!(self, PartKind::Binary)
    }
}

impl fmt::Display for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PartKind::Binary => "binary",
            PartKind::Resources => "resources",
            PartKind::Worker => "worker",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Identity and version fields read from a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppMetadata {
    pub uuid: Uuid,
    pub flags: u32,
    pub icon_resource_id: u32,
    pub app_version: Version,
    pub sdk_version: Version,
    pub app_name: String,
}

/// Two-phase identity: the bundle UUID is known up front, the install id
/// only once the device has asked for the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallIdentity {
    pub uuid: Uuid,
    pub install_id: Option<InstallId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    Ready,
    Registering,
    RequestingRun,
    AwaitingFetch,
    Transferring(PartKind),
    Completed,
    Failed,
}

impl InstallStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, InstallStage::Completed | InstallStage::Failed)
    }
}

/// Keyspaces of the device's registration store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobDatabase {
    Test,
    Pin,
    App,
    Reminder,
    Notification,
}

impl BlobDatabase {
    pub fn id(self) -> u8 {
        match self {
            BlobDatabase::Test => 0,
            BlobDatabase::Pin => 1,
            BlobDatabase::App => 2,
            BlobDatabase::Reminder => 3,
            BlobDatabase::Notification => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobStatus {
    Success,
    GeneralFailure,
    InvalidOperation,
    InvalidDatabaseId,
    InvalidData,
    KeyDoesNotExist,
    DatabaseFull,
    DataStale,
    Unknown(u8),
}

impl BlobStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x01 => BlobStatus::Success,
            0x02 => BlobStatus::GeneralFailure,
            0x03 => BlobStatus::InvalidOperation,
            0x04 => BlobStatus::InvalidDatabaseId,
            0x05 => BlobStatus::InvalidData,
            0x06 => BlobStatus::KeyDoesNotExist,
            0x07 => BlobStatus::DatabaseFull,
            0x08 => BlobStatus::DataStale,
            other => BlobStatus::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            BlobStatus::Success => 0x01,
            BlobStatus::GeneralFailure => 0x02,
            BlobStatus::InvalidOperation => 0x03,
            BlobStatus::InvalidDatabaseId => 0x04,
            BlobStatus::InvalidData => 0x05,
            BlobStatus::KeyDoesNotExist => 0x06,
            BlobStatus::DatabaseFull => 0x07,
            BlobStatus::DataStale => 0x08,
            BlobStatus::Unknown(c) => c,
        }
    }
}

impl fmt::Display for BlobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (0x{:02x})", self, self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Start,
    Busy,
    InvalidUuid,
    NoData,
}

impl FetchStatus {
    pub fn code(self) -> u8 {
        match self {
            FetchStatus::Start => 0x01,
            FetchStatus::Busy => 0x02,
            FetchStatus::InvalidUuid => 0x03,
            FetchStatus::NoData => 0x04,
        }
    }
}

/// Messages the host sends over the device link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    AppRunStart { uuid: Uuid },
    AppFetchResponse { status: FetchStatus },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundKind {
    AppFetchRequest,
}

/// Messages the device sends back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    AppFetchRequest { uuid: Uuid, app_id: InstallId },
}

impl Inbound {
    pub fn kind(&self) -> InboundKind {
        match self {
            Inbound::AppFetchRequest { .. } => InboundKind::AppFetchRequest,
        }
    }
}

/// One progress report from a single part transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferTick {
    /// Bytes acknowledged since the previous tick.
    pub sent: u64,
    pub part_sent: u64,
    pub part_total: u64,
}
