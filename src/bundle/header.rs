use bytes::Buf;
use uuid::Uuid;

use crate::bundle::BundleError;
use crate::core::model::{AppMetadata, Version};

pub const MAGIC: &[u8; 8] = b"PBLAPP\0\0";
pub const HEADER_LEN: usize = 120;

/// Fixed header at the start of every app/worker binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppHeader {
    pub struct_version: Version,
    pub sdk_version: Version,
    pub app_version: Version,
    pub app_size: u16,
    pub offset: u32,
    pub crc: u32,
    pub app_name: String,
    pub company_name: String,
    pub icon_resource_id: u32,
    pub symbol_table_addr: u32,
    pub flags: u32,
    pub num_relocation_entries: u32,
    pub uuid: Uuid,
}

impl AppHeader {
    pub fn parse(data: &[u8]) -> Result<Self, BundleError> {
        if data.len() < HEADER_LEN {
            return Err(BundleError::BadHeader(format!("{} bytes, need {}", data.len(), HEADER_LEN)));
        }
        let mut buf = &data[..HEADER_LEN];

        let mut magic = [0u8; 8];
        buf.copy_to_slice(&mut magic);
        if &magic != MAGIC {
            return Err(BundleError::BadHeader(format!("magic {:?}", String::from_utf8_lossy(&magic))));
        }

        let struct_version = read_version(&mut buf);
        let sdk_version = read_version(&mut buf);
        let app_version = read_version(&mut buf);
        let app_size = buf.get_u16_le();
        let offset = buf.get_u32_le();
        let crc = buf.get_u32_le();
        let app_name = read_cstr(&mut buf, 32);
        let company_name = read_cstr(&mut buf, 32);
        let icon_resource_id = buf.get_u32_le();
        let symbol_table_addr = buf.get_u32_le();
        let flags = buf.get_u32_le();
        let num_relocation_entries = buf.get_u32_le();
        let mut uuid = [0u8; 16];
        buf.copy_to_slice(&mut uuid);

        Ok(Self {
            struct_version,
            sdk_version,
            app_version,
            app_size,
            offset,
            crc,
            app_name,
            company_name,
            icon_resource_id,
            symbol_table_addr,
            flags,
            num_relocation_entries,
            uuid: Uuid::from_bytes(uuid),
        })
    }

    pub fn metadata(&self) -> AppMetadata {
        AppMetadata {
            uuid: self.uuid,
            flags: self.flags,
            icon_resource_id: self.icon_resource_id,
            app_version: self.app_version,
            sdk_version: self.sdk_version,
            app_name: self.app_name.clone(),
        }
    }
}

fn read_version(buf: &mut &[u8]) -> Version {
    let major = buf.get_u8();
    let minor = buf.get_u8();
    Version { major, minor }
}

fn read_cstr(buf: &mut &[u8], len: usize) -> String {
    let raw = &buf[..len];
    let end = raw.iter().position(|b| *b == 0).unwrap_or(len);
    let s = String::from_utf8_lossy(&raw[..end]).into_owned();
    buf.advance(len);
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::testing::header_bytes;

    #[test]
    fn parses_fields() {
        let uuid = Uuid::from_u128(0xdead_beef);
        let h = AppHeader::parse(&header_bytes(uuid, "Weather", 0x20, 9)).unwrap();
        assert_eq!(h.uuid, uuid);
        assert_eq!(h.app_name, "Weather");
        assert_eq!(h.company_name, "Acme");
        assert_eq!(h.flags, 0x20);
        assert_eq!(h.icon_resource_id, 9);
        assert_eq!(h.sdk_version, Version { major: 5, minor: 86 });
        assert_eq!(h.app_version, Version { major: 1, minor: 4 });

        let m = h.metadata();
        assert_eq!(m.uuid, uuid);
        assert_eq!(m.app_name, "Weather");
    }

    #[test]
    fn rejects_bad_magic() {
        let mut data = header_bytes(Uuid::nil(), "x", 0, 0);
        data[0] = b'X';
        assert!(matches!(AppHeader::parse(&data), Err(BundleError::BadHeader(_))));
    }

    #[test]
    fn rejects_short_header() {
        let data = header_bytes(Uuid::nil(), "x", 0, 0);
        assert!(matches!(AppHeader::parse(&data[..60]), Err(BundleError::BadHeader(_))));
    }
}
