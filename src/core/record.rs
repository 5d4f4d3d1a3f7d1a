use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::core::model::{AppMetadata, Version};

// Reserved watchface fields. Bundles carry no value for them and the device
// is always sent zero; unconfirmed whether firmware reads them at all.
pub const APP_FACE_BG_COLOR: u8 = 0;
pub const APP_FACE_TEMPLATE_ID: u8 = 0;

pub const APP_NAME_LEN: usize = 96;
pub const RECORD_LEN: usize = 16 + 4 + 4 + 6 + APP_NAME_LEN;

/// The app entry published to the device's registration store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRecord {
    pub uuid: Uuid,
    pub flags: u32,
    pub icon: u32,
    pub app_version: Version,
    pub sdk_version: Version,
    pub app_face_bg_color: u8,
    pub app_face_template_id: u8,
    pub app_name: String,
}

impl AppRecord {
    pub fn from_metadata(meta: &AppMetadata) -> Self {
        Self {
            uuid: meta.uuid,
            flags: meta.flags,
            icon: meta.icon_resource_id,
            app_version: meta.app_version,
            sdk_version: meta.sdk_version,
            app_face_bg_color: APP_FACE_BG_COLOR,
            app_face_template_id: APP_FACE_TEMPLATE_ID,
            app_name: meta.app_name.clone(),
        }
    }

    /// Little-endian wire form; the name is truncated and NUL-padded.
    pub fn serialise(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(RECORD_LEN);
        buf.put_slice(self.uuid.as_bytes());
        buf.put_u32_le(self.flags);
        buf.put_u32_le(self.icon);
        buf.put_u8(self.app_version.major);
        buf.put_u8(self.app_version.minor);
        buf.put_u8(self.sdk_version.major);
        buf.put_u8(self.sdk_version.minor);
        buf.put_u8(self.app_face_bg_color);
        buf.put_u8(self.app_face_template_id);

        let name = truncate_utf8(&self.app_name, APP_NAME_LEN);
        buf.put_slice(name.as_bytes());
        buf.put_bytes(0, APP_NAME_LEN - name.len());
        buf.freeze()
    }
}

fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
