use bytes::BufMut;
use std::io::{Cursor, Write};
use uuid::Uuid;
use zip::write::SimpleFileOptions;

use crate::bundle::header::{HEADER_LEN, MAGIC};

pub fn header_bytes(uuid: Uuid, name: &str, flags: u32, icon: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN);
    buf.put_slice(MAGIC);
    buf.put_slice(&[16, 0]); // struct version
    buf.put_slice(&[5, 86]); // sdk
    buf.put_slice(&[1, 4]); // app
    buf.put_u16_le(0x1000);
    buf.put_u32_le(0x84);
    buf.put_u32_le(0xcafe_f00d);
    put_cstr(&mut buf, name, 32);
    put_cstr(&mut buf, "Acme", 32);
    buf.put_u32_le(icon);
    buf.put_u32_le(0);
    buf.put_u32_le(flags);
    buf.put_u32_le(0);
    buf.put_slice(uuid.as_bytes());
    buf
}

fn put_cstr(buf: &mut Vec<u8>, s: &str, len: usize) {
    buf.put_slice(s.as_bytes());
    buf.put_bytes(0, len - s.len());
}

/// An app binary: header followed by `body_len` filler bytes.
pub fn app_binary(uuid: Uuid, name: &str, body_len: usize) -> Vec<u8> {
    let mut bin = header_bytes(uuid, name, 0, 1);
    bin.resize(HEADER_LEN + body_len, 0xab);
    bin
}

pub fn manifest(resources: bool, worker: bool) -> String {
    let mut m = serde_json::json!({
        "manifestVersion": 2,
        "type": "application",
        "application": { "name": "pebble-app.bin", "size": 0, "crc": 0 },
    });
    if resources {
        m["resources"] = serde_json::json!({ "name": "app_resources.pbpack" });
    }
    if worker {
        m["worker"] = serde_json::json!({ "name": "pebble-worker.bin" });
    }
    m.to_string()
}

pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut w = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in files {
        w.start_file(*name, SimpleFileOptions::default()).unwrap();
        w.write_all(data).unwrap();
    }
    w.finish().unwrap().into_inner()
}
