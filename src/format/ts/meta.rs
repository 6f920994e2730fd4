//! Ordered key/value metadata carried in the PMT.
//!
//! The wire form is a 4-byte header followed by tab separated `key=value`
//! entries in insertion order:
//!
//! ```text
//! | 0x00 (reserved) | major << 4 | minor | body length (u16, BE) | body |
//! ```
//!
//! Keys and values must not contain `=` or tab.
//!
//! ```rust
//! use tsmeta::format::ts::meta::{self, Meta};
//!
//! let m = Meta::new();
//! m.add("loc", "-34.9,138.6");
//! m.add("codec", "h264");
//! let enc = m.encode().unwrap();
//! assert_eq!(meta::get("codec", &enc).unwrap(), "h264");
//! ```

use crate::error::{Result, TsError};
use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use std::collections::HashMap;

pub const HEADER_SIZE: usize = 4;

const MAJOR_VERSION: u8 = 1;
const MINOR_VERSION: u8 = 0;
const DATA_LEN_IDX: usize = 2;

/// Nominal access unit rate of the encoder that wrote the stream.
pub const WRITE_RATE_KEY: &str = "writeRate";
/// Unix time at which a table was written, when a wall clock is known.
pub const TIMESTAMP_KEY: &str = "ts";
/// Location of the recording device.
pub const LOCATION_KEY: &str = "loc";

/// Thread-safe ordered metadata store.
///
/// One lock covers every read and write, so [`encode`](Meta::encode) always
/// sees a consistent snapshot.
#[derive(Debug, Default)]
pub struct Meta {
    entries: Mutex<Vec<(String, String)>>,
}

impl Meta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `pairs` in order. A repeated key keeps its
    /// first position and takes the last value.
    pub fn with_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let m = Self::new();
        for (k, v) in pairs {
            m.add(k, v);
        }
        m
    }

    /// Creates a store from a map. Order follows the map's iteration order.
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        Self::with_pairs(map.iter().map(|(k, v)| (k.clone(), v.clone())))
    }

    /// Inserts or updates `key`, keeping the position of an existing key.
    pub fn add(&self, key: impl Into<String>, val: impl Into<String>) {
        let key = key.into();
        let val = val.into();
        let mut entries = self.entries.lock();
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = val,
            None => entries.push((key, val)),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Returns a copy of all entries.
    pub fn all(&self) -> HashMap<String, String> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn delete(&self, key: &str) {
        self.entries.lock().retain(|(k, _)| k != key);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Encodes the store with its header.
    pub fn encode(&self) -> Result<Bytes> {
        let body = self.encode_as_string();
        let len = u16::try_from(body.len()).map_err(|_| {
            TsError::InvalidData(format!("metadata body of {} bytes is too long", body.len()))
        })?;
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + body.len());
        buf.put_u8(0x00);
        buf.put_u8(MAJOR_VERSION << 4 | MINOR_VERSION);
        buf.put_u16(len);
        buf.put_slice(body.as_bytes());
        Ok(buf.freeze())
    }

    /// Encodes the entries without the header.
    pub fn encode_as_string(&self) -> String {
        let entries = self.entries.lock();
        let mut s = String::new();
        for (i, (k, v)) in entries.iter().enumerate() {
            if i > 0 {
                s.push('\t');
            }
            s.push_str(k);
            s.push('=');
            s.push_str(v);
        }
        s
    }
}

fn body(d: &[u8]) -> Result<&str> {
    if d.len() < HEADER_SIZE || d[0] != 0 {
        return Err(TsError::InvalidMetadata);
    }
    let len = u16::from_be_bytes([d[DATA_LEN_IDX], d[DATA_LEN_IDX + 1]]) as usize;
    if len != d.len() - HEADER_SIZE {
        return Err(TsError::InvalidMetadata);
    }
    std::str::from_utf8(&d[HEADER_SIZE..]).map_err(|_| TsError::UnexpectedMetaFormat)
}

fn split_entry(entry: &str) -> Result<(&str, &str)> {
    let mut parts = entry.split('=');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(k), Some(v), None) => Ok((k, v)),
        _ => Err(TsError::UnexpectedMetaFormat),
    }
}

fn entries(s: &str) -> impl Iterator<Item = &str> {
    s.split('\t').filter(move |_| !s.is_empty())
}

/// Returns the keys of encoded metadata in order.
pub fn keys(d: &[u8]) -> Result<Vec<String>> {
    Ok(get_all(d)?.into_iter().map(|(k, _)| k).collect())
}

/// Returns the value of `key` in encoded metadata.
pub fn get(key: &str, d: &[u8]) -> Result<String> {
    for entry in entries(body(d)?) {
        let (k, v) = split_entry(entry)?;
        if k == key {
            return Ok(v.to_string());
        }
    }
    Err(TsError::MetaKeyAbsent(key.to_string()))
}

/// Returns all entries of encoded metadata in order.
pub fn get_all(d: &[u8]) -> Result<Vec<(String, String)>> {
    entries(body(d)?)
        .map(|e| split_entry(e).map(|(k, v)| (k.to_string(), v.to_string())))
        .collect()
}

pub fn get_all_as_map(d: &[u8]) -> Result<HashMap<String, String>> {
    get_all_from_string(body(d)?)
}

/// Decodes a header-less body as produced by [`Meta::encode_as_string`].
pub fn get_all_from_string(s: &str) -> Result<HashMap<String, String>> {
    entries(s)
        .map(|e| split_entry(e).map(|(k, v)| (k.to_string(), v.to_string())))
        .collect()
}
