use std::io::{Read, Write};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use serde::Serialize;

use super::{KeyValue, Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Gzip,
    Zlib,
}

impl Codec {
    /// Stored-value marker for this codec. NUL-framed so it cannot collide
    /// with ordinary user values, which keeps detection a pure prefix check.
    fn marker(&self) -> &'static str {
        match self {
            Codec::Gzip => "\u{0}gz\u{0}",
            Codec::Zlib => "\u{0}zl\u{0}",
        }
    }

    /// Leading bytes of the codec's binary output (GZIP `1f 8b`, Zlib `78`),
    /// re-checked after decoding as a corruption guard.
    fn magic(&self) -> &'static [u8] {
        match self {
            Codec::Gzip => &[0x1f, 0x8b],
            Codec::Zlib => &[0x78],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CompressionStats {
    pub total_items: usize,
    pub compressed_items: usize,
    pub stored_bytes: usize,
}

/// Transparent compression for large values.
///
/// Values longer than `threshold` are compressed on `set` and stored as the
/// codec marker followed by the base64 of the compressed bytes; everything
/// else is stored verbatim. `get` detects the marker and decompresses on the
/// way out, so `get(set(k, v)) == v` for any value.
pub struct CompressedStore {
    inner: Arc<dyn Store>,
    codec: Codec,
    threshold: usize,
}

impl CompressedStore {
    pub fn new(inner: Arc<dyn Store>, codec: Codec, threshold: usize) -> Self {
        Self {
            inner,
            codec,
            threshold,
        }
    }

    fn compress(&self, value: &str) -> Result<String, StoreError> {
        let compressed = match self.codec {
            Codec::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(value.as_bytes())?;
                encoder.finish()?
            }
            Codec::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(value.as_bytes())?;
                encoder.finish()?
            }
        };

        Ok(format!(
            "{}{}",
            self.codec.marker(),
            BASE64.encode(&compressed)
        ))
    }

    fn decompress(&self, stored: &str) -> Result<String, StoreError> {
        let payload = &stored[self.codec.marker().len()..];
        let compressed = BASE64
            .decode(payload)
            .map_err(|e| StoreError::Corrupt(format!("compressed payload: {}", e)))?;

        if !compressed.starts_with(self.codec.magic()) {
            return Err(StoreError::Corrupt("bad compression magic".to_string()));
        }

        let mut out = Vec::new();
        match self.codec {
            Codec::Gzip => GzDecoder::new(compressed.as_slice()).read_to_end(&mut out)?,
            Codec::Zlib => ZlibDecoder::new(compressed.as_slice()).read_to_end(&mut out)?,
        };

        String::from_utf8(out).map_err(|e| StoreError::Corrupt(format!("decompressed: {}", e)))
    }

    fn is_compressed(&self, stored: &str) -> bool {
        stored.starts_with(self.codec.marker())
    }

    pub fn stats(&self) -> CompressionStats {
        let items = match self.inner.list_all() {
            Ok(items) => items,
            Err(_) => return CompressionStats::default(),
        };

        let mut stats = CompressionStats {
            total_items: items.len(),
            ..Default::default()
        };
        for item in &items {
            stats.stored_bytes += item.value.len();
            if self.is_compressed(&item.value) {
                stats.compressed_items += 1;
            }
        }

        stats
    }
}

impl Store for CompressedStore {
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if value.len() > self.threshold {
            let compressed = self.compress(value)?;
            return self.inner.set(key, &compressed);
        }

        self.inner.set(key, value)
    }

    fn get(&self, key: &str) -> Result<String, StoreError> {
        let stored = self.inner.get(key)?;

        if self.is_compressed(&stored) {
            return self.decompress(&stored);
        }

        Ok(stored)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key)
    }

    fn list_all(&self) -> Result<Vec<KeyValue>, StoreError> {
        let mut items = self.inner.list_all()?;
        for item in &mut items {
            if self.is_compressed(&item.value) {
                item.value = self.decompress(&item.value)?;
            }
        }
        Ok(items)
    }

    fn close(&self) -> Result<(), StoreError> {
        self.inner.close()
    }
}
