//! Memcached ASCII protocol request builder

use crate::ProtocolError;
use bytes::{Bytes, BytesMut};
use itoa::Buffer;

/// Maximum key length (memcached protocol limit)
pub const MAX_KEY_LENGTH: usize = 250;

/// Check if a key is valid
pub fn is_valid_key(key: &[u8]) -> bool {
    if key.is_empty() || key.len() > MAX_KEY_LENGTH {
        return false;
    }
    // Keys cannot contain control characters or whitespace
    key.iter().all(|&b| b > 32 && b < 127)
}

/// Validate a key before it is written into a command line
pub fn validate_key(key: &str) -> Result<(), ProtocolError> {
    if key.len() > MAX_KEY_LENGTH {
        return Err(ProtocolError::KeyTooLong);
    }
    if !is_valid_key(key.as_bytes()) {
        return Err(ProtocolError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Builds the exact wire form of each supported command
pub struct CommandWriter {
    buf: BytesMut,
}

impl CommandWriter {
    /// Create a new command writer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Take the buffer as a finished command
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    /// set <key> <flags> <exptime> <bytes>\r\n<data>\r\n
    pub fn set(key: &str, flags: u32, exptime: u64, value: &str) -> Bytes {
        let mut itoa_buf = Buffer::new();
        let mut w = Self::new(key.len() + value.len() + 48);
        w.buf.extend_from_slice(b"set ");
        w.buf.extend_from_slice(key.as_bytes());
        w.buf.extend_from_slice(b" ");
        w.buf.extend_from_slice(itoa_buf.format(flags).as_bytes());
        w.buf.extend_from_slice(b" ");
        w.buf.extend_from_slice(itoa_buf.format(exptime).as_bytes());
        w.buf.extend_from_slice(b" ");
        w.buf.extend_from_slice(itoa_buf.format(value.len()).as_bytes());
        w.buf.extend_from_slice(b"\r\n");
        w.buf.extend_from_slice(value.as_bytes());
        w.buf.extend_from_slice(b"\r\n");
        w.finish()
    }

    /// get <key>\r\n
    pub fn get(key: &str) -> Bytes {
        let mut w = Self::new(key.len() + 6);
        w.buf.extend_from_slice(b"get ");
        w.buf.extend_from_slice(key.as_bytes());
        w.buf.extend_from_slice(b"\r\n");
        w.finish()
    }

    /// stats\r\n
    pub fn stats() -> Bytes {
        Bytes::from_static(b"stats\r\n")
    }

    /// stats items\r\n
    pub fn stats_items() -> Bytes {
        Bytes::from_static(b"stats items\r\n")
    }

    /// stats cachedump <slab> <count>\n
    ///
    /// Terminated by a bare LF, unlike every other command.
    pub fn stats_cachedump(slab_id: u32, count: u64) -> Bytes {
        let mut itoa_buf = Buffer::new();
        let mut w = Self::new(48);
        w.buf.extend_from_slice(b"stats cachedump ");
        w.buf.extend_from_slice(itoa_buf.format(slab_id).as_bytes());
        w.buf.extend_from_slice(b" ");
        w.buf.extend_from_slice(itoa_buf.format(count).as_bytes());
        w.buf.extend_from_slice(b"\n");
        w.finish()
    }

    /// version \r\n (the trailing space is what servers have always accepted)
    pub fn version() -> Bytes {
        Bytes::from_static(b"version \r\n")
    }
}
