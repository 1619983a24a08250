use crate::error::Result;
use std::borrow::Cow;

/// One line read from the followed file, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    bytes: Vec<u8>,
    offset: u64,
    terminated: bool,
}

impl Record {
    pub(crate) fn new(bytes: Vec<u8>, offset: u64, terminated: bool) -> Self {
        Self {
            bytes,
            offset,
            terminated,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// File offset of the first byte of this record.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// False when the record was flushed after the quiescence window without
    /// ever seeing a terminator. Such a record may be the head of a line
    /// whose remainder arrives later as a separate record.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    pub fn into_string(self) -> Result<String> {
        Ok(String::from_utf8(self.bytes)?)
    }
}
