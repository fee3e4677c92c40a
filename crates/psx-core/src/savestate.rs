//! Positional binary save states.
//!
//! A state is a flat little-endian concatenation of every component in a
//! fixed order; there is no header or version. Each component implements
//! [`Snapshot`] and must read back exactly what it wrote. Variable-length
//! pieces (FIFOs) carry a `u32` length prefix.

use thiserror::Error;

/// Errors raised while restoring a save state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaveStateError {
    /// The buffer ended before the component being read was complete.
    #[error("save state truncated at byte {offset} while reading {component}")]
    Truncated {
        /// Component being read.
        component: &'static str,
        /// Offset where the read ran out of data.
        offset: usize,
    },
    /// Bytes remained after every component was read.
    #[error("save state has {remaining} trailing bytes")]
    TrailingBytes {
        /// Unread byte count.
        remaining: usize,
    },
    /// A field held a value no component can represent.
    #[error("invalid value {value:#x} for {field}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: u32,
    },
}

/// Appends little-endian fields to a growing buffer.
#[derive(Debug, Default)]
pub struct StateWriter {
    buf: Vec<u8>,
}

impl StateWriter {
    /// Creates a writer with `capacity` bytes reserved.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub(crate) fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn write_bool(&mut self, v: bool) {
        self.buf.push(u8::from(v));
    }

    pub(crate) fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Writes a `u32` length prefix followed by the bytes.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn write_fifo(&mut self, data: impl ExactSizeIterator<Item = u8>) {
        self.write_u32(data.len() as u32);
        self.buf.extend(data);
    }

    pub(crate) fn write_words(&mut self, words: &[u32]) {
        for word in words {
            self.write_u32(*word);
        }
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consumes the writer and returns the buffer.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Reads little-endian fields back in order.
#[derive(Debug)]
pub struct StateReader<'a> {
    data: &'a [u8],
    pos: usize,
    component: &'static str,
}

impl<'a> StateReader<'a> {
    /// Creates a reader over `data`.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            component: "state",
        }
    }

    /// Names the component being read, for error reporting.
    pub(crate) fn enter(&mut self, component: &'static str) {
        self.component = component;
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], SaveStateError> {
        if self.data.len() - self.pos < len {
            return Err(SaveStateError::Truncated {
                component: self.component,
                offset: self.pos,
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], SaveStateError> {
        let mut bytes = [0; N];
        bytes.copy_from_slice(self.take(N)?);
        Ok(bytes)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, SaveStateError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, SaveStateError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, SaveStateError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, SaveStateError> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    pub(crate) fn read_bool(&mut self) -> Result<bool, SaveStateError> {
        Ok(self.read_u8()? != 0)
    }

    pub(crate) fn read_into(&mut self, out: &mut [u8]) -> Result<(), SaveStateError> {
        out.copy_from_slice(self.take(out.len())?);
        Ok(())
    }

    /// Reads a length-prefixed byte run, rejecting lengths above `max`.
    pub(crate) fn read_fifo(&mut self, max: usize) -> Result<&'a [u8], SaveStateError> {
        let len = self.read_u32()?;
        if len as usize > max {
            return Err(SaveStateError::InvalidValue {
                field: self.component,
                value: len,
            });
        }
        self.take(len as usize)
    }

    pub(crate) fn read_words(&mut self, out: &mut [u32]) -> Result<(), SaveStateError> {
        for word in out {
            *word = self.read_u32()?;
        }
        Ok(())
    }

    /// Fails unless every byte has been consumed.
    ///
    /// # Errors
    ///
    /// Returns [`SaveStateError::TrailingBytes`] when data remains.
    pub fn finish(self) -> Result<(), SaveStateError> {
        let remaining = self.data.len() - self.pos;
        if remaining == 0 {
            Ok(())
        } else {
            Err(SaveStateError::TrailingBytes { remaining })
        }
    }
}

/// A component that can be written to and restored from a save state.
pub trait Snapshot {
    /// Appends this component's state.
    fn save(&self, w: &mut StateWriter);

    /// Restores this component's state.
    ///
    /// # Errors
    ///
    /// Returns [`SaveStateError`] when the data is truncated or malformed.
    fn load(&mut self, r: &mut StateReader<'_>) -> Result<(), SaveStateError>;
}

#[cfg(test)]
mod tests {
    use super::{SaveStateError, StateReader, StateWriter};

    #[test]
    fn fields_read_back_in_write_order() {
        let mut w = StateWriter::default();
        w.write_u8(7);
        w.write_u16(0xBEEF);
        w.write_u32(0xDEAD_BEEF);
        w.write_u64(u64::MAX - 1);
        w.write_bool(true);
        w.write_fifo([1u8, 2, 3].into_iter());
        let bytes = w.into_bytes();

        let mut r = StateReader::new(&bytes);
        assert_eq!(r.read_u8().unwrap(), 7);
        assert_eq!(r.read_u16().unwrap(), 0xBEEF);
        assert_eq!(r.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(r.read_u64().unwrap(), u64::MAX - 1);
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_fifo(16).unwrap(), &[1, 2, 3]);
        r.finish().unwrap();
    }

    #[test]
    fn truncated_read_names_component_and_offset() {
        let mut r = StateReader::new(&[1, 2]);
        r.enter("gpu");
        assert_eq!(
            r.read_u32(),
            Err(SaveStateError::Truncated {
                component: "gpu",
                offset: 0
            })
        );
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut r = StateReader::new(&[0, 0, 0, 0, 9]);
        r.read_u32().unwrap();
        assert_eq!(r.finish(), Err(SaveStateError::TrailingBytes { remaining: 1 }));
    }

    #[test]
    fn oversized_fifo_length_is_rejected() {
        let mut w = StateWriter::default();
        w.write_u32(100);
        let bytes = w.into_bytes();
        let mut r = StateReader::new(&bytes);
        r.enter("cdrom");
        assert!(matches!(
            r.read_fifo(16),
            Err(SaveStateError::InvalidValue { value: 100, .. })
        ));
    }
}
