//! Binary primitives for the graph format
//!
//! All integers are big-endian. Strings and byte arrays carry an `int32`
//! length prefix. Reads are bounds-checked and never panic on short input.

use crate::address::{Address, FieldKey};
use crate::error::DecodeError;
use bytes::{Buf, BufMut, BytesMut};
use uuid::Uuid;

/// Growable output buffer
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: BytesMut,
}

impl ByteWriter {
    /// Create an empty writer
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing was written
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Write a single byte
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    /// Write a boolean as `0` or `1`
    #[inline]
    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    /// Write an unsigned 16-bit integer
    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    /// Write a signed 32-bit integer
    #[inline]
    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    /// Write a 32-bit float
    #[inline]
    pub fn write_f32(&mut self, value: f32) {
        self.buf.put_f32(value);
    }

    /// Write a length prefix
    ///
    /// # Panics
    /// Panics if `len` does not fit into an `int32`.
    pub fn write_len(&mut self, len: usize) {
        let len = i32::try_from(len).expect("length exceeds int32 range");
        self.buf.put_i32(len);
    }

    /// Write a length-prefixed byte array
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_len(bytes.len());
        self.buf.put_slice(bytes);
    }

    /// Write a length-prefixed UTF-8 string
    pub fn write_string(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    /// Write raw bytes without prefix
    #[inline]
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Write a UUID as 16 raw bytes
    #[inline]
    pub fn write_uuid(&mut self, uuid: &Uuid) {
        self.buf.put_slice(uuid.as_bytes());
    }

    /// Write an address: uuid, key count, keys
    ///
    /// # Panics
    /// Panics if the path has more than `u16::MAX` keys.
    pub fn write_address(&mut self, address: &Address) {
        self.write_uuid(&address.uuid());
        let keys = address.field_keys();
        self.write_u16(u16::try_from(keys.len()).expect("address path too long"));
        for key in keys {
            self.write_u16(*key);
        }
    }

    /// Finish and return the written bytes
    #[inline]
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

/// Checked reader over a byte slice
#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
}

impl<'a> ByteReader<'a> {
    /// Create a reader over `bytes`
    #[inline]
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { buf: bytes }
    }

    /// Bytes not yet consumed
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        if self.buf.remaining() < needed {
            return Err(DecodeError::UnexpectedEof {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    /// Read a single byte
    ///
    /// # Errors
    /// Returns error on short input
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    /// Read a `0`/`1` boolean
    ///
    /// # Errors
    /// Returns error on short input or any other byte value
    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DecodeError::InvalidFlag(other)),
        }
    }

    /// Read an unsigned 16-bit integer
    ///
    /// # Errors
    /// Returns error on short input
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    /// Read a signed 32-bit integer
    ///
    /// # Errors
    /// Returns error on short input
    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    /// Read a 32-bit float
    ///
    /// # Errors
    /// Returns error on short input
    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        self.ensure(4)?;
        Ok(self.buf.get_f32())
    }

    /// Read a non-negative length prefix
    ///
    /// # Errors
    /// Returns error on short input or a negative length
    pub fn read_len(&mut self) -> Result<usize, DecodeError> {
        let len = self.read_i32()?;
        usize::try_from(len).map_err(|_| DecodeError::InvalidLength(len))
    }

    /// Read `len` raw bytes
    ///
    /// # Errors
    /// Returns error on short input
    pub fn read_raw(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    /// Read a length-prefixed byte array
    ///
    /// # Errors
    /// Returns error on short input
    pub fn read_bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_len()?;
        Ok(self.read_raw(len)?.to_vec())
    }

    /// Read a length-prefixed UTF-8 string
    ///
    /// # Errors
    /// Returns error on short input or invalid UTF-8
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        Ok(String::from_utf8(self.read_bytes()?)?)
    }

    /// Read a 16-byte UUID
    ///
    /// # Errors
    /// Returns error on short input
    pub fn read_uuid(&mut self) -> Result<Uuid, DecodeError> {
        let raw = self.read_raw(16)?;
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(raw);
        Ok(Uuid::from_bytes(bytes))
    }

    /// Read an address written by [`ByteWriter::write_address`]
    ///
    /// # Errors
    /// Returns error on short input
    pub fn read_address(&mut self) -> Result<Address, DecodeError> {
        let uuid = self.read_uuid()?;
        let count = self.read_u16()?;
        let keys = (0..count)
            .map(|_| self.read_u16())
            .collect::<Result<Vec<FieldKey>, _>>()?;
        Ok(Address::new(uuid, keys))
    }
}
