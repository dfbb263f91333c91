use byteorder::{BigEndian, ByteOrder};

use crate::error::Error;

/// A read cursor over a byte slice. Every read is big-endian and advances
/// the cursor by the width consumed; reads past the end fail with a decode
/// error carrying the current offset.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// A decode error anchored at the current offset.
    pub fn error(&self, reason: impl Into<String>) -> Error {
        Error::decode(reason, self.pos)
    }

    /// Consumes `n` raw bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| self.error("short read"))?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, Error> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64, Error> {
        Ok(BigEndian::read_u64(self.take(8)?))
    }

    pub fn read_i32(&mut self) -> Result<i32, Error> {
        Ok(BigEndian::read_i32(self.take(4)?))
    }

    pub fn read_f64(&mut self) -> Result<f64, Error> {
        Ok(BigEndian::read_f64(self.take(8)?))
    }
}

/// An append-only big-endian writer backed by a `Vec<u8>`.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    #[must_use]
    pub fn with_capacity(n: usize) -> Self {
        Self {
            buf: Vec::with_capacity(n),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        let mut b = [0u8; 2];
        BigEndian::write_u16(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn put_u32(&mut self, v: u32) {
        let mut b = [0u8; 4];
        BigEndian::write_u32(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn put_u64(&mut self, v: u64) {
        let mut b = [0u8; 8];
        BigEndian::write_u64(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn put_i32(&mut self, v: i32) {
        let mut b = [0u8; 4];
        BigEndian::write_i32(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn put_f64(&mut self, v: f64) {
        let mut b = [0u8; 8];
        BigEndian::write_f64(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn put_slice(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

#[test]
fn test_cursor_reads() {
    let data = [0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x03, 0xff];
    let mut c = Cursor::new(&data);
    assert_eq!(c.read_u8().unwrap(), 1);
    assert_eq!(c.read_u16().unwrap(), 2);
    assert_eq!(c.read_u32().unwrap(), 3);
    assert_eq!(c.position(), 7);
    assert_eq!(c.remaining(), 1);
    assert_eq!(c.read_u8().unwrap(), 0xff);
    assert!(c.is_at_end());
}

#[test]
fn test_cursor_short_read_offset() {
    let mut c = Cursor::new(&[0xab, 0xcd]);
    assert_eq!(c.read_u8().unwrap(), 0xab);
    let err = c.read_u32().unwrap_err();
    assert_eq!(
        err,
        Error::Decode {
            reason: "short read".into(),
            offset: 1
        }
    );
    // A failed read does not advance.
    assert_eq!(c.position(), 1);
    assert_eq!(c.read_u8().unwrap(), 0xcd);
}

#[test]
fn test_cursor_signed_and_float() {
    let mut w = Writer::default();
    w.put_i32(-5);
    w.put_f64(1.5);
    let out = w.into_vec();
    let mut c = Cursor::new(&out);
    assert_eq!(c.read_i32().unwrap(), -5);
    assert_eq!(c.read_f64().unwrap(), 1.5);
}

#[test]
fn test_writer_round_trips_u64() {
    let mut w = Writer::with_capacity(8);
    w.put_u64(0x0123_4567_89ab_cdef);
    let out = w.into_vec();
    assert_eq!(out, [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef]);
}
