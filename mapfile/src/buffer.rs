use crate::vbe::{self, VbeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("needed {needed} bytes at position {position}, only {available} left")]
    UnexpectedEnd {
        position: usize,
        needed: usize,
        available: usize,
    },
    #[error("position {position} is past the end of a {len} byte buffer")]
    InvalidPosition { position: usize, len: usize },
    #[error("invalid utf-8 string at position {0}")]
    InvalidString(usize),
    #[error(transparent)]
    Vbe(#[from] VbeError),
}

/// Big-endian cursor over an in-memory byte slice.
#[derive(Debug, Clone)]
pub struct ReadBuffer<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ReadBuffer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn set_position(&mut self, position: usize) -> Result<(), BufferError> {
        if position > self.data.len() {
            return Err(BufferError::InvalidPosition {
                position,
                len: self.data.len(),
            });
        }
        self.position = position;
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> Result<(), BufferError> {
        self.take(count).map(drop)
    }

    pub fn take(&mut self, count: usize) -> Result<&'a [u8], BufferError> {
        let available = self.remaining();
        if count > available {
            return Err(BufferError::UnexpectedEnd {
                position: self.position,
                needed: count,
                available,
            });
        }
        let bytes = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], BufferError> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, BufferError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, BufferError> {
        self.array().map(u16::from_be_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, BufferError> {
        self.array().map(u32::from_be_bytes)
    }

    pub fn read_i32(&mut self) -> Result<i32, BufferError> {
        self.array().map(i32::from_be_bytes)
    }

    pub fn read_i64(&mut self) -> Result<i64, BufferError> {
        self.array().map(i64::from_be_bytes)
    }

    /// 40 bit big-endian unsigned integer.
    pub fn read_u40(&mut self) -> Result<u64, BufferError> {
        let bytes = self.array::<5>()?;
        Ok(read_u40(&bytes))
    }

    pub fn read_vbe_unsigned(&mut self) -> Result<u32, BufferError> {
        let (value, read) = vbe::decode_unsigned(&self.data[self.position..])?;
        self.position += read;
        Ok(value)
    }

    pub fn read_vbe_signed(&mut self) -> Result<i32, BufferError> {
        let (value, read) = vbe::decode_signed(&self.data[self.position..])?;
        self.position += read;
        Ok(value)
    }

    /// UTF-8 string prefixed with its byte length as a VBE unsigned integer.
    pub fn read_str(&mut self) -> Result<&'a str, BufferError> {
        let start = self.position;
        let len = self.read_vbe_unsigned()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes).map_err(|_| BufferError::InvalidString(start))
    }
}

pub fn read_u40(bytes: &[u8; 5]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |value, &byte| (value << 8) | u64::from(byte))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_width_values() {
        let data = [0x01, 0x02, 0xFF, 0xFF, 0xFF, 0xFE, 0x80, 0x00, 0x00, 0x00, 0x2A];
        let mut buffer = ReadBuffer::new(&data);
        assert_eq!(buffer.read_u16(), Ok(0x0102));
        assert_eq!(buffer.read_i32(), Ok(-2));
        assert_eq!(buffer.read_u40(), Ok(0x80_0000_002A));
        assert_eq!(buffer.remaining(), 0);
        assert!(matches!(
            buffer.read_u8(),
            Err(BufferError::UnexpectedEnd { position: 11, needed: 1, available: 0 })
        ));
    }

    #[test]
    fn strings() {
        let data = [0x05, b'h', b'e', b'l', b'l', b'o', 0x03, b'a'];
        let mut buffer = ReadBuffer::new(&data);
        assert_eq!(buffer.read_str(), Ok("hello"));
        assert!(buffer.read_str().is_err());
    }

    #[test]
    fn invalid_utf8() {
        let data = [0x02, 0xC3, 0x28];
        assert_eq!(
            ReadBuffer::new(&data).read_str(),
            Err(BufferError::InvalidString(0))
        );
    }

    #[test]
    fn positions() {
        let data = [0u8; 4];
        let mut buffer = ReadBuffer::new(&data);
        assert!(buffer.set_position(4).is_ok());
        assert!(buffer.set_position(5).is_err());
        buffer.set_position(1).unwrap();
        buffer.skip(2).unwrap();
        assert_eq!(buffer.position(), 3);
        assert!(buffer.skip(2).is_err());
        assert_eq!(buffer.position(), 3);
    }
}
