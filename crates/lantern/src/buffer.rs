use bytes::Bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("buffer underflow: needed {needed} bytes, {remaining} remaining")]
    Underflow { needed: usize, remaining: usize },
    #[error("position {position} is past the end of a {len} byte buffer")]
    OutOfBounds { position: usize, len: usize },
}

macro_rules! primitive {
    ($put:ident, $get:ident, $ty:ty) => {
        pub fn $put(&mut self, value: $ty) {
            self.write(&value.to_be_bytes());
        }

        pub fn $get(&mut self) -> Result<$ty, BufferError> {
            let raw = self.take::<{ std::mem::size_of::<$ty>() }>()?;
            Ok(<$ty>::from_be_bytes(raw))
        }
    };
}

/// Growable byte buffer with a single read/write cursor.
///
/// All multi-byte values are big-endian. Writes at the cursor overwrite
/// existing bytes and extend the buffer when they run past its end; reads
/// never extend it and fail with [`BufferError::Underflow`] instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DynamicByteBuffer {
    data: Vec<u8>,
    position: usize,
}

impl DynamicByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            position: 0,
        }
    }

    /// Wraps existing bytes with the cursor at the start, ready for reading.
    pub fn wrap(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            position: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) -> Result<(), BufferError> {
        if position > self.data.len() {
            return Err(BufferError::OutOfBounds {
                position,
                len: self.data.len(),
            });
        }
        self.position = position;
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.data)
    }

    primitive!(put_u8, get_u8, u8);
    primitive!(put_i8, get_i8, i8);
    primitive!(put_u16, get_u16, u16);
    primitive!(put_i16, get_i16, i16);
    primitive!(put_u32, get_u32, u32);
    primitive!(put_i32, get_i32, i32);
    primitive!(put_u64, get_u64, u64);
    primitive!(put_i64, get_i64, i64);

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.write(bytes);
    }

    pub fn get_bytes(&mut self, len: usize) -> Result<Vec<u8>, BufferError> {
        self.ensure(len)?;
        let bytes = self.data[self.position..self.position + len].to_vec();
        self.position += len;
        Ok(bytes)
    }

    fn write(&mut self, bytes: &[u8]) {
        let end = self.position + bytes.len();
        let overlap = self.data.len().min(end).saturating_sub(self.position);

        self.data[self.position..self.position + overlap].copy_from_slice(&bytes[..overlap]);
        self.data.extend_from_slice(&bytes[overlap..]);
        self.position = end;
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], BufferError> {
        self.ensure(N)?;
        let mut raw = [0u8; N];
        raw.copy_from_slice(&self.data[self.position..self.position + N]);
        self.position += N;
        Ok(raw)
    }

    #[inline]
    fn ensure(&self, needed: usize) -> Result<(), BufferError> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(BufferError::Underflow { needed, remaining });
        }
        Ok(())
    }
}

impl From<Vec<u8>> for DynamicByteBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self::wrap(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_big_endian() {
        let mut buf = DynamicByteBuffer::new();
        buf.put_u16(0x0102);
        buf.put_i32(-2);
        buf.put_u64(1);

        assert_eq!(
            buf.as_slice(),
            &[0x01, 0x02, 0xff, 0xff, 0xff, 0xfe, 0, 0, 0, 0, 0, 0, 0, 1]
        );
        assert_eq!(buf.position(), 14);
    }

    #[test]
    fn reads_follow_write_order() {
        let mut buf = DynamicByteBuffer::new();
        buf.put_i8(-5);
        buf.put_u32(0xdead_beef);
        buf.put_i64(i64::MIN);
        buf.put_bytes(b"abc");

        let mut buf = DynamicByteBuffer::wrap(buf.into_vec());
        assert_eq!(buf.get_i8().unwrap(), -5);
        assert_eq!(buf.get_u32().unwrap(), 0xdead_beef);
        assert_eq!(buf.get_i64().unwrap(), i64::MIN);
        assert_eq!(buf.get_bytes(3).unwrap(), b"abc");
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn underflow_does_not_move_cursor() {
        let mut buf = DynamicByteBuffer::wrap(vec![0x00, 0x01]);

        assert_eq!(
            buf.get_i32(),
            Err(BufferError::Underflow {
                needed: 4,
                remaining: 2
            })
        );
        assert_eq!(buf.position(), 0);
        assert_eq!(buf.get_u16().unwrap(), 1);
        assert!(buf.get_u8().is_err());
    }

    #[test]
    fn write_inside_overwrites_then_extends() {
        let mut buf = DynamicByteBuffer::wrap(vec![0xaa, 0xbb, 0xcc]);
        buf.set_position(2).unwrap();
        buf.put_u16(0x0102);

        assert_eq!(buf.as_slice(), &[0xaa, 0xbb, 0x01, 0x02]);
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn set_position_rejects_past_end() {
        let mut buf = DynamicByteBuffer::wrap(vec![1, 2]);
        assert!(buf.set_position(2).is_ok());
        assert_eq!(
            buf.set_position(3),
            Err(BufferError::OutOfBounds { position: 3, len: 2 })
        );
        assert_eq!(buf.position(), 2);
    }
}
