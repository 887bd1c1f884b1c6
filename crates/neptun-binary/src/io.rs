use bytes::{Buf, BufMut};

use crate::error::{BinaryError, Result};

/// Cursor over a borrowed byte slice. All multi-byte reads are big-endian.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

macro_rules! impl_reader_primitives {
    ($($name:ident => $ty:ty, $get:ident, $size:expr);* $(;)?) => {
        $(
            #[inline]
            pub fn $name(&mut self) -> Result<$ty> {
                self.require($size)?;
                let mut chunk = &self.buffer[self.position..];
                let value = chunk.$get();
                self.position += $size;
                Ok(value)
            }
        )*
    };
}

impl<'a> ByteReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn require(&self, count: usize) -> Result<()> {
        if count > self.remaining() {
            return Err(BinaryError::UnexpectedEof {
                needed: count,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    impl_reader_primitives! {
        read_u8 => u8, get_u8, 1;
        read_i8 => i8, get_i8, 1;
        read_u16 => u16, get_u16, 2;
        read_i16 => i16, get_i16, 2;
        read_u32 => u32, get_u32, 4;
        read_i32 => i32, get_i32, 4;
        read_u64 => u64, get_u64, 8;
        read_i64 => i64, get_i64, 8;
        read_f32 => f32, get_f32, 4;
        read_f64 => f64, get_f64, 8;
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Borrows `len` bytes out of the underlying slice.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.require(len)?;
        let bytes = &self.buffer[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }
}

/// Cursor over a borrowed mutable byte slice. All multi-byte writes are
/// big-endian. The caller owns the backing storage, so a full buffer is a
/// recoverable error rather than a reallocation.
#[derive(Debug)]
pub struct ByteWriter<'a> {
    buffer: &'a mut [u8],
    position: usize,
}

macro_rules! impl_writer_primitives {
    ($($name:ident => $ty:ty, $put:ident, $size:expr);* $(;)?) => {
        $(
            #[inline]
            pub fn $name(&mut self, value: $ty) -> Result<()> {
                self.require($size)?;
                let mut chunk = &mut self.buffer[self.position..];
                chunk.$put(value);
                self.position += $size;
                Ok(())
            }
        )*
    };
}

impl<'a> ByteWriter<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    fn require(&self, count: usize) -> Result<()> {
        if count > self.remaining() {
            return Err(BinaryError::UnexpectedEof {
                needed: count,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    impl_writer_primitives! {
        write_u8 => u8, put_u8, 1;
        write_i8 => i8, put_i8, 1;
        write_u16 => u16, put_u16, 2;
        write_i16 => i16, put_i16, 2;
        write_u32 => u32, put_u32, 4;
        write_i32 => i32, put_i32, 4;
        write_u64 => u64, put_u64, 8;
        write_i64 => i64, put_i64, 8;
        write_f32 => f32, put_f32, 4;
        write_f64 => f64, put_f64, 8;
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(value as u8)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.require(bytes.len())?;
        self.buffer[self.position..self.position + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
        Ok(())
    }

    /// The prefix written so far.
    pub fn written(&self) -> &[u8] {
        &self.buffer[..self.position]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_integers() {
        let data = [0x01, 0x02, 0x03, 0x04, 0xff, 0xfe];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_u32().unwrap(), 0x01020304);
        assert_eq!(reader.read_u16().unwrap(), 0xfffe);
        assert!(reader.is_empty());
    }

    #[test]
    fn write_then_read_round_trip() {
        let mut storage = [0u8; 32];
        let mut writer = ByteWriter::new(&mut storage);
        writer.write_u8(7).unwrap();
        writer.write_u16(513).unwrap();
        writer.write_u32(70_000).unwrap();
        writer.write_bytes(b"abc").unwrap();
        let written = writer.position();
        assert_eq!(written, 1 + 2 + 4 + 3);

        let mut reader = ByteReader::new(&storage[..written]);
        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_u16().unwrap(), 513);
        assert_eq!(reader.read_u32().unwrap(), 70_000);
        assert_eq!(reader.read_bytes(3).unwrap(), b"abc");
    }

    #[test]
    fn read_past_end_reports_eof() {
        let data = [0x01, 0x02];
        let mut reader = ByteReader::new(&data);
        assert_eq!(
            reader.read_u32(),
            Err(BinaryError::UnexpectedEof {
                needed: 4,
                remaining: 2
            })
        );
        // The failed read must not move the cursor.
        assert_eq!(reader.read_u16().unwrap(), 0x0102);
    }

    #[test]
    fn write_past_end_reports_eof() {
        let mut storage = [0u8; 3];
        let mut writer = ByteWriter::new(&mut storage);
        writer.write_u16(1).unwrap();
        assert_eq!(
            writer.write_u32(2),
            Err(BinaryError::UnexpectedEof {
                needed: 4,
                remaining: 1
            })
        );
        assert_eq!(writer.position(), 2);
    }
}
