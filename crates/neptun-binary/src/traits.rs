use crate::error::BinaryError;
use crate::io::{ByteReader, ByteWriter};

/// Trait for types that can be read from a `ByteReader`.
pub trait Readable: Sized {
    /// Reads an instance of `Self` from the reader.
    fn read(reader: &mut ByteReader) -> Result<Self, BinaryError>;
}

/// Trait for types that can be written to a `ByteWriter`.
pub trait Writable {
    /// Writes this instance to the writer.
    fn write(&self, writer: &mut ByteWriter) -> Result<(), BinaryError>;
}

macro_rules! impl_primitive_readable {
    ($($ty:ty => $method:ident),*) => {
        $(
            impl Readable for $ty {
                #[inline]
                fn read(reader: &mut ByteReader) -> Result<Self, BinaryError> {
                    reader.$method()
                }
            }
        )*
    };
}

macro_rules! impl_primitive_writable {
    ($($ty:ty => $method:ident),*) => {
        $(
            impl Writable for $ty {
                #[inline]
                fn write(&self, writer: &mut ByteWriter) -> Result<(), BinaryError> {
                    writer.$method(*self)
                }
            }
        )*
    };
}

impl_primitive_readable! {
    u8 => read_u8, i8 => read_i8,
    u16 => read_u16, i16 => read_i16,
    u32 => read_u32, i32 => read_i32,
    u64 => read_u64, i64 => read_i64,
    f32 => read_f32, f64 => read_f64,
    bool => read_bool
}

impl_primitive_writable! {
    u8 => write_u8, i8 => write_i8,
    u16 => write_u16, i16 => write_i16,
    u32 => write_u32, i32 => write_i32,
    u64 => write_u64, i64 => write_i64,
    f32 => write_f32, f64 => write_f64,
    bool => write_bool
}

// Option<T>
impl<T: Readable> Readable for Option<T> {
    fn read(reader: &mut ByteReader) -> Result<Self, BinaryError> {
        if reader.read_bool()? {
            Ok(Some(T::read(reader)?))
        } else {
            Ok(None)
        }
    }
}

impl<T: Writable> Writable for Option<T> {
    fn write(&self, writer: &mut ByteWriter) -> Result<(), BinaryError> {
        if let Some(value) = self {
            writer.write_bool(true)?;
            value.write(writer)?;
        } else {
            writer.write_bool(false)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_round_trip_through_traits() {
        let mut storage = [0u8; 16];
        let mut writer = ByteWriter::new(&mut storage);
        42u32.write(&mut writer).unwrap();
        true.write(&mut writer).unwrap();
        Some(7u16).write(&mut writer).unwrap();
        let written = writer.position();

        let mut reader = ByteReader::new(&storage[..written]);
        assert_eq!(u32::read(&mut reader).unwrap(), 42);
        assert_eq!(bool::read(&mut reader).unwrap(), true);
        assert_eq!(Option::<u16>::read(&mut reader).unwrap(), Some(7));
    }
}
