//! Fixed-size byte buffer with big-endian typed accessors.

use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

use crate::number::{Interpretation, Number, NumberType};

/// Largest buffer the machine addresses: 2^16 bytes.
pub const MAX_MEMORY_SIZE: usize = 1 << 16;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("address {address} + {length} bytes is outside a buffer of {size} bytes")]
    OutOfRange {
        address: usize,
        length: usize,
        size: usize,
    },

    #[error("buffer of {0} bytes exceeds the maximum of {MAX_MEMORY_SIZE}")]
    TooLarge(usize),
}

/// A flat byte image. Created with a fixed size and never resized.
///
/// All multi-byte accesses are big-endian regardless of the host layout.
/// Integer writes are truncated through the type's bitmask; floats are
/// stored as IEEE-754.
#[derive(Debug, Clone)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    pub fn new(size: usize) -> Result<Self, MemoryError> {
        if size > MAX_MEMORY_SIZE {
            return Err(MemoryError::TooLarge(size));
        }
        Ok(Self {
            bytes: vec![0; size],
        })
    }

    /// Wrap an existing image, e.g. an encoded program.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, MemoryError> {
        if bytes.len() > MAX_MEMORY_SIZE {
            return Err(MemoryError::TooLarge(bytes.len()));
        }
        Ok(Self { bytes })
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn range(&self, address: usize, length: usize) -> Result<(), MemoryError> {
        if address.checked_add(length).map_or(true, |end| end > self.bytes.len()) {
            return Err(MemoryError::OutOfRange {
                address,
                length,
                size: self.bytes.len(),
            });
        }
        Ok(())
    }

    pub fn read(&self, address: usize, ty: NumberType) -> Result<Number, MemoryError> {
        let length = ty.size_in_bytes();
        self.range(address, length)?;
        let slice = &self.bytes[address..address + length];
        let value = match ty.interpretation() {
            Interpretation::Unsigned => Number::Unsigned(BigEndian::read_uint(slice, length)),
            Interpretation::Signed => Number::Signed(BigEndian::read_int(slice, length)),
            Interpretation::Float => match length {
                4 => Number::Float(BigEndian::read_f32(slice) as f64),
                _ => Number::Float(BigEndian::read_f64(slice)),
            },
        };
        Ok(value)
    }

    pub fn write(&mut self, address: usize, ty: NumberType, value: Number) -> Result<(), MemoryError> {
        let length = ty.size_in_bytes();
        self.range(address, length)?;
        let slice = &mut self.bytes[address..address + length];
        match ty.interpretation() {
            Interpretation::Unsigned | Interpretation::Signed => {
                BigEndian::write_uint(slice, value.to_u64() & ty.bitmask(), length);
            }
            Interpretation::Float => match length {
                4 => BigEndian::write_f32(slice, value.to_f64() as f32),
                _ => BigEndian::write_f64(slice, value.to_f64()),
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_unsigned() {
        let mut memory = Memory::new(64).unwrap();
        for ty in [NumberType::Uint8, NumberType::Uint16, NumberType::Uint32, NumberType::Uint64] {
            memory.write(0, ty, Number::Unsigned(42)).unwrap();
            assert_eq!(memory.read(0, ty).unwrap(), Number::Unsigned(42));
        }
    }

    #[test]
    fn test_round_trip_signed_negative() {
        let mut memory = Memory::new(64).unwrap();
        for ty in [NumberType::Sint8, NumberType::Sint16, NumberType::Sint32, NumberType::Sint64] {
            memory.write(8, ty, Number::Signed(-5)).unwrap();
            assert_eq!(memory.read(8, ty).unwrap(), Number::Signed(-5));
        }
    }

    #[test]
    fn test_round_trip_floats() {
        let mut memory = Memory::new(64).unwrap();
        memory.write(0, NumberType::Fp64, Number::Float(3.25)).unwrap();
        assert_eq!(memory.read(0, NumberType::Fp64).unwrap(), Number::Float(3.25));

        memory.write(8, NumberType::Fp32, Number::Float(1.5)).unwrap();
        assert_eq!(memory.read(8, NumberType::Fp32).unwrap(), Number::Float(1.5));
    }

    #[test]
    fn test_write_masks_through_bitmask() {
        let mut memory = Memory::new(16).unwrap();
        memory.write(0, NumberType::Uint8, Number::Unsigned(0x1FF)).unwrap();
        assert_eq!(memory.read(0, NumberType::Uint8).unwrap(), Number::Unsigned(0xFF));

        memory.write(0, NumberType::Uint16, Number::Unsigned(0x1_2345)).unwrap();
        assert_eq!(memory.read(0, NumberType::Uint16).unwrap(), Number::Unsigned(0x2345));
    }

    #[test]
    fn test_big_endian_byte_order() {
        let mut memory = Memory::new(4).unwrap();
        memory.write(0, NumberType::Uint16, Number::Unsigned(0x1234)).unwrap();
        assert_eq!(&memory.as_bytes()[0..2], &[0x12, 0x34]);

        memory.write(0, NumberType::Uint32, Number::Unsigned(0xDEAD_BEEF)).unwrap();
        assert_eq!(memory.as_bytes(), &[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_signed_sign_extension() {
        let mut memory = Memory::new(4).unwrap();
        memory.write(0, NumberType::Sint16, Number::Signed(-1)).unwrap();
        assert_eq!(&memory.as_bytes()[0..2], &[0xFF, 0xFF]);
        assert_eq!(memory.read(0, NumberType::Sint16).unwrap(), Number::Signed(-1));
    }

    #[test]
    fn test_out_of_range_read() {
        let memory = Memory::new(4).unwrap();
        let result = memory.read(2, NumberType::Uint32);
        match result {
            Err(MemoryError::OutOfRange { address: 2, length: 4, size: 4 }) => {}
            other => panic!("expected OutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_write() {
        let mut memory = Memory::new(1).unwrap();
        assert!(memory.write(1, NumberType::Uint8, Number::Unsigned(0)).is_err());
    }

    #[test]
    fn test_size_limits() {
        assert!(Memory::new(MAX_MEMORY_SIZE).is_ok());
        match Memory::new(MAX_MEMORY_SIZE + 1) {
            Err(MemoryError::TooLarge(size)) => assert_eq!(size, MAX_MEMORY_SIZE + 1),
            other => panic!("expected TooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_address_overflow_is_out_of_range() {
        let memory = Memory::new(16).unwrap();
        assert!(memory.read(usize::MAX, NumberType::Uint64).is_err());
    }
}
