use thiserror::Error;

use crate::plat::MEMORY_SIZE;

/// An access outside the 64 KiB address space.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("memory fault at 0x{address:05X}")]
pub struct MemoryFault {
    pub address: usize,
}

/// The CPU's flat, bounds-checked, byte-addressable memory.
pub struct Ram {
    memory: Box<[u8]>,
}

impl Ram {
    /// Creates a new [`Ram`] instance, allocating and initializing its memory to [0u8; 65536].
    pub fn new() -> Self {
        Self {
            memory: vec![0u8; MEMORY_SIZE].into_boxed_slice(),
        }
    }

    pub fn read(&self, address: usize) -> Result<u8, MemoryFault> {
        self.memory
            .get(address)
            .copied()
            .ok_or(MemoryFault { address })
    }

    pub fn write(&mut self, address: usize, value: u8) -> Result<(), MemoryFault> {
        let cell = self
            .memory
            .get_mut(address)
            .ok_or(MemoryFault { address })?;
        *cell = value;
        Ok(())
    }

    /// Reads a data word: the byte at `address` is the low byte, `address + 1` the high byte.
    pub fn read_word(&self, address: usize) -> Result<u16, MemoryFault> {
        let lo = self.read(address)?;
        let hi = self.read(address + 1)?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    /// Writes a data word, low byte first. Nothing is written if either byte is out of range.
    pub fn write_word(&mut self, address: usize, value: u16) -> Result<(), MemoryFault> {
        let len = self.memory.len();
        if address + 1 >= len {
            let address = if address < len { address + 1 } else { address };
            return Err(MemoryFault { address });
        }
        let [lo, hi] = value.to_le_bytes();
        self.write(address, lo)?;
        self.write(address + 1, hi)
    }

    /// Copies `bytes` into memory starting at `base`. Nothing is written if it doesn't fit.
    pub fn load(&mut self, base: usize, bytes: &[u8]) -> Result<(), MemoryFault> {
        let end = base + bytes.len();
        let dest = self
            .memory
            .get_mut(base..end)
            .ok_or(MemoryFault {
                address: end.max(base + 1) - 1,
            })?;
        dest.copy_from_slice(bytes);
        Ok(())
    }

    /// Fills `len` bytes starting at `base` with `value`, clipped to the end of memory.
    pub fn fill(&mut self, base: usize, len: usize, value: u8) {
        let end = (base + len).min(self.memory.len());
        if let Some(dest) = self.memory.get_mut(base..end) {
            dest.fill(value);
        }
    }

    pub fn clear(&mut self) {
        self.memory.fill(0);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.memory
    }
}

impl Default for Ram {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        let mut ram = Ram::new();
        assert_eq!(ram.read(0xFFFF), Ok(0));
        assert_eq!(ram.read(0x10000), Err(MemoryFault { address: 0x10000 }));
        assert_eq!(ram.write(0x10000, 1), Err(MemoryFault { address: 0x10000 }));
        assert!(ram.read_word(0xFFFF).is_err());
        assert!(ram.write_word(0xFFFF, 0x1234).is_err());
        assert_eq!(ram.read(0xFFFF), Ok(0));
    }

    #[test]
    fn test_word_is_little_endian() {
        let mut ram = Ram::new();
        ram.write_word(0x100, 0x1234).unwrap();
        assert_eq!(ram.read(0x100), Ok(0x34));
        assert_eq!(ram.read(0x101), Ok(0x12));
        assert_eq!(ram.read_word(0x100), Ok(0x1234));
    }

    #[test]
    fn test_load() {
        let mut ram = Ram::new();
        ram.load(0xFFFE, &[1, 2]).unwrap();
        assert_eq!(&ram.as_slice()[0xFFFE..], &[1, 2]);
        assert_eq!(ram.load(0xFFFE, &[1, 2, 3]), Err(MemoryFault { address: 0x10000 }));
        ram.fill(0x10, 4, 0xFF);
        assert_eq!(&ram.as_slice()[0x0F..0x15], &[0, 0xFF, 0xFF, 0xFF, 0xFF, 0]);
        ram.fill(0xFFFF, 16, 0xAA);
        assert_eq!(ram.read(0xFFFF), Ok(0xAA));
        ram.clear();
        assert!(ram.as_slice().iter().all(|b| *b == 0));
    }
}
