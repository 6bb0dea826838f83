// CHIP-8 address space layout
pub const ROM_START_ADDRESS: usize = 0x200;
pub const MEMORY_SIZE: usize = 4096;
pub const MAX_ROM_SIZE: usize = MEMORY_SIZE - ROM_START_ADDRESS;

/// 4KB address space. Every access wraps modulo [`MEMORY_SIZE`], so no
/// address can fault.
pub struct Memory {
    bytes: [u8; MEMORY_SIZE],
}

impl Memory {
    pub fn new() -> Self {
        Self {
            bytes: [0; MEMORY_SIZE],
        }
    }

    /// Copies a ROM image to [`ROM_START_ADDRESS`], truncating anything that does
    /// not fit. Returns the number of bytes loaded.
    pub fn load(&mut self, rom: &[u8]) -> usize {
        let copy_size = rom.len().min(MAX_ROM_SIZE);
        if copy_size < rom.len() {
            log::warn!(
                "ROM is {} bytes, only the first {} bytes were loaded",
                rom.len(),
                MAX_ROM_SIZE
            );
        }

        self.bytes[ROM_START_ADDRESS..ROM_START_ADDRESS + copy_size]
            .copy_from_slice(&rom[..copy_size]);
        copy_size
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.bytes[addr as usize % MEMORY_SIZE]
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        self.bytes[addr as usize % MEMORY_SIZE] = value;
    }

    /// Reads `end - start` bytes (with 16-bit wraparound) beginning at `start`.
    pub fn read_range(&self, start: u16, end: u16) -> Vec<u8> {
        let len = end.wrapping_sub(start);
        (0..len)
            .map(|offset| self.read(start.wrapping_add(offset)))
            .collect()
    }

    /// Reads the big-endian instruction word at `addr`.
    pub fn read_word(&self, addr: u16) -> u16 {
        u16::from_be_bytes([self.read(addr), self.read(addr.wrapping_add(1))])
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rom_lands_at_start_address() {
        let mut memory = Memory::new();
        assert_eq!(memory.load(&[0x12, 0x34, 0x56]), 3);

        assert_eq!(memory.read(0x1FF), 0);
        assert_eq!(memory.read(0x200), 0x12);
        assert_eq!(memory.read(0x202), 0x56);
        assert_eq!(memory.read_word(0x200), 0x1234);
    }

    #[test]
    fn oversized_rom_is_truncated() {
        let rom = vec![0xAA; MAX_ROM_SIZE + 10];
        let mut memory = Memory::new();

        assert_eq!(memory.load(&rom), MAX_ROM_SIZE);
        assert_eq!(memory.read(0xFFF), 0xAA);
        // Nothing spilled over into the low addresses
        assert_eq!(memory.read(0x000), 0);
    }

    #[test]
    fn range_wraps_past_end_of_memory() {
        let mut memory = Memory::new();
        memory.write(0xFFE, 1);
        memory.write(0xFFF, 2);
        memory.write(0x000, 3);

        assert_eq!(memory.read_range(0xFFE, 0x1001), vec![1, 2, 3]);
        assert_eq!(memory.read_range(0xFFFF, 0x0001), vec![2, 3]);
        assert!(memory.read_range(0x300, 0x300).is_empty());
    }

    #[test]
    fn word_read_wraps() {
        let mut memory = Memory::new();
        memory.write(0xFFF, 0xAB);
        memory.write(0x000, 0xCD);
        assert_eq!(memory.read_word(0xFFF), 0xABCD);
    }

    proptest! {
        #[test]
        fn write_then_read_wraps(addr in any::<u16>(), value in any::<u8>()) {
            let mut memory = Memory::new();
            memory.write(addr, value);
            prop_assert_eq!(memory.read(addr), value);
            prop_assert_eq!(memory.read(addr % MEMORY_SIZE as u16), value);
        }
    }
}
