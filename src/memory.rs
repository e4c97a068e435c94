use crate::error::EmulatorError;

/// Total addressable bytes: the full 16-bit address space.
pub const MEMORY_SIZE: usize = 65536;

pub struct Memory {
    data: [u8; MEMORY_SIZE], // 64KB memory space
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            data: [0; MEMORY_SIZE],
        }
    }

    /// Fill the entire address space with zero.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Read the byte at `address`.
    ///
    /// Addresses are taken at `u32` width so an out-of-range value like
    /// $10000 is representable and reported as `OutOfBounds`, never
    /// silently wrapped or clamped.
    pub fn read(&self, address: u32) -> Result<u8, EmulatorError> {
        self.data
            .get(address as usize)
            .copied()
            .ok_or(EmulatorError::OutOfBounds { address })
    }

    /// Overwrite the byte at `address`. Same bounds contract as `read`.
    pub fn write(&mut self, address: u32, value: u8) -> Result<(), EmulatorError> {
        match self.data.get_mut(address as usize) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(EmulatorError::OutOfBounds { address }),
        }
    }

    // Read a 16-bit value in little-endian format
    pub fn read_word(&self, address: u32) -> Result<u16, EmulatorError> {
        let low = self.read(address)? as u16;
        let high = self.read(address + 1)? as u16;
        Ok((high << 8) | low)
    }

    /// Write a 16-bit value in little-endian format across two byte
    /// cells, debiting two cycles. Both cells are bounds-checked
    /// individually.
    pub fn write_word(
        &mut self,
        value: u16,
        address: u32,
        cycles: &mut i64,
    ) -> Result<(), EmulatorError> {
        self.write(address, (value & 0xFF) as u8)?;
        self.write(address + 1, (value >> 8) as u8)?;
        *cycles -= 2;
        Ok(())
    }

    /// Seed raw program bytes starting at `start`.
    pub fn load_program(&mut self, data: &[u8], start: u16) -> Result<(), EmulatorError> {
        for (i, &byte) in data.iter().enumerate() {
            self.write(u32::from(start) + i as u32, byte)?;
        }
        Ok(())
    }
}
