use crate::error::EmulatorError;
use crate::memory::Memory;
use crate::metrics::{get_instruction_name, record_cycles_consumed, record_instruction,
    record_unknown_opcode, Timer};

#[derive(Debug)]
pub struct CPU {
    // Registers (made public for snapshot support)
    pub a: u8,      // Accumulator
    pub x: u8,      // X Index Register
    pub y: u8,      // Y Index Register
    pub pc: u16,    // Program Counter
    pub sp: u8,     // Stack Pointer
    pub status: u8, // Status Register
}

// Status register flags
pub const CARRY_FLAG: u8 = 0x01;
pub const ZERO_FLAG: u8 = 0x02;
pub const INTERRUPT_DISABLE: u8 = 0x04;
pub const DECIMAL_MODE: u8 = 0x08;
pub const BREAK_COMMAND: u8 = 0x10;
pub const UNUSED_FLAG: u8 = 0x20;
pub const OVERFLOW_FLAG: u8 = 0x40;
pub const NEGATIVE_FLAG: u8 = 0x80;

/// Location of the two-byte little-endian reset vector.
pub const RESET_VECTOR: u16 = 0xFFFC;

/// Bottom of the stack page.
pub const STACK_BASE: u16 = 0x0100;

impl CPU {
    pub fn new() -> Self {
        CPU {
            a: 0,
            x: 0,
            y: 0,
            pc: 0,
            sp: 0xFF,
            status: UNUSED_FLAG | INTERRUPT_DISABLE,
        }
    }

    /// Bring the processor to its defined power-on state.
    ///
    /// The entry point is latched by dereferencing the little-endian
    /// reset vector at $FFFC/$FFFD *before* the memory wipe, so the
    /// supported flow is: seed the vector, reset, then write the program
    /// at the latched entry point. On untouched memory the vector reads
    /// $0000. The stack pointer comes up at $FF and the decimal flag is
    /// clear.
    pub fn reset(&mut self, memory: &mut Memory) {
        // The vector addresses are always inside the 64K space.
        self.pc = memory.read_word(u32::from(RESET_VECTOR)).unwrap_or(0);

        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.sp = 0xFF;
        self.status = UNUSED_FLAG | INTERRUPT_DISABLE;

        memory.reset();
    }

    /// Run the fetch-decode-execute loop until the budget is spent.
    ///
    /// Returns the remaining budget. It may be negative when the last
    /// instruction cost more cycles than were left; that is not an
    /// error. A budget of zero executes nothing. An opcode outside the
    /// dispatch table stops execution immediately with `UnknownOpcode`.
    pub fn execute(&mut self, budget: i64, memory: &mut Memory) -> Result<i64, EmulatorError> {
        let mut cycles = budget;

        while cycles > 0 {
            let timer = Timer::new();
            let opcode = self.fetch_byte(&mut cycles, memory)?;

            match opcode {
                // LDA - Load Accumulator
                0xA9 => self.lda_immediate(&mut cycles, memory)?,
                0xA5 => self.lda_zero_page(&mut cycles, memory)?,
                0xB5 => self.lda_zero_page_x(&mut cycles, memory)?,
                0xAD => self.lda_absolute(&mut cycles, memory)?,

                // JSR - Jump to Subroutine
                0x20 => self.jsr(&mut cycles, memory)?,

                _ => {
                    record_unknown_opcode(opcode);
                    return Err(EmulatorError::UnknownOpcode {
                        opcode,
                        pc: self.pc.wrapping_sub(1),
                    });
                }
            }

            record_instruction(opcode, get_instruction_name(opcode), timer.elapsed());
        }

        record_cycles_consumed(budget - cycles);
        Ok(cycles)
    }

    /// Read the byte at PC, advance PC, debit one cycle.
    ///
    /// Every opcode and operand byte enters the pipeline through here so
    /// the cycle accounting stays uniform.
    pub fn fetch_byte(&mut self, cycles: &mut i64, memory: &Memory) -> Result<u8, EmulatorError> {
        let value = memory.read(u32::from(self.pc))?;
        self.pc = self.pc.wrapping_add(1);
        *cycles -= 1;
        Ok(value)
    }

    /// Fetch a 16-bit word at PC from its fixed little-endian wire
    /// layout, advancing PC by two. Debits three cycles: one for the low
    /// byte, two more when the high byte is combined. The result is in
    /// native byte order regardless of host endianness.
    pub fn fetch_word(&mut self, cycles: &mut i64, memory: &Memory) -> Result<u16, EmulatorError> {
        let low = memory.read(u32::from(self.pc))? as u16;
        self.pc = self.pc.wrapping_add(1);
        *cycles -= 1;

        let high = memory.read(u32::from(self.pc))? as u16;
        self.pc = self.pc.wrapping_add(1);
        *cycles -= 2;

        Ok((high << 8) | low)
    }

    // Getters
    pub fn get_register_a(&self) -> u8 { self.a }
    pub fn get_register_x(&self) -> u8 { self.x }
    pub fn get_register_y(&self) -> u8 { self.y }
    pub fn get_pc(&self) -> u16 { self.pc }
    pub fn get_sp(&self) -> u8 { self.sp }
    pub fn get_status(&self) -> u8 { self.status }

    // Flag operations
    pub fn set_flag(&mut self, flag: u8, value: bool) {
        if value {
            self.status |= flag;
        } else {
            self.status &= !flag;
        }
    }

    pub fn get_flag(&self, flag: u8) -> bool {
        (self.status & flag) != 0
    }

    fn update_zero_and_negative_flags(&mut self, value: u8) {
        self.set_flag(ZERO_FLAG, value == 0);
        self.set_flag(NEGATIVE_FLAG, (value & 0x80) != 0);
    }

    /// Addressed data read, one cycle.
    fn read_byte(
        &mut self,
        cycles: &mut i64,
        memory: &Memory,
        address: u32,
    ) -> Result<u8, EmulatorError> {
        let value = memory.read(address)?;
        *cycles -= 1;
        Ok(value)
    }

    // Addressing mode implementations
    fn read_immediate(&mut self, cycles: &mut i64, memory: &Memory) -> Result<u8, EmulatorError> {
        self.fetch_byte(cycles, memory)
    }

    fn read_zero_page(&mut self, cycles: &mut i64, memory: &Memory) -> Result<u8, EmulatorError> {
        let addr = self.fetch_byte(cycles, memory)?;
        self.read_byte(cycles, memory, u32::from(addr))
    }

    fn read_zero_page_x(&mut self, cycles: &mut i64, memory: &Memory) -> Result<u8, EmulatorError> {
        // The index addition wraps within the zero page and costs one cycle.
        let addr = self.fetch_byte(cycles, memory)?.wrapping_add(self.x);
        *cycles -= 1;
        self.read_byte(cycles, memory, u32::from(addr))
    }

    fn read_absolute(&mut self, cycles: &mut i64, memory: &Memory) -> Result<u8, EmulatorError> {
        let addr = self.fetch_word(cycles, memory)?;
        self.read_byte(cycles, memory, u32::from(addr))
    }

    // Instruction implementations
    fn lda_immediate(&mut self, cycles: &mut i64, memory: &Memory) -> Result<(), EmulatorError> {
        self.a = self.read_immediate(cycles, memory)?;
        self.update_zero_and_negative_flags(self.a);
        Ok(())
    }

    fn lda_zero_page(&mut self, cycles: &mut i64, memory: &Memory) -> Result<(), EmulatorError> {
        self.a = self.read_zero_page(cycles, memory)?;
        self.update_zero_and_negative_flags(self.a);
        Ok(())
    }

    fn lda_zero_page_x(&mut self, cycles: &mut i64, memory: &Memory) -> Result<(), EmulatorError> {
        self.a = self.read_zero_page_x(cycles, memory)?;
        self.update_zero_and_negative_flags(self.a);
        Ok(())
    }

    fn lda_absolute(&mut self, cycles: &mut i64, memory: &Memory) -> Result<(), EmulatorError> {
        self.a = self.read_absolute(cycles, memory)?;
        self.update_zero_and_negative_flags(self.a);
        Ok(())
    }

    fn jsr(&mut self, cycles: &mut i64, memory: &mut Memory) -> Result<(), EmulatorError> {
        let target = self.fetch_word(cycles, memory)?;

        // Push the return address (PC of the last operand byte) into the
        // descending stack page as one little-endian word write.
        let return_addr = self.pc.wrapping_sub(1);
        let stack_addr = u32::from(STACK_BASE) + u32::from(self.sp.wrapping_sub(1));
        memory.write_word(return_addr, stack_addr, cycles)?;
        self.sp = self.sp.wrapping_sub(2);

        self.pc = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(entry: u16) -> (CPU, Memory) {
        let mut cpu = CPU::new();
        let mut memory = Memory::new();

        memory.write(0xFFFC, (entry & 0xFF) as u8).unwrap();
        memory.write(0xFFFD, (entry >> 8) as u8).unwrap();
        cpu.reset(&mut memory);

        (cpu, memory)
    }

    #[test]
    fn test_reset_latches_vector_then_wipes() {
        let (cpu, memory) = setup(0x8000);

        assert_eq!(cpu.get_pc(), 0x8000);
        assert_eq!(cpu.get_sp(), 0xFF);
        assert!(!cpu.get_flag(DECIMAL_MODE));
        // The wipe happens after the vector is latched.
        assert_eq!(memory.read(0xFFFC).unwrap(), 0x00);
        assert_eq!(memory.read(0xFFFD).unwrap(), 0x00);
    }

    #[test]
    fn test_reset_on_untouched_memory() {
        let mut cpu = CPU::new();
        let mut memory = Memory::new();

        cpu.reset(&mut memory);

        assert_eq!(cpu.get_pc(), 0x0000);
        assert_eq!(cpu.get_sp(), 0xFF);
    }

    #[test]
    fn test_lda_immediate() {
        let (mut cpu, mut memory) = setup(0x8000);

        // LDA #$84
        memory.load_program(&[0xA9, 0x84], 0x8000).unwrap();

        let remaining = cpu.execute(2, &mut memory).unwrap();

        assert_eq!(remaining, 0);
        assert_eq!(cpu.get_register_a(), 0x84);
        assert_eq!(cpu.get_pc(), 0x8002);
        assert!(!cpu.get_flag(ZERO_FLAG));
        assert!(cpu.get_flag(NEGATIVE_FLAG));
    }

    #[test]
    fn test_lda_immediate_zero_sets_zero_flag() {
        let (mut cpu, mut memory) = setup(0x8000);

        // LDA #$00
        memory.load_program(&[0xA9, 0x00], 0x8000).unwrap();

        cpu.execute(2, &mut memory).unwrap();

        assert_eq!(cpu.get_register_a(), 0x00);
        assert!(cpu.get_flag(ZERO_FLAG));
        assert!(!cpu.get_flag(NEGATIVE_FLAG));
    }

    #[test]
    fn test_lda_zero_page() {
        let (mut cpu, mut memory) = setup(0x8000);

        // LDA $42
        memory.load_program(&[0xA5, 0x42], 0x8000).unwrap();
        memory.write(0x0042, 0x84).unwrap();

        let remaining = cpu.execute(3, &mut memory).unwrap();

        assert_eq!(remaining, 0);
        assert_eq!(cpu.get_register_a(), 0x84);
    }

    #[test]
    fn test_lda_zero_page_x() {
        let (mut cpu, mut memory) = setup(0x8000);
        cpu.x = 0x05;

        // LDA $30,X ; effective address $35
        memory.load_program(&[0xB5, 0x30], 0x8000).unwrap();
        memory.write(0x0035, 0x85).unwrap();

        let remaining = cpu.execute(4, &mut memory).unwrap();

        assert_eq!(remaining, 0);
        assert_eq!(cpu.get_register_a(), 0x85);
    }

    #[test]
    fn test_lda_zero_page_x_wraps_within_page() {
        let (mut cpu, mut memory) = setup(0x8000);
        cpu.x = 0xFF;

        // LDA $80,X ; $80 + $FF wraps to $7F, never $017F
        memory.load_program(&[0xB5, 0x80], 0x8000).unwrap();
        memory.write(0x007F, 0x37).unwrap();
        memory.write(0x017F, 0x99).unwrap();

        cpu.execute(4, &mut memory).unwrap();

        assert_eq!(cpu.get_register_a(), 0x37);
    }

    #[test]
    fn test_lda_absolute() {
        let (mut cpu, mut memory) = setup(0x8000);

        // LDA $4480
        memory.load_program(&[0xAD, 0x80, 0x44], 0x8000).unwrap();
        memory.write(0x4480, 0x2F).unwrap();

        // Opcode fetch + word fetch + data read = 5 cycles.
        let remaining = cpu.execute(5, &mut memory).unwrap();

        assert_eq!(remaining, 0);
        assert_eq!(cpu.get_register_a(), 0x2F);
        assert_eq!(cpu.get_pc(), 0x8003);
    }

    #[test]
    fn test_jsr() {
        let (mut cpu, mut memory) = setup(0x8000);

        // JSR $9000
        memory.load_program(&[0x20, 0x00, 0x90], 0x8000).unwrap();

        let remaining = cpu.execute(6, &mut memory).unwrap();

        assert_eq!(remaining, 0);
        assert_eq!(cpu.get_pc(), 0x9000);
        assert_eq!(cpu.get_sp(), 0xFD);
        // Return address $8002 sits little-endian in the stack page.
        assert_eq!(memory.read(0x01FE).unwrap(), 0x02);
        assert_eq!(memory.read(0x01FF).unwrap(), 0x80);
    }

    #[test]
    fn test_jsr_then_lda_at_target() {
        let (mut cpu, mut memory) = setup(0x8000);

        memory.load_program(&[0x20, 0x00, 0x90], 0x8000).unwrap();
        memory.load_program(&[0xA9, 0x21], 0x9000).unwrap();

        let remaining = cpu.execute(8, &mut memory).unwrap();

        assert_eq!(remaining, 0);
        assert_eq!(cpu.get_register_a(), 0x21);
        assert_eq!(cpu.get_pc(), 0x9002);
    }

    #[test]
    fn test_unknown_opcode_is_an_error() {
        let (mut cpu, mut memory) = setup(0x8000);

        memory.write(0x8000, 0xFE).unwrap();

        let result = cpu.execute(2, &mut memory);

        assert_eq!(
            result,
            Err(EmulatorError::UnknownOpcode {
                opcode: 0xFE,
                pc: 0x8000,
            })
        );
    }

    #[test]
    fn test_zero_budget_executes_nothing() {
        let (mut cpu, mut memory) = setup(0x8000);

        memory.load_program(&[0xA9, 0x84], 0x8000).unwrap();

        let remaining = cpu.execute(0, &mut memory).unwrap();

        assert_eq!(remaining, 0);
        assert_eq!(cpu.get_register_a(), 0x00);
        assert_eq!(cpu.get_pc(), 0x8000);
    }

    #[test]
    fn test_budget_may_go_negative() {
        let (mut cpu, mut memory) = setup(0x8000);

        // One cycle is not enough for LDA immediate, but the instruction
        // still completes; the overdraft is reported, not an error.
        memory.load_program(&[0xA9, 0x84], 0x8000).unwrap();

        let remaining = cpu.execute(1, &mut memory).unwrap();

        assert_eq!(remaining, -1);
        assert_eq!(cpu.get_register_a(), 0x84);
    }

    #[test]
    fn test_program_counter_wraps_at_top_of_memory() {
        let mut cpu = CPU::new();
        let mut memory = Memory::new();

        cpu.reset(&mut memory);
        cpu.pc = 0xFFFF;
        memory.write(0xFFFF, 0xA5).unwrap();
        memory.write(0x0000, 0x42).unwrap();
        memory.write(0x0042, 0x77).unwrap();

        // Opcode at $FFFF, operand fetched from the wrapped PC at $0000.
        let remaining = cpu.execute(3, &mut memory).unwrap();

        assert_eq!(remaining, 0);
        assert_eq!(cpu.get_register_a(), 0x77);
        assert_eq!(cpu.get_pc(), 0x0001);
    }

    #[test]
    fn test_flag_accessors() {
        let mut cpu = CPU::new();

        cpu.set_flag(CARRY_FLAG, true);
        cpu.set_flag(OVERFLOW_FLAG, true);
        assert!(cpu.get_flag(CARRY_FLAG));
        assert!(cpu.get_flag(OVERFLOW_FLAG));
        assert!(cpu.get_flag(UNUSED_FLAG));
        assert!(!cpu.get_flag(BREAK_COMMAND));

        cpu.set_flag(CARRY_FLAG, false);
        assert!(!cpu.get_flag(CARRY_FLAG));
    }
}
