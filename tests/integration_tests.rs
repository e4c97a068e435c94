use cycle65::cpu::{CPU, DECIMAL_MODE, NEGATIVE_FLAG, ZERO_FLAG};
use cycle65::error::EmulatorError;
use cycle65::memory::Memory;

/// Seed the reset vector with `entry` and reset; reset latches the
/// entry point before wiping memory, so programs are loaded afterwards.
fn boot(entry: u16) -> (CPU, Memory) {
    let mut cpu = CPU::new();
    let mut memory = Memory::new();

    memory.write(0xFFFC, (entry & 0xFF) as u8).unwrap();
    memory.write(0xFFFD, (entry >> 8) as u8).unwrap();
    cpu.reset(&mut memory);

    (cpu, memory)
}

#[test]
fn test_reset_invariant() {
    let mut cpu = CPU::new();
    let mut memory = Memory::new();

    // Dirty some state first
    memory.write(0x1234, 0xAB).unwrap();
    cpu.set_flag(DECIMAL_MODE, true);

    cpu.reset(&mut memory);

    assert!(!cpu.get_flag(DECIMAL_MODE));
    assert_eq!(cpu.get_sp(), 0xFF);
    assert_eq!(memory.read(0x1234).unwrap(), 0x00);
    assert_eq!(memory.read(0x0000).unwrap(), 0x00);
    assert_eq!(memory.read(0xFFFF).unwrap(), 0x00);
}

#[test]
fn test_immediate_load() {
    let (mut cpu, mut memory) = boot(0x8000);

    memory.load_program(&[0xA9, 0x84], 0x8000).unwrap();

    let remaining = cpu.execute(2, &mut memory).unwrap();

    assert_eq!(remaining, 0);
    assert_eq!(cpu.get_register_a(), 0x84);
    assert!(!cpu.get_flag(ZERO_FLAG));
    assert!(cpu.get_flag(NEGATIVE_FLAG));
}

#[test]
fn test_zero_page_load() {
    let (mut cpu, mut memory) = boot(0x8000);

    memory.load_program(&[0xA5, 0x42], 0x8000).unwrap();
    memory.write(0x0042, 0x84).unwrap();

    let remaining = cpu.execute(3, &mut memory).unwrap();

    assert_eq!(remaining, 0);
    assert_eq!(cpu.get_register_a(), 0x84);
}

#[test]
fn test_zero_page_x_load_with_wraparound() {
    let (mut cpu, mut memory) = boot(0x8000);
    cpu.x = 0x05;

    memory.load_program(&[0xB5, 0x30], 0x8000).unwrap();
    memory.write(0x0035, 0x85).unwrap();

    let remaining = cpu.execute(4, &mut memory).unwrap();

    assert_eq!(remaining, 0);
    assert_eq!(cpu.get_register_a(), 0x85);
    assert!(cpu.get_flag(NEGATIVE_FLAG));
}

#[test]
fn test_loading_zero_sets_zero_flag() {
    let (mut cpu, mut memory) = boot(0x8000);

    // Leave N set from a prior load to prove it is recomputed
    memory.load_program(&[0xA9, 0x80, 0xA5, 0x10], 0x8000).unwrap();

    cpu.execute(5, &mut memory).unwrap();

    assert_eq!(cpu.get_register_a(), 0x00);
    assert!(cpu.get_flag(ZERO_FLAG));
    assert!(!cpu.get_flag(NEGATIVE_FLAG));
}

#[test]
fn test_unknown_opcode_returns_error() {
    let (mut cpu, mut memory) = boot(0x8000);

    memory.write(0x8000, 0x02).unwrap();

    let result = cpu.execute(4, &mut memory);

    assert_eq!(
        result,
        Err(EmulatorError::UnknownOpcode {
            opcode: 0x02,
            pc: 0x8000,
        })
    );
}

#[test]
fn test_bounds_check_past_address_space() {
    let mut memory = Memory::new();

    assert_eq!(
        memory.read(0x10000),
        Err(EmulatorError::OutOfBounds { address: 0x10000 })
    );
    assert_eq!(
        memory.write(0x10000, 0x42),
        Err(EmulatorError::OutOfBounds { address: 0x10000 })
    );
}

#[test]
fn test_zero_budget_leaves_state_untouched() {
    let (mut cpu, mut memory) = boot(0x8000);

    memory.load_program(&[0xA9, 0x84], 0x8000).unwrap();

    let remaining = cpu.execute(0, &mut memory).unwrap();

    assert_eq!(remaining, 0);
    assert_eq!(cpu.get_register_a(), 0x00);
    assert_eq!(cpu.get_register_x(), 0x00);
    assert_eq!(cpu.get_register_y(), 0x00);
    assert_eq!(cpu.get_pc(), 0x8000);
    assert_eq!(cpu.get_sp(), 0xFF);
}

#[test]
fn test_subroutine_call_flow() {
    let (mut cpu, mut memory) = boot(0x8000);

    // LDA #$0A ; JSR $9000 where the subroutine does LDA #$84
    memory
        .load_program(&[0xA9, 0x0A, 0x20, 0x00, 0x90], 0x8000)
        .unwrap();
    memory.load_program(&[0xA9, 0x84], 0x9000).unwrap();

    let remaining = cpu.execute(10, &mut memory).unwrap();

    assert_eq!(remaining, 0);
    assert_eq!(cpu.get_register_a(), 0x84);
    assert_eq!(cpu.get_pc(), 0x9002);
    assert_eq!(cpu.get_sp(), 0xFD);
    // Return address ($8004, the last operand byte of the JSR) is in
    // the stack page, little-endian.
    assert_eq!(memory.read(0x01FE).unwrap(), 0x04);
    assert_eq!(memory.read(0x01FF).unwrap(), 0x80);
}

#[test]
fn test_absolute_load() {
    let (mut cpu, mut memory) = boot(0x8000);

    memory.load_program(&[0xAD, 0x00, 0x44], 0x8000).unwrap();
    memory.write(0x4400, 0x37).unwrap();

    let remaining = cpu.execute(5, &mut memory).unwrap();

    assert_eq!(remaining, 0);
    assert_eq!(cpu.get_register_a(), 0x37);
}

#[test]
fn test_execute_accumulates_across_calls() {
    let (mut cpu, mut memory) = boot(0x8000);

    memory.load_program(&[0xA9, 0x11, 0xA9, 0x22], 0x8000).unwrap();

    cpu.execute(2, &mut memory).unwrap();
    assert_eq!(cpu.get_register_a(), 0x11);

    // A second call picks up where the first left off.
    cpu.execute(2, &mut memory).unwrap();
    assert_eq!(cpu.get_register_a(), 0x22);
    assert_eq!(cpu.get_pc(), 0x8004);
}

#[test]
fn test_overdraft_is_not_an_error() {
    let (mut cpu, mut memory) = boot(0x8000);

    // Budget covers the opcode fetch only; the zero-page access overdraws.
    memory.load_program(&[0xA5, 0x42], 0x8000).unwrap();
    memory.write(0x0042, 0x99).unwrap();

    let remaining = cpu.execute(1, &mut memory).unwrap();

    assert_eq!(remaining, -2);
    assert_eq!(cpu.get_register_a(), 0x99);
}
