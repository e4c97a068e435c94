use std::process;

use cycle65::cpu::CPU;
use cycle65::error::EmulatorError;
use cycle65::memory::Memory;
use cycle65::server;

fn run_demo() -> Result<(), EmulatorError> {
    let mut memory = Memory::new();
    let mut cpu = CPU::new();

    // Entry point at $8000 via the reset vector
    memory.write(0xFFFC, 0x00)?;
    memory.write(0xFFFD, 0x80)?;

    cpu.reset(&mut memory);

    // LDA #$42, then JSR $9000 where LDA #$84 runs
    memory.load_program(&[0xA9, 0x42, 0x20, 0x00, 0x90], 0x8000)?;
    memory.load_program(&[0xA9, 0x84], 0x9000)?;

    let remaining = cpu.execute(10, &mut memory)?;

    println!("CPU State:");
    println!("A: ${:02X}", cpu.get_register_a());
    println!("X: ${:02X}", cpu.get_register_x());
    println!("Y: ${:02X}", cpu.get_register_y());
    println!("PC: ${:04X}", cpu.get_pc());
    println!("SP: ${:02X}", cpu.get_sp());
    println!("Status: ${:02X}", cpu.get_status());
    println!("Cycles remaining: {}", remaining);

    Ok(())
}

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);

    match args.next().as_deref() {
        Some("serve") => {
            let port = args.next().and_then(|p| p.parse().ok()).unwrap_or(3030);
            server::run_server(port).await;
        }
        _ => {
            // Any emulator error is fatal to the hosting process: write
            // the diagnostic to stderr and exit non-zero.
            if let Err(err) = run_demo() {
                eprintln!("fatal: {}", err);
                process::exit(1);
            }
        }
    }
}
