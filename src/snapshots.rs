use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::cpu::CPU;
use crate::error::EmulatorError;
use crate::memory::{Memory, MEMORY_SIZE};

/// Point-in-time capture of one emulator: the full register file plus a
/// run-length-compressed dump of the 64K address space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmulatorSnapshot {
    pub id: String,
    pub name: String,
    pub emulator_id: String,
    pub cpu_state: CpuSnapshot,
    pub memory_dump: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub pc: u16,
    pub sp: u8,
    pub status: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSnapshotRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreSnapshotRequest {
    pub snapshot_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

pub type SnapshotStore = Arc<Mutex<HashMap<String, EmulatorSnapshot>>>;

impl EmulatorSnapshot {
    pub fn capture(name: String, emulator_id: String, cpu: &CPU, memory: &Memory) -> Self {
        let cpu_state = CpuSnapshot {
            a: cpu.a,
            x: cpu.x,
            y: cpu.y,
            pc: cpu.pc,
            sp: cpu.sp,
            status: cpu.status,
        };

        let mut dump = Vec::with_capacity(MEMORY_SIZE);
        for addr in 0..MEMORY_SIZE {
            // Every cell is in range by construction.
            dump.push(memory.read(addr as u32).unwrap_or(0));
        }

        let compressed = compress_memory(&dump);
        let size_bytes = compressed.len() as u64;

        Self {
            id: Uuid::new_v4().to_string(),
            name,
            emulator_id,
            cpu_state,
            memory_dump: compressed,
            created_at: Utc::now(),
            size_bytes,
        }
    }

    pub fn restore(&self, cpu: &mut CPU, memory: &mut Memory) -> Result<(), EmulatorError> {
        let dump = decompress_memory(&self.memory_dump)?;

        for (addr, &value) in dump.iter().enumerate() {
            memory.write(addr as u32, value)?;
        }

        cpu.a = self.cpu_state.a;
        cpu.x = self.cpu_state.x;
        cpu.y = self.cpu_state.y;
        cpu.pc = self.cpu_state.pc;
        cpu.sp = self.cpu_state.sp;
        cpu.status = self.cpu_state.status;

        Ok(())
    }

    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            size_bytes: self.size_bytes,
        }
    }
}

// Run-length encoding tuned for the common mostly-zero memory image.
// Runs of four or more bytes (and any run of zeros) become
// marker/count/value triples; a literal marker byte is escaped as
// marker followed by 0x00.
const RLE_MARKER: u8 = 0xFF;

fn compress_memory(memory: &[u8]) -> Vec<u8> {
    let mut compressed = Vec::new();
    let mut i = 0;

    while i < memory.len() {
        let byte = memory[i];
        let run = memory[i..]
            .iter()
            .take(255)
            .take_while(|&&b| b == byte)
            .count();

        if run > 3 || byte == 0 {
            compressed.push(RLE_MARKER);
            compressed.push(run as u8);
            compressed.push(byte);
        } else {
            for _ in 0..run {
                if byte == RLE_MARKER {
                    compressed.push(RLE_MARKER);
                    compressed.push(0x00);
                } else {
                    compressed.push(byte);
                }
            }
        }

        i += run;
    }

    compressed
}

fn decompress_memory(compressed: &[u8]) -> Result<Vec<u8>, EmulatorError> {
    let mut decompressed = Vec::with_capacity(MEMORY_SIZE);
    let mut i = 0;

    while i < compressed.len() {
        if compressed[i] != RLE_MARKER {
            decompressed.push(compressed[i]);
            i += 1;
            continue;
        }

        match compressed.get(i + 1) {
            // Escaped literal marker byte
            Some(&0x00) => {
                decompressed.push(RLE_MARKER);
                i += 2;
            }
            Some(&count) => {
                let value = *compressed.get(i + 2).ok_or_else(|| {
                    EmulatorError::InvalidSnapshot("truncated run".to_string())
                })?;
                decompressed.extend(std::iter::repeat(value).take(count as usize));
                i += 3;
            }
            None => {
                return Err(EmulatorError::InvalidSnapshot(
                    "truncated marker".to_string(),
                ));
            }
        }
    }

    if decompressed.len() != MEMORY_SIZE {
        return Err(EmulatorError::InvalidSnapshot(format!(
            "decompressed size {} != {}",
            decompressed.len(),
            MEMORY_SIZE
        )));
    }

    Ok(decompressed)
}
