use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warp::Filter;
use prometheus::Encoder;

use crate::cpu::CPU;
use crate::error::EmulatorError;
use crate::memory::Memory;
use crate::metrics::{
    init_metrics, record_api_request, record_emulator_reset, record_memory_operation,
    record_program_load, record_snapshot_operation, set_active_emulators,
    update_cpu_registers, Timer, REGISTRY,
};
use crate::snapshots::{
    CreateSnapshotRequest, EmulatorSnapshot, RestoreSnapshotRequest, SnapshotStore,
    SnapshotSummary,
};

#[derive(Debug, Clone, Serialize)]
pub struct CpuState {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub pc: u16,
    pub sp: u8,
    pub status: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmulatorState {
    pub id: String,
    pub cpu: CpuState,
    pub cycles_consumed: i64,
}

#[derive(Debug, Deserialize)]
pub struct MemoryWrite {
    pub address: u32,
    pub value: u8,
}

#[derive(Debug, Deserialize)]
pub struct MemoryRead {
    pub address: u32,
    pub length: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct MemoryData {
    pub address: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub struct ProgramLoad {
    pub address: u16,
    pub data: Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteBudget {
    pub budget: i64,
}

#[derive(Debug, Serialize)]
pub struct ExecutionResult {
    pub budget: i64,
    pub remaining: i64,
    pub final_state: CpuState,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// One hosted emulator: an owned Memory plus a CPU that borrows it for
/// the duration of each reset/execute call.
pub struct Emulator {
    pub cpu: CPU,
    pub memory: Memory,
    pub cycles_consumed: i64,
}

impl Emulator {
    pub fn new() -> Self {
        Self {
            cpu: CPU::new(),
            memory: Memory::new(),
            cycles_consumed: 0,
        }
    }

    pub fn get_state(&self) -> CpuState {
        CpuState {
            a: self.cpu.get_register_a(),
            x: self.cpu.get_register_x(),
            y: self.cpu.get_register_y(),
            pc: self.cpu.get_pc(),
            sp: self.cpu.get_sp(),
            status: self.cpu.get_status(),
        }
    }

    pub fn reset(&mut self) {
        self.cpu.reset(&mut self.memory);
        self.cycles_consumed = 0;
    }

    pub fn execute(&mut self, budget: i64) -> Result<i64, EmulatorError> {
        let remaining = self.cpu.execute(budget, &mut self.memory)?;
        self.cycles_consumed += budget - remaining;
        Ok(remaining)
    }

    pub fn load_program(&mut self, address: u16, data: &[u8]) -> Result<(), EmulatorError> {
        self.memory.load_program(data, address)
    }

    pub fn read_memory(&self, address: u32, length: u32) -> Result<Vec<u8>, EmulatorError> {
        (0..length).map(|i| self.memory.read(address + i)).collect()
    }

    pub fn write_memory(&mut self, address: u32, value: u8) -> Result<(), EmulatorError> {
        self.memory.write(address, value)
    }
}

type EmulatorMap = Arc<Mutex<HashMap<String, Emulator>>>;

pub async fn run_server(port: u16) {
    // Initialize Prometheus metrics
    init_metrics();

    let emulators: EmulatorMap = Arc::new(Mutex::new(HashMap::new()));
    let snapshots: SnapshotStore = Arc::new(Mutex::new(HashMap::new()));

    // CORS
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST", "DELETE"]);

    // Create new emulator instance
    let create_emulator = warp::path("emulator")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_emulators(emulators.clone()))
        .and_then(create_emulator_handler);

    // Get emulator state
    let get_state = warp::path!("emulator" / String)
        .and(warp::get())
        .and(with_emulators(emulators.clone()))
        .and_then(get_state_handler);

    // Reset emulator
    let reset_emulator = warp::path!("emulator" / String / "reset")
        .and(warp::post())
        .and(with_emulators(emulators.clone()))
        .and_then(reset_handler);

    // Execute against a cycle budget
    let execute_budget = warp::path!("emulator" / String / "execute")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_emulators(emulators.clone()))
        .and_then(execute_handler);

    // Load program
    let load_program = warp::path!("emulator" / String / "program")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_emulators(emulators.clone()))
        .and_then(load_program_handler);

    // Read memory
    let read_memory = warp::path!("emulator" / String / "memory")
        .and(warp::get())
        .and(warp::query::<MemoryRead>())
        .and(with_emulators(emulators.clone()))
        .and_then(read_memory_handler);

    // Write memory
    let write_memory = warp::path!("emulator" / String / "memory")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_emulators(emulators.clone()))
        .and_then(write_memory_handler);

    // List emulators
    let list_emulators = warp::path("emulators")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_emulators(emulators.clone()))
        .and_then(list_emulators_handler);

    // Delete emulator
    let delete_emulator = warp::path!("emulator" / String)
        .and(warp::delete())
        .and(with_emulators(emulators.clone()))
        .and_then(delete_emulator_handler);

    // Create snapshot
    let create_snapshot = warp::path!("emulator" / String / "snapshot")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_emulators(emulators.clone()))
        .and(with_snapshots(snapshots.clone()))
        .and_then(create_snapshot_handler);

    // List snapshots for one emulator
    let list_snapshots = warp::path!("emulator" / String / "snapshots")
        .and(warp::get())
        .and(with_snapshots(snapshots.clone()))
        .and_then(list_snapshots_handler);

    // Restore snapshot
    let restore_snapshot = warp::path!("emulator" / String / "restore")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_emulators(emulators.clone()))
        .and(with_snapshots(snapshots.clone()))
        .and_then(restore_snapshot_handler);

    // Metrics endpoint
    let metrics = warp::path("metrics")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(metrics_handler);

    let routes = create_emulator
        .or(get_state)
        .or(reset_emulator)
        .or(execute_budget)
        .or(load_program)
        .or(read_memory)
        .or(write_memory)
        .or(list_emulators)
        .or(delete_emulator)
        .or(create_snapshot)
        .or(list_snapshots)
        .or(restore_snapshot)
        .or(metrics)
        .with(cors);

    println!("cycle65 emulator server starting on http://localhost:{}", port);
    println!("API:");
    println!("  POST   /emulator                - Create new emulator instance");
    println!("  GET    /emulator/:id            - Get emulator state");
    println!("  POST   /emulator/:id/reset      - Reset emulator");
    println!("  POST   /emulator/:id/execute    - Execute with a cycle budget");
    println!("  POST   /emulator/:id/program    - Load program");
    println!("  GET    /emulator/:id/memory     - Read memory");
    println!("  POST   /emulator/:id/memory     - Write memory");
    println!("  POST   /emulator/:id/snapshot   - Create snapshot");
    println!("  GET    /emulator/:id/snapshots  - List snapshots");
    println!("  POST   /emulator/:id/restore    - Restore snapshot");
    println!("  GET    /emulators               - List all emulator instances");
    println!("  DELETE /emulator/:id            - Delete emulator instance");
    println!("  GET    /metrics                 - Prometheus metrics endpoint");

    warp::serve(routes).run(([127, 0, 0, 1], port)).await;
}

fn with_emulators(
    emulators: EmulatorMap,
) -> impl Filter<Extract = (EmulatorMap,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || emulators.clone())
}

fn with_snapshots(
    snapshots: SnapshotStore,
) -> impl Filter<Extract = (SnapshotStore,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || snapshots.clone())
}

async fn create_emulator_handler(emulators: EmulatorMap) -> Result<impl warp::Reply, warp::Rejection> {
    let timer = Timer::new();
    let id = Uuid::new_v4().to_string();
    let emulator = Emulator::new();
    let state = emulator.get_state();

    {
        let mut emulators_lock = emulators.lock().unwrap();
        emulators_lock.insert(id.clone(), emulator);
        set_active_emulators(emulators_lock.len());
    }

    update_cpu_registers(&id, state.a, state.x, state.y, state.pc, state.sp, state.status);

    let response = ApiResponse::success(EmulatorState {
        id,
        cpu: state,
        cycles_consumed: 0,
    });

    record_api_request("POST", "/emulator", 200, timer.elapsed());
    Ok(warp::reply::json(&response))
}

async fn get_state_handler(id: String, emulators: EmulatorMap) -> Result<impl warp::Reply, warp::Rejection> {
    let emulators_lock = emulators.lock().unwrap();

    match emulators_lock.get(&id) {
        Some(emulator) => {
            let response = ApiResponse::success(EmulatorState {
                id: id.clone(),
                cpu: emulator.get_state(),
                cycles_consumed: emulator.cycles_consumed,
            });
            Ok(warp::reply::json(&response))
        }
        None => {
            let response: ApiResponse<EmulatorState> =
                ApiResponse::error("Emulator not found".to_string());
            Ok(warp::reply::json(&response))
        }
    }
}

async fn reset_handler(id: String, emulators: EmulatorMap) -> Result<impl warp::Reply, warp::Rejection> {
    let mut emulators_lock = emulators.lock().unwrap();

    match emulators_lock.get_mut(&id) {
        Some(emulator) => {
            emulator.reset();
            record_emulator_reset(&id);
            let response = ApiResponse::success(EmulatorState {
                id: id.clone(),
                cpu: emulator.get_state(),
                cycles_consumed: 0,
            });
            Ok(warp::reply::json(&response))
        }
        None => {
            let response: ApiResponse<EmulatorState> =
                ApiResponse::error("Emulator not found".to_string());
            Ok(warp::reply::json(&response))
        }
    }
}

async fn execute_handler(
    id: String,
    request: ExecuteBudget,
    emulators: EmulatorMap,
) -> Result<impl warp::Reply, warp::Rejection> {
    let timer = Timer::new();
    let mut emulators_lock = emulators.lock().unwrap();

    let result = match emulators_lock.get_mut(&id) {
        Some(emulator) => match emulator.execute(request.budget) {
            Ok(remaining) => {
                let state = emulator.get_state();
                update_cpu_registers(&id, state.a, state.x, state.y, state.pc, state.sp, state.status);

                let response = ApiResponse::success(ExecutionResult {
                    budget: request.budget,
                    remaining,
                    final_state: state,
                });
                Ok(warp::reply::json(&response))
            }
            // Unknown opcode or a stray memory access ends the run; the
            // emulator keeps its registers for post-mortem inspection.
            Err(err) => {
                let response: ApiResponse<ExecutionResult> = ApiResponse::error(err.to_string());
                Ok(warp::reply::json(&response))
            }
        },
        None => {
            let response: ApiResponse<ExecutionResult> =
                ApiResponse::error("Emulator not found".to_string());
            Ok(warp::reply::json(&response))
        }
    };

    record_api_request("POST", "/emulator/:id/execute", 200, timer.elapsed());
    result
}

async fn load_program_handler(
    id: String,
    request: ProgramLoad,
    emulators: EmulatorMap,
) -> Result<impl warp::Reply, warp::Rejection> {
    let mut emulators_lock = emulators.lock().unwrap();

    match emulators_lock.get_mut(&id) {
        Some(emulator) => match emulator.load_program(request.address, &request.data) {
            Ok(()) => {
                record_program_load(&id);
                let response = ApiResponse::success(format!(
                    "Loaded {} bytes at address ${:04X}",
                    request.data.len(),
                    request.address
                ));
                Ok(warp::reply::json(&response))
            }
            Err(err) => {
                let response: ApiResponse<String> = ApiResponse::error(err.to_string());
                Ok(warp::reply::json(&response))
            }
        },
        None => {
            let response: ApiResponse<String> = ApiResponse::error("Emulator not found".to_string());
            Ok(warp::reply::json(&response))
        }
    }
}

async fn read_memory_handler(
    id: String,
    query: MemoryRead,
    emulators: EmulatorMap,
) -> Result<impl warp::Reply, warp::Rejection> {
    let emulators_lock = emulators.lock().unwrap();

    match emulators_lock.get(&id) {
        Some(emulator) => {
            let length = query.length.unwrap_or(1);
            record_memory_operation("read", &id);
            match emulator.read_memory(query.address, length) {
                Ok(data) => {
                    let response = ApiResponse::success(MemoryData {
                        address: query.address,
                        data,
                    });
                    Ok(warp::reply::json(&response))
                }
                Err(err) => {
                    let response: ApiResponse<MemoryData> = ApiResponse::error(err.to_string());
                    Ok(warp::reply::json(&response))
                }
            }
        }
        None => {
            let response: ApiResponse<MemoryData> =
                ApiResponse::error("Emulator not found".to_string());
            Ok(warp::reply::json(&response))
        }
    }
}

async fn write_memory_handler(
    id: String,
    request: MemoryWrite,
    emulators: EmulatorMap,
) -> Result<impl warp::Reply, warp::Rejection> {
    let mut emulators_lock = emulators.lock().unwrap();

    match emulators_lock.get_mut(&id) {
        Some(emulator) => {
            record_memory_operation("write", &id);
            match emulator.write_memory(request.address, request.value) {
                Ok(()) => {
                    let response = ApiResponse::success(format!(
                        "Wrote ${:02X} to address ${:04X}",
                        request.value, request.address
                    ));
                    Ok(warp::reply::json(&response))
                }
                Err(err) => {
                    let response: ApiResponse<String> = ApiResponse::error(err.to_string());
                    Ok(warp::reply::json(&response))
                }
            }
        }
        None => {
            let response: ApiResponse<String> = ApiResponse::error("Emulator not found".to_string());
            Ok(warp::reply::json(&response))
        }
    }
}

async fn list_emulators_handler(emulators: EmulatorMap) -> Result<impl warp::Reply, warp::Rejection> {
    let emulators_lock = emulators.lock().unwrap();

    let emulator_list: Vec<EmulatorState> = emulators_lock
        .iter()
        .map(|(id, emulator)| EmulatorState {
            id: id.clone(),
            cpu: emulator.get_state(),
            cycles_consumed: emulator.cycles_consumed,
        })
        .collect();

    let response = ApiResponse::success(emulator_list);
    Ok(warp::reply::json(&response))
}

async fn delete_emulator_handler(id: String, emulators: EmulatorMap) -> Result<impl warp::Reply, warp::Rejection> {
    let timer = Timer::new();
    let mut emulators_lock = emulators.lock().unwrap();

    let result = match emulators_lock.remove(&id) {
        Some(_) => {
            set_active_emulators(emulators_lock.len());
            let response = ApiResponse::success(format!("Emulator {} deleted", id));
            Ok(warp::reply::json(&response))
        }
        None => {
            let response: ApiResponse<String> = ApiResponse::error("Emulator not found".to_string());
            Ok(warp::reply::json(&response))
        }
    };

    record_api_request("DELETE", "/emulator/:id", 200, timer.elapsed());
    result
}

async fn create_snapshot_handler(
    id: String,
    request: CreateSnapshotRequest,
    emulators: EmulatorMap,
    snapshots: SnapshotStore,
) -> Result<impl warp::Reply, warp::Rejection> {
    let snapshot = {
        let emulators_lock = emulators.lock().unwrap();
        match emulators_lock.get(&id) {
            Some(emulator) => {
                EmulatorSnapshot::capture(request.name, id.clone(), &emulator.cpu, &emulator.memory)
            }
            None => {
                let response: ApiResponse<SnapshotSummary> =
                    ApiResponse::error("Emulator not found".to_string());
                return Ok(warp::reply::json(&response));
            }
        }
    };

    record_snapshot_operation("create", &id);
    let summary = snapshot.summary();

    let mut snapshots_lock = snapshots.lock().unwrap();
    snapshots_lock.insert(snapshot.id.clone(), snapshot);

    let response = ApiResponse::success(summary);
    Ok(warp::reply::json(&response))
}

async fn list_snapshots_handler(
    id: String,
    snapshots: SnapshotStore,
) -> Result<impl warp::Reply, warp::Rejection> {
    let snapshots_lock = snapshots.lock().unwrap();

    let summaries: Vec<SnapshotSummary> = snapshots_lock
        .values()
        .filter(|snapshot| snapshot.emulator_id == id)
        .map(EmulatorSnapshot::summary)
        .collect();

    let response = ApiResponse::success(summaries);
    Ok(warp::reply::json(&response))
}

async fn restore_snapshot_handler(
    id: String,
    request: RestoreSnapshotRequest,
    emulators: EmulatorMap,
    snapshots: SnapshotStore,
) -> Result<impl warp::Reply, warp::Rejection> {
    let snapshot = {
        let snapshots_lock = snapshots.lock().unwrap();
        snapshots_lock.get(&request.snapshot_id).cloned()
    };

    let Some(snapshot) = snapshot else {
        let response: ApiResponse<EmulatorState> =
            ApiResponse::error("Snapshot not found".to_string());
        return Ok(warp::reply::json(&response));
    };

    let mut emulators_lock = emulators.lock().unwrap();
    match emulators_lock.get_mut(&id) {
        Some(emulator) => match snapshot.restore(&mut emulator.cpu, &mut emulator.memory) {
            Ok(()) => {
                record_snapshot_operation("restore", &id);
                let response = ApiResponse::success(EmulatorState {
                    id: id.clone(),
                    cpu: emulator.get_state(),
                    cycles_consumed: emulator.cycles_consumed,
                });
                Ok(warp::reply::json(&response))
            }
            Err(err) => {
                let response: ApiResponse<EmulatorState> = ApiResponse::error(err.to_string());
                Ok(warp::reply::json(&response))
            }
        },
        None => {
            let response: ApiResponse<EmulatorState> =
                ApiResponse::error("Emulator not found".to_string());
            Ok(warp::reply::json(&response))
        }
    }
}

async fn metrics_handler() -> Result<impl warp::Reply, warp::Rejection> {
    let timer = Timer::new();
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();

    match encoder.encode_to_string(&metric_families) {
        Ok(metrics_text) => {
            record_api_request("GET", "/metrics", 200, timer.elapsed());
            Ok(warp::reply::with_header(
                metrics_text,
                "content-type",
                "text/plain; version=0.0.4",
            ))
        }
        Err(_) => {
            record_api_request("GET", "/metrics", 500, timer.elapsed());
            Ok(warp::reply::with_header(
                "Error encoding metrics".to_string(),
                "content-type",
                "text/plain",
            ))
        }
    }
}
