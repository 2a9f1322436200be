//! Background Tasks Module
//!
//! Long-running loops that keep the cache within its limits.
//!
//! # Tasks
//! - Disk maintenance: expiry and size sweeps at a configured interval
//! - Memory pressure: clears the memory tier whenever the environment asks

mod maintenance;
mod pressure;

pub use maintenance::spawn_maintenance_task;
pub use pressure::spawn_pressure_listener;
