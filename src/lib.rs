//! ProMonitor library
//!
//! Building sensor network emulator: a simulated population of
//! temperature, humidity, pressure, power and CO2 sensors exposed over a
//! Modbus TCP register map and an HTTP/JSON control surface.

pub mod config;
pub mod daemon;
pub mod modbus;
pub mod registers;
pub mod sensor;
pub mod simulation;
pub mod visualization;
