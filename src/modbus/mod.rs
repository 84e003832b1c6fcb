// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the promonitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus communication module
//!
//! This module provides the Modbus TCP server of the emulator, allowing
//! external systems (SCADA, BMS front-ends, diagnostic tools) to read the
//! simulated sensor values as holding registers.
//!
//! For avoiding confusion with the Modbus master/slave terminology, this
//! module uses the terms "server" and "client" instead: the server is the
//! device that provides data, the client is the device that requests it.
//!
//! ## Key Components
//!
//! - [`frame`]: pure parser/builder for the MBAP-framed wire format.
//! - [`ModbusServer`]: the TCP listener dispatching one task per client.
//!
//! ## Register Map
//!
//! Only function code 0x03 (Read Holding Registers) is supported; every
//! sensor value is an IEEE-754 float32 over two consecutive registers (see
//! [`crate::registers`] for the address map). Register writes are not part
//! of this deployment and are answered with an illegal-function exception.

pub mod frame;
pub mod server;

pub use server::ModbusServer;
