// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the promonitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Diagnostic Modbus client for the emulator
//!
//! Reads a range of holding registers and, when the range is even-aligned,
//! decodes each register pair as an IEEE-754 float32 the way the emulator
//! encodes sensor values.

use clap::Parser;
use std::{error::Error, net::SocketAddr};
use tokio_modbus::prelude::*;

use promonitor::registers;

/// Modbus client for reading sensor values from the emulator
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Modbus server address
    #[clap(long, default_value = "127.0.0.1")]
    address: String,

    /// Modbus server port
    #[clap(long, default_value = "5020")]
    port: u16,

    /// Starting holding register address
    #[clap(long, default_value = "1000")]
    register: u16,

    /// Number of registers to read
    #[clap(long, default_value = "8")]
    quantity: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    // Parse command line arguments
    let args = Args::parse();

    // Format server address
    let socket_addr: SocketAddr = format!("{}:{}", args.address, args.port).parse()?;
    println!("Connecting to Modbus server at {}", socket_addr);

    // Create TCP transport
    let mut ctx = tcp::connect_slave(socket_addr, Slave(1)).await?;

    // Read holding registers
    println!(
        "Reading {} holding registers starting at address {}",
        args.quantity, args.register
    );
    let response = ctx.read_holding_registers(args.register, args.quantity).await??;

    // Display raw results
    println!("Raw register values: {:?}", response);

    // Decode float32 pairs when the read is aligned to the register map
    if args.register % 2 == 0 {
        for (i, pair) in response.chunks_exact(2).enumerate() {
            let address = args.register + 2 * i as u16;
            let value = registers::decode_f32(pair[0], pair[1]);
            println!("  register {:>5}: {:.2}", address, value);
        }
    }

    Ok(())
}
