//! # Daemon Module
//!
//! The daemon module provides functionality for running and managing the
//! background services of the emulator: the visualization web server, the
//! Modbus TCP register server, the periodic simulation driver, and system
//! monitoring.
//!
//! ## Components
//!
//! * **Launch Daemon**: Core implementation for starting, monitoring, and
//!   gracefully shutting down background tasks
//!
//! ## Usage
//!
//! ```no_run
//! use promonitor::{config::Config, daemon::launch_daemon::Daemon};
//! use promonitor::sensor::SensorStore;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! async fn run() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.yaml")?;
//!     let store = Arc::new(SensorStore::new(
//!         config.build_sensors(),
//!         Duration::from_secs(config.simulation.interval_secs),
//!     ));
//!
//!     let mut daemon = Daemon::new(store);
//!     daemon.launch(&config).await?;
//!
//!     // ... wait for a shutdown signal ...
//!     daemon.shutdown();
//!     daemon.join().await?;
//!     Ok(())
//! }
//! ```

pub mod launch_daemon;

pub use launch_daemon::Daemon;
