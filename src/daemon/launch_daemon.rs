//! # Daemon Management Module
//!
//! This module provides functionality for running and managing background
//! tasks (daemons) in the emulator. It handles the lifecycle of various
//! services including:
//!
//! - Web server for visualization and control
//! - Modbus TCP register server
//! - Periodic simulation of the sensor population
//! - System health monitoring (heartbeat)
//!
//! The daemon system allows for graceful startup and shutdown of these
//! services, with proper error handling and task coordination.
//!
//! ## Architecture
//!
//! The daemon system uses Tokio's asynchronous runtime to manage concurrent
//! tasks. Each service runs as an independent task, and the main daemon
//! structure tracks and coordinates these tasks. The sensor store is the
//! only shared state; every task receives its own `Arc` handle to it.

use anyhow::Result;
use log::{debug, info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::Config;
use crate::modbus::ModbusServer;
use crate::sensor::{SensorStore, StoreEvent};
use crate::visualization::server::build_rocket;
use rocket::config::LogLevel;

/// Represents a daemon task manager that coordinates multiple background
/// services
///
/// This structure maintains a collection of asynchronous tasks and provides
/// methods to start, stop, and monitor them.
///
/// # Fields
///
/// * `tasks` - Collection of handles to running tasks for management and cleanup
/// * `running` - Atomic flag shared between tasks to coordinate shutdown
/// * `store` - Shared sensor value store handed to every service
///
/// # Thread Safety
///
/// The `running` flag is wrapped in an `Arc` to allow safe sharing between
/// multiple tasks. Each task checks this flag periodically to determine if
/// it should continue running or gracefully terminate. Tasks that block in
/// `accept` or on a channel rather than polling are woken through a watch
/// channel instead.
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    store: Arc<SensorStore>,
    shutdown_signal: watch::Sender<bool>,
}

impl Daemon {
    /// Create a new daemon instance around a shared sensor store
    ///
    /// Initializes a new daemon manager with an empty task list and the
    /// running flag set to `true`.
    pub fn new(store: Arc<SensorStore>) -> Self {
        let (shutdown_signal, _) = watch::channel(false);
        Daemon {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            store,
            shutdown_signal,
        }
    }

    /// Launch all configured tasks based on configuration
    ///
    /// Starts the various daemon services according to the provided
    /// configuration. Only services that are enabled in the configuration
    /// will be started. Each service runs as a separate asynchronous task.
    ///
    /// The following services may be started:
    /// * Visualization web server - if `config.visualization.enabled`
    /// * Modbus TCP server - if `config.modbus.enabled`
    /// * Simulation driver - if `config.simulation.enabled`
    /// * Store event logger and heartbeat - always
    ///
    /// # Errors
    ///
    /// This function can fail if any of the services fail to start, such as
    /// a server failing to bind to its configured port.
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        if config.visualization.enabled {
            self.start_visualization_server(config)?;
        }

        if config.modbus.enabled {
            self.start_modbus_server(config).await?;
        }

        if config.simulation.enabled {
            self.start_simulation(config)?;
        }

        self.start_event_logger()?;
        self.start_heartbeat()?;

        Ok(())
    }

    /// Start the Rocket web server for visualization and control
    ///
    /// The server is configured according to the provided configuration
    /// (address, port, server identity) and runs until the process exits.
    fn start_visualization_server(&mut self, config: &Config) -> Result<()> {
        info!(
            "Starting web server on {}:{}",
            config.visualization.address, config.visualization.port
        );

        let figment = rocket::Config::figment()
            .merge(("ident", config.visualization.name.clone()))
            .merge(("address", config.visualization.address.clone()))
            .merge(("port", config.visualization.port))
            .merge(("log_level", LogLevel::Normal));

        let rocket = build_rocket(figment, self.store.clone());

        let task = tokio::spawn(async move {
            let ignited = rocket.ignite().await?;
            ignited.launch().await?;
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Launch the Modbus server daemon
    ///
    /// Binds the listening socket immediately so configuration errors
    /// surface at startup rather than on the first client connection, then
    /// spawns the accept loop. The loop stops when [`Daemon::shutdown`]
    /// flips the watch channel.
    async fn start_modbus_server(&mut self, config: &Config) -> Result<()> {
        info!(
            "Starting modbus server on {}:{}",
            config.modbus.address, config.modbus.port
        );

        let server = ModbusServer::bind(&config.modbus.address, config.modbus.port).await?;
        let store = self.store.clone();
        let shutdown = self.shutdown_signal.subscribe();

        let task = tokio::spawn(async move { server.serve(store, shutdown).await });

        self.tasks.push(task);
        info!("Modbus server started");
        Ok(())
    }

    /// Start the periodic simulation driver
    ///
    /// Advances the sensor store at the configured interval until the
    /// daemon's `running` flag is cleared. A failed tick (store
    /// unavailable) is logged and retried on the next interval.
    fn start_simulation(&mut self, config: &Config) -> Result<()> {
        info!(
            "Starting simulation driver ({}s interval)",
            config.simulation.interval_secs
        );

        let running = self.running.clone();
        let store = self.store.clone();
        let tick_interval = Duration::from_secs(config.simulation.interval_secs);

        let task = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            // The first tick of a tokio interval fires immediately; skip it
            // so sensors hold their configured values for one full period.
            interval.tick().await;
            while running.load(Ordering::SeqCst) {
                interval.tick().await;
                if let Err(e) = store.tick() {
                    warn!("Simulation tick skipped: {}", e);
                }
            }
            info!("Simulation driver stopped");
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Start a task logging every store event
    ///
    /// Subscribes to the store's broadcast channel and logs manual
    /// overrides and scenario changes, giving operators a single timeline
    /// of control actions. Lagging behind the channel only costs log
    /// lines, never state.
    fn start_event_logger(&mut self) -> Result<()> {
        let mut events = self.store.subscribe();
        let mut shutdown = self.shutdown_signal.subscribe();

        let task = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    event = events.recv() => event,
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                };
                match event {
                    Ok(StoreEvent::ManualSet { id, value }) => {
                        info!("Event: {} pinned to {}", id, value);
                    }
                    Ok(StoreEvent::ManualCleared { id }) => {
                        info!("Event: {} released to simulation", id);
                    }
                    Ok(StoreEvent::ScenarioStarted(scenario)) => {
                        info!(
                            "Event: scenario {} started (building: {:?}, intensity: {})",
                            scenario.kind, scenario.building, scenario.intensity
                        );
                    }
                    Ok(StoreEvent::ScenarioStopped(kind)) => {
                        info!("Event: scenario {} stopped", kind);
                    }
                    Ok(StoreEvent::AllScenariosStopped) => {
                        info!("Event: all scenarios stopped");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Event logger lagged, {} events dropped", missed);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Start a heartbeat task that logs system status periodically
    ///
    /// The heartbeat task runs every 60 seconds and continues until the
    /// daemon's `running` flag is set to `false`. In a production
    /// environment, these messages could be monitored by an external
    /// system to detect if the daemon has stopped functioning properly.
    fn start_heartbeat(&mut self) -> Result<()> {
        info!("Starting heartbeat monitor");

        let running = self.running.clone();
        let task = tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                debug!("Daemon heartbeat: running");
                time::sleep(Duration::from_secs(60)).await;
            }
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Shared store handle, for callers that want to inspect state outside
    /// the daemon's own tasks.
    pub fn get_store(&self) -> Arc<SensorStore> {
        self.store.clone()
    }

    /// Stop all running tasks gracefully
    ///
    /// Signals all spawned tasks to terminate by setting the shared
    /// `running` flag to `false` and flipping the Modbus shutdown channel.
    /// This method only signals the tasks to stop; it does not wait for
    /// them to complete. To wait for all tasks to finish, call `join()`
    /// after this method.
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.running.store(false, Ordering::SeqCst);
        // Receivers may all be gone already when no Modbus server ran.
        let _ = self.shutdown_signal.send(true);
    }

    /// Wait for all tasks to complete
    ///
    /// Consumes the daemon and waits for all spawned tasks to finish
    /// execution. This method should be called after `shutdown()` to
    /// ensure a clean application exit.
    ///
    /// If any task panics or overruns the per-task timeout, the problem is
    /// logged but this method still waits for the remaining tasks.
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match tokio::time::timeout(Duration::from_secs(5), task).await {
                Ok(result) => {
                    if let Err(e) = result {
                        log::error!("Task panicked: {}", e);
                    }
                }
                Err(_) => {
                    // Task didn't complete within timeout
                    log::warn!("Task did not complete within timeout period, may be hung");
                }
            }
        }
        Ok(())
    }
}
