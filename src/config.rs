// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the promonitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Configuration Management
//!
//! This module implements configuration handling for the sensor network
//! emulator. It supports loading, validating, and saving configuration from
//! YAML files using JSON Schema validation for robust error checking.
//!
//! ## Configuration Structure
//!
//! The application's configuration is organized as a nested structure with
//! sections:
//! - `visualization`: settings for the dashboard API web server
//! - `modbus`: settings for the Modbus TCP register server
//! - `simulation`: tick interval of the simulation driver
//! - `sensors`: the fixed sensor population and its register map
//!
//! ## Usage
//!
//! ```no_run
//! use promonitor::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some(8081),                  // Web port
//!     Some("0.0.0.0".to_string()), // Web address
//!     Some(true),                  // Enable Modbus
//!     Some("0.0.0.0".to_string()), // Modbus address
//!     Some(5020),                  // Modbus port
//!     Some(2),                     // Simulation interval
//! );
//!
//! // Access configuration values
//! println!("Server port: {}", config.visualization.port);
//! ```

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::Write,
    path::Path,
};

use crate::sensor::{Sensor, SensorKind};

/// Configuration for the visualization web server.
///
/// These settings control the dashboard API: network binding and whether
/// the server is started at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizationConfig {
    /// The TCP port the visualization server will listen on.
    ///
    /// Valid range is 1-65534. Default value is 8080.
    #[serde(default = "default_web_port")]
    pub port: u16,

    /// The network address the server will bind to.
    ///
    /// Can be an IPv4/IPv6 address or a hostname. Default is "127.0.0.1".
    /// Use "0.0.0.0" to bind to all IPv4 interfaces.
    #[serde(default = "default_address")]
    pub address: String,

    /// The server name reported in HTTP headers and logs.
    #[serde(default = "default_name")]
    pub name: String,

    /// Enable or disable the visualization server.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_web_port() -> u16 {
    8080
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_name() -> String {
    format!("ProMonitorApiServer/{}", env!("CARGO_PKG_VERSION"))
}

fn default_enabled() -> bool {
    true
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            port: default_web_port(),
            address: default_address(),
            name: default_name(),
            enabled: default_enabled(),
        }
    }
}

/// Configuration for the Modbus TCP server component.
///
/// # Fields
///
/// * `enabled` - Flag to enable or disable the Modbus server
/// * `port` - TCP port number for the Modbus server (default: 5020)
/// * `address` - Network address for the Modbus server to bind to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModbusConfig {
    /// Enable or disable the Modbus TCP server.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// The TCP port the Modbus server will listen on.
    ///
    /// Default is 5020; the standard Modbus port 502 requires elevated
    /// privileges on most systems.
    #[serde(default = "default_modbus_port")]
    pub port: u16,

    /// The network address the Modbus server will bind to.
    #[serde(default = "default_address")]
    pub address: String,
}

fn default_modbus_port() -> u16 {
    5020
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            port: default_modbus_port(),
            address: default_address(),
        }
    }
}

/// Configuration for the simulation driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Enable or disable the periodic simulation task.
    ///
    /// With the simulation disabled, sensor values only change through
    /// manual overrides. Default is `true`.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Time between consecutive simulation ticks in seconds.
    ///
    /// Valid range is 1-5 seconds. Default is 2.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    2
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval_secs(),
        }
    }
}

/// Static definition of one sensor.
///
/// Sensors are defined once here and never created or destroyed at
/// runtime; only their value and manual-override state mutate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Logical identifier, unique across the configuration.
    pub id: String,

    /// Physical category, drives the simulation model.
    pub kind: SensorKind,

    /// Base register address. Must be even: each value occupies two
    /// consecutive 16-bit registers.
    pub address: u16,

    /// Building the sensor belongs to, used for scenario scoping.
    pub building: u8,

    /// Value at startup.
    pub initial: f64,

    /// Lower bound the simulation clamps to.
    pub min: f64,

    /// Upper bound the simulation clamps to.
    pub max: f64,

    /// Human-readable unit label.
    pub unit: String,
}

impl SensorConfig {
    #[allow(clippy::too_many_arguments)]
    fn new(
        id: &str,
        kind: SensorKind,
        address: u16,
        building: u8,
        initial: f64,
        min: f64,
        max: f64,
        unit: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            kind,
            address,
            building,
            initial,
            min,
            max,
            unit: unit.to_string(),
        }
    }

    /// Materialize the live sensor for the store.
    pub fn into_sensor(self) -> Sensor {
        Sensor {
            id: self.id,
            address: self.address,
            building: self.building,
            value: self.initial,
            min: self.min,
            max: self.max,
            unit: self.unit,
            kind: self.kind,
            manual: None,
        }
    }
}

/// The default sensor population: the fixed register map of the emulated
/// building complex. Per-building base temperatures and humidities follow
/// the deployed site profile (buildings 1-4 run 20/21/23/25 °C and
/// 47/49/51 %RH).
fn default_sensors() -> Vec<SensorConfig> {
    use SensorKind::*;
    vec![
        SensorConfig::new("temp_b1", Temperature, 1000, 1, 20.0, 15.0, 30.0, "°C"),
        SensorConfig::new("temp_b2", Temperature, 1002, 2, 21.0, 15.0, 30.0, "°C"),
        SensorConfig::new("temp_b3", Temperature, 1004, 3, 23.0, 15.0, 30.0, "°C"),
        SensorConfig::new("temp_b4", Temperature, 1006, 4, 25.0, 15.0, 30.0, "°C"),
        SensorConfig::new("hum_b1", Humidity, 2000, 1, 47.0, 30.0, 70.0, "%RH"),
        SensorConfig::new("hum_b2", Humidity, 2002, 2, 49.0, 30.0, 70.0, "%RH"),
        SensorConfig::new("hum_b3", Humidity, 2004, 3, 51.0, 30.0, 70.0, "%RH"),
        SensorConfig::new("press_b1", Pressure, 3000, 1, 1005.0, 980.0, 1030.0, "hPa"),
        SensorConfig::new("press_b2", Pressure, 3002, 2, 1008.0, 980.0, 1030.0, "hPa"),
        SensorConfig::new("power_b1", Power, 4000, 1, 60.0, 0.0, 100.0, "kW"),
        SensorConfig::new("power_b2", Power, 4002, 2, 55.0, 0.0, 100.0, "kW"),
        SensorConfig::new("power_b3", Power, 4004, 3, 65.0, 0.0, 100.0, "kW"),
        SensorConfig::new("co2_b1", Generic, 5000, 1, 450.0, 350.0, 2000.0, "ppm"),
        SensorConfig::new("co2_b2", Generic, 5002, 2, 480.0, 350.0, 2000.0, "ppm"),
    ]
}

/// Root configuration structure for the emulator.
///
/// The configuration is designed to be deserialized from and serialized to
/// YAML using the serde framework. The structure is validated against a
/// JSON schema to ensure all required fields are present and have valid
/// values; each section falls back to defaults when not specified, allowing
/// for minimal configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Settings for the visualization web server component.
    #[serde(default)]
    pub visualization: VisualizationConfig,

    /// Settings for the Modbus TCP register server.
    #[serde(default)]
    pub modbus: ModbusConfig,

    /// Settings for the periodic simulation driver.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// The sensor population and its register map.
    #[serde(default = "default_sensors")]
    pub sensors: Vec<SensorConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            visualization: VisualizationConfig::default(),
            modbus: ModbusConfig::default(),
            simulation: SimulationConfig::default(),
            sensors: default_sensors(),
        }
    }
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        debug!("Creating sample configuration file at {:?}", path);
        let sample_path = path.with_extension("sample.yaml");

        // Create parent directories if they don't exist
        if let Some(parent) = sample_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        let sample_config = Self::default();
        sample_config
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        // First step: parse the YAML to a generic value
        let yaml_value: serde_yml::Value = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;

        // Convert to a JSON value for validation
        let json_value = serde_json::to_value(&yaml_value)
            .context("Failed to convert YAML to JSON for validation")?;

        // Load and parse the embedded schema
        let schema_str = include_str!("../resources/config.schema.json");
        let schema: serde_json::Value =
            serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        // Validate before deserializing to Config
        debug!("Validating {} against the schema", path.display());
        if let Err(validation_error) = validator.validate(&json_value) {
            error!("Configuration validation error: {}", validation_error);
            // Generate a sample file with the default values for the user
            // to edit
            Self::create_sample_config(path)?;
            anyhow::bail!("Configuration validation failed: {}", validation_error);
        }

        // Now that the YAML has been validated, deserialize to Config
        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config = match serde_yml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                match Self::create_sample_config(path) {
                    Ok(_) => debug!("Successfully created sample config"),
                    Err(e) => error!("Failed to create sample config: {}", e),
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        // Perform additional validations the schema cannot express
        if let Err(err) = Self::validate_specific_rules(&config) {
            error!("Configuration validation error: {}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only values that are explicitly provided override the existing
    /// configuration.
    ///
    /// # Parameters
    ///
    /// * `web_port` - Optional TCP port for the visualization server
    /// * `web_address` - Optional network address for the visualization server
    /// * `modbus_enabled` - Optional flag to enable/disable the Modbus server
    /// * `modbus_address` - Optional network address for the Modbus server
    /// * `modbus_port` - Optional TCP port for the Modbus server
    /// * `interval_secs` - Optional simulation tick interval in seconds
    pub fn apply_args(
        &mut self,
        web_port: Option<u16>,
        web_address: Option<String>,
        modbus_enabled: Option<bool>,
        modbus_address: Option<String>,
        modbus_port: Option<u16>,
        interval_secs: Option<u64>,
    ) {
        // Only override if command-line arguments are provided
        if let Some(web_port) = web_port {
            debug!("Overriding web port from command line: {}", web_port);
            self.visualization.port = web_port;
        }

        if let Some(web_address) = web_address {
            debug!("Overriding web address from command line: {}", web_address);
            self.visualization.address = web_address;
        }

        if let Some(enabled) = modbus_enabled {
            debug!("Overriding Modbus enabled from command line: {}", enabled);
            self.modbus.enabled = enabled;
        }

        if let Some(address) = modbus_address {
            debug!("Overriding Modbus address from command line: {}", address);
            self.modbus.address = address;
        }

        if let Some(port) = modbus_port {
            debug!("Overriding Modbus port from command line: {}", port);
            self.modbus.port = port;
        }

        if let Some(interval) = interval_secs {
            debug!(
                "Overriding simulation interval from command line: {}s",
                interval
            );
            self.simulation.interval_secs = interval;
        }
    }

    /// Materialize the configured sensor population for the store.
    pub fn build_sensors(&self) -> Vec<Sensor> {
        self.sensors
            .iter()
            .cloned()
            .map(SensorConfig::into_sensor)
            .collect()
    }

    /// Validates the configuration against additional rules that aren't
    /// covered by the JSON schema.
    ///
    /// # Validation Rules
    ///
    /// - **Port Ranges**: both server ports must be within 1-65534
    /// - **IP Address Format**: bind addresses should parse as IP addresses
    ///   or known special values
    /// - **Simulation Interval**: must stay within 1-5 seconds
    /// - **Sensor Map**: ids unique, base addresses even and non-overlapping
    ///   (each sensor occupies two register slots), `min < max`, and the
    ///   initial value within bounds
    fn validate_specific_rules(config: &Config) -> Result<()> {
        debug!("Performing additional validation checks");

        if config.visualization.port < 1 || config.visualization.port > 65534 {
            anyhow::bail!("Invalid web port number: {}", config.visualization.port);
        }
        if config.modbus.port < 1 || config.modbus.port > 65534 {
            anyhow::bail!("Invalid Modbus port number: {}", config.modbus.port);
        }

        if !is_valid_ip_address(&config.visualization.address) {
            debug!(
                "Potentially invalid address format: {}",
                config.visualization.address
            );
            // Just note it but don't block; hostnames resolve at bind time
        }

        if !(1..=5).contains(&config.simulation.interval_secs) {
            anyhow::bail!(
                "Invalid simulation interval: {}s (valid range is 1-5)",
                config.simulation.interval_secs
            );
        }

        let mut seen_ids = std::collections::HashSet::new();
        let mut seen_slots = std::collections::HashSet::new();
        for sensor in &config.sensors {
            if !seen_ids.insert(sensor.id.as_str()) {
                anyhow::bail!("Duplicate sensor id: {}", sensor.id);
            }
            if sensor.address % 2 != 0 {
                anyhow::bail!(
                    "Sensor {} has odd base address {}; values occupy two registers starting at an even address",
                    sensor.id,
                    sensor.address
                );
            }
            if sensor.address == u16::MAX {
                anyhow::bail!(
                    "Sensor {} base address {} leaves no room for its second register",
                    sensor.id,
                    sensor.address
                );
            }
            for slot in [sensor.address, sensor.address + 1] {
                if !seen_slots.insert(slot) {
                    anyhow::bail!(
                        "Sensor {} overlaps another sensor at register {}",
                        sensor.id,
                        slot
                    );
                }
            }
            if sensor.min >= sensor.max {
                anyhow::bail!(
                    "Sensor {} has an empty range: min {} >= max {}",
                    sensor.id,
                    sensor.min,
                    sensor.max
                );
            }
            if sensor.initial < sensor.min || sensor.initial > sensor.max {
                anyhow::bail!(
                    "Sensor {} initial value {} outside [{}, {}]",
                    sensor.id,
                    sensor.initial,
                    sensor.min,
                    sensor.max
                );
            }
        }

        Ok(())
    }
}

/// Check if a string is a valid IP address
fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    // Special cases
    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line. It outputs the full JSON schema for the
/// configuration to stdout, formatted for readability.
///
/// # Example
///
/// ```bash
/// ./promonitor --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    // Load the schema from the embedded string
    let schema_str = include_str!("../resources/config.schema.json");

    // Parse the schema to pretty-format it
    let schema: serde_json::Value =
        serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}
