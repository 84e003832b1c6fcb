// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the promonitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Sensor data model
//!
//! This module defines the data model shared by every component of the
//! emulator: the sensors themselves, the closed set of perturbation
//! scenarios, and the error taxonomy of the [`store::SensorStore`].
//!
//! Sensors are defined once at startup from the configuration and are never
//! created or destroyed at runtime; only their value and manual-override
//! state mutate, always under the store lock.

mod store;

pub use store::{SensorStore, StoreEvent};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Physical category of a sensor channel.
///
/// The category drives the baseline drift model and decides which
/// scenarios affect the sensor. It is resolved once when the configuration
/// is loaded; no string matching happens per tick or per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Temperature,
    Humidity,
    Pressure,
    Power,
    /// Catch-all for channels without a dedicated physical model, such as
    /// CO2 concentration.
    Generic,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorKind::Temperature => "temperature",
            SensorKind::Humidity => "humidity",
            SensorKind::Pressure => "pressure",
            SensorKind::Power => "power",
            SensorKind::Generic => "generic",
        };
        f.write_str(name)
    }
}

/// One simulated sensor and its live state.
#[derive(Debug, Clone)]
pub struct Sensor {
    /// Logical identifier, unique across the store.
    pub id: String,
    /// Base register address. Even-aligned: the value occupies
    /// `address` (high word) and `address + 1` (low word).
    pub address: u16,
    /// Building the sensor is installed in, used for scenario scoping.
    pub building: u8,
    /// Current value, clamped to `[min, max]` on every tick unless pinned.
    pub value: f64,
    pub min: f64,
    pub max: f64,
    /// Human-readable unit label, e.g. "°C".
    pub unit: String,
    pub kind: SensorKind,
    /// Manual override. While `Some`, the simulation skips this sensor and
    /// the pinned value is served as-is, even outside `[min, max]`.
    pub manual: Option<f64>,
}

impl Sensor {
    pub fn is_pinned(&self) -> bool {
        self.manual.is_some()
    }
}

/// Point-in-time copy of one sensor, safe to use outside the store lock.
#[derive(Debug, Clone, Serialize)]
pub struct SensorSnapshot {
    pub id: String,
    pub address: u16,
    pub building: u8,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub unit: String,
    pub kind: SensorKind,
    pub manual: bool,
}

impl From<&Sensor> for SensorSnapshot {
    fn from(sensor: &Sensor) -> Self {
        Self {
            id: sensor.id.clone(),
            address: sensor.address,
            building: sensor.building,
            value: sensor.value,
            min: sensor.min,
            max: sensor.max,
            unit: sensor.unit.clone(),
            kind: sensor.kind,
            manual: sensor.manual.is_some(),
        }
    }
}

/// Closed set of perturbation scenarios.
///
/// Unknown names are rejected at the control boundary with
/// [`StoreError::InvalidScenario`]; nothing in the store dispatches on raw
/// strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    Fire,
    Leak,
    PowerFailure,
    TemperatureSpike,
    HumidityDrop,
    Co2Alarm,
    EquipmentFailure,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 7] = [
        ScenarioKind::Fire,
        ScenarioKind::Leak,
        ScenarioKind::PowerFailure,
        ScenarioKind::TemperatureSpike,
        ScenarioKind::HumidityDrop,
        ScenarioKind::Co2Alarm,
        ScenarioKind::EquipmentFailure,
    ];

    /// Default intensity applied when the caller does not supply one.
    ///
    /// The unit depends on the scenario: degrees for temperature effects,
    /// percentage points for humidity, ppm for CO2, and a dimensionless
    /// multiplier for power failure and equipment failure.
    pub fn default_intensity(self) -> f64 {
        match self {
            ScenarioKind::Fire => 20.0,
            ScenarioKind::Leak => 25.0,
            ScenarioKind::PowerFailure => 1.0,
            ScenarioKind::TemperatureSpike => 10.0,
            ScenarioKind::HumidityDrop => 15.0,
            ScenarioKind::Co2Alarm => 400.0,
            ScenarioKind::EquipmentFailure => 1.0,
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScenarioKind::Fire => "fire",
            ScenarioKind::Leak => "leak",
            ScenarioKind::PowerFailure => "power_failure",
            ScenarioKind::TemperatureSpike => "temperature_spike",
            ScenarioKind::HumidityDrop => "humidity_drop",
            ScenarioKind::Co2Alarm => "co2_alarm",
            ScenarioKind::EquipmentFailure => "equipment_failure",
        };
        f.write_str(name)
    }
}

impl FromStr for ScenarioKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fire" => Ok(ScenarioKind::Fire),
            "leak" => Ok(ScenarioKind::Leak),
            "power_failure" => Ok(ScenarioKind::PowerFailure),
            "temperature_spike" => Ok(ScenarioKind::TemperatureSpike),
            "humidity_drop" => Ok(ScenarioKind::HumidityDrop),
            "co2_alarm" => Ok(ScenarioKind::Co2Alarm),
            "equipment_failure" => Ok(ScenarioKind::EquipmentFailure),
            other => Err(StoreError::InvalidScenario(other.to_string())),
        }
    }
}

/// One active scenario instance.
///
/// At most one instance per [`ScenarioKind`] is active at a time;
/// re-activating a kind replaces its previous instance.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Scenario {
    pub kind: ScenarioKind,
    /// Scope: affected building, or all buildings when `None`.
    pub building: Option<u8>,
    pub intensity: f64,
}

impl Scenario {
    /// Whether the given sensor falls within this scenario's scope.
    ///
    /// Scope is by building only; which categories react, and how, is
    /// decided by the simulation model.
    pub fn in_scope(&self, sensor: &Sensor) -> bool {
        match self.building {
            Some(building) => sensor.building == building,
            None => true,
        }
    }
}

/// Snapshot of the whole store, produced for the HTTP surface.
#[derive(Debug, Clone, Serialize)]
pub struct StoreSnapshot {
    pub timestamp: DateTime<Utc>,
    pub scenarios: Vec<Scenario>,
    pub sensors: Vec<SensorSnapshot>,
}

/// Error taxonomy of the sensor value store.
///
/// These errors only ever surface through the HTTP control surface as
/// structured failures; the binary protocol has no representation for them
/// and serves zero-filled registers instead.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Referenced sensor id is not configured.
    #[error("unknown sensor: {0}")]
    NotFound(String),

    /// Scenario name is not part of the closed scenario set.
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),

    /// The store lock could not be acquired (poisoned). Callers retry on
    /// the next tick or report a boolean failure; this never crashes the
    /// process.
    #[error("sensor store unavailable")]
    Unavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_names_round_trip() {
        for kind in ScenarioKind::ALL {
            assert_eq!(kind.to_string().parse::<ScenarioKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_scenario_name_is_rejected() {
        let err = "alien_invasion".parse::<ScenarioKind>().unwrap_err();
        assert!(matches!(err, StoreError::InvalidScenario(name) if name == "alien_invasion"));
    }

    #[test]
    fn scenario_scope_by_building() {
        let sensor = Sensor {
            id: "temp_1".into(),
            address: 1000,
            building: 1,
            value: 21.0,
            min: 15.0,
            max: 30.0,
            unit: "°C".into(),
            kind: SensorKind::Temperature,
            manual: None,
        };
        let scoped = Scenario {
            kind: ScenarioKind::Fire,
            building: Some(1),
            intensity: 20.0,
        };
        let elsewhere = Scenario {
            kind: ScenarioKind::Fire,
            building: Some(2),
            intensity: 20.0,
        };
        let global = Scenario {
            kind: ScenarioKind::Fire,
            building: None,
            intensity: 20.0,
        };
        assert!(scoped.in_scope(&sensor));
        assert!(!elsewhere.in_scope(&sensor));
        assert!(global.in_scope(&sensor));
    }
}
