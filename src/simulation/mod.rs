// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the promonitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Physical models for the periodic simulation tick
//!
//! Every tick, each unpinned sensor receives a delta from two additive
//! sources: a baseline drift depending on its [`SensorKind`] and a
//! directional bias from every active scenario whose scope covers it. The
//! store applies the delta and clamps the result to the sensor's effective
//! bounds (normally `[min, max]`; a fire raises the temperature and power
//! ceiling above the configured maximum).
//!
//! The functions here are pure with respect to the store: they read sensor
//! state and a random source and return deltas, leaving all mutation to
//! [`crate::sensor::SensorStore::tick`].

use rand::Rng;

use crate::sensor::{Scenario, ScenarioKind, Sensor, SensorKind};

/// Period of the pressure oscillation in seconds.
const PRESSURE_PERIOD_SECS: f64 = 30.0;

/// Load fraction of the configured range that power channels revert to.
const POWER_LOAD_FRACTION: f64 = 0.6;

/// Baseline drift for one tick.
///
/// * temperature: bounded uniform noise, ±0.5 per tick
/// * humidity: bounded uniform noise, ±2.0 per tick
/// * pressure: sinusoidal term with a ~30 s period plus small noise
/// * power: mean reversion towards a load fraction of the range plus noise
/// * generic: bounded uniform noise, ±15 per tick (CO2-style channels)
///
/// `elapsed_secs` is the simulated time since process start and only drives
/// the pressure oscillation phase.
pub fn baseline_drift<R: Rng>(sensor: &Sensor, elapsed_secs: f64, rng: &mut R) -> f64 {
    match sensor.kind {
        SensorKind::Temperature => rng.random_range(-0.5..=0.5),
        SensorKind::Humidity => rng.random_range(-2.0..=2.0),
        SensorKind::Pressure => {
            let phase = elapsed_secs * std::f64::consts::TAU / PRESSURE_PERIOD_SECS;
            0.5 * phase.sin() + rng.random_range(-0.2..=0.2)
        }
        SensorKind::Power => {
            let range = sensor.max - sensor.min;
            let target = sensor.min + POWER_LOAD_FRACTION * range;
            0.1 * (target - sensor.value) + rng.random_range(-0.05..=0.05) * range
        }
        SensorKind::Generic => rng.random_range(-15.0..=15.0),
    }
}

/// Directional bias contributed by one active scenario for one tick.
///
/// Returns 0.0 when the sensor is out of the scenario's scope or its
/// category does not react to the scenario. Per-tick magnitudes are scaled
/// so that the named scenarios reach their intended total excursion over
/// roughly ten ticks (a temperature spike of intensity 10 climbs 8–12
/// degrees, a humidity drop of intensity 15 loses 12–18 points, a CO2
/// alarm of intensity 400 gains 300–500 ppm).
pub fn scenario_bias<R: Rng>(scenario: &Scenario, sensor: &Sensor, rng: &mut R) -> f64 {
    if !scenario.in_scope(sensor) {
        return 0.0;
    }
    let intensity = scenario.intensity;
    match (scenario.kind, sensor.kind) {
        (ScenarioKind::Fire, SensorKind::Temperature) => rng.random_range(1.0..=2.0),
        (ScenarioKind::Fire, SensorKind::Power) => {
            rng.random_range(0.05..=0.10) * (sensor.max - sensor.min)
        }
        (ScenarioKind::Leak, SensorKind::Humidity) => rng.random_range(1.0..=3.0),
        (ScenarioKind::Leak, SensorKind::Pressure) => -rng.random_range(0.2..=0.6),
        (ScenarioKind::PowerFailure, SensorKind::Power) => {
            // Exponential decay towards the bottom of the range.
            -0.3 * intensity * (sensor.value - sensor.min)
        }
        (ScenarioKind::TemperatureSpike, SensorKind::Temperature) => {
            rng.random_range(0.8..=1.2) * intensity / 10.0
        }
        (ScenarioKind::HumidityDrop, SensorKind::Humidity) => {
            -rng.random_range(0.8..=1.2) * intensity / 10.0
        }
        (ScenarioKind::Co2Alarm, SensorKind::Generic) => {
            rng.random_range(0.75..=1.25) * intensity / 10.0
        }
        (ScenarioKind::EquipmentFailure, kind) => {
            // Erratic readings across every channel of the faulty equipment.
            let swing = match kind {
                SensorKind::Temperature => 10.0,
                SensorKind::Humidity => 25.0,
                SensorKind::Pressure => 20.0,
                SensorKind::Power => 0.2 * (sensor.max - sensor.min),
                SensorKind::Generic => 500.0,
            };
            rng.random_range(-1.0..=1.0) * swing * intensity
        }
        _ => 0.0,
    }
}

/// Upper clamp bound for a sensor given the active scenarios.
///
/// An in-scope fire lets temperature and power exceed the configured
/// maximum by the fire's intensity; every other combination keeps the
/// configured maximum.
pub fn effective_max(sensor: &Sensor, scenarios: &[Scenario]) -> f64 {
    let mut max = sensor.max;
    for scenario in scenarios {
        if scenario.kind == ScenarioKind::Fire
            && scenario.in_scope(sensor)
            && matches!(sensor.kind, SensorKind::Temperature | SensorKind::Power)
        {
            max = max.max(sensor.max + scenario.intensity);
        }
    }
    max
}
