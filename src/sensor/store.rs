// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the promonitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Sensor value store
//!
//! The store is the single piece of mutable shared state in the emulator.
//! It is constructed once at process start and an `Arc` handle is injected
//! into every component that needs it: Modbus connection handlers read
//! register ranges, the simulation task drives [`SensorStore::tick`], and
//! the HTTP handlers translate control requests into store calls.
//!
//! All mutation and all multi-field reads go through one coarse mutex over
//! the whole state. The critical sections are O(number of sensors), so the
//! lock is held only briefly; one `read_register_range` call is atomic with
//! respect to concurrent ticks, but two consecutive reads may observe
//! different ticks.

use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::broadcast;

use crate::registers;
use crate::sensor::{
    Scenario, ScenarioKind, Sensor, SensorSnapshot, StoreError, StoreSnapshot,
};
use crate::simulation;

/// State-change notifications published by the store.
///
/// Connected observers (the daemon event logger, dashboards polling through
/// a push channel) subscribe via [`SensorStore::subscribe`]. Lagging
/// receivers miss events rather than blocking the store.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    ManualSet { id: String, value: f64 },
    ManualCleared { id: String },
    ScenarioStarted(Scenario),
    ScenarioStopped(ScenarioKind),
    AllScenariosStopped,
}

struct StoreInner {
    sensors: Vec<Sensor>,
    scenarios: Vec<Scenario>,
    /// Number of completed ticks, drives the pressure oscillation phase.
    ticks: u64,
}

/// Concurrently-accessible mapping from sensor identity to live value,
/// bounds, unit, and manual-override state. See the module documentation
/// for the locking model.
pub struct SensorStore {
    inner: Mutex<StoreInner>,
    events: broadcast::Sender<StoreEvent>,
    tick_interval: Duration,
}

impl SensorStore {
    /// Create a store over a fixed sensor population.
    ///
    /// `tick_interval` is the simulation period; it only shapes the
    /// time-driven part of the physical model, the caller still decides
    /// when to invoke [`SensorStore::tick`].
    pub fn new(sensors: Vec<Sensor>, tick_interval: Duration) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Mutex::new(StoreInner {
                sensors,
                scenarios: Vec::new(),
                ticks: 0,
            }),
            events,
            tick_interval,
        }
    }

    /// Subscribe to state-change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreInner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Unavailable)
    }

    fn emit(&self, event: StoreEvent) {
        // No receivers is fine; the store never depends on its observers.
        let _ = self.events.send(event);
    }

    /// Snapshot of one sensor by id.
    pub fn get(&self, id: &str) -> Result<SensorSnapshot, StoreError> {
        let inner = self.lock()?;
        inner
            .sensors
            .iter()
            .find(|s| s.id == id)
            .map(SensorSnapshot::from)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Snapshot of the whole store: timestamp, active scenarios, sensors.
    pub fn snapshot(&self) -> Result<StoreSnapshot, StoreError> {
        let inner = self.lock()?;
        Ok(StoreSnapshot {
            timestamp: Utc::now(),
            scenarios: inner.scenarios.clone(),
            sensors: inner.sensors.iter().map(SensorSnapshot::from).collect(),
        })
    }

    /// Read `count` consecutive register slots starting at `start`.
    ///
    /// Each slot is resolved to its owning sensor by even alignment; even
    /// slots yield the high word of the float32 encoding, odd slots the low
    /// word. Slots not owned by any configured sensor read as zero, so a
    /// window may start mid-sensor or span several sensors and still
    /// produce correctly attributed words.
    pub fn read_register_range(&self, start: u16, count: u16) -> Result<Vec<u16>, StoreError> {
        let inner = self.lock()?;
        let mut words = Vec::with_capacity(count as usize);
        for offset in 0..u32::from(count) {
            let slot = u32::from(start) + offset;
            let Ok(slot) = u16::try_from(slot) else {
                // Address space wrapped; everything past the end reads zero.
                words.push(0);
                continue;
            };
            let base = registers::base_address(slot);
            let word = match inner.sensors.iter().find(|s| s.address == base) {
                Some(sensor) => {
                    let (hi, lo) = registers::encode_f32(sensor.value);
                    if registers::is_high_word(slot) {
                        hi
                    } else {
                        lo
                    }
                }
                None => 0,
            };
            words.push(word);
        }
        Ok(words)
    }

    /// Pin a sensor to a manually-set value.
    ///
    /// The value takes effect immediately and is exempt from bounds checks:
    /// operators may legitimately simulate out-of-range readings. The
    /// simulation skips the sensor until [`SensorStore::clear_manual`].
    pub fn set_manual(&self, id: &str, value: f64) -> Result<(), StoreError> {
        {
            let mut inner = self.lock()?;
            let sensor = inner
                .sensors
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            sensor.value = value;
            sensor.manual = Some(value);
            info!("Manual override: {} = {}", id, value);
        }
        self.emit(StoreEvent::ManualSet {
            id: id.to_string(),
            value,
        });
        Ok(())
    }

    /// Release a manual override; the next tick drifts and re-clamps the
    /// value back into `[min, max]`.
    pub fn clear_manual(&self, id: &str) -> Result<(), StoreError> {
        {
            let mut inner = self.lock()?;
            let sensor = inner
                .sensors
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            sensor.manual = None;
            info!("Manual override cleared: {}", id);
        }
        self.emit(StoreEvent::ManualCleared { id: id.to_string() });
        Ok(())
    }

    /// Activate a scenario, replacing any previous instance of the same
    /// kind. `intensity` falls back to the per-kind default.
    ///
    /// Activation clears every manual override within the scenario's scope.
    /// This silently discards operator pins; the behavior is intentional
    /// and matches the deployed system, so dashboards should re-read state
    /// after activating a scenario.
    pub fn set_scenario(
        &self,
        kind: ScenarioKind,
        building: Option<u8>,
        intensity: Option<f64>,
    ) -> Result<(), StoreError> {
        let scenario = Scenario {
            kind,
            building,
            intensity: intensity.unwrap_or_else(|| kind.default_intensity()),
        };
        {
            let mut inner = self.lock()?;
            inner.scenarios.retain(|s| s.kind != kind);
            let cleared: Vec<String> = inner
                .sensors
                .iter_mut()
                .filter(|s| s.manual.is_some() && scenario.in_scope(s))
                .map(|s| {
                    s.manual = None;
                    s.id.clone()
                })
                .collect();
            if !cleared.is_empty() {
                warn!(
                    "Scenario {} cleared manual overrides: {}",
                    kind,
                    cleared.join(", ")
                );
            }
            inner.scenarios.push(scenario);
            info!(
                "Scenario {} activated (building: {:?}, intensity: {})",
                kind, building, scenario.intensity
            );
        }
        self.emit(StoreEvent::ScenarioStarted(scenario));
        Ok(())
    }

    /// Deactivate one scenario kind, or all of them when `kind` is `None`.
    pub fn stop_scenario(&self, kind: Option<ScenarioKind>) -> Result<(), StoreError> {
        {
            let mut inner = self.lock()?;
            match kind {
                Some(kind) => {
                    inner.scenarios.retain(|s| s.kind != kind);
                    info!("Scenario {} stopped", kind);
                }
                None => {
                    inner.scenarios.clear();
                    info!("All scenarios stopped");
                }
            }
        }
        self.emit(match kind {
            Some(kind) => StoreEvent::ScenarioStopped(kind),
            None => StoreEvent::AllScenariosStopped,
        });
        Ok(())
    }

    /// Advance the simulation by one period.
    ///
    /// For every sensor that is not pinned: apply the baseline drift for
    /// its category, add the bias of every in-scope scenario, then clamp to
    /// the effective bounds. Pinned sensors are untouched.
    pub fn tick(&self) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.ticks += 1;
        let elapsed_secs = inner.ticks as f64 * self.tick_interval.as_secs_f64();

        let StoreInner {
            sensors, scenarios, ..
        } = &mut *inner;
        let mut rng = rand::rng();
        for sensor in sensors.iter_mut() {
            if sensor.is_pinned() {
                continue;
            }
            let mut delta = simulation::baseline_drift(sensor, elapsed_secs, &mut rng);
            for scenario in scenarios.iter() {
                delta += simulation::scenario_bias(scenario, sensor, &mut rng);
            }
            let max = simulation::effective_max(sensor, scenarios);
            sensor.value = (sensor.value + delta).clamp(sensor.min, max);
        }
        debug!("Simulation tick {} applied", inner.ticks);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{decode_f32, encode_f32};
    use crate::sensor::SensorKind;

    fn sensor(id: &str, kind: SensorKind, address: u16, building: u8, value: f64) -> Sensor {
        let (min, max, unit) = match kind {
            SensorKind::Temperature => (15.0, 30.0, "°C"),
            SensorKind::Humidity => (30.0, 70.0, "%RH"),
            SensorKind::Pressure => (980.0, 1030.0, "hPa"),
            SensorKind::Power => (0.0, 100.0, "kW"),
            SensorKind::Generic => (350.0, 2000.0, "ppm"),
        };
        Sensor {
            id: id.to_string(),
            address,
            building,
            value,
            min,
            max,
            unit: unit.to_string(),
            kind,
            manual: None,
        }
    }

    fn test_store() -> SensorStore {
        SensorStore::new(
            vec![
                sensor("temp_1", SensorKind::Temperature, 1000, 1, 20.0),
                sensor("temp_2", SensorKind::Temperature, 1002, 2, 21.0),
                sensor("hum_1", SensorKind::Humidity, 2000, 1, 47.0),
                sensor("press_1", SensorKind::Pressure, 3000, 1, 1005.0),
                sensor("power_1", SensorKind::Power, 4000, 1, 60.0),
            ],
            Duration::from_secs(2),
        )
    }

    #[test]
    fn get_unknown_sensor_fails() {
        let store = test_store();
        assert!(matches!(
            store.get("nope"),
            Err(StoreError::NotFound(id)) if id == "nope"
        ));
    }

    #[test]
    fn manual_value_is_served_immediately_even_out_of_bounds() {
        let store = test_store();
        store.set_manual("temp_1", 99.5).unwrap();

        let words = store.read_register_range(1000, 2).unwrap();
        assert_eq!(decode_f32(words[0], words[1]), 99.5);
        assert!(store.get("temp_1").unwrap().manual);
    }

    #[test]
    fn pinned_sensor_survives_ticks_then_reclamps_after_clear() {
        let store = test_store();
        store.set_manual("temp_1", 99.5).unwrap();
        for _ in 0..5 {
            store.tick().unwrap();
        }
        assert_eq!(store.get("temp_1").unwrap().value, 99.5);

        store.clear_manual("temp_1").unwrap();
        store.tick().unwrap();
        let snap = store.get("temp_1").unwrap();
        assert!(snap.value >= snap.min && snap.value <= snap.max);
    }

    #[test]
    fn values_stay_in_bounds_over_many_ticks() {
        let store = test_store();
        for _ in 0..200 {
            store.tick().unwrap();
        }
        for snap in store.snapshot().unwrap().sensors {
            assert!(
                snap.value >= snap.min && snap.value <= snap.max,
                "{} = {} outside [{}, {}]",
                snap.id,
                snap.value,
                snap.min,
                snap.max
            );
        }
    }

    #[test]
    fn odd_window_spans_two_sensors() {
        let store = test_store();
        // Slot 1001 is temp_1's low word, slot 1002 temp_2's high word.
        let words = store.read_register_range(1001, 2).unwrap();
        let (_, lo_1) = encode_f32(20.0);
        let (hi_2, _) = encode_f32(21.0);
        assert_eq!(words, vec![lo_1, hi_2]);
    }

    #[test]
    fn unmapped_slots_read_zero() {
        let store = test_store();
        assert_eq!(store.read_register_range(5000, 4).unwrap(), vec![0; 4]);
        // Window straddling the end of a mapped pair.
        let words = store.read_register_range(2001, 3).unwrap();
        let (_, lo) = encode_f32(47.0);
        assert_eq!(words, vec![lo, 0, 0]);
    }

    #[test]
    fn range_read_at_address_space_end_does_not_overflow() {
        let store = test_store();
        let words = store.read_register_range(u16::MAX, 3).unwrap();
        assert_eq!(words, vec![0; 3]);
    }

    #[test]
    fn fire_scoped_to_building_1_heats_only_building_1() {
        let store = test_store();
        let before_1 = store.get("temp_1").unwrap().value;
        let before_2 = store.get("temp_2").unwrap().value;

        store
            .set_scenario(ScenarioKind::Fire, Some(1), None)
            .unwrap();
        for _ in 0..10 {
            store.tick().unwrap();
        }

        let rise_1 = store.get("temp_1").unwrap().value - before_1;
        let rise_2 = store.get("temp_2").unwrap().value - before_2;
        // Building 1 gains at least 1.0 per tick from the fire; building 2
        // only sees ±0.5 baseline noise.
        assert!(rise_1 > rise_2, "fire rise {rise_1} vs baseline {rise_2}");
        assert!(rise_1 > 4.0);
    }

    #[test]
    fn fire_may_exceed_configured_max_up_to_ceiling() {
        let store = test_store();
        store
            .set_scenario(ScenarioKind::Fire, Some(1), Some(20.0))
            .unwrap();
        for _ in 0..100 {
            store.tick().unwrap();
        }
        let snap = store.get("temp_1").unwrap();
        assert!(snap.value <= snap.max + 20.0);
        assert!(snap.value > snap.max, "fire should push past normal max");
    }

    #[test]
    fn scenario_activation_clears_in_scope_manual_overrides() {
        let store = test_store();
        store.set_manual("temp_1", 50.0).unwrap();
        store.set_manual("temp_2", 50.0).unwrap();

        store
            .set_scenario(ScenarioKind::TemperatureSpike, Some(1), None)
            .unwrap();

        // Building 1 pin discarded, building 2 pin survives.
        assert!(!store.get("temp_1").unwrap().manual);
        assert!(store.get("temp_2").unwrap().manual);
    }

    #[test]
    fn reactivating_a_scenario_replaces_its_instance() {
        let store = test_store();
        store
            .set_scenario(ScenarioKind::Fire, Some(1), Some(5.0))
            .unwrap();
        store
            .set_scenario(ScenarioKind::Fire, Some(2), Some(8.0))
            .unwrap();

        let scenarios = store.snapshot().unwrap().scenarios;
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].building, Some(2));
        assert_eq!(scenarios[0].intensity, 8.0);
    }

    #[test]
    fn stop_all_scenarios() {
        let store = test_store();
        store.set_scenario(ScenarioKind::Fire, None, None).unwrap();
        store
            .set_scenario(ScenarioKind::Co2Alarm, None, None)
            .unwrap();
        store.stop_scenario(Some(ScenarioKind::Fire)).unwrap();
        assert_eq!(store.snapshot().unwrap().scenarios.len(), 1);
        store.stop_scenario(None).unwrap();
        assert!(store.snapshot().unwrap().scenarios.is_empty());
    }

    #[test]
    fn events_are_broadcast_to_subscribers() {
        let store = test_store();
        let mut events = store.subscribe();
        store.set_manual("temp_1", 25.0).unwrap();
        store.set_scenario(ScenarioKind::Leak, None, None).unwrap();

        assert!(matches!(
            events.try_recv().unwrap(),
            StoreEvent::ManualSet { id, value } if id == "temp_1" && value == 25.0
        ));
        // The leak activation clears temp_1's pin before starting.
        assert!(matches!(
            events.try_recv().unwrap(),
            StoreEvent::ScenarioStarted(s) if s.kind == ScenarioKind::Leak
        ));
    }
}
