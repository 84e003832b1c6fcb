// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the promonitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! JSON route handlers of the control surface
//!
//! Every response carries a `success` flag; failures add an `error` string
//! and a matching HTTP status (404 for unknown sensor ids, 400 for names
//! outside the closed scenario set, 503 when the store is unavailable).
//! State reads are full snapshots: dashboards poll `GET /api/sensors` and
//! re-render, there is no partial update or push channel here.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{delete, get, post, State};
use serde::{Deserialize, Serialize};

use crate::sensor::{Scenario, ScenarioKind, SensorSnapshot, SensorStore, StoreError};

/// Envelope for operations that return no data.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
}

/// Envelope for failed operations.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
}

type ApiFailure = status::Custom<Json<ApiError>>;

fn failure(err: StoreError) -> ApiFailure {
    let code = match err {
        StoreError::NotFound(_) => Status::NotFound,
        StoreError::InvalidScenario(_) => Status::BadRequest,
        StoreError::Unavailable => Status::ServiceUnavailable,
    };
    status::Custom(
        code,
        Json(ApiError {
            success: false,
            error: err.to_string(),
        }),
    )
}

const ACK: Json<Ack> = Json(Ack { success: true });

/// One sensor as reported to dashboards. Values are rounded to two
/// decimals; the full precision only matters on the register side.
#[derive(Debug, Serialize)]
pub struct SensorDto {
    pub id: String,
    pub address: u16,
    pub building: u8,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub unit: String,
    pub kind: String,
    pub manual: bool,
}

impl From<SensorSnapshot> for SensorDto {
    fn from(s: SensorSnapshot) -> Self {
        Self {
            id: s.id,
            address: s.address,
            building: s.building,
            value: (s.value * 100.0).round() / 100.0,
            min: s.min,
            max: s.max,
            unit: s.unit,
            kind: s.kind.to_string(),
            manual: s.manual,
        }
    }
}

/// One active scenario as reported to dashboards.
#[derive(Debug, Serialize)]
pub struct ScenarioDto {
    pub name: String,
    pub building: Option<u8>,
    pub intensity: f64,
}

impl From<Scenario> for ScenarioDto {
    fn from(s: Scenario) -> Self {
        Self {
            name: s.kind.to_string(),
            building: s.building,
            intensity: s.intensity,
        }
    }
}

/// Full state snapshot served to polling clients.
#[derive(Debug, Serialize)]
pub struct SensorsResponse {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub scenarios: Vec<ScenarioDto>,
    pub sensors: Vec<SensorDto>,
}

/// Read the full emulator state.
///
/// The snapshot is taken atomically under the store lock, so the sensor
/// values and the scenario list are always mutually consistent.
#[get("/api/sensors")]
pub fn get_sensors(store: &State<Arc<SensorStore>>) -> Result<Json<SensorsResponse>, ApiFailure> {
    let snapshot = store.snapshot().map_err(failure)?;
    Ok(Json(SensorsResponse {
        success: true,
        timestamp: snapshot.timestamp,
        scenarios: snapshot.scenarios.into_iter().map(Into::into).collect(),
        sensors: snapshot.sensors.into_iter().map(Into::into).collect(),
    }))
}

/// Body of a manual override request.
#[derive(Debug, Deserialize)]
pub struct ManualRequest {
    pub value: f64,
}

/// Pin one sensor to a fixed value.
///
/// The value is accepted as-is, including values outside the sensor's
/// configured range; pinned sensors are skipped by the simulation until
/// the override is cleared.
#[post("/api/sensors/<id>/manual", format = "json", data = "<body>")]
pub fn set_manual(
    id: &str,
    body: Json<ManualRequest>,
    store: &State<Arc<SensorStore>>,
) -> Result<Json<Ack>, ApiFailure> {
    store.set_manual(id, body.value).map_err(failure)?;
    Ok(ACK)
}

/// Release a manual override and hand the sensor back to the simulation.
#[delete("/api/sensors/<id>/manual")]
pub fn clear_manual(
    id: &str,
    store: &State<Arc<SensorStore>>,
) -> Result<Json<Ack>, ApiFailure> {
    store.clear_manual(id).map_err(failure)?;
    Ok(ACK)
}

/// Body of a scenario activation request.
#[derive(Debug, Deserialize)]
pub struct ScenarioRequest {
    pub name: String,
    /// Affected building; all buildings when omitted.
    pub building: Option<u8>,
    /// Scenario-specific magnitude; each scenario has its own default.
    pub intensity: Option<f64>,
}

/// Activate a scenario, replacing any running instance of the same kind.
#[post("/api/scenarios", format = "json", data = "<body>")]
pub fn start_scenario(
    body: Json<ScenarioRequest>,
    store: &State<Arc<SensorStore>>,
) -> Result<Json<Ack>, ApiFailure> {
    let kind = ScenarioKind::from_str(&body.name).map_err(failure)?;
    store
        .set_scenario(kind, body.building, body.intensity)
        .map_err(failure)?;
    Ok(ACK)
}

/// Deactivate one scenario by name, or every scenario with the
/// pseudo-name `all`.
///
/// Stopping is idempotent: stopping a scenario that is not running is a
/// success, the store simply has nothing to remove.
#[delete("/api/scenarios/<name>")]
pub fn stop_scenario(
    name: &str,
    store: &State<Arc<SensorStore>>,
) -> Result<Json<Ack>, ApiFailure> {
    let kind = if name == "all" {
        None
    } else {
        Some(ScenarioKind::from_str(name).map_err(failure)?)
    };
    store.stop_scenario(kind).map_err(failure)?;
    Ok(ACK)
}
