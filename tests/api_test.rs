// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the promonitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Tests for the HTTP/JSON control surface
//!
//! These tests drive the Rocket instance through its local blocking client,
//! so no socket is bound. Responses are decoded as loose JSON values; the
//! envelope (`success`, optional `error`) is part of the contract.

use std::sync::Arc;
use std::time::Duration;

use rocket::figment::Figment;
use rocket::http::{ContentType, Status};
use rocket::local::blocking::Client;
use serde_json::Value;

use promonitor::config::Config;
use promonitor::sensor::SensorStore;
use promonitor::visualization::build_rocket;

fn test_client() -> (Client, Arc<SensorStore>) {
    let config = Config::default();
    let store = Arc::new(SensorStore::new(
        config.build_sensors(),
        Duration::from_secs(2),
    ));
    let figment = Figment::from(rocket::Config::default());
    let client = Client::tracked(build_rocket(figment, store.clone()))
        .expect("valid rocket instance");
    (client, store)
}

fn body_json(response: rocket::local::blocking::LocalResponse<'_>) -> Value {
    let body = response.into_string().expect("response body");
    serde_json::from_str(&body).expect("JSON body")
}

#[test]
fn test_get_sensors_snapshot() {
    let (client, _store) = test_client();

    let response = client.get("/api/sensors").dispatch();
    assert_eq!(response.status(), Status::Ok);
    let body = body_json(response);

    assert_eq!(body["success"], Value::Bool(true));
    assert!(body["timestamp"].is_string());
    assert_eq!(body["scenarios"].as_array().unwrap().len(), 0);

    let sensors = body["sensors"].as_array().unwrap();
    assert_eq!(sensors.len(), Config::default().sensors.len());

    let temp_b1 = sensors
        .iter()
        .find(|s| s["id"] == "temp_b1")
        .expect("temp_b1 present");
    assert_eq!(temp_b1["address"], 1000);
    assert_eq!(temp_b1["building"], 1);
    assert_eq!(temp_b1["value"], 20.0);
    assert_eq!(temp_b1["unit"], "°C");
    assert_eq!(temp_b1["kind"], "temperature");
    assert_eq!(temp_b1["manual"], Value::Bool(false));
}

#[test]
fn test_manual_override_roundtrip() {
    let (client, store) = test_client();

    // Pin a sensor, including a value outside its configured range
    let response = client
        .post("/api/sensors/temp_b1/manual")
        .header(ContentType::JSON)
        .body(r#"{"value": 99.5}"#)
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(body_json(response)["success"], Value::Bool(true));

    let snapshot = store.get("temp_b1").unwrap();
    assert!(snapshot.manual);
    assert_eq!(snapshot.value, 99.5);

    // The pinned flag shows up in the polling snapshot
    let body = body_json(client.get("/api/sensors").dispatch());
    let pinned = body["sensors"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["id"] == "temp_b1")
        .unwrap()
        .clone();
    assert_eq!(pinned["manual"], Value::Bool(true));
    assert_eq!(pinned["value"], 99.5);

    // Release the override
    let response = client.delete("/api/sensors/temp_b1/manual").dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert!(!store.get("temp_b1").unwrap().manual);
}

#[test]
fn test_manual_override_unknown_sensor() {
    let (client, _store) = test_client();

    let response = client
        .post("/api/sensors/no_such_sensor/manual")
        .header(ContentType::JSON)
        .body(r#"{"value": 1.0}"#)
        .dispatch();
    assert_eq!(response.status(), Status::NotFound);
    let body = body_json(response);
    assert_eq!(body["success"], Value::Bool(false));
    assert!(body["error"].as_str().unwrap().contains("no_such_sensor"));

    let response = client.delete("/api/sensors/no_such_sensor/manual").dispatch();
    assert_eq!(response.status(), Status::NotFound);
}

#[test]
fn test_scenario_lifecycle() {
    let (client, _store) = test_client();

    // Activate a building-scoped fire with the default intensity
    let response = client
        .post("/api/scenarios")
        .header(ContentType::JSON)
        .body(r#"{"name": "fire", "building": 1}"#)
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(body_json(response)["success"], Value::Bool(true));

    let body = body_json(client.get("/api/sensors").dispatch());
    let scenarios = body["scenarios"].as_array().unwrap();
    assert_eq!(scenarios.len(), 1);
    assert_eq!(scenarios[0]["name"], "fire");
    assert_eq!(scenarios[0]["building"], 1);
    assert_eq!(scenarios[0]["intensity"], 20.0);

    // Re-activating the same kind replaces the instance, never stacks it
    let response = client
        .post("/api/scenarios")
        .header(ContentType::JSON)
        .body(r#"{"name": "fire", "intensity": 5.0}"#)
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let body = body_json(client.get("/api/sensors").dispatch());
    let scenarios = body["scenarios"].as_array().unwrap();
    assert_eq!(scenarios.len(), 1);
    assert_eq!(scenarios[0]["intensity"], 5.0);
    assert_eq!(scenarios[0]["building"], Value::Null);

    // Stop it by name; stopping again is an idempotent success
    let response = client.delete("/api/scenarios/fire").dispatch();
    assert_eq!(response.status(), Status::Ok);
    let response = client.delete("/api/scenarios/fire").dispatch();
    assert_eq!(response.status(), Status::Ok);

    let body = body_json(client.get("/api/sensors").dispatch());
    assert_eq!(body["scenarios"].as_array().unwrap().len(), 0);
}

#[test]
fn test_unknown_scenario_name_is_rejected() {
    let (client, _store) = test_client();

    let response = client
        .post("/api/scenarios")
        .header(ContentType::JSON)
        .body(r#"{"name": "alien_invasion"}"#)
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);
    let body = body_json(response);
    assert_eq!(body["success"], Value::Bool(false));
    assert!(body["error"].as_str().unwrap().contains("alien_invasion"));

    let response = client.delete("/api/scenarios/alien_invasion").dispatch();
    assert_eq!(response.status(), Status::BadRequest);
}

#[test]
fn test_stop_all_scenarios() {
    let (client, store) = test_client();

    store.set_scenario("fire".parse().unwrap(), None, None).unwrap();
    store.set_scenario("leak".parse().unwrap(), Some(2), None).unwrap();

    let response = client.delete("/api/scenarios/all").dispatch();
    assert_eq!(response.status(), Status::Ok);

    let body = body_json(client.get("/api/sensors").dispatch());
    assert_eq!(body["scenarios"].as_array().unwrap().len(), 0);
}

#[test]
fn test_scenario_clears_in_scope_overrides() {
    let (client, store) = test_client();

    store.set_manual("temp_b1", 11.0).unwrap();
    store.set_manual("temp_b2", 12.0).unwrap();

    // A fire in building 1 releases pins there but leaves building 2 alone
    let response = client
        .post("/api/scenarios")
        .header(ContentType::JSON)
        .body(r#"{"name": "fire", "building": 1}"#)
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    assert!(!store.get("temp_b1").unwrap().manual);
    assert!(store.get("temp_b2").unwrap().manual);
}

#[test]
fn test_cors_headers_present() {
    let (client, _store) = test_client();

    let response = client.get("/api/sensors").dispatch();
    assert_eq!(
        response.headers().get_one("Access-Control-Allow-Origin"),
        Some("*")
    );

    // Preflight requests succeed on any path
    let response = client.options("/api/sensors/temp_b1/manual").dispatch();
    assert_eq!(response.status(), Status::Ok);
}
