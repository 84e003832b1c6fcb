// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the promonitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rocket server builder and configuration
//!
//! This module provides the function to build and configure the Rocket
//! server instance with all necessary routes, fairings, and state
//! management.

use std::path::PathBuf;
use std::sync::Arc;

use rocket::fairing::{Fairing, Info, Kind};
use rocket::figment::Figment;
use rocket::http::Header;
use rocket::{options, routes, Build, Request, Response, Rocket};

use crate::sensor::SensorStore;
use crate::visualization::api;

/// Cross-Origin Resource Sharing (CORS) fairing for Rocket
///
/// This fairing adds CORS headers to all responses from the server,
/// enabling cross-origin requests from dashboards hosted on different
/// origins than the API.
///
/// ### Security Note
///
/// The current implementation uses very permissive settings (`*` for
/// origins and headers). For production environments, consider restricting
/// these to specific origins and headers needed by your application.
pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response, // Run after a response has been generated
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        // Allow requests from any origin
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));

        // Allow common HTTP methods
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "POST, GET, PUT, DELETE, OPTIONS",
        ));

        // Allow all headers
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
    }
}

/// Handler for HTTP OPTIONS requests required for CORS preflight
///
/// This handler responds to OPTIONS requests with a 200 OK response,
/// which is necessary for CORS preflight requests. The CORS fairing
/// adds the appropriate headers to the response.
#[options("/<_path..>")]
pub async fn options(_path: PathBuf) -> Result<(), std::io::Error> {
    Ok(())
}

/// Build a configured Rocket server instance
///
/// The store handle is added as managed state so every route handler can
/// reach the shared sensor population; nothing global is involved.
///
/// ### Parameters
///
/// * `figment` - The Rocket configuration figment containing server settings
/// * `store` - Shared handle to the sensor value store
///
/// ### Returns
///
/// A configured Rocket instance ready to be launched
///
/// ### Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use rocket::figment::Figment;
/// use promonitor::{config::Config, sensor::SensorStore, visualization::server};
///
/// let config = Config::default();
/// let store = Arc::new(SensorStore::new(config.build_sensors(), Duration::from_secs(2)));
/// let figment = Figment::from(rocket::Config::default());
/// let rocket = server::build_rocket(figment, store);
/// ```
pub fn build_rocket(figment: Figment, store: Arc<SensorStore>) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(CORS)
        .mount(
            "/",
            routes![
                options,
                api::get_sensors,
                api::set_manual,
                api::clear_manual,
                api::start_scenario,
                api::stop_scenario,
            ],
        )
        .manage(store)
}
