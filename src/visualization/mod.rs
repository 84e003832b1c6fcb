// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the promonitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Visualization and control web server
//!
//! This module provides the HTTP/JSON control surface of the emulator:
//! a polling API for dashboards (full state snapshots) and control
//! endpoints for manual overrides and scenario activation. Clients poll
//! `GET /api/sensors`; there is no push channel on the HTTP side, change
//! notifications live on the store's internal broadcast channel.
//!
//! ## Key Components
//!
//! - [`server`]: Rocket instance builder and CORS fairing
//! - [`api`]: the JSON route handlers and their payload types

pub mod api;
pub mod server;

pub use server::build_rocket;
