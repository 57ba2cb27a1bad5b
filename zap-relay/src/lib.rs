//! # zap-relay
//!
//! Telemetry relay server for DeroZap bike tracking stations.
//!
//! This crate implements a relay server that:
//! - Accepts form-encoded usage reports posted by stations
//! - Checks the station id before anything else happens
//! - Forwards each report to a primary and a best-effort destination
//! - Records every exchange in SQLite and prunes it after a year
//! - Passes mail subscription requests along to the same destinations
//!
//! ## Architecture
//!
//! ```text
//! Station ──POST /api/v1/zapdata──┐        ┌──► primary URL
//!                                 │        │    (reply proxied back)
//!                             ┌───┴────────┴───┐
//!                             │   zap-relay    │
//!                             │  ┌──────────┐  │──► best-effort URL
//!                             │  │  SQLite  │  │    (reply recorded)
//!                             │  └──────────┘  │
//!                             └────────────────┘
//! ```
//!
//! ## Endpoints
//!
//! - `POST /api/v1/zapdata` station ingress
//! - `GET /api/v1/zapdata` raw exchange dump (admin)
//! - `GET /api/v1/zapdata/summary` decoded report summaries (admin)
//! - `GET|POST /api/v1/mail` mail subscription relay
//! - `GET /health`, `GET /metrics`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod forward;
pub mod http;
pub mod relay;
pub mod server;
pub mod settings;
pub mod storage;
