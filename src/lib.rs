// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod api;
pub mod app_dirs;
pub mod config;
pub mod controller;
pub mod error;
pub mod history;
pub mod logging;
pub mod models;
pub mod notes;
pub mod runtime;
pub mod session;
pub mod timer;
