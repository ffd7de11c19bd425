pub mod config;
pub mod container;
pub mod control;
pub mod errors;
pub mod layout;
pub mod orchestrator;
pub mod settings;
pub mod telemetry;
