//! Command implementations.

pub mod config;
pub mod interfaces;
pub mod run;

pub use config::run_config;
pub use interfaces::run_interfaces;
pub use run::run_relay;
