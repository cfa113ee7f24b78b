//! Multi-metric mesh routing stack for LoRa nodes.
//!
//! This library contains platform-independent components that can be tested
//! on the host machine without ESP32 hardware; only [`lora::radio`] and
//! [`lora::iface`] require the real SX1262 driver and are gated behind the
//! `esp32` feature.

// Allow the crate to reference itself by name (needed for proc-macro generated code)
extern crate self as loramesh;

pub mod address;
pub mod config;
pub mod core;
pub mod cost;
pub mod duplicate_cache;
pub mod error;
pub mod events;
pub mod forwarder;
pub mod health;
pub mod hello_scheduler;
pub mod link_metrics;
pub mod lora;
pub mod radio_io;
pub mod route_processor;
pub mod route_table;
pub mod stats;
pub mod stats_server;
pub mod trickle;
pub mod wire;

// Re-export the types a binary wiring a node together needs most often.
pub use address::{Address, Role};
pub use config::RoutingConfig;
pub use core::RoutingCore;
pub use error::{ConfigError, SendOutcome};
pub use events::{EventSink, LogEventSink, RoutingEvent};
pub use radio_io::RadioIo;
pub use stats::{Stats, StatsSnapshot};
pub use stats_server::{StatsServer, DEFAULT_STATS_PORT};

/// Runs the ESP-IDF initialization `#[esp32_test]`-annotated tests rely on,
/// exactly once per process, so every test can assume a ready runtime
/// without each one repeating the setup.
#[cfg(feature = "esp32")]
pub fn ensure_esp_initialized() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        esp_idf_sys::link_patches();
        esp_idf_svc::log::EspLogger::initialize_default();
    });
}
