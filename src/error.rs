//! Error taxonomy for the routing core.
//!
//! Packet-level problems are never fatal: they are counted (see
//! [`crate::stats::Stats`]) and, at most, logged. Only configuration
//! problems detected at construction time are fatal, returned to the
//! caller as a [`ConfigError`].

use std::fmt;

/// Fatal configuration problem, returned from `RoutingConfig::validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field outside its allowed range.
    InvalidConfig(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Outcome of an outbound send request from the application (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the radio for transmission.
    Accepted,
    /// No next hop known for the destination.
    NoRoute,
    /// The radio could not accept the frame right now; retry later.
    Backpressure,
}

/// Reason a packet was dropped, for the `dropped` stats breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Invalid length or field combination.
    Malformed,
    /// Destination table was full when a new entry needed to be installed.
    TableFull,
    /// No next hop known.
    NoRoute,
    /// TTL reached zero while forwarding.
    TtlExpired,
    /// Already seen (P1 duplicate cache).
    Duplicate,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Malformed => "malformed",
            Self::TableFull => "table_full",
            Self::NoRoute => "no_route",
            Self::TtlExpired => "ttl_expired",
            Self::Duplicate => "duplicate",
        };
        write!(f, "{}", s)
    }
}
