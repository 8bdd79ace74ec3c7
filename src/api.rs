//! Baseline charger contract
//!
//! Every driver implements [`Charger`]. Optional abilities are not part of
//! this trait; they are discovered through the [`CapabilitySet`] supertrait,
//! see [`crate::capability`].

use crate::capability::CapabilitySet;
use crate::error::Result;
use serde::Serialize;
use std::fmt;

/// Minimum charge current accepted by every driver, in A
pub const MIN_CURRENT: i64 = 6;

/// IEC 61851 charge state reported by a charger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChargeStatus {
    /// Idle, no vehicle connected
    A,
    /// Vehicle connected, not drawing power
    B,
    /// Charging
    C,
    /// Fault
    F,
}

impl fmt::Display for ChargeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChargeStatus::A => "A",
            ChargeStatus::B => "B",
            ChargeStatus::C => "C",
            ChargeStatus::F => "F",
        };
        f.write_str(s)
    }
}

/// Operations every charger driver supports.
///
/// Calls on one instance are expected to be issued sequentially by a single
/// polling task.
#[async_trait::async_trait]
pub trait Charger: CapabilitySet + Send + Sync {
    /// Current charge state
    async fn status(&self) -> Result<ChargeStatus>;

    /// Whether the device currently allows charging
    async fn enabled(&self) -> Result<bool>;

    /// Allow or stop charging
    async fn enable(&self, enable: bool) -> Result<()>;

    /// Set the maximum charge current in A
    async fn max_current(&self, current: i64) -> Result<()>;
}
