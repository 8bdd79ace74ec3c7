//! Device adapters
//!
//! Each adapter implements the baseline [`Charger`](crate::api::Charger)
//! contract for one vendor protocol, queries the device during construction
//! and hands its discovered capabilities to
//! [`compose`](crate::compose::compose).

pub mod etrel;
pub mod goe;
pub mod wallbox;

#[cfg(test)]
pub(crate) mod mock;

pub use etrel::Etrel;
pub use goe::GoE;
pub use wallbox::Wallbox;

use crate::api::MIN_CURRENT;
use crate::error::{ChargerError, Result};
use crate::registry::DriverRegistry;

/// Register every built-in driver
pub fn register_builtin(registry: &DriverRegistry) -> Result<()> {
    registry.add("etrel", etrel::new_from_config)?;
    registry.add("go-e", goe::new_from_config)?;
    registry.add("wallbox", wallbox::new_from_config)?;
    registry.add("pulsar", wallbox::new_from_config)?;
    Ok(())
}

/// Reject currents below the minimum before anything is sent to a device.
///
/// Non-finite values and values outside the `f32` register range are
/// rejected too.
pub(crate) fn check_current(current: f64) -> Result<()> {
    if !current.is_finite() || current > f64::from(f32::MAX) {
        return Err(ChargerError::invalid_argument(format!(
            "invalid current {}",
            current
        )));
    }
    if current < MIN_CURRENT as f64 {
        return Err(ChargerError::invalid_argument(format!(
            "invalid current {:.1}, minimum is {}",
            current, MIN_CURRENT
        )));
    }
    Ok(())
}
