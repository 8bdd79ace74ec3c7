//! # Chargerkit - EV charger drivers with composable capabilities
//!
//! Every charger implements the baseline [`Charger`] contract (status,
//! enable, maximum current). What a particular device can do beyond that is
//! only known after talking to it, so drivers query the device during
//! construction and hand the capabilities they found to [`compose`], which
//! returns a single handle answering exactly the supported capability
//! queries.
//!
//! ## Architecture
//!
//! - `api`: baseline charger contract and charge states
//! - `capability`: the optional capability catalog and bindings
//! - `compose`: capability composition
//! - `registry`: driver type name → factory
//! - `charger`: device adapters (Etrel, Wallbox/Pulsar, go-e)
//! - `modbus` / `http`: device transports
//! - `config`: YAML configuration
//! - `logging`: structured logging and tracing
//! - `error`: error types

pub mod api;
pub mod capability;
pub mod charger;
pub mod compose;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod modbus;
pub mod registry;

// Re-export commonly used types
pub use api::{ChargeStatus, Charger};
pub use capability::{Bindings, Capability, CapabilitySet};
pub use compose::compose;
pub use config::Config;
pub use error::{ChargerError, Result};
pub use registry::{DriverRegistry, registry};
