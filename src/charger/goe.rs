//! go-e charger via its local HTTP API
//!
//! Firmware exposes either the legacy v1 API (`/status`, `/mqtt`) or the v2
//! API (`/api/status`, `/api/set`). The generation is detected once during
//! construction and decides which optional capabilities get bound.

mod types;

pub use types::ApiVersion;

use super::check_current;
use crate::api::{ChargeStatus, Charger, MIN_CURRENT};
use crate::capability::{Bindings, CapabilitySet, Meter, MeterCurrent};
use crate::compose::compose;
use crate::config::{Other, decode_other};
use crate::error::{ChargerError, Result};
use crate::http::{DEFAULT_TIMEOUT, HttpHelper, JsonTransport, Request};
use crate::logging::get_logger;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use types::{STATUS_KEYS, Status};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Settings {
    uri: String,
}

/// Map the go-e `car` state to a charge state
pub fn status_from_code(car: i64) -> Result<ChargeStatus> {
    match car {
        1 => Ok(ChargeStatus::A),
        2 => Ok(ChargeStatus::C),
        3 | 4 => Ok(ChargeStatus::B),
        5 => Ok(ChargeStatus::F),
        _ => Err(ChargerError::protocol(format!("invalid status: {}", car))),
    }
}

/// go-e charger
pub struct GoE {
    logger: crate::logging::StructuredLogger,
    transport: Box<dyn JsonTransport>,
    uri: String,
    api: ApiVersion,
    current: AtomicI64,
}

/// Factory registered as `go-e`
pub async fn new_from_config(other: Other) -> Result<Arc<dyn Charger>> {
    let settings: Settings = decode_other(&other)?;
    let transport = HttpHelper::new("go-e", DEFAULT_TIMEOUT)?;
    let goe = Arc::new(GoE::new(Box::new(transport), &settings.uri).await?);
    let bindings = goe.bindings();
    Ok(compose(goe, bindings))
}

fn normalize_uri(uri: &str) -> String {
    let uri = uri.trim().trim_end_matches('/');
    if uri.contains("://") {
        uri.to_string()
    } else {
        format!("http://{}", uri)
    }
}

impl GoE {
    /// Detect the API generation; fails if neither API answers.
    pub async fn new(transport: Box<dyn JsonTransport>, uri: &str) -> Result<Self> {
        let logger = get_logger("go-e");
        let uri = normalize_uri(uri);

        let v2_status = transport
            .request(Request::get(format!("{}/api/status?filter=fwv", uri)))
            .await;
        let api = match v2_status {
            Ok(_) => ApiVersion::V2,
            Err(v2_err) => {
                logger.debug(&format!("API v2 not available: {}", v2_err));
                transport
                    .request(Request::get(format!("{}/status", uri)))
                    .await
                    .map_err(|e| {
                        ChargerError::network(format!("go-e not reachable at {}: {}", uri, e))
                    })?;
                ApiVersion::V1
            }
        };
        logger.info(&format!("Connected to go-e at {} using API {:?}", uri, api));

        Ok(Self {
            logger,
            transport,
            uri,
            api,
            current: AtomicI64::new(MIN_CURRENT),
        })
    }

    /// Detected API generation
    pub fn api_version(&self) -> ApiVersion {
        self.api
    }

    /// Optional capabilities available with the detected API
    pub fn bindings(self: &Arc<Self>) -> Bindings {
        let goe = self.clone();
        let mut bindings = Bindings::new().with_meter_energy(move || {
            let goe = goe.clone();
            async move { goe.total_energy().await }
        });

        if self.api == ApiVersion::V2 {
            let goe = self.clone();
            bindings = bindings.with_charge_phases(move |phases| {
                let goe = goe.clone();
                async move { goe.phases_1p3p(phases).await }
            });
        }

        bindings
    }

    async fn status_record(&self) -> Result<Status> {
        let url = match self.api {
            ApiVersion::V1 => format!("{}/status", self.uri),
            ApiVersion::V2 => format!("{}/api/status?filter={}", self.uri, STATUS_KEYS),
        };
        let value = self.transport.request(Request::get(url)).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn set(&self, key: &str, value: i64) -> Result<()> {
        let url = match self.api {
            ApiVersion::V1 => format!("{}/mqtt?payload={}={}", self.uri, key, value),
            ApiVersion::V2 => format!("{}/api/set?{}={}", self.uri, key, value),
        };
        self.logger.debug(&format!("Setting {}={}", key, value));
        self.transport.request(Request::get(url)).await?;
        Ok(())
    }

    fn energy_meter(&self, status: &Status, index: usize) -> Result<f64> {
        status.nrg.get(index).copied().ok_or_else(|| {
            ChargerError::protocol(format!(
                "energy array too short: {} values",
                status.nrg.len()
            ))
        })
    }

    /// Lifetime energy in kWh
    pub async fn total_energy(&self) -> Result<f64> {
        let status = self.status_record().await?;
        Ok(match self.api {
            ApiVersion::V1 => status.eto / 10.0,
            ApiVersion::V2 => status.eto / 1e3,
        })
    }

    /// Switch between one and three phases
    pub async fn phases_1p3p(&self, phases: u8) -> Result<()> {
        let psm = match phases {
            1 => 1,
            3 => 2,
            _ => {
                return Err(ChargerError::invalid_argument(format!(
                    "invalid phases: {}",
                    phases
                )));
            }
        };
        self.set("psm", psm).await
    }
}

impl CapabilitySet for GoE {
    fn as_meter(&self) -> Option<&dyn Meter> {
        Some(self)
    }

    fn as_meter_current(&self) -> Option<&dyn MeterCurrent> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl Charger for GoE {
    async fn status(&self) -> Result<ChargeStatus> {
        status_from_code(self.status_record().await?.car)
    }

    /// Charging must be allowed (`alw`) with a non-zero current (`amp`).
    async fn enabled(&self) -> Result<bool> {
        let status = self.status_record().await?;
        Ok(status.alw && status.amp > 0)
    }

    async fn enable(&self, enable: bool) -> Result<()> {
        match (enable, self.api) {
            (false, ApiVersion::V1) => self.set("alw", 0).await,
            (false, ApiVersion::V2) => self.set("frc", 1).await,
            (true, api) => {
                self.set("amp", self.current.load(Ordering::Acquire)).await?;
                match api {
                    ApiVersion::V1 => self.set("alw", 1).await,
                    ApiVersion::V2 => self.set("frc", 2).await,
                }
            }
        }
    }

    async fn max_current(&self, current: i64) -> Result<()> {
        check_current(current as f64)?;
        self.set("amp", current).await?;
        self.current.store(current, Ordering::Release);
        Ok(())
    }
}

#[async_trait::async_trait]
impl Meter for GoE {
    async fn current_power(&self) -> Result<f64> {
        let status = self.status_record().await?;
        let power = self.energy_meter(&status, 11)?;
        Ok(match self.api {
            ApiVersion::V1 => power * 10.0,
            ApiVersion::V2 => power,
        })
    }
}

#[async_trait::async_trait]
impl MeterCurrent for GoE {
    async fn currents(&self) -> Result<(f64, f64, f64)> {
        let status = self.status_record().await?;
        let scale = match self.api {
            ApiVersion::V1 => 0.1,
            ApiVersion::V2 => 1.0,
        };
        let mut currents = [0.0; 3];
        for (i, value) in currents.iter_mut().enumerate() {
            *value = self.energy_meter(&status, 4 + i)? * scale;
        }
        Ok((currents[0], currents[1], currents[2]))
    }
}
