//! Wallbox / Pulsar charger via the Wallbox cloud API

mod types;

pub use types::API_URI;

use super::check_current;
use crate::api::{ChargeStatus, Charger, MIN_CURRENT};
use crate::capability::{Bindings, CapabilitySet, ChargeRater, Meter};
use crate::compose::compose;
use crate::config::{Other, decode_other};
use crate::error::{ChargerError, Result};
use crate::http::{Auth, DEFAULT_TIMEOUT, HttpHelper, JsonTransport, Request, with_vendor_message};
use crate::logging::get_logger;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use types::{ACTION_PAUSE, ACTION_RESUME, ChargerStatus, Groups, Token};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Settings {
    user: String,
    password: String,
    #[serde(default)]
    id: u64,
    uri: Option<String>,
}

/// Map a Wallbox `status_id` to a charge state
pub fn status_from_code(code: i64) -> Result<ChargeStatus> {
    match code {
        0 | 161 | 162 | 163 | 165 | 166 | 209 => Ok(ChargeStatus::A),
        164 | 177..=189 | 196 | 210 => Ok(ChargeStatus::B),
        193..=195 => Ok(ChargeStatus::C),
        14 | 15 => Ok(ChargeStatus::F),
        _ => Err(ChargerError::protocol(format!("invalid status: {}", code))),
    }
}

/// Wallbox charger
pub struct Wallbox {
    logger: crate::logging::StructuredLogger,
    transport: Box<dyn JsonTransport>,
    uri: String,
    token: String,
    id: u64,
    current: AtomicI64,
}

/// Factory registered as `wallbox` and `pulsar`
pub async fn new_from_config(other: Other) -> Result<Arc<dyn Charger>> {
    let settings: Settings = decode_other(&other)?;
    if settings.user.is_empty() || settings.password.is_empty() {
        return Err(ChargerError::validation(
            "user",
            "missing user or password",
        ));
    }

    let transport = HttpHelper::new("wallbox", DEFAULT_TIMEOUT)?;
    let uri = settings.uri.unwrap_or_else(|| API_URI.to_string());
    let wb = Wallbox::new(
        Box::new(transport),
        &uri,
        &settings.user,
        &settings.password,
        settings.id,
    )
    .await?;
    Ok(compose(Arc::new(wb), Bindings::new()))
}

impl Wallbox {
    /// Log in and resolve the charger id.
    ///
    /// With `id == 0` the account must own exactly one charger.
    pub async fn new(
        transport: Box<dyn JsonTransport>,
        uri: &str,
        user: &str,
        password: &str,
        id: u64,
    ) -> Result<Self> {
        let logger = get_logger("wallbox");
        let uri = uri.trim_end_matches('/').to_string();

        let req = Request::get(format!("{}/auth/token/user", uri)).with_auth(Auth::Basic {
            user: user.to_string(),
            password: password.to_string(),
        });
        let value = transport.request(req).await.map_err(|e| {
            ChargerError::auth(format!("login failed: {}", with_vendor_message(e)))
        })?;
        let token: Token = serde_json::from_value(value)?;

        let mut wb = Self {
            logger,
            transport,
            uri,
            token: token.jwt,
            id,
            current: AtomicI64::new(MIN_CURRENT),
        };

        if id == 0 {
            let groups: Groups = wb.get(format!("{}/v3/chargers/groups", wb.uri)).await?;
            match groups.charger_ids().as_slice() {
                [id] => wb.id = *id,
                ids => {
                    return Err(ChargerError::config(format!("found chargers: {:?}", ids)));
                }
            }
        }

        // Fails when the charger is unreachable
        wb.charger_status().await?;
        wb.logger.info(&format!("Connected to Wallbox charger {}", wb.id));
        Ok(wb)
    }

    /// Resolved charger id
    pub fn id(&self) -> u64 {
        self.id
    }

    fn auth(&self) -> Auth {
        Auth::Bearer(self.token.clone())
    }

    async fn send(&self, req: Request) -> Result<serde_json::Value> {
        self.transport
            .request(req.with_auth(self.auth()))
            .await
            .map_err(with_vendor_message)
    }

    async fn get<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        let value = self.send(Request::get(url)).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn charger_status(&self) -> Result<ChargerStatus> {
        self.get(format!("{}/chargers/status/{}", self.uri, self.id))
            .await
    }

    async fn set_current(&self, current: i64) -> Result<()> {
        let url = format!("{}/v2/charger/{}", self.uri, self.id);
        self.send(Request::put(url, json!({ "maxChargingCurrent": current })))
            .await?;
        Ok(())
    }

    async fn remote_action(&self, action: u8) -> Result<()> {
        let url = format!("{}/v3/chargers/{}/remote-action", self.uri, self.id);
        self.send(Request::post(url, json!({ "action": action })))
            .await?;
        Ok(())
    }
}

impl CapabilitySet for Wallbox {
    fn as_meter(&self) -> Option<&dyn Meter> {
        Some(self)
    }

    fn as_charge_rater(&self) -> Option<&dyn ChargeRater> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl Charger for Wallbox {
    async fn status(&self) -> Result<ChargeStatus> {
        let res = self.charger_status().await?;
        status_from_code(res.status_id)
    }

    /// A paused charger reads as disabled, since `enable(false)` pauses it.
    async fn enabled(&self) -> Result<bool> {
        let res = self.charger_status().await?;
        Ok(res.config_data.max_charging_current > 0 && !res.is_paused())
    }

    async fn enable(&self, enable: bool) -> Result<()> {
        if !enable {
            return self.remote_action(ACTION_PAUSE).await;
        }

        self.remote_action(ACTION_RESUME).await?;
        self.set_current(self.current.load(Ordering::Acquire)).await
    }

    async fn max_current(&self, current: i64) -> Result<()> {
        check_current(current as f64)?;
        self.set_current(current).await?;
        self.current.store(current, Ordering::Release);
        Ok(())
    }
}

#[async_trait::async_trait]
impl Meter for Wallbox {
    async fn current_power(&self) -> Result<f64> {
        let res = self.charger_status().await?;
        Ok(res.charging_power * 1e3)
    }
}

#[async_trait::async_trait]
impl ChargeRater for Wallbox {
    async fn charged_energy(&self) -> Result<f64> {
        Ok(self.charger_status().await?.added_energy)
    }
}
