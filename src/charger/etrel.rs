//! Etrel INCH / Sonnen wallbox over Modbus TCP
//!
//! Register map: Etrel INCH SmartHome Modbus TCP register list.

use super::check_current;
use crate::api::{ChargeStatus, Charger, MIN_CURRENT};
use crate::capability::{
    CapabilitySet, ChargeRater, ChargeTimer, ChargerEx, Diagnosis, Meter, MeterCurrent,
};
use crate::compose::compose;
use crate::config::{Other, decode_other};
use crate::error::{ChargerError, Result};
use crate::logging::get_logger;
use crate::modbus::{
    ModbusClient, ModbusConnectionManager, ModbusLike, decode_32bit_float, decode_string_lossy,
    decode_u16, decode_u64, encode_32bit_float,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

// Input registers
const REG_CHARGE_STATUS: u16 = 0;
const REG_CURRENTS: [u16; 3] = [14, 16, 18];
const REG_POWER: u16 = 26;
const REG_SESSION_ENERGY: u16 = 30;
const REG_CHARGE_TIME: u16 = 32;
const REG_BRAND: u16 = 190;
const REG_SERIAL: u16 = 990;
const REG_MODEL: u16 = 1000;
const REG_HW_VERSION: u16 = 1010;
const REG_SW_VERSION: u16 = 1015;

// Holding registers
const REG_STOP: u16 = 1;
const REG_MAX_CURRENT: u16 = 8;

const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const OPERATION_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Settings {
    uri: String,
    #[serde(default = "default_id")]
    id: u8,
}

fn default_id() -> u8 {
    255
}

/// Map an Etrel connector status code to a charge state
pub fn status_from_code(code: u16) -> Result<ChargeStatus> {
    match code {
        1 | 2 => Ok(ChargeStatus::A),
        3 | 5 | 6 | 7 | 9 => Ok(ChargeStatus::B),
        4 => Ok(ChargeStatus::C),
        8 => Ok(ChargeStatus::F),
        _ => Err(ChargerError::protocol(format!("invalid status: {}", code))),
    }
}

struct EtrelState {
    conn: Box<dyn ModbusLike>,
    /// Last successfully written current, resent on enable
    current: f32,
}

/// Etrel charger
pub struct Etrel {
    logger: crate::logging::StructuredLogger,
    slave_id: u8,
    model: String,
    state: Mutex<EtrelState>,
}

/// Factory registered as `etrel`
pub async fn new_from_config(other: Other) -> Result<Arc<dyn Charger>> {
    let settings: Settings = decode_other(&other)?;

    let client =
        ModbusClient::new(&settings.uri).with_timeouts(CONNECT_TIMEOUT, OPERATION_TIMEOUT);
    let mut manager = ModbusConnectionManager::new(client);
    manager.connect().await?;

    let wb = Etrel::new(Box::new(manager), settings.id).await?;
    Ok(compose(Arc::new(wb), crate::capability::Bindings::new()))
}

impl Etrel {
    /// Identify the device behind `conn` and build the adapter.
    ///
    /// Fails if the model register cannot be read. The model text itself is
    /// decoded leniently.
    pub async fn new(mut conn: Box<dyn ModbusLike>, slave_id: u8) -> Result<Self> {
        let logger = get_logger("etrel");

        let regs = tokio::time::timeout(
            IDENTIFY_TIMEOUT,
            conn.read_input_registers(slave_id, REG_MODEL, 10),
        )
        .await
        .map_err(|_| ChargerError::timeout("Etrel identification timeout"))??;
        let model = decode_string_lossy(&regs);
        logger.info(&format!("Connected to Etrel model '{}'", model));

        Ok(Self {
            logger,
            slave_id,
            model,
            state: Mutex::new(EtrelState {
                conn,
                current: MIN_CURRENT as f32,
            }),
        })
    }

    /// Model string read during construction
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn read_input(&self, address: u16, count: u16) -> Result<Vec<u16>> {
        let mut state = self.state.lock().await;
        state
            .conn
            .read_input_registers(self.slave_id, address, count)
            .await
    }

    async fn read_float(&self, address: u16) -> Result<f64> {
        let regs = self.read_input(address, 2).await?;
        Ok(f64::from(decode_32bit_float(&regs)?))
    }

    async fn set_current(&self, current: f32) -> Result<()> {
        let mut state = self.state.lock().await;
        self.logger.debug(&format!("Setting current {:.1} A", current));
        state
            .conn
            .write_multiple_registers(self.slave_id, REG_MAX_CURRENT, &encode_32bit_float(current))
            .await?;
        state.current = current;
        Ok(())
    }
}

impl CapabilitySet for Etrel {
    fn as_meter(&self) -> Option<&dyn Meter> {
        Some(self)
    }

    fn as_charge_rater(&self) -> Option<&dyn ChargeRater> {
        Some(self)
    }

    fn as_meter_current(&self) -> Option<&dyn MeterCurrent> {
        Some(self)
    }

    fn as_charge_timer(&self) -> Option<&dyn ChargeTimer> {
        Some(self)
    }

    fn as_diagnosis(&self) -> Option<&dyn Diagnosis> {
        Some(self)
    }

    fn as_charger_ex(&self) -> Option<&dyn ChargerEx> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl Charger for Etrel {
    async fn status(&self) -> Result<ChargeStatus> {
        let regs = self.read_input(REG_CHARGE_STATUS, 1).await?;
        status_from_code(decode_u16(&regs)?)
    }

    async fn enabled(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        let regs = state
            .conn
            .read_holding_registers(self.slave_id, REG_MAX_CURRENT, 2)
            .await?;
        Ok(decode_32bit_float(&regs)? > 0.0)
    }

    async fn enable(&self, enable: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        if enable {
            let current = state.current;
            return state
                .conn
                .write_multiple_registers(
                    self.slave_id,
                    REG_MAX_CURRENT,
                    &encode_32bit_float(current),
                )
                .await;
        }

        state
            .conn
            .write_multiple_registers(self.slave_id, REG_STOP, &[1])
            .await
    }

    async fn max_current(&self, current: i64) -> Result<()> {
        self.max_current_millis(current as f64).await
    }
}

#[async_trait::async_trait]
impl ChargerEx for Etrel {
    async fn max_current_millis(&self, current: f64) -> Result<()> {
        check_current(current)?;
        self.set_current(current as f32).await
    }
}

#[async_trait::async_trait]
impl Meter for Etrel {
    async fn current_power(&self) -> Result<f64> {
        // Register holds kW
        Ok(self.read_float(REG_POWER).await? * 1e3)
    }
}

#[async_trait::async_trait]
impl ChargeRater for Etrel {
    async fn charged_energy(&self) -> Result<f64> {
        self.read_float(REG_SESSION_ENERGY).await
    }
}

#[async_trait::async_trait]
impl MeterCurrent for Etrel {
    async fn currents(&self) -> Result<(f64, f64, f64)> {
        let mut currents = [0.0; 3];
        for (value, reg) in currents.iter_mut().zip(REG_CURRENTS) {
            *value = self.read_float(reg).await?;
        }
        Ok((currents[0], currents[1], currents[2]))
    }
}

#[async_trait::async_trait]
impl ChargeTimer for Etrel {
    async fn charging_time(&self) -> Result<Duration> {
        let regs = self.read_input(REG_CHARGE_TIME, 4).await?;
        Ok(Duration::from_secs(decode_u64(&regs)?))
    }
}

#[async_trait::async_trait]
impl Diagnosis for Etrel {
    async fn diagnose(&self) -> Result<Vec<(String, String)>> {
        let fields = [
            ("Brand", REG_BRAND, 10),
            ("Model", REG_MODEL, 10),
            ("Serial", REG_SERIAL, 10),
            ("Hardware", REG_HW_VERSION, 5),
            ("Software", REG_SW_VERSION, 5),
        ];

        let mut report = Vec::new();
        for (label, reg, count) in fields {
            // Unreadable fields are skipped
            match self.read_input(reg, count).await {
                Ok(regs) => report.push((label.to_string(), decode_string_lossy(&regs))),
                Err(e) => self
                    .logger
                    .debug(&format!("Cannot read {}: {}", label.to_lowercase(), e)),
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capability;
    use crate::charger::mock::{MockModbus, regs_from_f32, regs_from_str};

    async fn etrel(mock: &MockModbus) -> Etrel {
        Etrel::new(Box::new(mock.clone()), 255).await.unwrap()
    }

    fn device() -> MockModbus {
        MockModbus::new()
            .with_input(REG_MODEL, regs_from_str("INCH Home", 10))
            .with_holding(REG_MAX_CURRENT, regs_from_f32(0.0))
    }

    #[test]
    fn status_table() {
        assert_eq!(status_from_code(4).unwrap(), ChargeStatus::C);
        assert_eq!(status_from_code(9).unwrap(), ChargeStatus::B);
        assert_eq!(status_from_code(1).unwrap(), ChargeStatus::A);
        assert_eq!(status_from_code(8).unwrap(), ChargeStatus::F);
        assert!(matches!(
            status_from_code(255),
            Err(ChargerError::Protocol { .. })
        ));
        assert!(status_from_code(0).is_err());
    }

    #[tokio::test]
    async fn new_reads_model() {
        let mock = device();
        let wb = etrel(&mock).await;
        assert_eq!(wb.model(), "INCH Home");
    }

    #[tokio::test]
    async fn new_fails_when_unreachable() {
        let mock = device();
        mock.fail_reads(true);
        assert!(Etrel::new(Box::new(mock), 255).await.is_err());
    }

    #[tokio::test]
    async fn status_reads_input_register() {
        let mock = device().with_input(REG_CHARGE_STATUS, vec![4]);
        let wb = etrel(&mock).await;
        assert_eq!(wb.status().await.unwrap(), ChargeStatus::C);

        mock.set_input(REG_CHARGE_STATUS, vec![9]);
        assert_eq!(wb.status().await.unwrap(), ChargeStatus::B);

        mock.set_input(REG_CHARGE_STATUS, vec![255]);
        assert!(wb.status().await.is_err());
    }

    #[tokio::test]
    async fn new_tolerates_garbled_model_text() {
        let mock = MockModbus::new().with_input(
            REG_MODEL,
            vec![0x494E, 0x4348, 0xFFFF, 0, 0, 0, 0, 0, 0, 0],
        );
        let wb = etrel(&mock).await;
        assert!(wb.model().starts_with("INCH"));
    }

    #[tokio::test]
    async fn max_current_rejects_non_finite_without_write() {
        let mock = device();
        let wb = etrel(&mock).await;
        for current in [f64::NAN, f64::INFINITY, 1e300] {
            let err = wb.max_current_millis(current).await.unwrap_err();
            assert!(err.is_invalid_argument());
        }
        assert!(mock.writes().is_empty());

        wb.enable(true).await.unwrap();
        assert_eq!(mock.writes(), vec![(255, REG_MAX_CURRENT, regs_from_f32(6.0))]);
    }

    #[tokio::test]
    async fn max_current_below_minimum_writes_nothing() {
        let mock = device();
        let wb = etrel(&mock).await;
        let err = wb.max_current(5).await.unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(mock.writes().is_empty());
    }

    #[tokio::test]
    async fn max_current_writes_requested_value() {
        let mock = device();
        let wb = etrel(&mock).await;
        wb.max_current(16).await.unwrap();
        assert_eq!(
            mock.writes(),
            vec![(255, REG_MAX_CURRENT, regs_from_f32(16.0))]
        );
        assert!(wb.enabled().await.unwrap());
    }

    #[tokio::test]
    async fn enable_resends_last_successful_current() {
        let mock = device();
        let wb = etrel(&mock).await;

        wb.enable(true).await.unwrap();
        assert_eq!(mock.writes().last().unwrap().2, regs_from_f32(6.0));

        wb.max_current(10).await.unwrap();
        wb.enable(true).await.unwrap();
        assert_eq!(mock.writes().last().unwrap().2, regs_from_f32(10.0));

        mock.fail_writes(true);
        assert!(wb.max_current(20).await.is_err());
        mock.fail_writes(false);
        wb.enable(true).await.unwrap();
        assert_eq!(mock.writes().last().unwrap().2, regs_from_f32(10.0));
    }

    #[tokio::test]
    async fn disable_writes_stop_register() {
        let mock = device();
        let wb = etrel(&mock).await;
        wb.enable(false).await.unwrap();
        assert_eq!(mock.writes(), vec![(255, REG_STOP, vec![1])]);
    }

    #[tokio::test]
    async fn native_measurements() {
        let mock = device()
            .with_input(REG_POWER, regs_from_f32(7.2))
            .with_input(REG_SESSION_ENERGY, regs_from_f32(3.5))
            .with_input(REG_CHARGE_TIME, vec![0, 0, 0, 90])
            .with_input(14, regs_from_f32(10.0))
            .with_input(16, regs_from_f32(11.0))
            .with_input(18, regs_from_f32(12.0));
        let wb = etrel(&mock).await;

        let power = wb.current_power().await.unwrap();
        assert!((power - 7200.0).abs() < 0.1);
        assert!((wb.charged_energy().await.unwrap() - 3.5).abs() < 1e-6);
        assert_eq!(wb.charging_time().await.unwrap(), Duration::from_secs(90));
        let (l1, l2, l3) = wb.currents().await.unwrap();
        assert_eq!((l1, l2, l3), (10.0, 11.0, 12.0));

        let report = wb.diagnose().await.unwrap();
        assert_eq!(report, vec![("Model".to_string(), "INCH Home".to_string())]);
    }

    #[tokio::test]
    async fn composed_etrel_is_the_adapter() {
        let mock = device();
        let wb = Arc::new(etrel(&mock).await);
        let charger = compose(wb.clone(), crate::capability::Bindings::new());
        assert_eq!(
            Arc::as_ptr(&charger) as *const (),
            Arc::as_ptr(&wb) as *const ()
        );
        assert_eq!(
            charger.capabilities(),
            vec![
                Capability::Meter,
                Capability::ChargeRater,
                Capability::MeterCurrent,
                Capability::ChargeTimer,
                Capability::Diagnosis,
                Capability::ChargerEx,
            ]
        );
        assert!(charger.as_meter_energy().is_none());
    }
}
