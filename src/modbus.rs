//! Modbus TCP transport for register-mapped chargers
//!
//! This module provides async Modbus TCP communication with proper timeouts,
//! the [`ModbusLike`] seam that device adapters talk to, and the big-endian
//! register codecs shared by all Modbus adapters.

use crate::error::{ChargerError, Result};
use crate::logging::get_logger;
use std::time::Duration;
use tokio::time::timeout;
use tokio_modbus::client::tcp;
use tokio_modbus::prelude::*;

/// Default Modbus TCP port
pub const DEFAULT_PORT: u16 = 502;

/// Register-level access used by Modbus device adapters
#[async_trait::async_trait]
pub trait ModbusLike: Send {
    /// Optional connection status. Default: unknown (None).
    fn connection_status(&self) -> Option<bool> {
        None
    }

    async fn read_holding_registers(
        &mut self,
        slave_id: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>>;

    async fn read_input_registers(
        &mut self,
        slave_id: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>>;

    async fn write_multiple_registers(
        &mut self,
        slave_id: u8,
        address: u16,
        values: &[u16],
    ) -> Result<()>;
}

/// Modbus TCP client
pub struct ModbusClient {
    /// Modbus TCP client connection
    client: Option<tokio_modbus::client::Context>,

    /// `host:port` of the device
    address: String,

    /// Connection timeout
    connection_timeout: Duration,

    /// Operation timeout
    operation_timeout: Duration,

    /// Logger
    logger: crate::logging::StructuredLogger,
}

impl ModbusClient {
    /// Create a new Modbus client for `host` or `host:port`
    pub fn new(uri: &str) -> Self {
        let logger = get_logger("modbus");
        Self {
            client: None,
            address: with_default_port(uri),
            connection_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(2),
            logger,
        }
    }

    /// Override connection and operation timeouts
    pub fn with_timeouts(mut self, connection: Duration, operation: Duration) -> Self {
        self.connection_timeout = connection;
        self.operation_timeout = operation;
        self
    }

    /// Connect to the Modbus server
    pub async fn connect(&mut self) -> Result<()> {
        self.logger
            .info(&format!("Connecting to Modbus server at {}", self.address));

        let socket_addr: std::net::SocketAddr = self
            .address
            .parse()
            .map_err(|e| ChargerError::modbus(format!("Invalid socket address: {}", e)))?;

        match timeout(self.connection_timeout, tcp::connect(socket_addr)).await {
            Ok(Ok(client)) => {
                self.client = Some(client);
                self.logger.info("Successfully connected to Modbus server");
                Ok(())
            }
            Ok(Err(e)) => {
                let error_msg = format!("Failed to connect to Modbus server: {}", e);
                self.logger.error(&error_msg);
                Err(ChargerError::modbus(error_msg))
            }
            Err(_) => {
                let error_msg = "Connection timeout".to_string();
                self.logger.error(&error_msg);
                Err(ChargerError::timeout(error_msg))
            }
        }
    }

    /// Disconnect from the Modbus server
    pub fn disconnect(&mut self) {
        if self.client.take().is_some() {
            self.logger.info("Disconnecting from Modbus server");
        }
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Get client reference bound to `slave_id`, or error if not connected
    fn get_client(&mut self, slave_id: u8) -> Result<&mut tokio_modbus::client::Context> {
        let client = self
            .client
            .as_mut()
            .ok_or_else(|| ChargerError::modbus("Not connected to Modbus server"))?;
        client.set_slave(Slave(slave_id));
        Ok(client)
    }
}

#[async_trait::async_trait]
impl ModbusLike for ModbusClient {
    fn connection_status(&self) -> Option<bool> {
        Some(self.is_connected())
    }

    async fn read_holding_registers(
        &mut self,
        slave_id: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>> {
        let timeout_duration = self.operation_timeout;

        self.logger.debug(&format!(
            "Reading {} holding registers from address {} on slave {}",
            count, address, slave_id
        ));

        let client = self.get_client(slave_id)?;
        let response = timeout(timeout_duration, client.read_holding_registers(address, count))
            .await
            .map_err(|_| ChargerError::timeout("Read operation timeout"))?;
        let registers = self.unwrap_response(response, "read holding registers")?;
        self.logger
            .trace(&format!("Read {} registers: {:?}", registers.len(), registers));
        Ok(registers)
    }

    async fn read_input_registers(
        &mut self,
        slave_id: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>> {
        let timeout_duration = self.operation_timeout;

        self.logger.debug(&format!(
            "Reading {} input registers from address {} on slave {}",
            count, address, slave_id
        ));

        let client = self.get_client(slave_id)?;
        let response = timeout(timeout_duration, client.read_input_registers(address, count))
            .await
            .map_err(|_| ChargerError::timeout("Read operation timeout"))?;
        let registers = self.unwrap_response(response, "read input registers")?;
        self.logger
            .trace(&format!("Read {} registers: {:?}", registers.len(), registers));
        Ok(registers)
    }

    async fn write_multiple_registers(
        &mut self,
        slave_id: u8,
        address: u16,
        values: &[u16],
    ) -> Result<()> {
        let timeout_duration = self.operation_timeout;

        self.logger.debug(&format!(
            "Writing {} values to registers starting at {} on slave {}",
            values.len(),
            address,
            slave_id
        ));

        let client = self.get_client(slave_id)?;
        let response = timeout(
            timeout_duration,
            client.write_multiple_registers(address, values),
        )
        .await
        .map_err(|_| ChargerError::timeout("Write operation timeout"))?;
        self.unwrap_response(response, "write multiple registers")?;
        self.logger.debug("Successfully wrote multiple registers");
        Ok(())
    }
}

impl ModbusClient {
    fn unwrap_response<T>(&self, response: tokio_modbus::Result<T>, op: &str) -> Result<T> {
        match response {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(exception)) => {
                let error_msg = format!("Failed to {}: exception {:?}", op, exception);
                self.logger.error(&error_msg);
                Err(ChargerError::modbus(error_msg))
            }
            Err(e) => {
                let error_msg = format!("Failed to {}: connection error: {}", op, e);
                self.logger.error(&error_msg);
                Err(ChargerError::modbus(error_msg))
            }
        }
    }
}

/// Connection manager that re-establishes a dropped connection on the next call.
///
/// A failing operation is never repeated here: its error goes back to the
/// caller, and a connection-level failure only marks the link for reconnect.
pub struct ModbusConnectionManager {
    client: ModbusClient,
    logger: crate::logging::StructuredLogger,
}

impl ModbusConnectionManager {
    /// Create a new connection manager
    pub fn new(client: ModbusClient) -> Self {
        let logger = get_logger("modbus_manager");
        Self { client, logger }
    }

    /// Connect eagerly; used during driver construction to fail fast
    pub async fn connect(&mut self) -> Result<()> {
        self.client.connect().await
    }

    async fn ensure_connected(&mut self) -> Result<()> {
        if !self.client.is_connected() {
            self.logger.debug("Re-establishing Modbus connection");
            self.client.connect().await?;
        }
        Ok(())
    }

    fn observe<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result
            && e.is_connection_error()
        {
            self.logger
                .warn(&format!("Operation failed due to connection error: {}", e));
            self.client.disconnect();
        }
        result
    }
}

#[async_trait::async_trait]
impl ModbusLike for ModbusConnectionManager {
    fn connection_status(&self) -> Option<bool> {
        Some(self.client.is_connected())
    }

    async fn read_holding_registers(
        &mut self,
        slave_id: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>> {
        self.ensure_connected().await?;
        let result = self
            .client
            .read_holding_registers(slave_id, address, count)
            .await;
        self.observe(result)
    }

    async fn read_input_registers(
        &mut self,
        slave_id: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>> {
        self.ensure_connected().await?;
        let result = self
            .client
            .read_input_registers(slave_id, address, count)
            .await;
        self.observe(result)
    }

    async fn write_multiple_registers(
        &mut self,
        slave_id: u8,
        address: u16,
        values: &[u16],
    ) -> Result<()> {
        self.ensure_connected().await?;
        let result = self
            .client
            .write_multiple_registers(slave_id, address, values)
            .await;
        self.observe(result)
    }
}

fn with_default_port(uri: &str) -> String {
    let uri = uri.trim();
    if uri.rsplit_once(':').is_some_and(|(_, port)| port.parse::<u16>().is_ok()) {
        uri.to_string()
    } else {
        format!("{}:{}", uri, DEFAULT_PORT)
    }
}

/// Utility functions for data conversion

/// Decode 32-bit float from two 16-bit registers (big-endian)
pub fn decode_32bit_float(registers: &[u16]) -> Result<f32> {
    if registers.len() < 2 {
        return Err(ChargerError::modbus(
            "Insufficient registers for 32-bit float",
        ));
    }

    let bytes = [
        (registers[0] >> 8) as u8,
        (registers[0] & 0xFF) as u8,
        (registers[1] >> 8) as u8,
        (registers[1] & 0xFF) as u8,
    ];

    Ok(f32::from_be_bytes(bytes))
}

/// Decode unsigned 16-bit value from one register
pub fn decode_u16(registers: &[u16]) -> Result<u16> {
    registers
        .first()
        .copied()
        .ok_or_else(|| ChargerError::modbus("Insufficient registers for 16-bit value"))
}

/// Decode unsigned 64-bit value from four 16-bit registers (big-endian)
pub fn decode_u64(registers: &[u16]) -> Result<u64> {
    if registers.len() < 4 {
        return Err(ChargerError::modbus(
            "Insufficient registers for 64-bit value",
        ));
    }

    Ok(registers[..4]
        .iter()
        .fold(0u64, |acc, &reg| (acc << 16) | u64::from(reg)))
}

/// Decode string from registers
pub fn decode_string(registers: &[u16], max_length: Option<usize>) -> Result<String> {
    let mut bytes = Vec::new();

    for &reg in registers {
        bytes.push((reg >> 8) as u8);
        bytes.push((reg & 0xFF) as u8);
    }

    let string = String::from_utf8(bytes)
        .map_err(|e| ChargerError::modbus(format!("Invalid UTF-8 string: {}", e)))?;

    // Remove null terminators and trailing whitespace
    let string = string.trim_matches('\0').trim();

    if let Some(max_len) = max_length {
        Ok(string.chars().take(max_len).collect())
    } else {
        Ok(string.to_string())
    }
}

/// Decode a device text field, replacing invalid UTF-8 instead of failing
pub fn decode_string_lossy(registers: &[u16]) -> String {
    let bytes: Vec<u8> = registers.iter().flat_map(|reg| reg.to_be_bytes()).collect();
    String::from_utf8_lossy(&bytes)
        .trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}

/// Encode 32-bit float to two 16-bit registers (big-endian)
pub fn encode_32bit_float(value: f32) -> [u16; 2] {
    let bytes = value.to_be_bytes();
    [
        ((bytes[0] as u16) << 8) | (bytes[1] as u16),
        ((bytes[2] as u16) << 8) | (bytes[3] as u16),
    ]
}
