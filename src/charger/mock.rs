//! In-memory transports for adapter tests

use crate::error::{ChargerError, Result};
use crate::http::{JsonTransport, Method, Request};
use crate::modbus::ModbusLike;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct ModbusState {
    pub holding: HashMap<u16, Vec<u16>>,
    pub input: HashMap<u16, Vec<u16>>,
    pub writes: Vec<(u8, u16, Vec<u16>)>,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

/// Register map backed Modbus transport; clones share state
#[derive(Clone, Default)]
pub struct MockModbus {
    pub state: Arc<Mutex<ModbusState>>,
}

impl MockModbus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(self, address: u16, regs: Vec<u16>) -> Self {
        self.state.lock().unwrap().input.insert(address, regs);
        self
    }

    pub fn with_holding(self, address: u16, regs: Vec<u16>) -> Self {
        self.state.lock().unwrap().holding.insert(address, regs);
        self
    }

    pub fn set_input(&self, address: u16, regs: Vec<u16>) {
        self.state.lock().unwrap().input.insert(address, regs);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    pub fn writes(&self) -> Vec<(u8, u16, Vec<u16>)> {
        self.state.lock().unwrap().writes.clone()
    }

    fn read(map: &HashMap<u16, Vec<u16>>, address: u16, count: u16) -> Result<Vec<u16>> {
        let regs = map
            .get(&address)
            .ok_or_else(|| ChargerError::modbus(format!("exception IllegalDataAddress {}", address)))?;
        Ok(regs.iter().copied().take(count as usize).collect())
    }
}

#[async_trait::async_trait]
impl ModbusLike for MockModbus {
    async fn read_holding_registers(&mut self, _slave_id: u8, address: u16, count: u16) -> Result<Vec<u16>> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(ChargerError::modbus("connection error: broken pipe"));
        }
        Self::read(&state.holding, address, count)
    }

    async fn read_input_registers(&mut self, _slave_id: u8, address: u16, count: u16) -> Result<Vec<u16>> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(ChargerError::modbus("connection error: broken pipe"));
        }
        Self::read(&state.input, address, count)
    }

    async fn write_multiple_registers(&mut self, slave_id: u8, address: u16, values: &[u16]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(ChargerError::modbus("connection error: broken pipe"));
        }
        state.writes.push((slave_id, address, values.to_vec()));
        state.holding.insert(address, values.to_vec());
        Ok(())
    }
}

type Responder = Box<dyn Fn(&Request) -> Result<Value> + Send + Sync>;

/// Route table backed JSON transport; clones share state
#[derive(Clone, Default)]
pub struct MockHttp {
    routes: Arc<Mutex<Vec<(Method, String, Arc<Responder>)>>>,
    pub requests: Arc<Mutex<Vec<Request>>>,
}

impl MockHttp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to requests whose URL starts with `prefix`; later routes win
    pub fn route<F>(self, method: Method, prefix: &str, f: F) -> Self
    where
        F: Fn(&Request) -> Result<Value> + Send + Sync + 'static,
    {
        let responder: Responder = Box::new(f);
        self.routes
            .lock()
            .unwrap()
            .push((method, prefix.to_string(), Arc::new(responder)));
        self
    }

    pub fn json(self, method: Method, prefix: &str, value: Value) -> Self {
        self.route(method, prefix, move |_| Ok(value.clone()))
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests other than plain reads
    pub fn writes(&self) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|r| r.method != Method::Get || r.url.contains("/api/set") || r.url.contains("/mqtt"))
            .collect()
    }
}

#[async_trait::async_trait]
impl JsonTransport for MockHttp {
    async fn request(&self, req: Request) -> Result<Value> {
        self.requests.lock().unwrap().push(req.clone());
        let responder = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(m, prefix, _)| *m == req.method && req.url.starts_with(prefix.as_str()))
            .map(|(_, _, r)| r.clone());
        match responder {
            Some(r) => r(&req),
            None => Err(ChargerError::http(404, format!("no route for {}", req.url))),
        }
    }
}

pub fn regs_from_f32(v: f32) -> Vec<u16> {
    crate::modbus::encode_32bit_float(v).to_vec()
}

pub fn regs_from_str(s: &str, count: usize) -> Vec<u16> {
    let mut bytes = s.as_bytes().to_vec();
    bytes.resize(count * 2, 0);
    bytes
        .chunks_exact(2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .collect()
}
