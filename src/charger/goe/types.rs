//! go-e status document
//!
//! API v1 reports every value as a string, API v2 uses JSON numbers and
//! booleans. Both decode into the same [`Status`].

use serde::de::{self, Deserializer};
use serde::Deserialize;

/// Firmware API generation detected during construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
    V2,
}

/// Keys read from the status document
pub const STATUS_KEYS: &str = "alw,amp,car,eto,nrg,psm";

#[derive(Debug, Default, Deserialize)]
pub struct Status {
    #[serde(default, deserialize_with = "flex_i64")]
    pub car: i64,
    #[serde(default, deserialize_with = "flex_bool")]
    pub alw: bool,
    #[serde(default, deserialize_with = "flex_i64")]
    pub amp: i64,
    #[serde(default, deserialize_with = "flex_f64_vec")]
    pub nrg: Vec<f64>,
    #[serde(default, deserialize_with = "flex_f64")]
    pub eto: f64,
    #[serde(default, deserialize_with = "flex_i64")]
    pub psm: i64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flex {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Flex {
    fn as_f64(&self) -> Result<f64, String> {
        match self {
            Flex::Bool(b) => Ok(f64::from(u8::from(*b))),
            Flex::Number(n) => Ok(*n),
            Flex::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| format!("invalid number '{}'", s)),
        }
    }

    fn as_bool(&self) -> Result<bool, String> {
        match self {
            Flex::Bool(b) => Ok(*b),
            Flex::Number(n) => Ok(*n != 0.0),
            Flex::Text(s) => match s.trim() {
                "1" | "true" => Ok(true),
                "0" | "false" => Ok(false),
                _ => Err(format!("invalid boolean '{}'", s)),
            },
        }
    }
}

fn flex_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Flex::deserialize(d)?.as_f64().map_err(de::Error::custom)
}

fn flex_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    flex_f64(d).map(|v| v.round() as i64)
}

fn flex_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Flex::deserialize(d)?.as_bool().map_err(de::Error::custom)
}

fn flex_f64_vec<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
    Vec::<Flex>::deserialize(d)?
        .iter()
        .map(|v| v.as_f64().map_err(de::Error::custom))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_v1_strings() {
        let status: Status = serde_json::from_value(json!({
            "car": "2", "alw": "1", "amp": "16", "eto": "1234",
            "nrg": ["230", "231", "229", "0", "160", "161", "159", "0", "0", "0", "0", "1104"]
        }))
        .unwrap();
        assert_eq!(status.car, 2);
        assert!(status.alw);
        assert_eq!(status.amp, 16);
        assert_eq!(status.eto, 1234.0);
        assert_eq!(status.nrg[11], 1104.0);
        assert_eq!(status.psm, 0);
    }

    #[test]
    fn decodes_v2_numbers() {
        let status: Status = serde_json::from_value(json!({
            "car": 3, "alw": false, "amp": 10, "eto": 5000, "psm": 2,
            "nrg": [230, 231, 229, 0, 16.0, 16.1, 15.9, 0, 0, 0, 0, 11040]
        }))
        .unwrap();
        assert_eq!(status.car, 3);
        assert!(!status.alw);
        assert_eq!(status.psm, 2);
        assert_eq!(status.nrg[4], 16.0);
    }

    #[test]
    fn rejects_garbage() {
        let res: Result<Status, _> = serde_json::from_value(json!({"amp": "lots"}));
        assert!(res.is_err());
    }
}
