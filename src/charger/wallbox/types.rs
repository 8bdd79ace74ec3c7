//! Wallbox cloud API documents

use serde::Deserialize;

/// Default cloud endpoint
pub const API_URI: &str = "https://api.wall-box.com";

/// Remote action codes for `POST /v3/chargers/{id}/remote-action`
pub const ACTION_RESUME: u8 = 1;
pub const ACTION_PAUSE: u8 = 2;

#[derive(Debug, Deserialize)]
pub struct Token {
    pub jwt: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Groups {
    #[serde(default)]
    pub result: GroupsResult,
}

#[derive(Debug, Default, Deserialize)]
pub struct GroupsResult {
    #[serde(default)]
    pub groups: Vec<Group>,
}

#[derive(Debug, Deserialize)]
pub struct Group {
    #[serde(default)]
    pub chargers: Vec<ChargerRef>,
}

#[derive(Debug, Deserialize)]
pub struct ChargerRef {
    pub id: u64,
}

impl Groups {
    /// Charger ids across all groups
    pub fn charger_ids(&self) -> Vec<u64> {
        self.result
            .groups
            .iter()
            .flat_map(|g| g.chargers.iter().map(|c| c.id))
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfigData {
    #[serde(default)]
    pub max_charging_current: i64,
}

/// `GET /chargers/status/{id}`
#[derive(Debug, Deserialize)]
pub struct ChargerStatus {
    pub status_id: i64,
    #[serde(default)]
    pub config_data: ConfigData,
    /// kW
    #[serde(default)]
    pub charging_power: f64,
    /// kWh
    #[serde(default)]
    pub added_energy: f64,
}

impl ChargerStatus {
    pub fn is_paused(&self) -> bool {
        matches!(self.status_id, 178 | 182)
    }
}
