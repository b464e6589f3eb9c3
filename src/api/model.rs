//! Raw response and request bodies of the Nuki web API.
//!
//! Only the fields this crate looks at are declared, everything else
//! the API sends is ignored.

use serde::{Deserialize, Serialize};

/// A single entry of `GET /smartlock/{id}/log`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub id: String,
    pub smartlock_id: i64,
    #[serde(default)]
    pub device_type: i32,
    #[serde(default)]
    pub account_user_id: i64,
    #[serde(default)]
    pub auth_id: String,
    #[serde(default)]
    pub name: String,
    pub action: i32,
    pub trigger: i32,
    pub state: i32,
    #[serde(default)]
    pub auto_unlock: bool,
    /// RFC3339
    pub date: String,
    #[serde(default)]
    pub source: i32,
}

/// A single entry of `GET /address/{id}/reservation`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: String,
    #[serde(default)]
    pub address_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub reference: String,
    /// RFC3339
    pub start_date: String,
    /// RFC3339
    pub end_date: String,
}

/// The `state` object of `GET /smartlock/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SmartlockStateData {
    pub mode: i32,
    pub state: i32,
    pub battery_critical: bool,
    pub battery_charging: bool,
    pub battery_charge: i32,
    pub keypad_battery_critical: bool,
    pub doorsensor_battery_critical: bool,
    pub door_state: i32,
}

/// Response of `GET /smartlock/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Smartlock {
    pub smartlock_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: SmartlockStateData,
}

/// A single entry of `GET /smartlock/{id}/auth`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartlockAuth {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(rename = "type", default)]
    pub kind: i32,
}

/// Body of `POST /address/{id}/reservation/{id}/update/accesstimes`.
///
/// Both values are minutes from midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTimes {
    pub check_in_time: i32,
    pub check_out_time: i32,
}
