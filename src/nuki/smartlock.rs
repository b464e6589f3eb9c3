use serde::{Deserialize, Serialize};

use crate::api;

/// Battery charge (in percent) at and below which the smartlock needs attention.
pub const LOW_BATTERY_CHARGE: i32 = 30;

/// Summary of a smartlock's health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartlockState {
    pub smartlock_id: i64,
    pub name: String,
    pub battery_critical: bool,
    /// Remaining battery in percent
    pub battery_charge: i32,
    pub keypad_battery_critical: bool,
    pub doorsensor_battery_critical: bool,
}

impl SmartlockState {
    pub fn needs_attention(&self) -> bool {
        self.battery_critical
            || self.keypad_battery_critical
            || self.doorsensor_battery_critical
            || self.battery_charge <= LOW_BATTERY_CHARGE
    }
}

impl From<api::Smartlock> for SmartlockState {
    fn from(value: api::Smartlock) -> Self {
        SmartlockState {
            smartlock_id: value.smartlock_id,
            name: value.name,
            battery_critical: value.state.battery_critical,
            battery_charge: value.state.battery_charge,
            keypad_battery_critical: value.state.keypad_battery_critical,
            doorsensor_battery_critical: value.state.doorsensor_battery_critical,
        }
    }
}

/// An authorization (keypad code, app user, ...) of a smartlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmartlockAuth {
    pub id: String,
    pub name: String,
    pub code: Option<i64>,
    pub enabled: bool,
}

impl From<api::SmartlockAuth> for SmartlockAuth {
    fn from(value: api::SmartlockAuth) -> Self {
        SmartlockAuth {
            id: value.id,
            name: value.name,
            code: value.code,
            enabled: value.enabled,
        }
    }
}
