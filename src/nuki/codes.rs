//! Numeric codes used by the Nuki web API.
//!
//! Every code type keeps unknown values around so that a log entry
//! survives a round-trip through the cache unchanged.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

macro_rules! codes {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident = $code:literal => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "i32", into = "i32")]
        pub enum $name {
            $($variant,)+
            /// A code this crate doesn't know about.
            Unknown(i32),
        }

        impl $name {
            pub fn code(&self) -> i32 {
                match self {
                    $(Self::$variant => $code,)+
                    Self::Unknown(code) => *code,
                }
            }

            pub fn label(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                    Self::Unknown(_) => "unknown",
                }
            }
        }

        impl From<i32> for $name {
            fn from(code: i32) -> Self {
                match code {
                    $($code => Self::$variant,)+
                    other => Self::Unknown(other),
                }
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> i32 {
                value.code()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

codes! {
    /// What the smartlock did.
    Action {
        Unlock = 1 => "unlock",
        Lock = 2 => "lock",
        Unlatch = 3 => "unlatch",
        LockNGo = 4 => "lock'n'go",
        LockNGoWithUnlatch = 5 => "lock'n'go with unlatch",
        DoorWarningAjar = 208 => "door warning ajar",
        DoorWarningStatusMismatch = 209 => "door warning status mismatch",
        DoorbellRecognition = 224 => "doorbell recognition (only Opener)",
        DoorOpened = 240 => "door opened",
        DoorClosed = 241 => "door closed",
        DoorSensorJammed = 242 => "door sensor jammed",
        FirmwareUpdate = 243 => "firmware update",
        DoorLogEnabled = 250 => "door log enabled",
        DoorLogDisabled = 251 => "door log disabled",
        Initialization = 252 => "initialization",
        Calibration = 253 => "calibration",
        LogEnabled = 254 => "log enabled",
        LogDisabled = 255 => "log disabled",
    }
}

codes! {
    /// Who or what caused the action.
    Trigger {
        System = 0 => "system",
        Manual = 1 => "manual",
        Button = 2 => "button",
        Automatic = 3 => "automatic",
        Web = 4 => "web",
        App = 5 => "app",
        AutoLock = 6 => "auto lock",
        Accessory = 7 => "accessory",
        Keypad = 255 => "keypad",
    }
}

codes! {
    /// Outcome of the action.
    State {
        Success = 0 => "Success",
        MotorBlocked = 1 => "Motor blocked",
        Canceled = 2 => "Canceled",
        TooRecent = 3 => "Too recent",
        Busy = 4 => "Busy",
        LowMotorVoltage = 5 => "Low motor voltage",
        ClutchFailure = 6 => "Clutch failure",
        MotorPowerFailure = 7 => "Motor power failure",
        Incomplete = 8 => "Incomplete",
        Rejected = 9 => "Rejected",
        RejectedNightMode = 10 => "Rejected night mode",
        WrongKeypadCode = 224 => "Wrong keypad code",
        OtherError = 254 => "Other error",
        UnknownError = 255 => "Unknown error",
    }
}

codes! {
    /// How the `name` field of a log entry has to be read.
    Source {
        Default = 0 => "Default",
        KeypadCode = 1 => "Keypad code",
        Fingerprint = 2 => "Fingerprint",
    }
}

codes! {
    DeviceType {
        Smartlock = 0 => "smartlock",
        Opener = 2 => "opener",
        Smartdoor = 3 => "smartdoor",
    }
}

impl Trigger {
    pub fn emoji(&self) -> &'static str {
        match self {
            Trigger::System => "\u{2699}\u{fe0f}",
            Trigger::Keypad => "\u{1f522}",
            Trigger::App => "\u{1f4f1}",
            Trigger::Web => "\u{1f30d}",
            Trigger::Button => "\u{1f518}",
            Trigger::Manual => "\u{1f590}\u{fe0f}",
            other => other.label(),
        }
    }
}

impl State {
    pub fn emoji(&self) -> &'static str {
        match self {
            State::Success => "\u{1f7e2}",
            State::LowMotorVoltage | State::MotorBlocked | State::Busy | State::TooRecent => {
                "\u{26a0}\u{fe0f}"
            }
            State::WrongKeypadCode | State::RejectedNightMode | State::Rejected => "\u{1f534}",
            State::OtherError
            | State::UnknownError
            | State::ClutchFailure
            | State::MotorPowerFailure => "\u{2757}",
            State::Canceled | State::Incomplete => "\u{2b55}",
            other => other.label(),
        }
    }
}
