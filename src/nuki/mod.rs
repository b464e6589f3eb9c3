mod codes;
pub use codes::{Action, DeviceType, Source, State, Trigger};

mod diff;
pub use diff::diff;

pub(crate) mod log_entry;
pub use log_entry::Log;

mod reservation;
pub use reservation::Reservation;

mod smartlock;
pub use smartlock::{SmartlockAuth, SmartlockState, LOW_BATTERY_CHARGE};
