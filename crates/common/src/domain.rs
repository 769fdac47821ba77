mod command;
mod customer;
mod device;
mod principal;
mod result;
mod snapshot;
mod status_history;
mod telemetry;
mod zone;

pub use command::*;
pub use customer::*;
pub use device::*;
pub use principal::*;
pub use result::*;
pub use snapshot::*;
pub use status_history::*;
pub use telemetry::*;
pub use zone::*;
