mod auth;
mod broadcast;
mod device_handler;
mod error;
mod realtime_handler;
mod registration_handler;
mod server;
mod state;
mod system_handler;

pub use auth::*;
pub use broadcast::*;
pub use device_handler::*;
pub use error::*;
pub use realtime_handler::*;
pub use registration_handler::*;
pub use server::*;
pub use state::*;
pub use system_handler::*;
