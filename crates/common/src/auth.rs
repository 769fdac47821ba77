mod config;
mod credential_gate;
mod jwt;
mod traits;

pub use config::*;
pub use credential_gate::*;
pub use jwt::*;
pub use traits::*;
