pub mod ac_api;
pub mod domain;
pub mod http;

pub use ac_api::*;
pub use domain::*;
pub use http::*;
