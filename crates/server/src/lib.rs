pub mod api;
pub mod config;
pub mod error;

pub use config::CadenceConfig;
pub use error::ServerError;
