pub mod config;
pub mod error;
pub mod provider;
pub mod types;

pub use config::SmsConfig;
pub use error::SmsError;
pub use provider::SmsProvider;
