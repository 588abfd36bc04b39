pub mod config;
pub mod provider;

pub use config::EmailConfig;
pub use provider::EmailProvider;
