pub mod error;
pub mod provider;
pub mod registry;
pub mod signature;
pub mod types;

pub use error::ProviderError;
pub use provider::{DynProvider, Provider};
pub use registry::ProviderRegistry;
pub use types::{SendReceipt, SendRequest};
