pub mod audit;
pub mod contact;
pub mod error;
pub mod store;

pub use audit::AuditEntry;
pub use contact::ContactProfile;
pub use error::StateError;
pub use store::{CampaignStore, EventInsert, TransitionResult, UnresolvedEvent};
