pub mod store;

pub use store::MemoryCampaignStore;
