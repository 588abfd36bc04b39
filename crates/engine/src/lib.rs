pub mod config;
pub mod consent;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod reconciler;
pub mod retry;
pub mod runner;
pub mod scheduler;

pub use config::{EngineConfig, SignaturePolicy};
pub use consent::allowed;
pub use dispatcher::{DispatchOutcome, MessageDispatcher};
pub use error::EngineError;
pub use metrics::EngineMetrics;
pub use orchestrator::{FunnelOrchestrator, StepTable};
pub use reconciler::{IngestOutcome, WebhookReconciler};
pub use retry::RetryStrategy;
pub use runner::EngineRunner;
pub use scheduler::{MemoryScheduler, ScheduledTask, Scheduler};
