pub mod consent;
pub mod dispatch;
pub mod enrollment;
pub mod error;
pub mod event;
pub mod step;
pub mod types;
pub mod workflow;

pub use consent::ConsentSnapshot;
pub use dispatch::{DispatchRecord, DispatchStatus};
pub use enrollment::{Attendance, Enrollment};
pub use error::CadenceError;
pub use event::{EngagementKind, ProviderEvent};
pub use step::{StepDefinition, StepPrecondition};
pub use types::{
    Channel, ContactId, EnrollmentId, EventId, ProviderId, ProviderMessageId, StepId, WorkflowId,
};
pub use workflow::{FunnelKind, WorkflowInstance, WorkflowStatus};
