pub mod store;
pub mod projector;
pub mod state_machine;
pub mod check_in;
pub mod supabase;
pub mod memory;

pub use store::{PatientResolver, QueueStore};
pub use projector::QueueProjector;
pub use state_machine::{validate, QueueStateMachine, TimeGate, CONSULTATION_GRACE_MINUTES};
pub use check_in::CheckInQueue;
pub use supabase::{SupabasePatientResolver, SupabaseQueueStore};
pub use memory::{InMemoryPatientResolver, InMemoryQueueStore};
