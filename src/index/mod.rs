pub mod analysis;
pub mod definition;
pub mod registry;
pub mod suspend;

pub use definition::{DynamicPolicy, IndexBuilder, IndexDefinition};
pub use registry::SyncRegistry;
pub use suspend::{suspended_updates, updates_suspended, SuspendGuard};
