// Unscoped endpoints (/ and /health) live in `system`; everything in `tasks`
// runs behind the tenant middleware and reaches the database through the
// tenant's schema.
pub mod system;
pub mod tasks;

pub use tasks::TaskStore;
