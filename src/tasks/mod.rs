pub mod model;
pub mod repository;
pub mod service;
pub mod validation;

pub use model::{CreateTask, Task, UpdateTask};
pub use repository::{PgTaskRepository, TaskRepository};
pub use service::TaskError;
pub use validation::ValidationResult;
