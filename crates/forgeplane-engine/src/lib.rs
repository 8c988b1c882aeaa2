pub mod context;
pub mod engine;
pub mod error;
pub mod executor;
pub mod runner;

pub use context::ExecutionContext;
pub use engine::OrchestrationEngine;
pub use error::EngineError;
pub use executor::Executor;
pub use runner::{create_runner, WorkflowInput, WorkflowRunner};
