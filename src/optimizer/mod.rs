//! # Optimizer Module
//!
//! Separa le responsabilità della normalizzazione in sottomoduli:
//! - `media_optimizer`: Orchestratore principale e worker pool
//! - `task_optimizer`: Worker per singoli file (classify + dispatch)
//! - `path_resolver`: Sanitizzazione delle chiavi e calcolo path di output

pub mod media_optimizer;
pub mod path_resolver;
pub mod task_optimizer;

pub use media_optimizer::{MediaOptimizer, RunSummary};
pub use path_resolver::{sanitize_path, OutputTarget, PathResolver};
pub use task_optimizer::{FileOutcome, TaskOptimizer};
