pub mod combine;
pub mod config;
pub mod dirs;
pub mod error;
pub mod import_rewriter;
pub mod move_plan;
pub mod mover;
pub mod orchestrator;
pub mod resolver;
pub mod scanner;
pub mod util;
pub mod visitors;
pub mod writer;

pub use config::Config;
pub use error::{MoveError, SkipReason};
pub use move_plan::{MoveEntry, MoveKind, MovePlan};
pub use orchestrator::{ApplyReport, MoveOrchestrator};
pub use resolver::{ModulePath, ModuleResolver};
