pub mod builtins;
pub mod command;
pub mod error;
pub mod handle;
pub mod pipeline;

pub use builtins::BUILTINS;
pub use pipeline::{build_stages, run, Flow};
