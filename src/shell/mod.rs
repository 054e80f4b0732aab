pub mod completion;
pub mod executor;
pub mod history;
pub mod parser;
pub mod readline;
#[allow(clippy::module_inception)]
mod shell;

pub use shell::Shell;
