pub mod ast;
pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;

pub use ast::{Command, Redirect, RedirectMode};
pub use lexer::scan;
pub use parser::{parse_pipeline, Parser};
