//src/lib.rs
pub mod ast;
pub mod backend;
pub mod common;
pub mod error;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod pipeline;
pub mod semantics;
pub mod simulator;

pub use error::CompileError;
pub use pipeline::{CompileOptions, Outcome, Stage, Transcript, compile};
