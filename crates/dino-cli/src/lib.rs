//! Command-line front end for the dino character voice.
//!
//! `main.rs` is the composition root; this library holds the parser, the
//! settings overlay and the command handlers so they can be tested.

pub mod commands;
pub mod handlers;
pub mod parser;
pub mod settings;

pub use commands::Commands;
pub use parser::Cli;
