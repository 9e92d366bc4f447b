//! CLI argument model for the relay server.
//!
//! Every flag falls back to an environment variable so the server can be
//! configured either way; nothing reads the environment after parsing.

pub mod cli_args;

pub use cli_args::Cli;
