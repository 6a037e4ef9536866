// User Interface module
// Slash commands driving the engine from a line-based front end

pub mod commands;

pub use commands::{Command, CommandProcessor, TransportHandler};
