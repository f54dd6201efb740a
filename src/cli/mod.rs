//! CLI module for robolink - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for encoding packets,
//! driving the robot from stdin, and exercising the link with chatter.

pub mod commands;

pub use commands::Cli;
