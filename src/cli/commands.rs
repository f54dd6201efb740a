//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - encode: print one packet
//! - drive: stream stick positions from stdin to the robot
//! - chatter: connect and send numbered messages on a timer

use clap::{Parser, Subcommand};
use robolink::protocol::{Component, Index, Operation, Receiver, Transmitter};
use std::path::PathBuf;

/// Robolink - remote-control client for a wheeled robot
#[derive(Parser, Debug)]
#[command(name = "robolink")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write logs to this file instead of the default location
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print one encoded packet
    Encode {
        /// Sender (controller_board, main_board, master)
        transmitter: Transmitter,

        /// Addressee (all, controller_board, main_board, master)
        receiver: Receiver,

        /// write, ack, read, answer or message
        operation: Operation,

        /// Target component (drive, arm, headlight, ...)
        component: Component,

        /// slot1..slot6 or all
        index: Index,

        /// Integer payload
        #[arg(allow_negative_numbers = true)]
        payload: Vec<i32>,

        /// Number of packets to print, showing the id sequence
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
    },

    /// Connect and send motor speeds for each "x y" line read from stdin
    Drive {
        /// Robot address, overrides the config file
        #[arg(short, long)]
        url: Option<String>,

        /// Clamp bound for stick axes and motor speeds
        #[arg(short, long)]
        bound: Option<i32>,
    },

    /// Connect and send numbered messages on a timer
    Chatter {
        /// Robot address, overrides the config file
        #[arg(short, long)]
        url: Option<String>,

        /// Milliseconds between messages
        #[arg(short, long)]
        interval_ms: Option<u64>,

        /// Message prefix
        #[arg(short, long)]
        prefix: Option<String>,

        /// Stop after this many seconds (runs until Ctrl-C when omitted)
        #[arg(short, long)]
        duration_secs: Option<u64>,
    },
}
