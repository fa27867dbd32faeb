//! CLI command definitions and dispatch for the `qloom` binary.
//!
//! Uses clap derive macros for argument parsing. Commands mirror the
//! thread lifecycle: `ask` drives an interactive session, `threads` and
//! `show` inspect checkpoints, `discard` removes one, `serve` exposes
//! the REST API.

pub mod ask;
pub mod discard;
pub mod render;
pub mod show;
pub mod threads;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use uuid::Uuid;

/// Ask questions of your database in plain language.
#[derive(Parser)]
#[command(name = "qloom", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a question and review the drafted queries interactively.
    Ask {
        /// The question to answer (prompted when omitted).
        question: Option<String>,

        /// Resume a suspended thread by id instead of starting a new one.
        #[arg(long)]
        resume: Option<String>,
    },

    /// List known threads, newest first.
    #[command(alias = "ls")]
    Threads {
        /// Maximum number of threads to list.
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Show one thread: status, transcript, and pending prompt.
    Show {
        /// Thread id to display.
        thread_id: String,
    },

    /// Delete a thread's checkpoint.
    #[command(alias = "rm")]
    Discard {
        /// Thread id to discard.
        thread_id: String,

        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// Start the REST API server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Parse a thread id argument into a UUID.
pub fn parse_thread_id(raw: &str) -> Result<Uuid> {
    raw.trim().parse::<Uuid>().map_err(|_| {
        anyhow::anyhow!("'{raw}' is not a thread id; run 'qloom threads' to list known threads")
    })
}
