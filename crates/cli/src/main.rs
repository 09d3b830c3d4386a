///! # CLI - Record Store Interactive Shell
///!
///! A REPL-style command-line interface over a record store of string
///! records. Reads commands from stdin, executes them, and prints results to
///! stdout. Works interactively or scripted (pipe commands via stdin). Logs go
///! to stderr.
///!
///! ## Commands
///!
///! ```text
///! NEW                     Generate a new stream id
///! PEEK                    Show the most recently generated stream id
///! APPEND id value         Append a record to a stream (prints its index)
///! READ id index           Read one record
///! COUNT id                Number of records in a stream
///! SYNC                    Write the sidecar now
///! NUKE                    Delete both files; the store is unusable afterwards
///! STATS                   Print store debug info
///! EXIT / QUIT             Shut down (writes the sidecar)
///! ```
///!
///! ## Configuration
///!
///! ```text
///! RETSTORE_DIR       base directory              (default: "data")
///! RETSTORE_NAME      store name                  (default: "store")
///! RETSTORE_RECOVER   recover existing files      (default: "true")
///! RETSTORE_DEBUG     per-operation debug logs    (default: "false")
///! RUST_LOG           overrides the log filter
///! ```
///!
///! ## Example
///!
///! ```text
///! $ cargo run -p cli
///! retstore started (name=store, dir=data, cursor=0)
///! > NEW
///! 0
///! > APPEND 0 hello world
///! OK 0
///! > READ 0 0
///! hello world
///! > EXIT
///! bye
///! ```
mod shell;

use anyhow::Result;
use config::StoreConfig;
use shell::{Reply, Shell};
use std::io::{self, BufRead, Write};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let config = StoreConfig::from_env();
    init_tracing(config.debug);

    let shell = Shell::open(config)?;
    println!("{}", shell.banner());
    println!("Commands: NEW | PEEK | APPEND id value | READ id index | COUNT id");
    println!("          SYNC | NUKE | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        match shell.execute(&line) {
            Reply::Line(text) => println!("{}", text),
            Reply::Empty => {}
            Reply::Exit => {
                info!("shutting down");
                println!("bye");
                break;
            }
        }

        print!("> ");
        io::stdout().flush().ok();
    }

    Ok(())
}
