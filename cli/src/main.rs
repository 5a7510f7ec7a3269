//! eventindex CLI — inspect indexer defaults and configuration.
//!
//! Usage:
//! ```bash
//! eventindex info
//! eventindex version
//! ```

use std::env;
use std::process;

use eventindex_core::indexer::IndexerConfig;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "info" => cmd_info(),
        "version" | "--version" | "-V" => {
            println!("eventindex {}", env!("CARGO_PKG_VERSION"));
        }
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("eventindex {}", env!("CARGO_PKG_VERSION"));
    println!("Reorg-safe rollup event ingestion engine\n");
    println!("USAGE:");
    println!("    eventindex <COMMAND>\n");
    println!("COMMANDS:");
    println!("    info     Show eventindex configuration defaults");
    println!("    version  Print version");
    println!("    help     Print this help");
}

fn cmd_info() {
    let defaults = IndexerConfig::default();
    println!("eventindex v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default batch size: {} blocks/window", defaults.batch_size);
    println!("  Default poll interval: {} ms", defaults.poll_interval_ms);
    println!(
        "  Default subscription backoff: {} ms",
        defaults.subscription_backoff_ms
    );
    println!("  Sync modes: sync (resume), resync (from genesis)");
    println!("  Fork eras: legacy-l1, pacaya, shasta");
    println!("  Storage backends: memory, PostgreSQL");
}
