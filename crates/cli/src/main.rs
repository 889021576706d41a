//! Entry point for the command-line interface.
//! Delegates to dedicated modules for argument handling,
//! scanning, inspection and output formatting.

use undisposed::args::{parse_cli, Commands};
use undisposed::config::handle_config;
use undisposed::explain::run_explain;
use undisposed::inspect::run_inspect;
use undisposed::scan::run_scan;

fn main() -> anyhow::Result<()> {
    let cli = parse_cli();
    match cli.command {
        Commands::Scan(args) => run_scan(args),
        Commands::Inspect(args) => run_inspect(args),
        Commands::Explain(args) => run_explain(args),
        Commands::Config(cmd) => handle_config(cmd),
    }
}
