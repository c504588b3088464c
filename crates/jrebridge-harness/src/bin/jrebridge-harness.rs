//! CLI entrypoint for jrebridge host tooling.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use jrebridge::{DynamicResolver, LaunchOptions, Launcher, logging};
use jrebridge_core::config::{DEFAULT_LAUNCHER_LIBRARY, LAUNCH_SYMBOL};

/// Probe and drive the embedded runtime launcher from a shell.
#[derive(Debug, Parser)]
#[command(name = "jrebridge-harness")]
#[command(about = "Probe entry points and launch an embedded JRE through jrebridge")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve one symbol in one library and print a JSON report.
    Resolve {
        /// Library path or soname.
        #[arg(long, default_value = DEFAULT_LAUNCHER_LIBRARY)]
        library: String,
        /// Symbol to look up.
        #[arg(long, default_value = LAUNCH_SYMBOL)]
        symbol: String,
    },
    /// Launch the runtime with the given arguments and exit with its status.
    Launch {
        /// Launcher library providing JLI_Launch.
        #[arg(long, default_value = DEFAULT_LAUNCHER_LIBRARY)]
        jli: String,
        /// Runtime library providing the fault handler.
        #[arg(long)]
        jvm: Option<String>,
        /// Leave signal dispositions untouched.
        #[arg(long)]
        no_trap_relay: bool,
        /// Runtime arguments; the first one is the program name.
        #[arg(last = true, required = true)]
        args: Vec<String>,
    },
    /// Print the signal table the trap relay works over as JSON.
    Signals,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Resolve { library, symbol } => {
            let report = jrebridge_harness::probe(&library, &symbol);
            println!("{}", report.to_json()?);
            Ok(if report.resolved {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Launch {
            jli,
            jvm,
            no_trap_relay,
            args,
        } => {
            logging::init();
            let launcher = Launcher::new(DynamicResolver::new(jli, jvm)).with_options(LaunchOptions {
                install_trap_relay: !no_trap_relay,
            });
            let status = launcher.launch(&args).unwrap_or_else(|err| {
                eprintln!("launch failed: {err}");
                err.status()
            });
            // Exit codes are 8-bit; negative statuses map to their low byte.
            Ok(ExitCode::from(status as u8))
        }
        Command::Signals => {
            let table = jrebridge_harness::signal_table();
            println!("{}", serde_json::to_string_pretty(&table)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
