//! dyntables: define relational tables at runtime
//!
//! Operator CLI over the schema engine. Every command works against one
//! SQLite database, resolved from `--db`, `DYNTABLES_DB`, `config.toml` or
//! the default under `~/.dyntables/`.
//!
//! ```text
//! dyntables provision users -f email:string -f age:number
//! dyntables append 1 -f active:boolean
//! dyntables show 1
//! ```

use clap::{Parser, Subcommand};
use dyntables_logging::{init_logging, LogConfig};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

use cli::config::ConfigArgs;
use cli::table::{ChangeArgs, IdArgs, ListArgs, ProvisionArgs, TableCommand};

#[derive(Parser, Debug)]
#[command(name = "dyntables", version, about = "Define relational tables at runtime")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Database file (overrides DYNTABLES_DB and config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new table and its catalog record
    Provision(ProvisionArgs),

    /// Drop and recreate a table with a new field list (all rows are lost)
    Replace(ChangeArgs),

    /// Add fields to a table, keeping its rows
    Append(ChangeArgs),

    /// Show the current fields of a table
    Show(IdArgs),

    /// List managed tables
    List(ListArgs),

    /// Compare a table's catalog record with the live table
    Check(IdArgs),

    /// Show resolved paths and settings
    Config(ConfigArgs),
}

fn command_wants_json(command: &Commands) -> bool {
    match command {
        Commands::Provision(args) => args.json,
        Commands::Replace(args) | Commands::Append(args) => args.json,
        Commands::Show(args) | Commands::Check(args) => args.json,
        Commands::List(args) => args.json,
        Commands::Config(args) => args.json,
    }
}

fn run_command(cli: Cli) -> anyhow::Result<u8> {
    let db = cli.db.as_deref();
    let command = match cli.command {
        Commands::Config(args) => {
            cli::config::run(args, db)?;
            return Ok(0);
        }
        Commands::Provision(args) => TableCommand::Provision(args),
        Commands::Replace(args) => TableCommand::Replace(args),
        Commands::Append(args) => TableCommand::Append(args),
        Commands::Show(args) => TableCommand::Show(args),
        Commands::List(args) => TableCommand::List(args),
        Commands::Check(args) => TableCommand::Check(args),
    };
    cli::table::run(command, db)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = command_wants_json(&cli.command);

    let log_dir = match cli::config::Config::load() {
        Ok(config) if config.logging.file => Some(cli::config::logs_dir()),
        _ => None,
    };
    let _log_guard = match init_logging(LogConfig {
        app_name: "dyntables",
        verbose: cli.verbose,
        log_dir,
    }) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Warning: failed to initialize logging: {:#}", err);
            None
        }
    };

    match run_command(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            if json_mode {
                cli::error::print_json_error(&err);
            } else if err.downcast_ref::<cli::error::HelpfulError>().is_some() {
                eprint!("{}", err);
            } else {
                eprintln!("ERROR: {:#}", err);
            }
            ExitCode::from(cli::error::exit_code(&err))
        }
    }
}
