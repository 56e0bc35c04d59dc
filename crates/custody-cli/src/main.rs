//! Punto de entrada de `custody`.
//!
//! Configuración desde variables de entorno (`.env` si existe):
//! `DATABASE_URL`, `DATABASE_MIN_CONNECTIONS`, `DATABASE_MAX_CONNECTIONS`,
//! `CUSTODY_EXPORT_DIR`, `RUST_LOG`.

use clap::Parser;
use custody_cli::{execute, Cli, CliResult, Commands};
use tracing_subscriber::EnvFilter;

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging();

    if let Err(e) = run(&cli.command) {
        eprintln!("Error: {}", e.operator_message());
        std::process::exit(e.exit_code());
    }
}

/// Suscriptor `fmt` que también recibe los registros del facade `log`.
fn init_logging() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
                             .with_writer(std::io::stderr)
                             .init();
}

fn run(command: &Commands) -> CliResult<()> {
    if let Commands::Migrate = command {
        // build_pool aplica las migraciones pendientes
        custody_persistence::build_dev_pool_from_env()?;
        println!("schema up to date");
        return Ok(());
    }
    let ledger = custody_ledger::open_ledger_from_env()?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(command, &ledger, &mut out)
}
