use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};

mod cli;
mod util;
mod cmd_watch;
mod cmd_restore;
mod cmd_list;
mod cmd_delete;
mod cmd_status;
mod cmd_stop;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт info.
    // Пример: RUST_LOG=debug undoai watch
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    match cli.cmd {
        cli::Cmd::Watch => cmd_watch::exec(),

        cli::Cmd::Restore {
            id,
            latest,
            interactive,
            files,
            pattern,
            yes,
        } => cmd_restore::exec(cmd_restore::RestoreArgs {
            id,
            latest,
            interactive,
            files,
            pattern,
            yes,
        }),

        cli::Cmd::List { json } => cmd_list::exec(json),

        cli::Cmd::Delete { id } => cmd_delete::exec(id),

        // Status supports --json flag
        cli::Cmd::Status { json } => cmd_status::exec(json),

        cli::Cmd::Stop => cmd_stop::exec(),
    }
}
