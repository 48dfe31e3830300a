use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use gtags_index::cli::{
    parse_command, print_help, print_version, wants_help, wants_version, Command,
};
use gtags_index::handlers::{
    handle_call_sites, handle_callers, handle_definition, handle_rebuild, handle_refs,
    handle_search,
};
use gtags_index::navigate::CancellationFlag;
use gtags_index::retrieval::SearchSession;
use gtags_index::tools::GlobalCli;
use gtags_index::{logging, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let args = std::env::args().collect::<Vec<_>>();
    if wants_help(&args) {
        print_help();
        return Ok(());
    }
    if wants_version(&args) {
        print_version();
        return Ok(());
    }

    let command = parse_command(&args)?;
    let config = Config::from_env()?;
    let _log_guard = logging::init(&config.log_dir)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        base_dir = %config.base_dir.display(),
        "Starting gtags-index"
    );

    if let Err(err) = run(config, command).await {
        error!(error = %err, "Command failed");
        return Err(err);
    }
    Ok(())
}

async fn run(config: Config, command: Command) -> Result<()> {
    let tool = Arc::new(GlobalCli::from_config(&config));
    let state = AppState::new(config, tool)?;

    match command {
        Command::Build => print_json(&handle_rebuild(&state).await?),
        Command::Search { query } if !query.is_empty() => {
            print_json(&handle_search(&state, &query.join(" "))?)
        }
        Command::Search { .. } => interactive_search(&state).await,
        Command::Def { name } => {
            let cancel = CancellationFlag::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c.cancel();
                }
            });
            let def = handle_definition(&state, &name, &cancel).await?;
            match def.location {
                Some(loc) => println!("{}:{}:{}", def.file, loc.line, loc.column),
                None => println!("{}", def.file),
            }
            Ok(())
        }
        Command::Refs { symbol } => print_json(&handle_refs(&state, &symbol).await?),
        Command::Callers { symbol, depth } => {
            print_json(&handle_callers(&state, &symbol, depth).await?)
        }
        Command::CallSites { symbol } => print_json(&handle_call_sites(&state, &symbol).await?),
    }
}

/// One session over stdin: one query per line, session cache dropped at EOF.
async fn interactive_search(state: &AppState) -> Result<()> {
    let mut session =
        SearchSession::new(&state.store).with_prefix_match(state.config.token_prefix_match);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        let hits = session.search(query)?;
        println!("{}", serde_json::to_string(&hits)?);
    }
    session.reset();
    Ok(())
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
