// This file is part of Opguard.
//
// Opguard is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Opguard is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Opguard.
// If not, see https://www.gnu.org/licenses/.

use std::{fs, path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use ethers::types::Address;
use jsonrpsee::server::Server;
use opguard_rpc::{DebugApiImpl, DebugApiServer, ValidatorApiImpl, ValidatorApiServer};
use opguard_sim::{
    eth, precheck,
    reputation::MemoryReputation,
    simulation::StateSnapshot,
    Settings, Simulator, SimulatorImpl,
};
use opguard_types::{consts, PackedUserOperation};
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "opguard", about = "Standalone ERC-4337 user operation validator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate a user operation from a JSON file and print the result.
    Check {
        /// Path to the user operation JSON file.
        op: PathBuf,
        /// Optional state snapshot seeding the embedded EVM.
        #[arg(long)]
        state: Option<PathBuf>,
        /// Entry point address to simulate against.
        #[arg(long)]
        entry_point: Option<String>,
    },
    /// Serve the validator over JSON-RPC.
    Serve {
        /// Socket address to listen on.
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: String,
        /// Entry point address to simulate against.
        #[arg(long)]
        entry_point: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Check {
            op,
            state,
            entry_point,
        } => check(op, state, entry_point),
        Command::Serve { addr, entry_point } => serve(addr, entry_point).await,
    }
}

fn resolve_entry_point(entry_point: Option<String>) -> anyhow::Result<Address> {
    match entry_point {
        Some(text) => eth::parse_address(&text),
        None => Ok(consts::default_entry_point()),
    }
}

fn check(
    op_path: PathBuf,
    state: Option<PathBuf>,
    entry_point: Option<String>,
) -> anyhow::Result<ExitCode> {
    let text = fs::read_to_string(&op_path)
        .with_context(|| format!("reading {}", op_path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).context("user operation file is not valid JSON")?;

    let precheck_result = precheck::validate_user_op_structure(&value);
    if !precheck_result.is_valid {
        print_rejection(&precheck_result.errors)?;
        return Ok(ExitCode::FAILURE);
    }

    let op = PackedUserOperation::from_json(&value)?;
    let settings = Settings::default();
    if let Err(error) = precheck::check_verification_gas(&op, &settings) {
        print_rejection(&[error])?;
        return Ok(ExitCode::FAILURE);
    }

    let entry_point = resolve_entry_point(entry_point)?;
    let reputation = MemoryReputation::new(settings.throttle_threshold, settings.ban_threshold);
    let mut simulator = SimulatorImpl::new(entry_point, Arc::new(reputation), settings);
    if let Some(path) = state {
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let snapshot: StateSnapshot =
            serde_json::from_str(&text).context("state snapshot is not valid JSON")?;
        simulator.environment_mut().apply_snapshot(&snapshot);
    }

    let result = simulator.simulate_validation(&op);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(if result.is_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_rejection(errors: &[String]) -> anyhow::Result<()> {
    let rejection = serde_json::json!({
        "isValid": false,
        "errors": errors,
    });
    println!("{}", serde_json::to_string_pretty(&rejection)?);
    Ok(())
}

async fn serve(addr: String, entry_point: Option<String>) -> anyhow::Result<ExitCode> {
    let entry_point = resolve_entry_point(entry_point)?;
    let settings = Settings::default();
    let reputation = Arc::new(MemoryReputation::new(
        settings.throttle_threshold,
        settings.ban_threshold,
    ));
    let simulator = Arc::new(Mutex::new(SimulatorImpl::new(
        entry_point,
        Arc::clone(&reputation),
        settings,
    )));

    let server = Server::builder()
        .build(addr.as_str())
        .await
        .with_context(|| format!("binding {addr}"))?;
    let mut module = ValidatorApiImpl::new(simulator).into_rpc();
    module
        .merge(DebugApiImpl::new(reputation).into_rpc())
        .context("merging rpc modules")?;

    info!("listening on {addr}");
    info!("entry point: {entry_point:?}");
    let handle = server.start(module);
    handle.stopped().await;
    info!("validator server shutdown");
    Ok(ExitCode::SUCCESS)
}
