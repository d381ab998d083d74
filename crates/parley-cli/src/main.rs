//! Parley command-line client.
//!
//! Runs the full sync engine against an in-process simulated gateway and a
//! seeded conversation directory.
//!
//! # Usage
//!
//! ```bash
//! parley-cli --user-id 1 --name ana
//! RUST_LOG=parley_client=debug parley-cli
//! ```

use std::{io::Write, time::Duration};

use clap::Parser;
use parley_app::{Command, Runtime, RuntimeConfig, StaticCredentials, SystemEnv};
use parley_cli::{HELP, Input, Printer, conversation_list, parse};
use parley_core::{Credentials, Identity, Role};
use parley_harness::{SimDirectory, SimGateway};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parley command-line client
#[derive(Parser, Debug)]
#[command(name = "parley-cli")]
#[command(about = "Line-oriented Parley client against a simulated gateway")]
#[command(version)]
struct Args {
    /// Local user id
    #[arg(long, default_value = "1")]
    user_id: u64,

    /// Display name of the local user
    #[arg(long, default_value = "you")]
    name: String,

    /// Housekeeping interval in milliseconds
    #[arg(long, default_value = "500")]
    tick_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let gateway = SimGateway::new(args.user_id);
    let directory = SimDirectory::new(args.user_id);
    directory.seed(
        args.user_id + 1,
        &["hi, is the bike still for sale?", "it is", "great, can I pick it up tomorrow?"],
    );
    directory.seed(args.user_id + 2, &["thanks for the quick reply"]);

    let credentials = StaticCredentials::new(Credentials::new(
        format!("sim-token-{}", args.user_id),
        Identity::new(args.user_id, args.name, Role::Vendor),
    ));
    let config = RuntimeConfig {
        tick_interval: Duration::from_millis(args.tick_ms.max(1)),
        ..RuntimeConfig::default()
    };
    let (runtime, handle) =
        Runtime::new(SystemEnv::new(), gateway.clone(), directory, credentials, config);
    let task = tokio::spawn(runtime.run());

    let mut stdout = std::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut snapshots = handle.subscribe();
    let mut printer = Printer::new();

    writeln!(stdout, "{HELP}")?;
    handle.send(Command::Connect).await?;
    handle.send(Command::RefreshConversations).await?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let snapshot = handle.snapshot();

                match parse(&line, snapshot.active_conversation) {
                    Ok(Input::Run(command)) => handle.send(command).await?,
                    Ok(Input::Reply(text)) => {
                        let local = snapshot.identity.as_ref().map_or(args.user_id, |i| i.id);
                        let active =
                            snapshot.active_conversation.and_then(|id| snapshot.conversation(id));
                        match active {
                            Some(conversation) => {
                                gateway.deliver_from(
                                    conversation.counterpart(local),
                                    conversation.id,
                                    &text,
                                )?;
                            },
                            None => writeln!(stdout, "! no conversation open, use /open <id>")?,
                        }
                    },
                    Ok(Input::List) => {
                        for line in conversation_list(&snapshot) {
                            writeln!(stdout, "{line}")?;
                        }
                    },
                    Ok(Input::Help) => writeln!(stdout, "{HELP}")?,
                    Ok(Input::Quit) => break,
                    Ok(Input::Nothing) => {},
                    Err(err) => writeln!(stdout, "! {err}")?,
                }
            },

            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                for line in printer.update(&snapshot) {
                    writeln!(stdout, "{line}")?;
                }
            },
        }
    }

    handle.send(Command::Shutdown).await?;
    task.await?;
    Ok(())
}
