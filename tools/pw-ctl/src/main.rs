//! pw-ctl: command line client for the package worker.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use shared_types::{TransactionId, TransactionStatus, WorkerNotification, WorkerRequest, WorkerResponse};

use pw_ctl::{parse_instructions, WorkerClient};

/// Talk to the package worker over its Unix socket.
#[derive(Parser, Debug)]
#[command(name = "pw-ctl")]
#[command(about = "Queue and inspect package transactions")]
struct Args {
    /// Worker socket path
    #[arg(short, long, default_value = "/run/pkg-worker/worker.sock")]
    socket: PathBuf,

    /// Follow a queued transaction until it finishes
    #[arg(short, long, global = true)]
    wait: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh the package lists
    UpdateCache,
    /// Install a local package file
    InstallFile { path: PathBuf },
    /// Upgrade installed packages
    Upgrade {
        /// Only upgrades that need no new installs or removals
        #[arg(long)]
        safe: bool,
    },
    /// Download package archives into a directory
    Download {
        #[arg(short, long)]
        destination: PathBuf,
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Apply package changes given as name=action pairs
    Commit {
        #[arg(required = true)]
        instructions: Vec<String>,
    },
    /// Write a file as root
    WriteFile {
        path: PathBuf,
        /// File contents
        contents: String,
    },
    /// Copy an archive into the archive cache
    CopyArchive { archive: PathBuf },
    /// Cancel a queued or running transaction
    Cancel { id: TransactionId },
    /// Show one transaction
    Status { id: TransactionId },
    /// Show queue membership
    Queue,
    /// Print worker metrics
    Metrics,
    /// Print notifications as they arrive
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut client = WorkerClient::connect(&args.socket).await?;

    let request = match args.command {
        Command::UpdateCache => WorkerRequest::UpdateCache,
        Command::InstallFile { path } => WorkerRequest::InstallFile { path },
        Command::Upgrade { safe } => WorkerRequest::UpgradeSystem { safe },
        Command::Download {
            destination,
            packages,
        } => WorkerRequest::DownloadArchives {
            packages,
            destination,
        },
        Command::Commit { instructions } => WorkerRequest::CommitChanges {
            instructions: parse_instructions(&instructions).map_err(anyhow::Error::msg)?,
        },
        Command::WriteFile { path, contents } => WorkerRequest::WriteFileToDisk { contents, path },
        Command::CopyArchive { archive } => WorkerRequest::CopyArchiveToCache {
            archive_path: archive,
        },
        Command::Cancel { id } => WorkerRequest::CancelTransaction { id },
        Command::Status { id } => WorkerRequest::GetTransaction { id },
        Command::Queue => WorkerRequest::GetQueue,
        Command::Metrics => WorkerRequest::GetMetrics,
        Command::Watch => return watch(&mut client).await,
    };

    let response = client
        .call(request)
        .await
        .context("request failed")?;

    match response {
        WorkerResponse::TransactionId(id) => {
            println!("{id}");
            if args.wait {
                let status = client.wait_for(id, print_notification).await?;
                if status != TransactionStatus::Finished {
                    bail!("transaction {id} ended {status}");
                }
            }
        }
        WorkerResponse::Bool(ok) => {
            println!("{ok}");
            if !ok {
                std::process::exit(1);
            }
        }
        WorkerResponse::Transaction(snapshot) => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        WorkerResponse::Queue(queue) => {
            match queue.active {
                Some(active) => println!("active: {active}"),
                None => println!("active: -"),
            }
            for id in &queue.queue {
                println!("  {id}");
            }
        }
        WorkerResponse::Metrics(text) => print!("{text}"),
        WorkerResponse::Error(e) => bail!("{e}"),
    }

    Ok(())
}

async fn watch(client: &mut WorkerClient) -> Result<()> {
    if let WorkerResponse::Queue(queue) = client.call(WorkerRequest::GetQueue).await? {
        print_notification(&WorkerNotification::QueueChanged(queue));
    }
    loop {
        let notification = client.next_notification().await?;
        print_notification(&notification);
    }
}

fn print_notification(notification: &WorkerNotification) {
    match notification {
        WorkerNotification::QueueChanged(queue) => {
            let ids: Vec<String> = queue.queue.iter().map(ToString::to_string).collect();
            println!("queue [{}]", ids.join(", "));
        }
        WorkerNotification::TransactionStatusChanged { id, status, error } => match error {
            Some(e) => println!("{id} {status}: {e}"),
            None => println!("{id} {status}"),
        },
        WorkerNotification::TransactionProgress { id, progress } => {
            match &progress.status_message {
                Some(message) => println!("{id} {:>3}% {message}", progress.percentage),
                None => println!("{id} {:>3}%", progress.percentage),
            }
        }
    }
}
