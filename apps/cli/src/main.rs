use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlbridge_blob::{CancelPolicy, ProgressIndicator, UploadJob};
use sqlbridge_protocol::{IsolationLevel, QueryResult};
use sqlbridge_session::RemoteConnection;
use sqlbridge_transport::TransportConfig;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const PROGRESS_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "sqlbridge")]
#[command(about = "Run statements and upload BLOBs against a sqlbridge server")]
struct Cli {
    /// JSON transport configuration (baseUrl, credentials, proxy, timeoutMs).
    #[arg(long, short)]
    config: PathBuf,

    /// Overrides the configured request timeout.
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Runs a query and prints its rows as tab-separated values.
    Query { sql: String },
    /// Runs a statement and prints the affected row count.
    Update {
        sql: String,
        /// Wraps the statement in a transaction at this isolation level.
        #[arg(long)]
        transaction: Option<IsolationLevel>,
    },
    /// Uploads a file as a BLOB.
    Upload {
        blob_id: String,
        file: PathBuf,
        /// Keeps uploading when interrupted with Ctrl-C.
        #[arg(long)]
        no_cancel: bool,
    },
    /// Sets the session isolation level (e.g. read-committed).
    Isolation { level: IsolationLevel },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let conn = connect(&cli.config, cli.timeout_ms)?;

    let outcome = match cli.command {
        Command::Query { sql } => run_query(&conn, &sql).await,
        Command::Update { sql, transaction } => run_update(&conn, &sql, transaction).await,
        Command::Upload {
            blob_id,
            file,
            no_cancel,
        } => run_upload(&conn, blob_id, &file, no_cancel).await,
        Command::Isolation { level } => run_isolation(&conn, level).await,
    };

    if let Err(e) = conn.close().await {
        tracing::warn!("failed to close connection: {e}");
    }
    outcome
}

fn connect(path: &Path, timeout_ms: Option<u64>) -> Result<RemoteConnection> {
    let mut config = TransportConfig::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    if let Some(ms) = timeout_ms {
        config = config.with_timeout_ms(ms);
    }
    RemoteConnection::connect(config).context("failed to open connection")
}

/// Cancels the returned token on Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    token
}

async fn run_isolation(conn: &RemoteConnection, level: IsolationLevel) -> Result<()> {
    conn.set_transaction_isolation(level)
        .await
        .context("failed to set isolation level")?;
    println!("isolation set to {level}");
    Ok(())
}

async fn run_query(conn: &RemoteConnection, sql: &str) -> Result<()> {
    let cancel = interrupt_token();
    let result = conn
        .execute_query(sql, Some(&cancel))
        .await
        .context("query failed")?;
    print_rows(&result);
    Ok(())
}

fn print_rows(result: &QueryResult) {
    println!("{}", result.columns.join("\t"));
    for row in &result.rows {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| match cell {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => "NULL".into(),
                other => other.to_string(),
            })
            .collect();
        println!("{}", cells.join("\t"));
    }
    println!("({} rows)", result.len());
}

async fn run_update(
    conn: &RemoteConnection,
    sql: &str,
    transaction: Option<IsolationLevel>,
) -> Result<()> {
    let Some(level) = transaction else {
        let count = conn.execute_update(sql, None).await.context("update failed")?;
        println!("{count} rows affected");
        return Ok(());
    };

    if level != IsolationLevel::Unspecified {
        conn.set_transaction_isolation(level)
            .await
            .context("failed to set isolation level")?;
    }
    let tx = conn.begin(level).await.context("failed to begin transaction")?;

    match conn.execute_update(sql, None).await {
        Ok(count) => {
            tx.commit().await.context("commit failed")?;
            println!("{count} rows affected (committed, {})", tx.isolation_wire_token());
            Ok(())
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!("rollback failed: {rollback_err}");
            }
            Err(e).context("update failed, transaction rolled back")
        }
    }
}

async fn run_upload(
    conn: &RemoteConnection,
    blob_id: String,
    file: &Path,
    no_cancel: bool,
) -> Result<()> {
    let job = UploadJob::from_file(blob_id, file)
        .await
        .with_context(|| format!("failed to open {}", file.display()))?;
    let indicator = Arc::new(ProgressIndicator::new(0));
    let cancel = interrupt_token();
    let policy = if no_cancel {
        CancelPolicy::Ignore
    } else {
        CancelPolicy::Honor
    };

    let upload = conn.upload_blob(job, Some(Arc::clone(&indicator)), &cancel, policy);
    tokio::pin!(upload);

    let mut ticker = tokio::time::interval(PROGRESS_POLL_INTERVAL);
    let mut last_shown = None;
    let result = loop {
        tokio::select! {
            result = &mut upload => break result,
            _ = ticker.tick() => {
                let value = indicator.get();
                if last_shown != Some(value) {
                    eprintln!("upload {value}%");
                    last_shown = Some(value);
                }
            }
        }
    };

    match result {
        Ok(()) => {
            eprintln!("upload {}%", indicator.get());
            println!("uploaded {}", file.display());
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            anyhow::bail!("upload cancelled at {}%", indicator.get())
        }
        Err(e) => Err(e).context("upload failed"),
    }
}
