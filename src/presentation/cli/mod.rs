use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::application::handlers::{DispatchEngine, DispatchEngineConfig};
use crate::application::services::{DispatchLock, NoopLock};
use crate::application::usecases::{EnqueueMailRequest, EnqueueMailUseCase, RetryDeferredUseCase};
use crate::config::Config;
use crate::domain::models::{NewAttachment, Priority};
use crate::domain::repositories::SuppressionListRepository;
use crate::domain::value_objects::Whitelist;
use crate::infrastructure::lock::PgAdvisoryLock;
use crate::infrastructure::repositories::postgres::{
    PgPool, PostgresDeliveryLogRepository, PostgresMessageQueueRepository,
    PostgresSuppressionListRepository,
};
use crate::infrastructure::transport::SmtpMailTransport;

#[derive(Parser)]
#[command(name = "mailer", about = "Durable priority-ordered outbound mail queue")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Do one pass through the mail queue, attempting to send all mail.
    Send {
        /// The maximum number of mails to send.
        #[arg(short, long)]
        limit: Option<u32>,
        /// Do not take the cross-process send lock.
        #[arg(short = 'n', long = "no-lock")]
        no_lock: bool,
    },
    /// Attempt to resend any deferred mail.
    RetryDeferred {
        /// Tier the deferred mail is restored to.
        #[arg(long, default_value = "medium")]
        priority: String,
    },
    /// Run the service loop: poll the queue and send whenever it is non-empty.
    Serve,
    /// Put a new message on the queue.
    Enqueue {
        /// Recipient address; repeat for multiple recipients.
        #[arg(long = "to", required = true)]
        recipients: Vec<String>,
        #[arg(long = "from")]
        from_address: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        body: String,
        #[arg(long = "html-body")]
        html_body: Option<String>,
        #[arg(long, default_value = "medium")]
        priority: String,
        /// Attachment file path; repeat for multiple attachments.
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },
    /// Add an address to the suppression list.
    Suppress { address: String },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    match cli.command {
        Command::Send { limit, no_lock } => {
            let engine = build_engine(&config, pool, !no_lock)?;
            engine.run_pass(limit).await?;
            Ok(())
        }
        Command::RetryDeferred { priority } => {
            let priority = parse_priority(&priority)?;
            let usecase = RetryDeferredUseCase::new(PostgresMessageQueueRepository::new(pool));
            let count = usecase.execute(priority).await?;
            info!(count, "message(s) retried");
            Ok(())
        }
        Command::Serve => {
            let engine = build_engine(&config, pool, true)?;
            engine.run_forever().await
        }
        Command::Enqueue {
            recipients,
            from_address,
            subject,
            body,
            html_body,
            priority,
            attachments,
        } => {
            let priority = parse_priority(&priority)?;
            let attachments = attachments
                .iter()
                .map(|path| {
                    let content = std::fs::read(path)
                        .with_context(|| format!("failed to read attachment {}", path.display()))?;
                    let filename = path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string());
                    Ok(NewAttachment {
                        filename,
                        content,
                        mimetype: None,
                    })
                })
                .collect::<anyhow::Result<Vec<_>>>()?;

            let usecase = EnqueueMailUseCase::new(PostgresMessageQueueRepository::new(pool));
            let ids = usecase
                .execute(EnqueueMailRequest {
                    recipients,
                    from_address,
                    subject,
                    body,
                    html_body,
                    priority,
                    attachments,
                })
                .await?;
            info!(count = ids.len(), "message(s) queued");
            Ok(())
        }
        Command::Suppress { address } => {
            let repo = PostgresSuppressionListRepository::new(pool);
            let entry = repo.add(&address).await?;
            info!(address = %entry.address, "address suppressed");
            Ok(())
        }
    }
}

fn build_engine(config: &Config, pool: PgPool, use_locking: bool) -> anyhow::Result<DispatchEngine> {
    let whitelist = match &config.whitelist_patterns {
        Some(patterns) => Whitelist::from_patterns(patterns)?,
        None => Whitelist::allow_all(),
    };

    // The no-op lock is a second implementation of the same capability,
    // selected here rather than branched on inside the engine.
    let lock: Arc<dyn DispatchLock> = if use_locking {
        PgAdvisoryLock::new(pool.clone())
    } else {
        Arc::new(NoopLock)
    };

    Ok(DispatchEngine::new(
        PostgresMessageQueueRepository::new(pool.clone()),
        PostgresSuppressionListRepository::new(pool.clone()),
        PostgresDeliveryLogRepository::new(pool),
        SmtpMailTransport::new(&config.smtp)?,
        lock,
        DispatchEngineConfig {
            lock_wait: config.lock_wait_timeout,
            empty_queue_sleep: config.empty_queue_sleep,
            whitelist,
        },
    ))
}

fn parse_priority(label: &str) -> anyhow::Result<Priority> {
    Priority::from_label(label)
        .ok_or_else(|| anyhow::anyhow!("invalid priority {label:?}, expected high, medium or low"))
}
