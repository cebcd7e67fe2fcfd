use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use shared::domain::UserId;
use storage::Storage;
use user_sync::{WebhookVerifier, SVIX_ID_HEADER, SVIX_SIGNATURE_HEADER, SVIX_TIMESTAMP_HEADER};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/users.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print svix headers for a payload read from a file or stdin.
    SignWebhook {
        #[arg(long, env = "SIGNING_SECRET", hide_env_values = true)]
        secret: String,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        msg_id: Option<String>,
        /// Seconds since the epoch; defaults to now.
        #[arg(long)]
        timestamp: Option<i64>,
    },
    ListUsers,
    ShowUser {
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::SignWebhook {
            secret,
            file,
            msg_id,
            timestamp,
        } => {
            let body = match file {
                Some(path) => fs::read(&path)
                    .with_context(|| format!("failed to read payload '{}'", path.display()))?,
                None => {
                    let mut buf = Vec::new();
                    io::stdin()
                        .read_to_end(&mut buf)
                        .context("failed to read payload from stdin")?;
                    buf
                }
            };
            let verifier = WebhookVerifier::new(&secret).context("invalid signing secret")?;
            let msg_id = msg_id.unwrap_or_else(|| format!("msg_{}", uuid::Uuid::new_v4().simple()));
            let timestamp = timestamp.unwrap_or_else(|| Utc::now().timestamp());
            println!("{SVIX_ID_HEADER}: {msg_id}");
            println!("{SVIX_TIMESTAMP_HEADER}: {timestamp}");
            println!(
                "{SVIX_SIGNATURE_HEADER}: {}",
                verifier.sign(&msg_id, timestamp, &body)
            );
        }
        Command::ListUsers => {
            let storage = Storage::new(&cli.database_url).await?;
            for user in storage.list_users().await? {
                println!("{}\t{}\t{}", user.id, user.email, user.display_name);
            }
        }
        Command::ShowUser { id } => {
            let storage = Storage::new(&cli.database_url).await?;
            match storage.get_user(&UserId::new(id.clone())).await? {
                Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
                None => println!("no user with id={id}"),
            }
        }
    }

    Ok(())
}
