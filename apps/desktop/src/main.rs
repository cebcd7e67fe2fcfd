use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use client_core::{
    spawn_bootstrap_driver, AuthorizedRequestIssuer, ChatBootstrap, ClientEvent, HttpChatBackend,
    JwtTokenProvider, SessionHandle,
};
use shared::domain::{UserId, UserRecord};
use tracing::info;
use url::Url;

#[derive(Parser, Debug)]
struct Args {
    /// Chat API base, e.g. `http://localhost:5000/api`.
    #[arg(long, env = "CHAT_API_URL")]
    server_url: Url,
    #[arg(long)]
    user_id: String,
    #[arg(long, default_value = "")]
    email: String,
    #[arg(long, default_value = "")]
    name: String,
    #[arg(long, env = "CHAT_TOKEN_SECRET", hide_env_values = true)]
    token_secret: String,
    #[arg(long, default_value_t = 60)]
    token_ttl_seconds: i64,
    /// Create a new chat after the initial load and show the refreshed list.
    #[arg(long)]
    new_chat: bool,
    #[arg(long, default_value_t = 15)]
    timeout_seconds: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
    let args = Args::parse();

    let session = SessionHandle::new(Arc::new(JwtTokenProvider::new(
        args.token_secret.as_bytes(),
        args.token_ttl_seconds,
    )));
    let issuer = AuthorizedRequestIssuer::new(args.server_url.clone(), session.clone());
    let bootstrap = ChatBootstrap::new(Arc::new(HttpChatBackend::new(issuer)), session.clone());
    let mut events = bootstrap.subscribe_events();
    let _driver = spawn_bootstrap_driver(&bootstrap);

    info!(server_url = %args.server_url, user_id = %args.user_id, "desktop: signing in");
    session.sign_in(UserRecord {
        id: UserId::new(args.user_id),
        email: args.email,
        display_name: args.name,
        avatar_url: String::new(),
    });

    let event = tokio::time::timeout(Duration::from_secs(args.timeout_seconds), events.recv())
        .await
        .context("timed out waiting for chat bootstrap")?
        .context("bootstrap event channel closed")?;
    if let ClientEvent::Error(message) = event {
        return Err(anyhow!("chat bootstrap failed: {message}"));
    }

    if args.new_chat {
        let chat = bootstrap.create_chat().await?;
        info!(chat_id = %chat.id, "desktop: chat created");
        bootstrap.refresh().await?;
    }

    let state = bootstrap.state().await;
    let selected = state.selected_chat.as_ref().map(|chat| chat.id.clone());
    for chat in &state.chats {
        let marker = if Some(&chat.id) == selected.as_ref() {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {}  {}  {}",
            chat.id,
            chat.updated_at,
            serde_json::to_string(&chat.extra)?
        );
    }

    Ok(())
}
