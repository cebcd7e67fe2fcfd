use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use shared::domain::{Chat, ChatId, UserId};
use tokio::{
    sync::{broadcast, watch, Mutex, RwLock},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{backend::ChatBackend, error::ClientError, session::SessionHandle};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientChatState {
    pub chats: Vec<Chat>,
    pub selected_chat: Option<Chat>,
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    ChatsCommitted {
        chats: Vec<Chat>,
        selected: Option<Chat>,
    },
    Error(String),
}

/// Loads the signed-in user's chats, creating the first one when the list
/// is empty, and keeps the most recently updated chat selected.
pub struct ChatBootstrap {
    backend: Arc<dyn ChatBackend>,
    session: SessionHandle,
    state: RwLock<ClientChatState>,
    flights: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
    events: broadcast::Sender<ClientEvent>,
    // Never sent on; receivers see it close when the bootstrap is dropped.
    lifetime: watch::Sender<()>,
}

impl ChatBootstrap {
    pub fn new(backend: Arc<dyn ChatBackend>, session: SessionHandle) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        let (lifetime, _) = watch::channel(());
        Arc::new(Self {
            backend,
            session,
            state: RwLock::new(ClientChatState::default()),
            flights: Mutex::new(HashMap::new()),
            events,
            lifetime,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub async fn state(&self) -> ClientChatState {
        self.state.read().await.clone()
    }

    pub async fn chats(&self) -> Vec<Chat> {
        self.state.read().await.chats.clone()
    }

    pub async fn selected_chat(&self) -> Option<Chat> {
        self.state.read().await.selected_chat.clone()
    }

    pub async fn select_chat(&self, id: &ChatId) -> Result<Chat, ClientError> {
        let mut state = self.state.write().await;
        let chat = state
            .chats
            .iter()
            .find(|chat| &chat.id == id)
            .cloned()
            .ok_or_else(|| ClientError::UnknownChat(id.clone()))?;
        state.selected_chat = Some(chat.clone());
        Ok(chat)
    }

    /// Creates a chat without touching local state; callers `refresh` to
    /// pick it up.
    pub async fn create_chat(&self) -> Result<Chat, ClientError> {
        if !self.session.is_ready() {
            return Err(ClientError::AuthUnavailable);
        }
        self.backend.create_chat().await
    }

    pub async fn refresh(&self) -> Result<ClientChatState, ClientError> {
        self.run().await
    }

    /// One full bootstrap pass. On failure the previously committed state is
    /// left as it was.
    pub async fn run(&self) -> Result<ClientChatState, ClientError> {
        let result = self.run_guarded().await;
        match &result {
            Ok(state) => {
                let _ = self.events.send(ClientEvent::ChatsCommitted {
                    chats: state.chats.clone(),
                    selected: state.selected_chat.clone(),
                });
            }
            Err(error) => {
                warn!(%error, "bootstrap: run aborted");
                let _ = self.events.send(ClientEvent::Error(error.to_string()));
            }
        }
        result
    }

    async fn run_guarded(&self) -> Result<ClientChatState, ClientError> {
        let user = match self.session.current_user() {
            Some(user) if self.session.is_ready() => user,
            _ => return Err(ClientError::AuthUnavailable),
        };

        let flight = {
            let mut flights = self.flights.lock().await;
            Arc::clone(flights.entry(user.id.clone()).or_default())
        };
        let result = {
            let _guard = flight.lock().await;
            self.fetch_and_commit(&user.id).await
        };

        let mut flights = self.flights.lock().await;
        // Only the map and this run still hold it: nobody is waiting.
        if Arc::strong_count(&flight) == 2 {
            flights.remove(&user.id);
        }
        result
    }

    async fn fetch_and_commit(&self, user_id: &UserId) -> Result<ClientChatState, ClientError> {
        let mut chats = self.backend.list_chats().await?;
        debug!(user_id = %user_id, count = chats.len(), "bootstrap: fetched chats");

        if chats.is_empty() {
            let created = self.backend.create_chat().await?;
            info!(user_id = %user_id, chat_id = %created.id, "bootstrap: created first chat");
            chats.push(created);
        }

        sort_by_recent_update(&mut chats);
        let committed = ClientChatState {
            selected_chat: chats.first().cloned(),
            chats,
        };
        *self.state.write().await = committed.clone();

        info!(
            user_id = %user_id,
            count = committed.chats.len(),
            selected = ?committed.selected_chat.as_ref().map(|chat| &chat.id),
            "bootstrap: chats committed"
        );
        Ok(committed)
    }
}

/// Newest first. `sort_by` is stable, so equal timestamps keep fetch order.
pub fn sort_by_recent_update(chats: &mut [Chat]) {
    chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

/// Runs the bootstrap each time the gate opens, or the signed-in user
/// changes while it is open. Holds the bootstrap weakly and stops once the
/// session or the bootstrap is gone.
pub fn spawn_bootstrap_driver(bootstrap: &Arc<ChatBootstrap>) -> JoinHandle<()> {
    let mut updates = bootstrap.session.subscribe();
    let mut lifetime = bootstrap.lifetime.subscribe();
    let bootstrap: Weak<ChatBootstrap> = Arc::downgrade(bootstrap);

    tokio::spawn(async move {
        // The opening counter catches a close and reopen that happened while
        // a run was in flight, even though only the latest value is kept.
        let mut last_opening: Option<(u64, UserId)> = None;
        loop {
            let opening = {
                let session = updates.borrow_and_update();
                session
                    .user
                    .as_ref()
                    .filter(|_| session.is_ready())
                    .map(|user| (session.opened, user.id.clone()))
            };

            if opening.is_some() && opening != last_opening {
                let Some(bootstrap) = bootstrap.upgrade() else {
                    break;
                };
                let _ = bootstrap.run().await;
            }
            last_opening = opening;

            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = lifetime.changed() => break,
            }
        }
        debug!("bootstrap: driver stopped");
    })
}

#[cfg(test)]
#[path = "tests/bootstrap_tests.rs"]
mod tests;
