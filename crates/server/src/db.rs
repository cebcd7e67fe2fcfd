use anyhow::Result;
use storage::Storage;
use tokio::sync::OnceCell;
use tracing::info;

/// Opens the user store on first use and shares it afterwards.
///
/// A failed open is not remembered; the next request tries again.
pub(crate) struct LazyStorage {
    database_url: String,
    cell: OnceCell<Storage>,
}

impl LazyStorage {
    pub(crate) fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            cell: OnceCell::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn ready(storage: Storage) -> Self {
        Self {
            database_url: String::new(),
            cell: OnceCell::new_with(Some(storage)),
        }
    }

    pub(crate) async fn get(&self) -> Result<&Storage> {
        self.cell
            .get_or_try_init(|| async {
                let storage = Storage::new(&self.database_url).await?;
                info!(database_url = %self.database_url, "storage: connection established");
                Ok::<_, anyhow::Error>(storage)
            })
            .await
    }

    #[cfg(test)]
    pub(crate) fn is_connected(&self) -> bool {
        self.cell.initialized()
    }
}
