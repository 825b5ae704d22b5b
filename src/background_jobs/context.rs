use crate::server_store::ServerStore;
use crate::song_store::SongStore;
use crate::stats_cache::StatsCache;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Context provided to jobs during execution.
///
/// Contains references to shared resources and a cancellation token
/// for graceful shutdown handling.
#[derive(Clone)]
pub struct JobContext {
    /// Token to check for cancellation/shutdown requests.
    pub cancellation_token: CancellationToken,

    /// Durable playlists and songs.
    pub song_store: Arc<dyn SongStore>,

    /// Ephemeral metrics cache.
    pub stats_cache: Arc<dyn StatsCache>,

    /// Access to server-side state (job history, schedules).
    pub server_store: Arc<dyn ServerStore>,
}

impl JobContext {
    pub fn new(
        cancellation_token: CancellationToken,
        song_store: Arc<dyn SongStore>,
        stats_cache: Arc<dyn StatsCache>,
        server_store: Arc<dyn ServerStore>,
    ) -> Self {
        Self {
            cancellation_token,
            song_store,
            stats_cache,
            server_store,
        }
    }

    /// Same resources, different cancellation token.
    pub fn with_token(&self, cancellation_token: CancellationToken) -> Self {
        Self {
            cancellation_token,
            ..self.clone()
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Sleeps for `duration` unless cancellation is requested first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), super::JobError> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.cancellation_token.cancelled() => Err(super::JobError::Cancelled),
        }
    }
}
