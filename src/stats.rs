//! Community-wide statistics.
//!
//! Stats are never stored; they are recomputed from every session's duration
//! whenever the store reports a change.

use std::sync::Arc;

use anyhow::Result;
use log::{debug, warn};
use serde::Serialize;
use tokio::{
    sync::{broadcast::error::RecvError, watch},
    task::JoinHandle,
};

use crate::store::SessionStore;

/// Sessions shorter than this are left out of the average.
pub const AVERAGE_MIN_MINUTES: u32 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    pub total_minutes: u64,
    pub total_sessions: u64,
    /// Mean duration of sessions of at least five minutes, rounded.
    pub average_minutes: u32,
}

impl GlobalStats {
    pub fn from_durations(durations: &[u32]) -> Self {
        let total_minutes = durations.iter().map(|&d| u64::from(d)).sum();
        let total_sessions = durations.len() as u64;

        let (qualifying_minutes, qualifying_count) = durations
            .iter()
            .filter(|&&d| d >= AVERAGE_MIN_MINUTES)
            .fold((0u64, 0u64), |(sum, count), &d| (sum + u64::from(d), count + 1));

        let average_minutes = if qualifying_count > 0 {
            let rounded = (qualifying_minutes + qualifying_count / 2) / qualifying_count;
            u32::try_from(rounded).unwrap_or(u32::MAX)
        } else {
            0
        };

        Self {
            total_minutes,
            total_sessions,
            average_minutes,
        }
    }

    /// Total time as (hours, minutes).
    pub fn total_time(&self) -> (u64, u64) {
        (self.total_minutes / 60, self.total_minutes % 60)
    }
}

pub async fn compute(store: &dyn SessionStore) -> Result<GlobalStats> {
    let durations = store.list_all_durations().await?;
    Ok(GlobalStats::from_durations(&durations))
}

/// Keeps a [`GlobalStats`] snapshot current by listening to store changes.
pub struct StatsFeed {
    rx: watch::Receiver<GlobalStats>,
    handle: JoinHandle<()>,
}

impl StatsFeed {
    pub fn spawn(store: Arc<dyn SessionStore>) -> Self {
        let (tx, rx) = watch::channel(GlobalStats::default());
        let mut events = store.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                match compute(store.as_ref()).await {
                    Ok(stats) => {
                        debug!("Global stats refreshed: {stats:?}");
                        tx.send_replace(stats);
                    }
                    Err(err) => warn!("Failed to refresh global stats: {err:#}"),
                }

                match events.recv().await {
                    Ok(_) => {}
                    // Missed events only mean we recompute once for several changes.
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Stats feed skipped {skipped} store events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Self { rx, handle }
    }

    pub fn current(&self) -> GlobalStats {
        *self.rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<GlobalStats> {
        self.rx.clone()
    }
}

impl Drop for StatsFeed {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
