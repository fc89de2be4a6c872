use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::store::{CollectionKey, CollectionStore};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeEvent {
    Changed(CollectionKey),
    /// The subscriber fell behind and lost events; every collection must be reloaded.
    Resync,
}

impl ChangeEvent {
    pub fn affects(self, key: CollectionKey) -> bool {
        match self {
            Self::Changed(changed) => changed == key,
            Self::Resync => true,
        }
    }
}

/// Fan-out of store changes to every live view, the emitter included.
#[derive(Clone, Debug)]
pub struct ChangeBroadcaster {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeBroadcaster {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ChangeBroadcaster {
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Fire and forget. Returns how many subscribers were live at send time.
    pub fn notify(&self, key: CollectionKey) -> usize {
        let delivered = self.sender.send(ChangeEvent::Changed(key)).unwrap_or(0);
        debug!(
            event_name = "broadcast.change.sent",
            collection = key.as_str(),
            subscribers = delivered,
            "store change broadcast"
        );
        delivered
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription { receiver: self.sender.subscribe() }
    }

    /// Runs `handler` on a spawned task for every event until the handle is dropped.
    pub fn subscribe_with<H>(&self, handler: H) -> SubscriptionHandle
    where
        H: Fn(ChangeEvent) + Send + Sync + 'static,
    {
        let mut subscription = self.subscribe();
        let task = tokio::spawn(async move {
            while let Some(event) = subscription.next().await {
                handler(event);
            }
        });
        SubscriptionHandle { task: Some(task) }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Polls every collection version and broadcasts keys written by other processes
    /// sharing the same store. The first pass only records a baseline.
    pub fn watch_store(
        &self,
        store: Arc<dyn CollectionStore>,
        interval: Duration,
    ) -> SubscriptionHandle {
        let broadcaster = self.clone();
        let task = tokio::spawn(async move {
            let mut seen: HashMap<CollectionKey, u64> = HashMap::new();
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                for key in CollectionKey::ALL {
                    let version = match store.load(key).await {
                        Ok(stored) => stored.version,
                        Err(error) => {
                            warn!(
                                event_name = "broadcast.poll.load_failed",
                                collection = key.as_str(),
                                error = %error,
                                "store poll failed"
                            );
                            continue;
                        }
                    };
                    if let Some(previous) = seen.insert(key, version) {
                        if previous != version {
                            broadcaster.notify(key);
                        }
                    }
                }
            }
        });
        SubscriptionHandle { task: Some(task) }
    }
}

pub struct Subscription {
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    /// Next event, or `None` once every broadcaster clone is gone.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        match self.receiver.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(
                    event_name = "broadcast.change.lagged",
                    skipped, "subscriber fell behind; requesting resync"
                );
                Some(ChangeEvent::Resync)
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// Waits for the next event touching `key`.
    pub async fn next_affecting(&mut self, key: CollectionKey) -> Option<ChangeEvent> {
        loop {
            let event = self.next().await?;
            if event.affects(key) {
                return Some(event);
            }
        }
    }

    /// Drains already-queued events without waiting.
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => Some(ChangeEvent::Resync),
            Err(_) => None,
        }
    }
}

pub struct SubscriptionHandle {
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub fn unsubscribe(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.abort();
    }
}
