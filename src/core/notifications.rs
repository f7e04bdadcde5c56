//! Purpose: Hold the notification list and keep it synchronized by polling.
//! Exports: `NotificationStore`, `Notification`, `NotificationEvent`, `DEFAULT_POLL_INTERVAL`.
//! Role: Sole owner of notification state; fetch results merge in by id.
//! Invariants: At most one entry per id; unseen items prepend, known items keep their position.
//! Invariants: Read flags flip only after the server confirms; no optimistic update.
//! Invariants: A generation counter discards merges that raced a `clear_notifications`.
//! Invariants: Observers run outside the state lock.

use crate::api::ApiClient;
use crate::notice::Notice;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

const OPERATION_FAILED_MESSAGE: &str = "operation failed, please try again later";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub is_read: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NotificationEvent {
    /// A previously unseen notification entered the list.
    Added(Notification),
    /// An existing notification's read flag changed.
    ReadState { id: u64, is_read: bool },
    Cleared,
}

type Observer = Box<dyn Fn(&NotificationEvent) + Send + Sync>;

#[derive(Clone, Default)]
pub struct NotificationStore {
    inner: Arc<NotificationInner>,
}

#[derive(Default)]
struct NotificationInner {
    state: Mutex<NotificationState>,
    observers: Mutex<Vec<Observer>>,
    poll: Mutex<Option<PollHandle>>,
}

#[derive(Default)]
struct NotificationState {
    items: Vec<Notification>,
    generation: u64,
}

struct PollHandle {
    stop_tx: mpsc::Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the held list, newest first.
    pub fn items(&self) -> Vec<Notification> {
        self.state().items.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.state().items.iter().filter(|n| !n.is_read).count()
    }

    pub fn subscribe(&self, observer: impl Fn(&NotificationEvent) + Send + Sync + 'static) {
        self.inner
            .observers
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(Box::new(observer));
    }

    /// Merges a freshly fetched list into the held one. An empty local list
    /// takes the fetched list wholesale (server ordering). Otherwise each
    /// fetched item either overwrites the read flag of its local counterpart
    /// in place, or prepends; the server is trusted to return newest first,
    /// and its read state is authoritative in both directions.
    pub fn merge(&self, fetched: Vec<Notification>) {
        let generation = self.state().generation;
        self.merge_if_current(generation, fetched);
    }

    fn merge_if_current(&self, generation: u64, fetched: Vec<Notification>) {
        let mut events = Vec::new();
        {
            let mut state = self.state();
            if state.generation != generation {
                debug!("discarding stale notification merge");
                return;
            }
            if state.items.is_empty() {
                for item in &fetched {
                    events.push(NotificationEvent::Added(item.clone()));
                }
                state.items = fetched;
            } else {
                for fetched_item in fetched {
                    if let Some(existing) = state
                        .items
                        .iter_mut()
                        .find(|item| item.id == fetched_item.id)
                    {
                        if existing.is_read != fetched_item.is_read {
                            existing.is_read = fetched_item.is_read;
                            events.push(NotificationEvent::ReadState {
                                id: fetched_item.id,
                                is_read: fetched_item.is_read,
                            });
                        }
                    } else {
                        events.push(NotificationEvent::Added(fetched_item.clone()));
                        state.items.insert(0, fetched_item);
                    }
                }
            }
        }
        self.notify_all(&events);
    }

    /// One poll cycle: fetch the list and merge it. Fetch failures are logged
    /// and otherwise silent; the next cycle retries naturally.
    pub fn fetch_and_merge(&self, client: &ApiClient) {
        let generation = self.state().generation;
        match client.notifications().list() {
            Ok(fetched) => self.merge_if_current(generation, fetched),
            Err(err) => warn!(error = %err, "notification fetch failed"),
        }
    }

    /// Starts the poll loop: one immediate fetch-and-merge, then one per
    /// interval until stopped. A no-op while already polling.
    pub fn start_polling(&self, client: &ApiClient, interval: Duration) {
        let mut poll = self.poll_slot();
        if poll.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let weak = Arc::downgrade(&self.inner);
        let client = client.clone();
        let spawned = std::thread::Builder::new()
            .name("yuyu-notify-poll".to_string())
            .spawn(move || poll_loop(weak, client, stop_rx, interval));
        match spawned {
            Ok(thread) => {
                *poll = Some(PollHandle {
                    stop_tx,
                    thread: Some(thread),
                });
            }
            Err(err) => warn!(error = %err, "failed to spawn notification poll thread"),
        }
    }

    /// Cancels the poll loop and waits for the thread to park. Idempotent.
    pub fn stop_polling(&self) {
        let handle = self.poll_slot().take();
        if let Some(mut handle) = handle {
            let _ = handle.stop_tx.send(());
            if let Some(thread) = handle.thread.take() {
                let _ = thread.join();
            }
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poll_slot().is_some()
    }

    /// Empties the list and stops polling. Used on logout so a prior
    /// session's notifications never leak into the next one; the generation
    /// bump makes any in-flight fetch result land on the floor.
    pub fn clear_notifications(&self) {
        {
            let mut state = self.state();
            state.generation += 1;
            state.items.clear();
        }
        self.notify_all(&[NotificationEvent::Cleared]);
        self.stop_polling();
    }

    /// Marks one notification read. Absent or already-read items are silent
    /// no-ops (no request is issued). The local flag flips only after the
    /// server accepts; failures are logged and surfaced as an
    /// operation-failed notice, then swallowed.
    pub fn mark_as_read(&self, client: &ApiClient, id: u64) {
        {
            let state = self.state();
            let Some(item) = state.items.iter().find(|item| item.id == id) else {
                return;
            };
            if item.is_read {
                return;
            }
        }

        match client.notifications().mark_read(id) {
            Ok(()) => {
                let flipped = {
                    let mut state = self.state();
                    match state.items.iter_mut().find(|item| item.id == id) {
                        Some(item) if !item.is_read => {
                            item.is_read = true;
                            true
                        }
                        _ => false,
                    }
                };
                if flipped {
                    self.notify_all(&[NotificationEvent::ReadState { id, is_read: true }]);
                }
            }
            Err(err) => {
                warn!(id, error = %err, "mark notification read failed");
                client
                    .notices()
                    .emit(Notice::error("notifications.read", OPERATION_FAILED_MESSAGE));
            }
        }
    }

    /// Marks every unread notification read. A no-op (no request) at zero
    /// unread; flags flip only after the server accepts the bulk call.
    pub fn mark_all_as_read(&self, client: &ApiClient) {
        if self.unread_count() == 0 {
            return;
        }

        match client.notifications().mark_all_read() {
            Ok(()) => {
                let mut events = Vec::new();
                {
                    let mut state = self.state();
                    for item in state.items.iter_mut().filter(|item| !item.is_read) {
                        item.is_read = true;
                        events.push(NotificationEvent::ReadState {
                            id: item.id,
                            is_read: true,
                        });
                    }
                }
                self.notify_all(&events);
            }
            Err(err) => {
                warn!(error = %err, "mark all notifications read failed");
                client.notices().emit(Notice::error(
                    "notifications.read_all",
                    OPERATION_FAILED_MESSAGE,
                ));
            }
        }
    }

    fn state(&self) -> MutexGuard<'_, NotificationState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn poll_slot(&self) -> MutexGuard<'_, Option<PollHandle>> {
        self.inner
            .poll
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn notify_all(&self, events: &[NotificationEvent]) {
        if events.is_empty() {
            return;
        }
        let observers = self
            .inner
            .observers
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        for event in events {
            for observer in observers.iter() {
                observer(event);
            }
        }
    }
}

/// Poll thread body. Holds only a weak handle between cycles so dropping the
/// last store handle (or a stop signal) ends the loop.
fn poll_loop(
    weak: Weak<NotificationInner>,
    client: ApiClient,
    stop_rx: mpsc::Receiver<()>,
    interval: Duration,
) {
    loop {
        let Some(inner) = weak.upgrade() else {
            break;
        };
        let store = NotificationStore { inner };
        store.fetch_and_merge(&client);
        drop(store);

        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            _ => break,
        }
    }
}
