use std::{future::Future, sync::Mutex};

use tokio::sync::watch;
use tracing::debug;

type Outcome = watch::Receiver<Option<bool>>;

/// Lets at most one refresh run at a time. Callers arriving while a refresh
/// is in flight wait for it and observe the same outcome.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    in_flight: Mutex<Option<Outcome>>,
}

/// Empties the slot when the leading call finishes or is dropped.
struct SlotReset<'a>(&'a Mutex<Option<Outcome>>);

impl Drop for SlotReset<'_> {
    fn drop(&mut self) {
        let mut slot = self.0.lock().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }
}

enum Role {
    Leader(watch::Sender<Option<bool>>),
    Follower(Outcome),
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Runs `refresh` unless one is already running, in which case it waits
    /// for that one. Returns whether the refresh succeeded. A leader that is
    /// dropped mid-flight counts as a failure for its followers.
    pub async fn run<F, Fut>(&self, refresh: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = bool>,
    {
        let role = {
            let mut slot = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            match slot.as_ref() {
                Some(outcome) => Role::Follower(outcome.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    *slot = Some(rx);
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Leader(tx) => {
                let reset = SlotReset(&self.in_flight);
                let ok = refresh().await;
                // later 401s start a new flight
                drop(reset);
                tx.send_replace(Some(ok));
                debug!(ok, "refresh flight finished");
                ok
            }
            Role::Follower(mut outcome) => {
                debug!("joining in-flight refresh");
                match outcome.wait_for(Option::is_some).await {
                    Ok(done) => matches!(*done, Some(true)),
                    Err(_) => false,
                }
            }
        }
    }
}
