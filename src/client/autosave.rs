use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Duration, Instant, MissedTickBehavior};

pub type SaveFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Starts one best-effort save. Called from timer tasks, so it must not block.
pub type SaveTask = Arc<dyn Fn() -> SaveFuture + Send + Sync>;

/// Debounced and periodic triggers for background saves.
///
/// Each expiry spawns the save as its own task, so `cancel` and `stop` only
/// ever drop timers and never a request already on the wire.
pub struct AutosaveScheduler {
    save: SaveTask,
    debounce: Duration,
    interval: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
    periodic: Mutex<Option<Periodic>>,
}

struct Periodic {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl AutosaveScheduler {
    pub fn new(save: SaveTask, debounce: Duration, interval: Duration) -> Self {
        Self {
            save,
            debounce,
            interval,
            pending: Mutex::new(None),
            periodic: Mutex::new(None),
        }
    }

    /// Restarts the quiet-period timer. Call on every edit.
    pub fn schedule(&self) {
        let save = self.save.clone();
        let debounce = self.debounce;
        let timer = tokio::spawn(async move {
            sleep(debounce).await;
            tokio::spawn(save());
        });

        if let Some(previous) = lock(&self.pending).replace(timer) {
            previous.abort();
        }
    }

    pub fn cancel(&self) {
        if let Some(timer) = lock(&self.pending).take() {
            timer.abort();
        }
    }

    pub fn is_scheduled(&self) -> bool {
        lock(&self.pending).as_ref().is_some_and(|timer| !timer.is_finished())
    }

    /// Safety-net timer that fires every interval whether or not anything was
    /// edited. Starting it twice is a no-op.
    pub fn start_periodic(&self) {
        let mut periodic = lock(&self.periodic);
        if periodic.as_ref().is_some_and(|running| !running.handle.is_finished()) {
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(periodic_loop(self.save.clone(), self.interval, shutdown_rx));
        *periodic = Some(Periodic { shutdown: shutdown_tx, handle });
    }

    pub fn stop(&self) {
        self.cancel();
        if let Some(running) = lock(&self.periodic).take() {
            if running.shutdown.send(true).is_err() {
                tracing::debug!("Periodic autosave already finished");
            }
        }
    }
}

impl Drop for AutosaveScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn periodic_loop(save: SaveTask, every: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {
                tokio::spawn(save());
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
