use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio::{sync::watch, task::JoinHandle};
use tracing::debug;

/// Liveness scope of a mounted screen.
///
/// Clones share the same scope. Once [`ScreenLifetime::unmount`] runs, futures
/// awaited through [`ScreenLifetime::run`] resolve to `None` and tasks started
/// with [`ScreenLifetime::spawn`] are aborted.
#[derive(Clone)]
pub struct ScreenLifetime {
    inner: Arc<LifetimeInner>,
}

struct LifetimeInner {
    alive: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ScreenLifetime {
    pub fn new() -> Self {
        let (alive, _) = watch::channel(true);
        Self {
            inner: Arc::new(LifetimeInner {
                alive,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn is_alive(&self) -> bool {
        *self.inner.alive.borrow()
    }

    /// Awaits `fut` unless the screen unmounts first. A result that arrives
    /// after unmount is dropped.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        if !self.is_alive() {
            return None;
        }

        let mut alive = self.inner.alive.subscribe();
        tokio::select! {
            output = fut => self.is_alive().then_some(output),
            _ = alive.wait_for(|alive| !*alive) => None,
        }
    }

    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.is_alive() {
            debug!("ignoring task spawned on an unmounted screen");
            return;
        }

        let lifetime = self.clone();
        let handle = tokio::spawn(async move {
            lifetime.run(fut).await;
        });

        let mut tasks = self.tasks();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    pub fn unmount(&self) {
        if !self.inner.alive.send_replace(false) {
            return;
        }

        let tasks = std::mem::take(&mut *self.tasks());
        debug!(pending = tasks.len(), "screen unmounted");
        for task in tasks {
            task.abort();
        }
    }

    fn tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ScreenLifetime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn run_returns_output_while_mounted() {
        let lifetime = ScreenLifetime::new();
        assert_eq!(lifetime.run(async { 7 }).await, Some(7));
    }

    #[tokio::test]
    async fn late_result_is_dropped_after_unmount() {
        let lifetime = ScreenLifetime::new();
        let (tx, rx) = oneshot::channel::<u32>();

        let waiter = {
            let lifetime = lifetime.clone();
            tokio::spawn(async move { lifetime.run(async { rx.await.ok() }).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        lifetime.unmount();
        let _ = tx.send(3);

        assert_eq!(waiter.await.expect("join"), None);
        assert!(!lifetime.is_alive());
    }

    #[tokio::test]
    async fn unmount_aborts_spawned_tasks() {
        let lifetime = ScreenLifetime::new();
        let (tx, mut rx) = tokio::sync::mpsc::channel::<()>(1);

        lifetime.spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            let _ = tx.send(()).await;
        });

        lifetime.unmount();
        lifetime.unmount();
        assert!(rx.recv().await.is_none());
    }
}
