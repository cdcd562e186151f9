// ── Callback dispatch ──
//
// Reconciled updates are produced on the device manager's thread.
// A dispatcher decides where the caller's listener actually runs.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;

use crate::reconcile::Update;

/// Caller-supplied handler for reconciled updates.
pub type Listener = Arc<dyn Fn(Update) + Send + Sync + 'static>;

/// Delivers an update to a listener.
pub trait CallbackDispatcher: Send + Sync {
    fn dispatch(&self, listener: &Listener, update: Update);
}

/// Calls the listener on the delivering thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectDispatcher;

impl CallbackDispatcher for DirectDispatcher {
    fn dispatch(&self, listener: &Listener, update: Update) {
        listener(update);
    }
}

/// Hands updates to a tokio runtime, so the listener runs on the
/// runtime's threads instead of the device manager's.
///
/// Updates queue on one channel drained by a single task, so listeners
/// see them in the order they were dispatched.
#[derive(Debug, Clone)]
pub struct RuntimeDispatcher {
    tx: mpsc::UnboundedSender<(Listener, Update)>,
}

impl RuntimeDispatcher {
    pub fn new(handle: &Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<(Listener, Update)>();
        handle.spawn(async move {
            while let Some((listener, update)) = rx.recv().await {
                listener(update);
            }
        });
        Self { tx }
    }

    /// Dispatcher for the runtime the caller is running on, if any.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(|handle| Self::new(&handle))
    }
}

impl CallbackDispatcher for RuntimeDispatcher {
    fn dispatch(&self, listener: &Listener, update: Update) {
        if self.tx.send((Arc::clone(listener), update)).is_err() {
            debug!("runtime gone, dropping update");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::thread;

    use super::*;
    use crate::model::{Entry, Identifier};

    fn update() -> Update {
        numbered(1)
    }

    fn numbered(n: u32) -> Update {
        Update {
            id: Identifier::from(n.to_string()),
            entry: Entry::new(),
            created: false,
        }
    }

    #[test]
    fn direct_runs_on_calling_thread() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let listener: Listener = Arc::new(move |_| {
            *sink.lock().unwrap() = Some(thread::current().id());
        });
        DirectDispatcher.dispatch(&listener, update());
        assert_eq!(*seen.lock().unwrap(), Some(thread::current().id()));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn runtime_dispatch_from_foreign_thread() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let listener: Listener = Arc::new(move |u: Update| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send((u.id, thread::current().id()));
            }
        });

        let dispatcher = RuntimeDispatcher::current().unwrap();
        let runtime_thread = thread::current().id();
        thread::spawn(move || dispatcher.dispatch(&listener, update()))
            .join()
            .unwrap();

        let (id, thread_id) = rx.await.unwrap();
        assert_eq!(id, Identifier::from("1"));
        assert_eq!(thread_id, runtime_thread);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn runtime_dispatch_keeps_order() {
        const UPDATES: u32 = 2000;

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let listener: Listener = Arc::new(move |u: Update| {
            let _ = tx.send(u.id);
        });

        let dispatcher = RuntimeDispatcher::current().unwrap();
        thread::spawn(move || {
            for n in 0..UPDATES {
                dispatcher.dispatch(&listener, numbered(n));
            }
        })
        .join()
        .unwrap();

        let mut seen = Vec::new();
        while seen.len() < UPDATES as usize {
            seen.push(rx.recv().await.unwrap());
        }
        let expected: Vec<Identifier> = (0..UPDATES)
            .map(|n| Identifier::from(n.to_string()))
            .collect();
        assert_eq!(seen, expected);
    }
}
