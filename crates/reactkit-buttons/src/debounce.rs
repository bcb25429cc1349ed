//! Call coalescing with a leading and a trailing invocation per quiet window.
//!
//! The first `exec()` runs the operation immediately and opens a window.
//! Calls that land inside the window only mark it pending and share the
//! window's completion. When the window elapses the operation runs once more
//! if anything was pending, and every waiting caller receives that result.
//! Callers therefore observe the outcome for the *current* state, not the
//! state at the time of their own call.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

/// Completion of a debounce window: `None` when no call arrived during the
/// window, otherwise the result of the trailing invocation.
pub type DebounceFuture<T> = Shared<BoxFuture<'static, Option<T>>>;

type Operation<T> = Arc<dyn Fn() -> BoxFuture<'static, T> + Send + Sync>;

struct Window<T: Clone> {
    open: Option<DebounceFuture<T>>,
    pending: bool,
}

pub struct Debouncer<T: Clone> {
    op: Operation<T>,
    wait: Duration,
    window: Arc<Mutex<Window<T>>>,
}

impl<T> Debouncer<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(wait: Duration, op: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self {
            op: Arc::new(move || op().boxed()),
            wait,
            window: Arc::new(Mutex::new(Window {
                open: None,
                pending: false,
            })),
        }
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    /// Whether a quiet window is currently open.
    pub fn is_open(&self) -> bool {
        self.window.lock().unwrap().open.is_some()
    }

    /// Request an invocation. Must be called from within a Tokio runtime.
    ///
    /// The returned future resolves once the current window closes; dropping
    /// it does not cancel anything.
    pub fn exec(&self) -> DebounceFuture<T> {
        let mut guard = self.window.lock().unwrap();
        let window = &mut *guard;

        if let Some(open) = &window.open {
            window.pending = true;
            debug!("debounce window open, deferring to trailing call");
            return open.clone();
        }

        let leading = tokio::spawn((self.op)());

        let op = Arc::clone(&self.op);
        let state = Arc::clone(&self.window);
        let wait = self.wait;
        let closer = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let pending = {
                let mut window = state.lock().unwrap();
                window.open = None;
                std::mem::take(&mut window.pending)
            };
            if pending {
                // The trailing call never overlaps the leading one.
                let _ = leading.await;
                debug!("debounce window closed, running trailing call");
                Some(op().await)
            } else {
                None
            }
        });

        let completion = async move { closer.await.ok().flatten() }.boxed().shared();
        window.open = Some(completion.clone());
        completion
    }
}
