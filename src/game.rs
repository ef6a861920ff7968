//! The game thread.
//!
//! One dedicated OS thread drains a task queue. All event dispatch and all
//! channel membership mutation happen on it. Other threads cross over with
//! [`GameHandle::schedule`] or [`GameHandle::call`]; neither blocks the
//! caller.

use std::cell::Cell;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::thread::JoinHandle;

use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::error::EventError;

type Task = Box<dyn FnOnce() + Send + 'static>;

thread_local! {
    static ON_GAME_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is the game thread.
pub fn is_game_thread() -> bool {
    ON_GAME_THREAD.with(Cell::get)
}

/// Cloneable handle for scheduling work onto the game thread.
#[derive(Clone)]
pub struct GameHandle {
    tx: mpsc::UnboundedSender<Task>,
}

impl GameHandle {
    /// Queue `task` to run on the game thread.
    pub fn schedule<F>(&self, task: F) -> Result<(), EventError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx
            .send(Box::new(task))
            .map_err(|_| EventError::GameThreadGone)
    }

    /// Run `f` on the game thread and resolve with its result.
    ///
    /// Called from the game thread itself, `f` runs inline and the returned
    /// future is already complete.
    pub fn call<F, R>(&self, f: F) -> GameFuture<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        if is_game_thread() {
            let _ = tx.send(f());
        } else if let Err(e) = self.schedule(move || {
            let _ = tx.send(f());
        }) {
            warn!(error = %e, "Game thread unavailable, task dropped");
        }
        GameFuture::new(rx)
    }

    /// Whether the game thread has stopped accepting tasks.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// A handle whose thread is already gone.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        let (tx, _) = mpsc::unbounded_channel();
        Self { tx }
    }
}

/// The running game thread. Dropping every [`GameHandle`] (including the one
/// held here) lets the thread drain and exit.
pub struct GameThread {
    handle: GameHandle,
    join: Option<JoinHandle<()>>,
}

impl GameThread {
    /// Spawn the game thread.
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
        let thread_name = name.to_owned();
        let join = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                ON_GAME_THREAD.with(|flag| flag.set(true));
                info!(thread = %thread_name, "Game thread started");
                while let Some(task) = rx.blocking_recv() {
                    if catch_unwind(AssertUnwindSafe(task)).is_err() {
                        error!(thread = %thread_name, "Game task panicked");
                    }
                }
                info!(thread = %thread_name, "Game thread stopped");
            })?;
        Ok(Self {
            handle: GameHandle { tx },
            join: Some(join),
        })
    }

    /// A handle for scheduling onto this thread.
    pub fn handle(&self) -> GameHandle {
        self.handle.clone()
    }

    /// Close this thread's own handle and wait for the queue to drain.
    ///
    /// Returns once every other handle has also been dropped.
    pub fn join(mut self) {
        let Some(join) = self.join.take() else {
            return;
        };
        drop(self);
        if join.join().is_err() {
            error!("Game thread terminated abnormally");
        }
    }
}

/// Completion of work scheduled onto the game thread.
///
/// Await it from async code, or [`wait`](Self::wait) from a plain thread.
/// Blocking on it from the game thread itself is refused.
#[must_use = "futures do nothing unless awaited"]
pub struct GameFuture<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> GameFuture<T> {
    pub(crate) fn new(rx: oneshot::Receiver<T>) -> Self {
        Self { rx }
    }

    /// Block the current (non-async, non-game) thread until completion.
    pub fn wait(self) -> Result<T, EventError> {
        if is_game_thread() {
            return Err(EventError::WouldDeadlock);
        }
        self.rx.blocking_recv().map_err(|_| EventError::GameThreadGone)
    }

    /// Take the result if it is already available. Never blocks.
    pub fn try_take(&mut self) -> Option<Result<T, EventError>> {
        match self.rx.try_recv() {
            Ok(value) => Some(Ok(value)),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(EventError::GameThreadGone)),
        }
    }
}

impl<T> Future for GameFuture<T> {
    type Output = Result<T, EventError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.map_err(|_| EventError::GameThreadGone))
    }
}
