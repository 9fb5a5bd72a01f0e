//! Completion tokens for asynchronous engine operations.
//!
//! Every asynchronous engine operation takes a [`Completion`] and returns
//! immediately; the engine fulfils the completion later, possibly from one
//! of its own threads. The caller holds the paired [`Pending`] and waits on
//! it. [`await_completion`] bundles the two halves so that workflow code can
//! issue a call and block on its result in one expression.

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::oneshot;

use crate::{Error, Result};

/// The engine-side half of a single-assignment result slot.
///
/// Consuming methods guarantee the slot is filled at most once. Dropping a
/// completion without filling it makes the waiting side fail with
/// [`Error::Cancelled`].
pub struct Completion<T> {
    sender: oneshot::Sender<Result<T>>,
}

impl<T> Completion<T> {
    /// Fulfils the completion with a result.
    pub fn complete(self, result: Result<T>) {
        if self.sender.send(result).is_err() {
            log::debug!("Completion fulfilled after the waiting side went away");
        }
    }

    /// Fulfils the completion with a value.
    pub fn succeed(self, value: T) {
        self.complete(Ok(value));
    }

    /// Fulfils the completion with an error.
    pub fn fail(self, error: Error) {
        self.complete(Err(error));
    }

    /// Returns true if nobody is waiting for the result anymore.
    pub fn is_abandoned(&self) -> bool {
        self.sender.is_closed()
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("abandoned", &self.is_abandoned())
            .finish()
    }
}

/// The caller-side half of a single-assignment result slot.
#[derive(Debug)]
pub struct Pending<T> {
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T: Send> Pending<T> {
    /// Blocks the current thread until the completion is fulfilled.
    ///
    /// Inside a multi-threaded tokio runtime the worker is handed off with
    /// `block_in_place`. Inside any other runtime the wait runs on a helper
    /// thread. Async code should prefer [`Pending::recv`].
    pub fn wait(self) -> Result<T> {
        let receiver = self.receiver;
        let received = match Handle::try_current() {
            Err(_) => receiver.blocking_recv(),
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| receiver.blocking_recv())
            }
            Ok(_) => std::thread::scope(|scope| {
                scope.spawn(move || receiver.blocking_recv()).join()
            })
            .map_err(|_| Error::engine("Completion waiter thread panicked"))?,
        };
        received.map_err(|_| Error::Cancelled)?
    }
}

impl<T> Pending<T> {
    /// Waits for the completion without blocking the thread.
    pub async fn recv(self) -> Result<T> {
        self.receiver.await.map_err(|_| Error::Cancelled)?
    }
}

/// Creates a connected completion/pending pair.
pub fn completion<T>() -> (Completion<T>, Pending<T>) {
    let (sender, receiver) = oneshot::channel();
    (Completion { sender }, Pending { receiver })
}

/// Issues an asynchronous engine call and blocks until it completes.
///
/// This is the only place where the workflow turns the engine's
/// asynchronous operations into sequential steps.
///
/// # Example
///
/// ```rust
/// use docseal::engine::{Completion, await_completion};
///
/// fn engine_call(input: u32, done: Completion<u32>) {
///     std::thread::spawn(move || done.succeed(input * 2));
/// }
///
/// let value = await_completion(|done| engine_call(21, done))?;
/// assert_eq!(value, 42);
/// # Ok::<(), docseal::Error>(())
/// ```
pub fn await_completion<T: Send>(issue: impl FnOnce(Completion<T>)) -> Result<T> {
    let (done, pending) = completion();
    issue(done);
    pending.wait()
}
