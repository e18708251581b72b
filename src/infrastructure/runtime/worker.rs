//! Dispatch worker pool - threads that each drive a private current-thread runtime

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use tracing::{debug, trace, warn};

use crate::infrastructure::runtime::bridge::BridgeError;
use crate::infrastructure::runtime::context::{ExecutorGuard, ExecutorId};

type Job = Box<dyn FnOnce(&mut WorkerSlot) + Send + 'static>;

/// Outcome shipped back to the waiting caller; `Err` carries a panic payload
type Outcome<T, E> = thread::Result<Result<T, E>>;

/// State owned by one worker thread
struct WorkerSlot {
    index: usize,
    executor: ExecutorId,
    runtime: Option<Runtime>,
}

impl WorkerSlot {
    /// Build the worker's runtime on first use
    fn runtime(&mut self) -> Result<&Runtime, BridgeError> {
        if self.runtime.is_none() {
            let runtime = Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|err| BridgeError::Runtime(err.to_string()))?;
            debug!(worker = self.index, "worker runtime started");
            self.runtime = Some(runtime);
        }
        self.runtime
            .as_ref()
            .ok_or_else(|| BridgeError::Runtime("worker runtime unavailable".into()))
    }
}

/// Fixed-size pool of worker threads
///
/// A pool of one worker runs submissions strictly in order. Larger pools run up to
/// `size` operations concurrently with no ordering across workers.
pub struct DispatchPool {
    queue: Mutex<Option<Sender<Job>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    thread_ids: Vec<ThreadId>,
}

impl DispatchPool {
    /// Spawn `size` workers (at least one)
    pub fn new(size: usize) -> Result<Self, BridgeError> {
        let size = size.max(1);
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));

        let mut handles = Vec::with_capacity(size);
        for index in 0..size {
            let rx = Arc::clone(&rx);
            let handle = thread::Builder::new()
                .name(format!("openems-dispatch-{index}"))
                .spawn(move || run_worker(index, rx))
                .map_err(|err| BridgeError::Runtime(format!("spawn worker {index}: {err}")))?;
            handles.push(handle);
        }
        let thread_ids = handles.iter().map(|h| h.thread().id()).collect();

        Ok(Self {
            queue: Mutex::new(Some(tx)),
            handles: Mutex::new(handles),
            thread_ids,
        })
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.thread_ids.len()
    }

    /// True when called from one of this pool's worker threads
    pub fn is_worker_thread(&self) -> bool {
        self.thread_ids.contains(&thread::current().id())
    }

    /// Queue an operation; it runs entirely on whichever worker picks it up
    pub fn submit<F, Fut, T, E>(&self, operation: F) -> Result<PendingCall<T, E>, BridgeError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>>,
        T: Send + 'static,
        E: From<BridgeError> + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel::<Outcome<T, E>>(1);
        let job: Job = Box::new(move |slot: &mut WorkerSlot| {
            let outcome = match slot.runtime() {
                Ok(runtime) => panic::catch_unwind(AssertUnwindSafe(|| {
                    runtime.block_on(async move { operation().await })
                })),
                Err(err) => Ok(Err(E::from(err))),
            };
            deliver(tx, outcome);
        });

        let queue = lock(&self.queue);
        let sender = queue.as_ref().ok_or(BridgeError::ShutDown)?;
        sender.send(job).map_err(|_| BridgeError::ShutDown)?;
        Ok(PendingCall { rx })
    }

    /// Stop accepting work, let queued operations finish, then join the workers
    ///
    /// Safe to call repeatedly and from several threads at once: every caller
    /// returns only after the queue has drained and the workers are joined.
    /// A worker shutting down its own pool only closes the queue; the workers
    /// leave on their own once it is empty.
    pub fn shutdown(&self) {
        drop(lock(&self.queue).take());

        if self.is_worker_thread() {
            warn!("dispatch pool shut down from its own worker; not joining");
            return;
        }

        // held across the joins so concurrent callers wait for the drain
        let mut handles = lock(&self.handles);
        if handles.is_empty() {
            return;
        }
        for handle in handles.drain(..) {
            if handle.join().is_err() {
                warn!("dispatch worker exited by panic");
            }
        }
        debug!("dispatch pool stopped");
    }
}

impl Drop for DispatchPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Handle for one submitted operation
pub struct PendingCall<T, E> {
    rx: Receiver<Outcome<T, E>>,
}

impl<T, E: From<BridgeError>> PendingCall<T, E> {
    /// Block until the operation resolves or `timeout` elapses
    ///
    /// A timeout only releases the caller. The operation keeps running on its
    /// worker and its eventual result is dropped.
    pub fn wait(self, timeout: Option<Duration>) -> Result<T, E> {
        let outcome = match timeout {
            Some(limit) => match self.rx.recv_timeout(limit) {
                Ok(outcome) => outcome,
                Err(RecvTimeoutError::Timeout) => return Err(BridgeError::Timeout(limit).into()),
                Err(RecvTimeoutError::Disconnected) => return Err(BridgeError::WorkerLost.into()),
            },
            None => match self.rx.recv() {
                Ok(outcome) => outcome,
                Err(_) => return Err(BridgeError::WorkerLost.into()),
            },
        };

        match outcome {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

fn run_worker(index: usize, rx: Arc<Mutex<Receiver<Job>>>) {
    let mut slot = WorkerSlot {
        index,
        executor: ExecutorId::next(),
        runtime: None,
    };
    let _executor = ExecutorGuard::enter(slot.executor);
    trace!(worker = index, "dispatch worker waiting for work");

    loop {
        let job = lock(&rx).recv();
        match job {
            Ok(job) => job(&mut slot),
            Err(_) => break,
        }
    }

    if let Some(runtime) = slot.runtime.take() {
        runtime.shutdown_background();
    }
    trace!(worker = index, "dispatch worker exiting");
}

fn deliver<T, E>(tx: SyncSender<Outcome<T, E>>, outcome: Outcome<T, E>) {
    if tx.send(outcome).is_err() {
        debug!("caller stopped waiting; dropping operation result");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
