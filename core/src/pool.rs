//! Fixed-size worker pool with a reusable completion barrier.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, error, trace};

use crate::{Error, Result};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Queued plus in-flight tasks.
#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    drained: Condvar,
}

impl Pending {
    fn increment(&self) {
        *self.count.lock() += 1;
    }

    fn decrement(&self) {
        let mut count = self.count.lock();
        *count -= 1;
        if *count == 0 {
            self.drained.notify_all();
        }
    }
}

pub struct WorkQueue {
    sender: RwLock<Option<Sender<Task>>>,
    pending: Arc<Pending>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl WorkQueue {
    pub const DEFAULT_THREADS: usize = 5;

    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(Error::InvalidConfig("work queue needs at least one thread".into()));
        }
        let (tx, rx) = crossbeam_channel::unbounded::<Task>();
        let pending = Arc::new(Pending::default());
        let mut workers = Vec::with_capacity(threads);
        for id in 0..threads {
            let rx = rx.clone();
            let pending = Arc::clone(&pending);
            let handle = thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || run_worker(id, rx, pending))
                .map_err(|e| Error::InvalidConfig(format!("unable to spawn worker thread: {e}")))?;
            workers.push(handle);
        }
        debug!(threads, "work queue started");
        Ok(Self { sender: RwLock::new(Some(tx)), pending, workers: Mutex::new(workers), size: threads })
    }

    /// Queues `task` and returns immediately. Fails once the queue is shut down.
    pub fn execute<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.read();
        let tx = sender.as_ref().ok_or(Error::PoolShutdown)?;
        // counted before any worker can see it
        self.pending.increment();
        if tx.send(Box::new(task)).is_err() {
            self.pending.decrement();
            return Err(Error::PoolShutdown);
        }
        Ok(())
    }

    /// Blocks until every task submitted so far, including tasks submitted by
    /// other tasks, has completed. May be called any number of times. Must not
    /// be called from inside a task.
    pub fn finish(&self) {
        let mut count = self.pending.count.lock();
        while *count > 0 {
            self.pending.drained.wait(&mut count);
        }
    }

    /// Stops accepting work, lets queued tasks drain and joins the workers.
    pub fn shutdown(&self) {
        let sender = self.sender.write().take();
        if sender.is_none() {
            return;
        }
        drop(sender);
        let workers = std::mem::take(&mut *self.workers.lock());
        let current = thread::current().id();
        for handle in workers {
            // the last owner may be dropped on a worker thread
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("worker thread exited abnormally");
            }
        }
        debug!(threads = self.size, "work queue shut down");
    }

    pub fn pending(&self) -> usize {
        *self.pending.count.lock()
    }

    pub fn is_shutdown(&self) -> bool {
        self.sender.read().is_none()
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(id: usize, rx: Receiver<Task>, pending: Arc<Pending>) {
    trace!(worker = id, "worker started");
    // ends once the sender is dropped and the queue is empty
    for task in rx.iter() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
            error!(worker = id, reason = panic_message(payload.as_ref()), "task panicked");
        }
        pending.decrement();
    }
    trace!(worker = id, "worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
