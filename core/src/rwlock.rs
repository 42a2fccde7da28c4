//! Multiple-reader / single-writer lock with writer preference.
//!
//! Readers are admitted only while no writer holds or waits for the lock, so a
//! steady stream of readers cannot starve a pending writer. The lock is not
//! reentrant: a thread holding a read guard that asks for a write guard blocks
//! forever. Release happens when a guard drops, on every exit path.

use std::ops::{Deref, DerefMut};

use parking_lot::{Condvar, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Gate {
    readers: usize,
    writer: bool,
    waiting_writers: usize,
}

#[derive(Debug, Default)]
pub struct ReadWriteLock<T> {
    gate: Mutex<Gate>,
    turn: Condvar,
    // Only touched after the gate admits the caller, so it never contends.
    data: RwLock<T>,
}

impl<T> ReadWriteLock<T> {
    pub fn new(value: T) -> Self {
        Self { gate: Mutex::new(Gate::default()), turn: Condvar::new(), data: RwLock::new(value) }
    }

    /// Blocks until no writer holds or is waiting for the lock.
    pub fn lock_read(&self) -> ReadGuard<'_, T> {
        {
            let mut gate = self.gate.lock();
            while gate.writer || gate.waiting_writers > 0 {
                self.turn.wait(&mut gate);
            }
            gate.readers += 1;
        }
        ReadGuard { data: self.data.read(), _admission: Admission { lock: self, mode: Mode::Read } }
    }

    /// Blocks until every reader and any active writer has released.
    pub fn lock_write(&self) -> WriteGuard<'_, T> {
        {
            let mut gate = self.gate.lock();
            gate.waiting_writers += 1;
            while gate.writer || gate.readers > 0 {
                self.turn.wait(&mut gate);
            }
            gate.waiting_writers -= 1;
            gate.writer = true;
        }
        WriteGuard { data: self.data.write(), _admission: Admission { lock: self, mode: Mode::Write } }
    }

    pub fn readers(&self) -> usize {
        self.gate.lock().readers
    }

    pub fn waiting_writers(&self) -> usize {
        self.gate.lock().waiting_writers
    }

    pub fn is_write_locked(&self) -> bool {
        self.gate.lock().writer
    }

    fn unlock_read(&self) {
        let mut gate = self.gate.lock();
        gate.readers -= 1;
        if gate.readers == 0 {
            self.turn.notify_all();
        }
    }

    fn unlock_write(&self) {
        let mut gate = self.gate.lock();
        gate.writer = false;
        self.turn.notify_all();
    }
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Read,
    Write,
}

struct Admission<'a, T> {
    lock: &'a ReadWriteLock<T>,
    mode: Mode,
}

impl<T> Drop for Admission<'_, T> {
    fn drop(&mut self) {
        match self.mode {
            Mode::Read => self.lock.unlock_read(),
            Mode::Write => self.lock.unlock_write(),
        }
    }
}

/// Shared access. Field order matters: the data guard drops before the gate
/// is released.
pub struct ReadGuard<'a, T> {
    data: RwLockReadGuard<'a, T>,
    _admission: Admission<'a, T>,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

/// Exclusive access.
pub struct WriteGuard<'a, T> {
    data: RwLockWriteGuard<'a, T>,
    _admission: Admission<'a, T>,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}
