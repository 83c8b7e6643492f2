//! Reusable object pools
//!
//! Per-request objects (contexts, request wrappers, response buffers) are
//! drawn from a [`Pool`] and handed back after the response is flushed.
//! The pool keys objects only by type; nothing about a previous request
//! survives a cycle except allocated capacity.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default number of idle instances a pool keeps
pub const DEFAULT_MAX_IDLE: usize = 1024;

/// An object that can be returned to a clean slate
pub trait Reusable: Default + Send {
    /// Clear every field that could carry request data.
    fn reset(&mut self);
}

/// Free-list object pool that resets on release and again on acquire
pub struct Pool<T: Reusable> {
    idle: Mutex<Vec<T>>,
    max_idle: usize,
    created: AtomicUsize,
    reused: AtomicUsize,
}

impl<T: Reusable> Pool<T> {
    /// Create a pool keeping at most `max_idle` released instances
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
            created: AtomicUsize::new(0),
            reused: AtomicUsize::new(0),
        }
    }

    /// Take an instance, constructing one if the pool is empty.
    ///
    /// The returned value has always been reset.
    pub fn acquire(&self) -> T {
        let recycled = self.idle.lock().pop();

        match recycled {
            Some(mut item) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                item.reset();
                item
            }
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                let mut item = T::default();
                item.reset();
                item
            }
        }
    }

    /// Hand an instance back.
    ///
    /// Must be called exactly once per [`acquire`](Self::acquire). Kept
    /// instances are reset here so idle objects pin no request data. When
    /// the free list is full the instance is dropped.
    pub fn release(&self, mut item: T) {
        if self.idle.lock().len() >= self.max_idle {
            return;
        }
        item.reset();

        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(item);
        }
    }

    /// Number of idle instances
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    /// Instances constructed because the pool was empty
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Acquisitions served from the free list
    pub fn reused(&self) -> usize {
        self.reused.load(Ordering::Relaxed)
    }
}

impl<T: Reusable> Default for Pool<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE)
    }
}

impl<T: Reusable> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("idle", &self.idle())
            .field("max_idle", &self.max_idle)
            .field("created", &self.created())
            .field("reused", &self.reused())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Default)]
    struct Scratch {
        items: Vec<u32>,
        dirty: bool,
    }

    impl Reusable for Scratch {
        fn reset(&mut self) {
            self.items.clear();
            self.dirty = false;
        }
    }

    #[test]
    fn test_acquire_creates_when_empty() {
        let pool: Pool<Scratch> = Pool::default();
        let item = pool.acquire();
        assert!(item.items.is_empty());
        assert_eq!(pool.created(), 1);
        assert_eq!(pool.reused(), 0);
    }

    #[test]
    fn test_release_then_acquire_resets() {
        let pool: Pool<Scratch> = Pool::default();

        let mut item = pool.acquire();
        item.items.extend([1, 2, 3]);
        item.dirty = true;
        pool.release(item);
        assert_eq!(pool.idle(), 1);

        let item = pool.acquire();
        assert!(item.items.is_empty());
        assert!(item.items.capacity() >= 3);
        assert!(!item.dirty);
        assert_eq!(pool.reused(), 1);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_release_clears_idle_instances() {
        let pool: Pool<Scratch> = Pool::default();

        let mut item = pool.acquire();
        item.items.extend([7; 64]);
        item.dirty = true;
        pool.release(item);

        let idle = pool.idle.lock();
        assert!(idle[0].items.is_empty());
        assert!(idle[0].items.capacity() >= 64);
        assert!(!idle[0].dirty);
    }

    #[test]
    fn test_max_idle_bounds_growth() {
        let pool: Pool<Scratch> = Pool::new(2);
        for _ in 0..5 {
            pool.release(Scratch::default());
        }
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let pool: Arc<Pool<Scratch>> = Arc::new(Pool::default());

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let mut item = pool.acquire();
                        assert!(item.items.is_empty());
                        item.items.push(i);
                        pool.release(item);
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(pool.created() + pool.reused(), 800);
        assert!(pool.idle() <= 8);
    }
}
