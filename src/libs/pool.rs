//! Reusable per-call scratch objects.
//!
//! Chainers, prefix trees and comparators keep large scratch buffers between
//! calls. A [`Pool`] hands out exclusive instances behind a [`Pooled`] guard;
//! dropping the guard resets the object and puts it back, so concurrent
//! callers never share one and nothing leaks on early returns.

use crossbeam::queue::SegQueue;
use std::ops::{Deref, DerefMut};

/// Reset an object to a reusable state before it goes back to its pool.
pub trait Recycle {
    fn recycle(&mut self);
}

pub struct Pool<T> {
    idle: SegQueue<T>,
    make: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T: Recycle> Pool<T> {
    pub fn new<F>(make: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            idle: SegQueue::new(),
            make: Box::new(make),
        }
    }

    /// An idle instance, or a fresh one if the pool is empty.
    pub fn get(&self) -> Pooled<'_, T> {
        let item = self.idle.pop().unwrap_or_else(|| (self.make)());
        Pooled {
            pool: self,
            item: Some(item),
        }
    }

    /// Number of instances waiting for reuse.
    pub fn idle(&self) -> usize {
        self.idle.len()
    }
}

/// Exclusive handle to a pooled object; returns it on drop.
pub struct Pooled<'a, T: Recycle> {
    pool: &'a Pool<T>,
    item: Option<T>,
}

impl<T: Recycle> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.item.as_ref().expect("pooled object already returned")
    }
}

impl<T: Recycle> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().expect("pooled object already returned")
    }
}

impl<T: Recycle> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(mut item) = self.item.take() {
            item.recycle();
            self.pool.idle.push(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Scratch {
        buf: Vec<u32>,
    }

    impl Recycle for Scratch {
        fn recycle(&mut self) {
            self.buf.clear();
        }
    }

    #[test]
    fn test_guard_returns_object() {
        let pool = Pool::new(|| Scratch { buf: Vec::new() });
        assert_eq!(pool.idle(), 0);
        {
            let mut s = pool.get();
            s.buf.extend([1, 2, 3]);
            assert_eq!(pool.idle(), 0);
        }
        assert_eq!(pool.idle(), 1);

        let s = pool.get();
        assert!(s.buf.is_empty());
        assert!(s.buf.capacity() >= 3);
    }

    #[test]
    fn test_concurrent_use() {
        let made = Arc::new(AtomicUsize::new(0));
        let counter = made.clone();
        let pool = Pool::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Scratch { buf: Vec::new() }
        });

        let sums: Vec<u32> = (0..64u32)
            .into_par_iter()
            .map(|i| {
                let mut s = pool.get();
                s.buf.extend(0..=i);
                s.buf.iter().sum()
            })
            .collect();

        for (i, sum) in sums.iter().enumerate() {
            let i = i as u32;
            assert_eq!(*sum, i * (i + 1) / 2);
        }
        assert_eq!(pool.idle(), made.load(Ordering::SeqCst));
    }
}
