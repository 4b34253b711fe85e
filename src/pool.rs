//! A bounded pool of reusable objects shared between threads.
//!
//! Documents themselves are single-threaded, but scratch objects that
//! are expensive to allocate can be shared by independent documents
//! on different threads. `get` hands out a pooled object, or a new one
//! when the pool is empty; dropping the guard gives it back unless
//! the pool is already full.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard};

use log::trace;

pub struct ObjectPool<T> {
    free: Mutex<Vec<T>>,
    capacity: usize,
    create: fn() -> T,
}

impl<T> ObjectPool<T> {
    pub const fn new(capacity: usize, create: fn() -> T) -> ObjectPool<T> {
        ObjectPool { free: Mutex::new(Vec::new()), capacity, create }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        // The free list holds no invariant a panicking holder could break.
        self.free.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self) -> Pooled<'_, T> {
        let item = self.lock().pop().unwrap_or_else(|| {
            trace!(target: "dom.pool", "pool empty, creating a new object");
            (self.create)()
        });
        Pooled { pool: self, item: Some(item) }
    }

    /// Return an object. It is dropped if the pool is full.
    pub fn release(&self, item: T) {
        let mut free = self.lock();
        if free.len() < self.capacity {
            free.push(item);
        } else {
            trace!(target: "dom.pool", "pool full, dropping a released object");
        }
    }

    /// Objects currently waiting to be reused.
    pub fn available(&self) -> usize {
        self.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// An object on loan from an `ObjectPool`.
pub struct Pooled<'p, T> {
    pool: &'p ObjectPool<T>,
    item: Option<T>,
}

impl<'p, T> Pooled<'p, T> {
    /// Keep the object instead of returning it to the pool.
    pub fn detach(mut self) -> Option<T> {
        self.item.take()
    }
}

impl<'p, T> Deref for Pooled<'p, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.item {
            Some(ref item) => item,
            None => unreachable!("pooled object used after detach"),
        }
    }
}

impl<'p, T> DerefMut for Pooled<'p, T> {
    fn deref_mut(&mut self) -> &mut T {
        match self.item {
            Some(ref mut item) => item,
            None => unreachable!("pooled object used after detach"),
        }
    }
}

impl<'p, T> Drop for Pooled<'p, T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.release(item);
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::thread;

    use super::ObjectPool;

    fn new_buffer() -> String {
        String::with_capacity(16)
    }

    #[test]
    fn misses_fall_back_to_the_factory() {
        let pool = ObjectPool::new(2, new_buffer);

        let item = pool.get();

        assert!(item.capacity() >= 16);
        assert_eq!(0, pool.available());
    }

    #[test]
    fn dropped_objects_are_reused() {
        let pool = ObjectPool::new(2, new_buffer);
        {
            let mut item = pool.get();
            item.push_str("used");
        }
        assert_eq!(1, pool.available());

        let item = pool.get();
        assert_eq!("used", *item);
    }

    #[test]
    fn the_pool_never_grows_past_its_capacity() {
        let pool = ObjectPool::new(1, new_buffer);

        let a = pool.get();
        let b = pool.get();
        drop(a);
        drop(b);

        assert_eq!(1, pool.available());
    }

    #[test]
    fn detached_objects_are_not_returned() {
        let pool = ObjectPool::new(1, new_buffer);

        let item = pool.get().detach();

        assert!(item.is_some());
        assert_eq!(0, pool.available());
    }

    #[test]
    fn can_be_shared_between_threads() {
        let pool = Arc::new(ObjectPool::new(4, new_buffer));

        let handles: Vec<_> = (0..8).map(|i| {
            let pool = pool.clone();
            thread::spawn(move || {
                let mut item = pool.get();
                item.clear();
                item.push_str(&i.to_string());
                item.len()
            })
        }).collect();

        for h in handles {
            assert_eq!(1, h.join().unwrap());
        }
        assert!(pool.available() <= pool.capacity());
    }
}
