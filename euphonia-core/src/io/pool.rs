// Euphonia
// Copyright (c) 2023-2026 The Project Euphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cell::RefCell;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::rc::{Rc, Weak};

/// The maximum number of idle buffers retained by a pool.
const MAX_IDLE_BUFS: usize = 8;

/// `BufferPool` is a single-threaded pool of reusable byte buffers.
///
/// Buffers are rented with [`BufferPool::rent`] and recycle their storage back into the pool when
/// the returned [`PooledBuf`] is dropped. Cloning a `BufferPool` yields a handle to the same pool.
#[derive(Clone, Default)]
pub struct BufferPool {
    idle: Rc<RefCell<Vec<Vec<u8>>>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Default::default()
    }

    /// Rents a zeroed buffer of exactly `len` bytes, reusing recycled storage when available.
    pub fn rent(&self, len: usize) -> PooledBuf {
        let mut data = self.idle.borrow_mut().pop().unwrap_or_default();

        data.clear();
        data.resize(len, 0);

        PooledBuf { data, home: Rc::downgrade(&self.idle) }
    }
}

/// A byte buffer rented from a [`BufferPool`]. Dereferences to `[u8]`.
///
/// The underlying storage is returned to the pool on drop. A buffer may also be created detached
/// from any pool, in which case its storage is simply freed.
pub struct PooledBuf {
    data: Vec<u8>,
    home: Weak<RefCell<Vec<Vec<u8>>>>,
}

impl PooledBuf {
    /// Creates a buffer that is not associated with any pool.
    pub fn detached(data: Vec<u8>) -> Self {
        PooledBuf { data, home: Weak::new() }
    }
}

impl Deref for PooledBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        if let Some(home) = self.home.upgrade() {
            let mut idle = home.borrow_mut();

            if idle.len() < MAX_IDLE_BUFS {
                idle.push(mem::take(&mut self.data));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BufferPool;

    #[test]
    fn verify_rent_len() {
        let pool = BufferPool::new();

        let buf = pool.rent(100);
        assert_eq!(buf.len(), 100);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn verify_recycle() {
        let pool = BufferPool::new();

        let mut buf = pool.rent(64);
        buf[0] = 0xff;
        drop(buf);

        // The recycled buffer must be re-zeroed when rented again.
        let buf = pool.rent(32);
        assert_eq!(buf.len(), 32);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn verify_outlives_pool() {
        let pool = BufferPool::new();
        let buf = pool.rent(16);
        drop(pool);
        // The buffer detaches when the pool is gone.
        assert_eq!(buf.len(), 16);
    }
}
