// Copyright 2022, The Android Open Source Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! This module defines the BlockAllocator trait, the pluggable source of packet buffer memory.

use std::cell::RefCell;

use log::{debug, warn};
use uci_packets::MAX_PACKET_LEN;
use zeroize::Zeroize;

use crate::buffer::block::MIN_BLOCK_SIZE;

/// The trait for the strategy that produces and reclaims packet buffer memory. The client of this
/// library may implement this trait to plug in its own memory pool.
///
/// The allocator only deals in raw buffers; wrapping them into [`Block`](super::Block)s and
/// returning them on release is done by the block itself.
pub trait BlockAllocator: 'static {
    /// Returns one buffer, or None when the allocator is exhausted.
    ///
    /// The returned buffer may be smaller or larger than `size_hint`. Buffers shorter than
    /// [`MIN_BLOCK_SIZE`] are refused by the caller.
    fn alloc(&self, size_hint: usize) -> Option<Box<[u8]>>;

    /// Takes back one buffer previously returned by `alloc()`.
    fn free(&self, buf: Box<[u8]>);
}

/// Allocates every block on the global heap, sized after the hint.
pub struct HeapAllocator {
    max_block_size: usize,
}

impl HeapAllocator {
    pub fn new() -> Self {
        Self::with_max_block_size(MAX_PACKET_LEN)
    }

    /// Create an allocator that never returns blocks larger than `max_block_size` bytes.
    pub fn with_max_block_size(max_block_size: usize) -> Self {
        Self { max_block_size: max_block_size.max(MIN_BLOCK_SIZE) }
    }
}

impl Default for HeapAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockAllocator for HeapAllocator {
    fn alloc(&self, size_hint: usize) -> Option<Box<[u8]>> {
        let size = size_hint.clamp(MIN_BLOCK_SIZE, self.max_block_size);
        Some(vec![0; size].into_boxed_slice())
    }

    fn free(&self, mut buf: Box<[u8]>) {
        // Payloads may carry session keys.
        buf.zeroize();
    }
}

/// A fixed-block pool: all the blocks are allocated up front and recycled through a free list.
pub struct PoolAllocator {
    block_size: usize,
    capacity: usize,
    free_list: RefCell<Vec<Box<[u8]>>>,
}

impl PoolAllocator {
    pub fn new(block_count: usize, block_size: usize) -> Self {
        let block_size = block_size.max(MIN_BLOCK_SIZE);
        let free_list = (0..block_count).map(|_| vec![0; block_size].into_boxed_slice()).collect();
        Self { block_size, capacity: block_count, free_list: RefCell::new(free_list) }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of blocks currently in the free list.
    pub fn available(&self) -> usize {
        self.free_list.borrow().len()
    }
}

impl BlockAllocator for PoolAllocator {
    fn alloc(&self, _size_hint: usize) -> Option<Box<[u8]>> {
        let buf = self.free_list.borrow_mut().pop();
        if buf.is_none() {
            debug!("Block pool exhausted ({} blocks of {} bytes)", self.capacity, self.block_size);
        }
        buf
    }

    fn free(&self, mut buf: Box<[u8]>) {
        if buf.len() != self.block_size {
            warn!("Dropping a {} byte buffer not owned by the pool", buf.len());
            return;
        }
        buf.zeroize();
        self.free_list.borrow_mut().push(buf);
    }
}
