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

//! Allocator test doubles.

use std::cell::Cell;

use crate::buffer::allocator::BlockAllocator;
use crate::buffer::block::MIN_BLOCK_SIZE;

/// An allocator that is always exhausted.
pub struct FailingAllocator;

impl BlockAllocator for FailingAllocator {
    fn alloc(&self, _size_hint: usize) -> Option<Box<[u8]>> {
        None
    }

    fn free(&self, _buf: Box<[u8]>) {
        panic!("FailingAllocator never hands out buffers");
    }
}

/// A heap allocator that keeps count of the buffers in use, and can be told to fail.
#[derive(Default)]
pub struct CountingAllocator {
    block_size: Option<usize>,
    remaining: Cell<Option<usize>>,
    allocated: Cell<usize>,
    freed: Cell<usize>,
}

impl CountingAllocator {
    /// Hands out buffers sized after the hint, never below MIN_BLOCK_SIZE.
    pub fn new() -> Self {
        Default::default()
    }

    /// Hands out buffers of `block_size` bytes, whatever the hint.
    pub fn with_block_size(block_size: usize) -> Self {
        Self { block_size: Some(block_size), ..Default::default() }
    }

    /// Succeed `count` more times, then fail every allocation.
    pub fn fail_after(&self, count: usize) {
        self.remaining.set(Some(count));
    }

    pub fn allocated(&self) -> usize {
        self.allocated.get()
    }

    /// The number of buffers handed out and not returned yet.
    pub fn outstanding(&self) -> usize {
        self.allocated.get() - self.freed.get()
    }
}

impl BlockAllocator for CountingAllocator {
    fn alloc(&self, size_hint: usize) -> Option<Box<[u8]>> {
        match self.remaining.get() {
            Some(0) => return None,
            Some(n) => self.remaining.set(Some(n - 1)),
            None => (),
        }
        self.allocated.set(self.allocated.get() + 1);
        Some(vec![0; self.block_size.unwrap_or(size_hint.max(MIN_BLOCK_SIZE))].into_boxed_slice())
    }

    fn free(&self, _buf: Box<[u8]>) {
        self.freed.set(self.freed.get() + 1);
    }
}
