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

use std::fmt;
use std::rc::Rc;

use log::error;
use uci_packets::{STATUS_PACKET_LEN, UCI_PACKET_HEADER_LEN};

use crate::buffer::allocator::BlockAllocator;

/// The smallest block the core works with: the 4-byte header reservation plus the 16-byte worst
/// case segmentation descriptor.
pub const MIN_BLOCK_SIZE: usize = 20;
/// The size of the inline storage of static blocks, enough for one status packet.
pub const STATIC_BLOCK_SIZE: usize = STATUS_PACKET_LEN;

/// Called with the imported buffer when an external block is released.
pub type Destructor = Box<dyn FnOnce(Vec<u8>)>;

/// Where the memory of a block comes from, which decides how it is released.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    /// Handed out by a BlockAllocator, given back to it on release.
    Pool,
    /// Caller memory imported without copy. Its destructor runs on release.
    External,
    /// Inline storage that never touches an allocator.
    Static,
}

enum Storage {
    Pool { buf: Box<[u8]>, allocator: Rc<dyn BlockAllocator> },
    External { buf: Vec<u8>, destructor: Option<Destructor> },
    Static { buf: [u8; STATIC_BLOCK_SIZE] },
}

impl Storage {
    fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Pool { buf, .. } => &buf[..],
            Storage::External { buf, .. } => &buf[..],
            Storage::Static { buf } => &buf[..],
        }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            Storage::Pool { buf, .. } => &mut buf[..],
            Storage::External { buf, .. } => &mut buf[..],
            Storage::Static { buf } => &mut buf[..],
        }
    }
}

/// A packet buffer block: the byte range `[start, start + len)` of an owned allocation.
///
/// The bytes before `start` are headroom. Blocks allocated for message building keep
/// [`UCI_PACKET_HEADER_LEN`] bytes of headroom so that the packet header can later be written in
/// place. Dropping a block releases its memory according to its [`BlockKind`].
pub struct Block {
    storage: Storage,
    start: usize,
    len: usize,
}

impl Block {
    /// Allocate an empty block from `allocator`. Returns None when the allocator is exhausted or
    /// hands out a block smaller than [`MIN_BLOCK_SIZE`].
    pub fn alloc(allocator: &Rc<dyn BlockAllocator>, size_hint: usize) -> Option<Self> {
        let buf = allocator.alloc(size_hint)?;
        if buf.len() < MIN_BLOCK_SIZE {
            error!("Allocator returned a {} byte block, minimum is {}", buf.len(), MIN_BLOCK_SIZE);
            allocator.free(buf);
            return None;
        }
        let storage = Storage::Pool { buf, allocator: Rc::clone(allocator) };
        Some(Self { storage, start: 0, len: 0 })
    }

    /// Allocate an empty block whose payload starts after room for a packet header.
    pub fn alloc_with_header_room(
        allocator: &Rc<dyn BlockAllocator>,
        size_hint: usize,
    ) -> Option<Self> {
        let mut block = Self::alloc(allocator, size_hint)?;
        block.start = UCI_PACKET_HEADER_LEN;
        Some(block)
    }

    /// Import `buf` without copying. `destructor` receives the buffer back when the block is
    /// released.
    pub fn from_external(buf: Vec<u8>, destructor: impl FnOnce(Vec<u8>) + 'static) -> Self {
        let len = buf.len();
        Self {
            storage: Storage::External { buf, destructor: Some(Box::new(destructor)) },
            start: 0,
            len,
        }
    }

    /// Create an empty block backed by inline storage of [`STATIC_BLOCK_SIZE`] bytes.
    pub fn new_static() -> Self {
        Self { storage: Storage::Static { buf: [0; STATIC_BLOCK_SIZE] }, start: 0, len: 0 }
    }

    pub fn kind(&self) -> BlockKind {
        match self.storage {
            Storage::Pool { .. } => BlockKind::Pool,
            Storage::External { .. } => BlockKind::External,
            Storage::Static { .. } => BlockKind::Static,
        }
    }

    /// The bytes in use.
    pub fn data(&self) -> &[u8] {
        &self.storage.as_slice()[self.start..self.start + self.len]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        let (start, len) = (self.start, self.len);
        &mut self.storage.as_mut_slice()[start..start + len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The capacity of the underlying allocation.
    pub fn size(&self) -> usize {
        self.storage.as_slice().len()
    }

    pub fn headroom(&self) -> usize {
        self.start
    }

    pub fn tailroom(&self) -> usize {
        self.size() - self.start - self.len
    }

    /// Whether a packet header can be prepended without copying.
    pub fn is_header_reserved(&self) -> bool {
        self.headroom() >= UCI_PACKET_HEADER_LEN
    }

    /// Copy as much of `bytes` as fits in the tailroom, returning the number of bytes copied.
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.tailroom());
        self.extend(n).copy_from_slice(&bytes[..n]);
        n
    }

    /// Release the block. Same as dropping it.
    pub fn free(self) {}

    /// Grow the block by up to `n` bytes of tailroom and return the new bytes.
    pub(crate) fn extend(&mut self, n: usize) -> &mut [u8] {
        let n = n.min(self.tailroom());
        let end = self.start + self.len;
        self.len += n;
        &mut self.storage.as_mut_slice()[end..end + n]
    }

    /// Write `header` into the headroom, making it part of the data.
    pub(crate) fn push_header(&mut self, header: &[u8]) -> bool {
        if self.headroom() < header.len() {
            return false;
        }
        self.start -= header.len();
        self.len += header.len();
        let start = self.start;
        self.storage.as_mut_slice()[start..start + header.len()].copy_from_slice(header);
        true
    }

    /// Drop the first `n` bytes of data; they become headroom.
    pub(crate) fn advance(&mut self, n: usize) {
        let n = n.min(self.len);
        self.start += n;
        self.len -= n;
    }
}

impl From<Vec<u8>> for Block {
    /// Import `buf` without copying. The buffer is simply dropped on release.
    fn from(buf: Vec<u8>) -> Self {
        let len = buf.len();
        Self { storage: Storage::External { buf, destructor: None }, start: 0, len }
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        match &mut self.storage {
            Storage::Pool { buf, allocator } => allocator.free(std::mem::take(buf)),
            Storage::External { buf, destructor } => {
                if let Some(destructor) = destructor.take() {
                    destructor(std::mem::take(buf));
                }
            }
            Storage::Static { .. } => (),
        }
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("kind", &self.kind())
            .field("headroom", &self.start)
            .field("len", &self.len)
            .field("size", &self.size())
            .finish()
    }
}
