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

use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use log::{debug, error};
use uci_packets::{MAX_PACKET_LEN, MAX_PAYLOAD_LEN, UCI_PACKET_HEADER_LEN};

use crate::buffer::{Block, BlockAllocator, BlockChain, MIN_BLOCK_SIZE};
use crate::error::{Error, Result};

/// The maximum number of nested sub-messages open at the same time.
pub const MAX_NEST_DEPTH: usize = 8;

/// The location of a byte written by [`MessageBuilder::reserve_u8`], to be patched later.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReservedByte {
    block: usize,
    offset: usize,
}

/// Builds a message payload as a chain of blocks.
///
/// Every write returns a `Result`. The first failure is latched: from then on every write fails
/// with that same error and leaves the chain untouched, so a sequence of writes can be checked
/// once at the end with [`MessageBuilder::failed`] or [`MessageBuilder::finish`].
///
/// The blocks are allocated with room for a packet header and filled with at most one packet
/// payload each, so that the segmentation can frame them in place.
pub struct MessageBuilder {
    allocator: Rc<dyn BlockAllocator>,
    chain: BlockChain,
    first_error: Option<Error>,
    expected_packet_size: usize,
    nest_depth: usize,
}

impl MessageBuilder {
    pub fn new(allocator: Rc<dyn BlockAllocator>) -> Self {
        Self::with_packet_size(allocator, MAX_PACKET_LEN)
    }

    /// Create a builder whose blocks hold packets of at most `expected_packet_size` bytes,
    /// header included. The size is clamped to [MIN_BLOCK_SIZE, MAX_PACKET_LEN].
    pub fn with_packet_size(
        allocator: Rc<dyn BlockAllocator>,
        expected_packet_size: usize,
    ) -> Self {
        Self {
            allocator,
            chain: BlockChain::new(),
            first_error: None,
            expected_packet_size: expected_packet_size.clamp(MIN_BLOCK_SIZE, MAX_PACKET_LEN),
            nest_depth: 0,
        }
    }

    pub fn expected_packet_size(&self) -> usize {
        self.expected_packet_size
    }

    /// Whether any write failed so far.
    pub fn failed(&self) -> bool {
        self.first_error.is_some()
    }

    pub fn first_error(&self) -> Option<&Error> {
        self.first_error.as_ref()
    }

    /// The number of payload bytes written so far.
    pub fn len(&self) -> usize {
        self.chain.total_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append raw bytes, allocating new blocks as needed.
    pub fn put(&mut self, mut bytes: &[u8]) -> Result<&mut Self> {
        self.check()?;
        while !bytes.is_empty() {
            self.ensure_room()?;
            let n = self.chain.extend_back(bytes, self.block_payload_limit());
            bytes = &bytes[n..];
        }
        Ok(self)
    }

    pub fn put_u8(&mut self, value: u8) -> Result<&mut Self> {
        self.put(&[value])
    }

    pub fn put_u16(&mut self, value: u16) -> Result<&mut Self> {
        self.put(&value.to_le_bytes())
    }

    pub fn put_u32(&mut self, value: u32) -> Result<&mut Self> {
        self.put(&value.to_le_bytes())
    }

    /// Append the low 48 bits of `value` as 6 bytes.
    pub fn put_u48(&mut self, value: u64) -> Result<&mut Self> {
        self.put(&value.to_le_bytes()[..6])
    }

    pub fn put_u64(&mut self, value: u64) -> Result<&mut Self> {
        self.put(&value.to_le_bytes())
    }

    /// Reserve up to `size` bytes for the caller to write in place.
    ///
    /// The returned slice is shorter than `size` when the current block cannot hold it all; the
    /// caller loops until everything is written.
    pub fn put_nocopy(&mut self, size: usize) -> Result<&mut [u8]> {
        self.check()?;
        if size == 0 {
            return Ok(&mut []);
        }
        self.ensure_room()?;
        let limit = self.block_payload_limit();
        Ok(self.chain.reserve_back(size, limit))
    }

    /// Splice `block` into the message without copying. The builder owns the block from now on;
    /// a failed builder releases it immediately.
    pub fn put_blk(&mut self, block: Block) -> Result<&mut Self> {
        if let Err(e) = self.check() {
            debug!("Releasing a {} byte block spliced into a failed message", block.len());
            return Err(e);
        }
        self.chain.push_back(block);
        Ok(self)
    }

    /// Write `initial` and return a handle to patch it later with [`MessageBuilder::set_reserved`].
    pub fn reserve_u8(&mut self, initial: u8) -> Option<ReservedByte> {
        self.reserve(initial).ok()
    }

    pub fn set_reserved(&mut self, handle: ReservedByte, value: u8) {
        if self.failed() {
            return;
        }
        match self.chain.byte_mut(handle.block, handle.offset) {
            Some(byte) => *byte = value,
            None => error!("Reserved byte {:?} is out of the message", handle),
        }
    }

    /// Open a nested sub-message. A one-byte element count is written now and patched with
    /// [`Nest::elems_nr`] when the nest ends.
    pub fn start_nest(&mut self) -> Result<Nest<'_>> {
        self.check()?;
        if self.nest_depth >= MAX_NEST_DEPTH {
            return Err(self.fail(Error::NestTooDeep));
        }
        let count = self.reserve(0)?;
        self.nest_depth += 1;
        Ok(Nest { builder: self, count, elems_nr: 0 })
    }

    /// Hand over the built payload, or the first error.
    pub fn finish(self) -> Result<BlockChain> {
        match self.first_error {
            Some(e) => Err(e),
            None => Ok(self.chain),
        }
    }

    fn reserve(&mut self, initial: u8) -> Result<ReservedByte> {
        self.put_u8(initial)?;
        let block = self.chain.block_count() - 1;
        let offset = self.chain.back().map_or(0, |b| b.len() - 1);
        Ok(ReservedByte { block, offset })
    }

    fn check(&self) -> Result<()> {
        match &self.first_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn fail(&mut self, error: Error) -> Error {
        self.first_error.get_or_insert(error).clone()
    }

    fn block_payload_limit(&self) -> usize {
        (self.expected_packet_size - UCI_PACKET_HEADER_LEN).min(MAX_PAYLOAD_LEN)
    }

    // Make sure the last block can take at least one more byte.
    fn ensure_room(&mut self) -> Result<()> {
        if self.chain.back_room(self.block_payload_limit()) > 0 {
            return Ok(());
        }
        match Block::alloc_with_header_room(&self.allocator, self.expected_packet_size) {
            Some(block) => {
                self.chain.push_back(block);
                Ok(())
            }
            None => Err(self.fail(Error::NoBuffer)),
        }
    }
}

/// An open nested sub-message. It dereferences to the parent builder for writing the elements,
/// and patches the element count into the parent when it ends or is dropped.
pub struct Nest<'a> {
    builder: &'a mut MessageBuilder,
    count: ReservedByte,
    elems_nr: u8,
}

impl Nest<'_> {
    /// Count one more element. Fails when the count no longer fits in its byte.
    pub fn add_elem(&mut self) -> Result<()> {
        self.builder.check()?;
        match self.elems_nr.checked_add(1) {
            Some(n) => {
                self.elems_nr = n;
                Ok(())
            }
            None => Err(self.builder.fail(Error::BadParameters)),
        }
    }

    pub fn elems_nr(&self) -> u8 {
        self.elems_nr
    }

    /// Close the nest. Same as dropping it.
    pub fn end(self) {}
}

impl Deref for Nest<'_> {
    type Target = MessageBuilder;

    fn deref(&self) -> &MessageBuilder {
        self.builder
    }
}

impl DerefMut for Nest<'_> {
    fn deref_mut(&mut self) -> &mut MessageBuilder {
        self.builder
    }
}

impl Drop for Nest<'_> {
    fn drop(&mut self) {
        let (count, elems_nr) = (self.count, self.elems_nr);
        self.builder.set_reserved(count, elems_nr);
        self.builder.nest_depth -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::buffer::mock_allocator::{CountingAllocator, FailingAllocator};

    fn counting_builder(packet_size: usize) -> (Rc<CountingAllocator>, MessageBuilder) {
        let counting = Rc::new(CountingAllocator::new());
        let allocator: Rc<dyn BlockAllocator> = counting.clone();
        (counting, MessageBuilder::with_packet_size(allocator, packet_size))
    }

    fn assert_total_len(chain: &BlockChain) {
        assert_eq!(chain.total_len(), chain.iter().map(Block::len).sum::<usize>());
    }

    #[test]
    fn test_little_endian_scalars() {
        let (_, mut builder) = counting_builder(MAX_PACKET_LEN);
        builder.put_u16(0x0102).unwrap();
        builder.put_u32(0x0304_0506).unwrap();
        builder.put_u48(0xffff_0708_090a_0b0c).unwrap();
        builder.put_u64(0x0d0e_0f10_1112_1314).unwrap();
        let chain = builder.finish().unwrap();
        assert_eq!(
            chain.to_vec(),
            vec![
                0x02, 0x01, 0x06, 0x05, 0x04, 0x03, 0x0c, 0x0b, 0x0a, 0x09, 0x08, 0x07, 0x14, 0x13,
                0x12, 0x11, 0x10, 0x0f, 0x0e, 0x0d
            ]
        );
    }

    #[test]
    fn test_blocks_hold_one_packet_payload() {
        let (_, mut builder) = counting_builder(MAX_PACKET_LEN);
        builder.put(&[0x5a; 600]).unwrap();
        let chain = builder.finish().unwrap();
        let lens: Vec<usize> = chain.iter().map(Block::len).collect();
        assert_eq!(lens, vec![255, 255, 90]);
        assert!(chain.iter().all(Block::is_header_reserved));
        assert_total_len(&chain);

        let (_, mut builder) = counting_builder(24);
        builder.put(&[0x5a; 50]).unwrap();
        let chain = builder.finish().unwrap();
        let lens: Vec<usize> = chain.iter().map(Block::len).collect();
        assert_eq!(lens, vec![20, 20, 10]);
    }

    #[test]
    fn test_packet_size_is_clamped() {
        let (_, builder) = counting_builder(1);
        assert_eq!(builder.expected_packet_size(), MIN_BLOCK_SIZE);
        let (_, builder) = counting_builder(10_000);
        assert_eq!(builder.expected_packet_size(), MAX_PACKET_LEN);
    }

    #[test]
    fn test_error_is_latched() {
        let (counting, mut builder) = counting_builder(MAX_PACKET_LEN);
        counting.fail_after(1);
        assert_eq!(builder.put(&[0; 300]).err(), Some(Error::NoBuffer));
        assert!(builder.failed());
        assert_eq!(builder.len(), 255);

        for _ in 0..10 {
            assert_eq!(builder.put_u32(1).err(), Some(Error::NoBuffer));
            assert!(builder.put_nocopy(4).is_err());
            assert!(builder.reserve_u8(0).is_none());
            assert!(builder.start_nest().is_err());
        }
        assert_eq!(builder.len(), 255);
        assert_eq!(builder.first_error(), Some(&Error::NoBuffer));
        assert_eq!(builder.finish().err(), Some(Error::NoBuffer));
        assert_eq!(counting.outstanding(), 0);
    }

    #[test]
    fn test_exhausted_allocator() {
        let allocator: Rc<dyn BlockAllocator> = Rc::new(FailingAllocator);
        let mut builder = MessageBuilder::new(allocator);
        assert!(builder.put_u8(1).is_err());
        assert!(builder.failed());
        assert!(builder.is_empty());
    }

    #[test]
    fn test_empty_write_allocates_nothing() {
        let (counting, mut builder) = counting_builder(MAX_PACKET_LEN);
        builder.put(&[]).unwrap();
        assert!(builder.put_nocopy(0).unwrap().is_empty());
        assert_eq!(counting.allocated(), 0);
        assert!(builder.finish().unwrap().is_empty());
    }

    #[test]
    fn test_put_nocopy_is_bounded_by_block() {
        let (_, mut builder) = counting_builder(24);
        builder.put(&[1; 18]).unwrap();
        let space = builder.put_nocopy(8).unwrap();
        assert_eq!(space.len(), 2);
        space.copy_from_slice(&[2, 2]);
        let space = builder.put_nocopy(8).unwrap();
        assert_eq!(space.len(), 8);
        space.fill(3);

        let chain = builder.finish().unwrap();
        assert_eq!(chain.block_count(), 2);
        assert_eq!(chain.total_len(), 28);
        assert_total_len(&chain);
    }

    #[test]
    fn test_put_blk() {
        let (_, mut builder) = counting_builder(MAX_PACKET_LEN);
        builder.put_u8(0x10).unwrap();
        builder.put_blk(Block::from(vec![0x20; 300])).unwrap();
        builder.put_u8(0x30).unwrap();
        let chain = builder.finish().unwrap();
        assert_eq!(chain.block_count(), 3);
        assert_eq!(chain.total_len(), 302);
        assert_total_len(&chain);
    }

    #[test]
    fn test_put_blk_on_failed_builder_releases_block() {
        let allocator: Rc<dyn BlockAllocator> = Rc::new(FailingAllocator);
        let mut builder = MessageBuilder::new(allocator);
        let _ = builder.put_u8(0);

        let released = Rc::new(std::cell::Cell::new(false));
        let released_clone = released.clone();
        let block = Block::from_external(vec![1, 2, 3], move |_| released_clone.set(true));
        assert!(builder.put_blk(block).is_err());
        assert!(released.get());
    }

    #[test]
    fn test_reserve_u8() {
        let (_, mut builder) = counting_builder(24);
        builder.put(&[0; 19]).unwrap();
        let handle = builder.reserve_u8(0xff).unwrap();
        builder.put(&[0; 5]).unwrap();
        builder.set_reserved(handle, 0x42);
        let chain = builder.finish().unwrap();
        assert_eq!(chain.front().unwrap().data()[19], 0x42);
    }

    #[test]
    fn test_nest_patches_count() {
        let (_, mut builder) = counting_builder(MAX_PACKET_LEN);
        let mut nest = builder.start_nest().unwrap();
        nest.put_u8(0xaa).unwrap();
        nest.add_elem().unwrap();
        {
            let mut inner = nest.start_nest().unwrap();
            inner.put_u16(0xbbcc).unwrap();
            inner.add_elem().unwrap();
            inner.put_u16(0xddee).unwrap();
            inner.add_elem().unwrap();
            assert_eq!(inner.elems_nr(), 2);
        }
        nest.add_elem().unwrap();
        nest.end();

        let chain = builder.finish().unwrap();
        assert_eq!(chain.to_vec(), vec![2, 0xaa, 2, 0xcc, 0xbb, 0xee, 0xdd]);
    }

    #[test]
    fn test_nest_depth_is_bounded() {
        fn open(builder: &mut MessageBuilder, depth: usize) -> Result<()> {
            let mut nest = builder.start_nest()?;
            if depth > 1 {
                open(&mut nest, depth - 1)?;
            }
            nest.add_elem()
        }

        let (_, mut builder) = counting_builder(MAX_PACKET_LEN);
        open(&mut builder, MAX_NEST_DEPTH).unwrap();
        assert_eq!(builder.len(), MAX_NEST_DEPTH);

        assert_eq!(open(&mut builder, MAX_NEST_DEPTH + 1).err(), Some(Error::NestTooDeep));
        assert!(builder.failed());
    }

    #[test]
    fn test_nest_count_overflow() {
        let (_, mut builder) = counting_builder(MAX_PACKET_LEN);
        let mut nest = builder.start_nest().unwrap();
        for _ in 0..u8::MAX {
            nest.add_elem().unwrap();
        }
        assert_eq!(nest.add_elem().err(), Some(Error::BadParameters));
        drop(nest);
        assert!(builder.failed());
    }
}
