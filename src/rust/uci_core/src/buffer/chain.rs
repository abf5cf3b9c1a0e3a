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

use std::collections::vec_deque::{self, VecDeque};
use std::fmt;

use bytes::{Bytes, BytesMut};

use crate::buffer::block::Block;

/// An owned sequence of blocks holding one packet or one logical message.
///
/// The chain caches the sum of its block lengths in `total_len`. Once a block is part of a chain
/// its length only changes through the chain, which keeps the two in sync.
#[derive(Default)]
pub struct BlockChain {
    blocks: VecDeque<Block>,
    total_len: usize,
}

impl BlockChain {
    pub fn new() -> Self {
        Default::default()
    }

    /// The number of data bytes over all the blocks.
    pub fn total_len(&self) -> usize {
        self.total_len
    }

    /// Whether the chain holds no block at all.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, Block> {
        self.blocks.iter()
    }

    pub fn front(&self) -> Option<&Block> {
        self.blocks.front()
    }

    pub fn back(&self) -> Option<&Block> {
        self.blocks.back()
    }

    pub fn push_back(&mut self, block: Block) {
        self.total_len += block.len();
        self.blocks.push_back(block);
    }

    pub fn push_front(&mut self, block: Block) {
        self.total_len += block.len();
        self.blocks.push_front(block);
    }

    pub fn pop_front(&mut self) -> Option<Block> {
        let block = self.blocks.pop_front()?;
        self.total_len -= block.len();
        Some(block)
    }

    /// Move all the blocks of `other` to the end of this chain.
    pub fn append(&mut self, mut other: BlockChain) {
        self.total_len += other.total_len;
        other.total_len = 0;
        self.blocks.append(&mut other.blocks);
    }

    /// Release every block of the chain. Same as dropping it.
    pub fn free_all(self) {}

    /// Copy the data of all the blocks into one contiguous buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut bytes = BytesMut::with_capacity(self.total_len);
        for block in self.blocks.iter() {
            bytes.extend_from_slice(block.data());
        }
        bytes.freeze()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }

    /// The number of bytes the last block can still take while staying within `limit` bytes.
    pub(crate) fn back_room(&self, limit: usize) -> usize {
        self.blocks
            .back()
            .map_or(0, |block| block.tailroom().min(limit.saturating_sub(block.len())))
    }

    /// Copy as much of `bytes` as fits in the last block, returning the number of bytes copied.
    pub(crate) fn extend_back(&mut self, bytes: &[u8], limit: usize) -> usize {
        let n = bytes.len().min(self.back_room(limit));
        self.reserve_back(n, limit).copy_from_slice(&bytes[..n]);
        n
    }

    /// Grow the last block by up to `n` bytes and return them for writing.
    pub(crate) fn reserve_back(&mut self, n: usize, limit: usize) -> &mut [u8] {
        let n = n.min(self.back_room(limit));
        self.total_len += n;
        match self.blocks.back_mut() {
            Some(block) => block.extend(n),
            None => &mut [],
        }
    }

    /// Write `header` into the headroom of the first block.
    pub(crate) fn prepend(&mut self, header: &[u8]) -> bool {
        match self.blocks.front_mut() {
            Some(block) => {
                if !block.push_header(header) {
                    return false;
                }
                self.total_len += header.len();
                true
            }
            None => false,
        }
    }

    /// Drop the first `n` bytes of the chain, releasing the blocks emptied on the way.
    pub(crate) fn advance_front(&mut self, mut n: usize) {
        while n > 0 {
            let Some(front) = self.blocks.front_mut() else {
                break;
            };
            if front.len() <= n {
                n -= front.len();
                self.pop_front();
            } else {
                front.advance(n);
                self.total_len -= n;
                n = 0;
            }
        }
    }

    pub(crate) fn byte_mut(&mut self, block: usize, offset: usize) -> Option<&mut u8> {
        self.blocks.get_mut(block)?.data_mut().get_mut(offset)
    }
}

impl From<Block> for BlockChain {
    fn from(block: Block) -> Self {
        let mut chain = BlockChain::new();
        chain.push_back(block);
        chain
    }
}

impl FromIterator<Block> for BlockChain {
    fn from_iter<I: IntoIterator<Item = Block>>(iter: I) -> Self {
        let mut chain = BlockChain::new();
        for block in iter {
            chain.push_back(block);
        }
        chain
    }
}

impl fmt::Debug for BlockChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockChain")
            .field("total_len", &self.total_len)
            .field("blocks", &self.blocks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::rc::Rc;

    use crate::buffer::allocator::BlockAllocator;
    use crate::buffer::mock_allocator::CountingAllocator;

    fn assert_total_len(chain: &BlockChain) {
        assert_eq!(chain.total_len(), chain.iter().map(Block::len).sum::<usize>());
    }

    #[test]
    fn test_push_pop_keeps_total_len() {
        let mut chain = BlockChain::new();
        chain.push_back(Block::from(vec![1, 2, 3]));
        chain.push_front(Block::from(vec![0]));
        chain.push_back(Block::from(vec![4, 5]));
        assert_eq!(chain.total_len(), 6);
        assert_eq!(chain.block_count(), 3);
        assert_eq!(chain.to_vec(), vec![0, 1, 2, 3, 4, 5]);

        let front = chain.pop_front().unwrap();
        assert_eq!(front.data(), &[0]);
        assert_eq!(chain.total_len(), 5);
        assert_total_len(&chain);
    }

    #[test]
    fn test_append() {
        let mut chain: BlockChain =
            vec![Block::from(vec![1]), Block::from(vec![2, 3])].into_iter().collect();
        chain.append(BlockChain::from(Block::from(vec![4, 5, 6])));
        assert_eq!(chain.total_len(), 6);
        assert_eq!(chain.block_count(), 3);
        assert_total_len(&chain);
    }

    #[test]
    fn test_extend_back_respects_limit() {
        let allocator: Rc<dyn BlockAllocator> = Rc::new(CountingAllocator::new());
        let mut chain = BlockChain::from(Block::alloc_with_header_room(&allocator, 64).unwrap());

        assert_eq!(chain.back_room(8), 8);
        assert_eq!(chain.extend_back(&[0xaa; 10], 8), 8);
        assert_eq!(chain.extend_back(&[0xbb], 8), 0);
        assert_eq!(chain.total_len(), 8);
        assert_eq!(chain.reserve_back(4, 16).len(), 4);
        assert_eq!(chain.total_len(), 12);
        assert_total_len(&chain);
    }

    #[test]
    fn test_extend_back_on_empty_chain() {
        let mut chain = BlockChain::new();
        assert_eq!(chain.extend_back(&[1, 2], 255), 0);
        assert!(chain.reserve_back(2, 255).is_empty());
        assert_eq!(chain.total_len(), 0);
    }

    #[test]
    fn test_prepend() {
        let allocator: Rc<dyn BlockAllocator> = Rc::new(CountingAllocator::new());
        let mut chain = BlockChain::from(Block::alloc_with_header_room(&allocator, 32).unwrap());
        chain.extend_back(&[9], 255);
        assert!(chain.prepend(&[1, 2, 3, 4]));
        assert_eq!(chain.to_vec(), vec![1, 2, 3, 4, 9]);
        assert_eq!(chain.total_len(), 5);
        assert!(!chain.prepend(&[1, 2, 3, 4]));
        assert_eq!(chain.total_len(), 5);
        assert!(!BlockChain::new().prepend(&[1]));
        assert_total_len(&chain);
    }

    #[test]
    fn test_advance_front() {
        let mut chain: BlockChain =
            vec![Block::from(vec![1, 2]), Block::from(vec![3, 4, 5]), Block::from(vec![6])]
                .into_iter()
                .collect();
        chain.advance_front(3);
        assert_eq!(chain.block_count(), 2);
        assert_eq!(chain.to_vec(), vec![4, 5, 6]);
        assert_total_len(&chain);

        chain.advance_front(10);
        assert!(chain.is_empty());
        assert_eq!(chain.total_len(), 0);
    }

    #[test]
    fn test_drop_releases_every_block() {
        let counting = Rc::new(CountingAllocator::new());
        let allocator: Rc<dyn BlockAllocator> = counting.clone();
        let chain: BlockChain = (0..3).map(|_| Block::alloc(&allocator, 32).unwrap()).collect();
        assert_eq!(counting.outstanding(), 3);
        chain.free_all();
        assert_eq!(counting.outstanding(), 0);
    }

    #[test]
    fn test_byte_mut() {
        let mut chain: BlockChain =
            vec![Block::from(vec![1, 2]), Block::from(vec![3])].into_iter().collect();
        *chain.byte_mut(1, 0).unwrap() = 7;
        assert!(chain.byte_mut(1, 1).is_none());
        assert!(chain.byte_mut(2, 0).is_none());
        assert_eq!(chain.to_vec(), vec![1, 2, 7]);
    }
}
