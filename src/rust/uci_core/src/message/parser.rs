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

use bytes::{Bytes, BytesMut};

use crate::buffer::BlockChain;
use crate::error::{Error, Result};

/// Reads a message payload sequentially.
///
/// The parser owns the message. Blocks are released as soon as the cursor has moved past them.
#[derive(Debug)]
pub struct MessageParser {
    chain: BlockChain,
    // Offset of the cursor in the front block.
    offset: usize,
}

impl MessageParser {
    pub fn new(chain: BlockChain) -> Self {
        Self { chain, offset: 0 }
    }

    /// The number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.chain.total_len() - self.offset
    }

    /// Copy up to `buf.len()` bytes, returning the number of bytes copied.
    pub fn get(&mut self, buf: &mut [u8]) -> usize {
        let mut copied = 0;
        while copied < buf.len() {
            let data = self.get_nocopy(buf.len() - copied);
            if data.is_empty() {
                break;
            }
            buf[copied..copied + data.len()].copy_from_slice(data);
            copied += data.len();
        }
        copied
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(u8::from_le_bytes(self.get_array()?))
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.get_array()?))
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.get_array()?))
    }

    /// Read a 6-byte value.
    pub fn get_u48(&mut self) -> Result<u64> {
        let mut bytes = [0; 8];
        bytes[..6].copy_from_slice(&self.get_array::<6>()?);
        Ok(u64::from_le_bytes(bytes))
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.get_array()?))
    }

    /// Read up to `size` bytes in place. The returned slice stops at the end of the current block,
    /// so it may be shorter than `size` even when more bytes remain.
    pub fn get_nocopy(&mut self, size: usize) -> &[u8] {
        self.release_consumed();
        let start = self.offset;
        let n = match self.chain.front() {
            Some(block) => size.min(block.len() - start),
            None => return &[],
        };
        self.offset += n;
        match self.chain.front() {
            Some(block) => &block.data()[start..start + n],
            None => &[],
        }
    }

    /// Copy the next `size` bytes into a contiguous buffer.
    pub fn get_bytes(&mut self, size: usize) -> Result<Bytes> {
        self.check_remaining(size)?;
        let mut bytes = BytesMut::with_capacity(size);
        while bytes.len() < size {
            let data = self.get_nocopy(size - bytes.len());
            bytes.extend_from_slice(data);
        }
        Ok(bytes.freeze())
    }

    pub fn skip(&mut self, size: usize) -> Result<()> {
        self.check_remaining(size)?;
        self.offset += size;
        self.release_consumed();
        Ok(())
    }

    /// Detach the unread part of the message as a chain of its own, without copying.
    pub fn take_remaining(mut self) -> BlockChain {
        self.release_consumed();
        self.chain.advance_front(self.offset);
        self.chain
    }

    fn get_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.check_remaining(N)?;
        let mut bytes = [0; N];
        self.get(&mut bytes);
        Ok(bytes)
    }

    fn check_remaining(&self, wanted: usize) -> Result<()> {
        let remaining = self.remaining();
        if wanted > remaining {
            return Err(Error::Truncated { wanted, remaining });
        }
        Ok(())
    }

    // Pop the blocks that lie entirely before the cursor.
    fn release_consumed(&mut self) {
        while let Some(front) = self.chain.front() {
            if self.offset < front.len() {
                break;
            }
            self.offset -= front.len();
            self.chain.pop_front();
        }
    }
}
