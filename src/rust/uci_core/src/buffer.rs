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

//! Packet buffers: the pluggable block allocator, the ownership-tagged block, and the owned
//! block chain that carries one packet or one reassembled message.

mod allocator;
mod block;
mod chain;

#[cfg(any(test, feature = "mock-utils"))]
pub mod mock_allocator;

pub use allocator::{BlockAllocator, HeapAllocator, PoolAllocator};
pub use block::{Block, BlockKind, MIN_BLOCK_SIZE, STATIC_BLOCK_SIZE};
pub use chain::BlockChain;
