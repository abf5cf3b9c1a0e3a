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

mod context;
mod registry;

pub mod channel_transport;
pub mod core_builder;
pub mod segmentation;
pub mod transport;
pub mod uci_logger;

#[cfg(any(test, feature = "mock-utils"))]
pub mod mock_transport;
#[cfg(test)]
pub(crate) mod mock_uci_logger;

pub use context::{Role, UciCore, UciSender};
pub use channel_transport::{ChannelTransport, TransportEvent, TransportEvents};
pub use core_builder::UciCoreBuilder;
pub use registry::{HandlerEntry, HandlerStatus, UciHandler};
pub use segmentation::{segment, Reassembler, UciPacket};
pub use transport::{NopTransport, Transport};
pub use uci_logger::{NopUciLogger, PacketDirection, UciLogger, UciLoggerMode};
