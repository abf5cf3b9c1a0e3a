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

//! A Transport that forwards the core callbacks to an async driver task over a channel.

use log::{debug, warn};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::uci::transport::Transport;
use crate::utils::clean_mpsc_receiver;

/// The callbacks of the core, as seen by the driver task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    Attached,
    Detached,
    /// The core has packets to send again.
    SendReady,
}

/// The Transport half of the channel. Attach it to the core and poll the [`TransportEvents`].
pub struct ChannelTransport {
    event_sender: mpsc::UnboundedSender<TransportEvent>,
}

impl ChannelTransport {
    pub fn new() -> (Self, TransportEvents) {
        let (event_sender, event_receiver) = mpsc::unbounded_channel();
        (Self { event_sender }, TransportEvents { event_receiver })
    }

    fn send(&self, event: TransportEvent) -> Result<()> {
        self.event_sender.send(event).map_err(|_| {
            warn!("The transport event receiver is dropped, {:?} is lost", event);
            Error::NotAttached
        })
    }
}

impl Transport for ChannelTransport {
    fn attach(&mut self) -> Result<()> {
        self.send(TransportEvent::Attached)
    }

    fn detach(&mut self) {
        let _ = self.send(TransportEvent::Detached);
    }

    fn packet_send_ready(&mut self) {
        let _ = self.send(TransportEvent::SendReady);
    }
}

/// The receiving half of the channel, owned by the driver task.
pub struct TransportEvents {
    event_receiver: mpsc::UnboundedReceiver<TransportEvent>,
}

impl TransportEvents {
    /// Wait for the next event. Returns None once the ChannelTransport is dropped.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.event_receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<TransportEvent> {
        self.event_receiver.try_recv().ok()
    }
}

impl Drop for TransportEvents {
    fn drop(&mut self) {
        debug!("Dropping the transport events");
        clean_mpsc_receiver(&mut self.event_receiver);
    }
}
