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

use std::collections::VecDeque;
use std::rc::Rc;

use log::{debug, error, info, warn};
use uci_packets::{
    build_status_packet, MessageType, RoutingKey, StatusCode, MAX_PAYLOAD_LEN,
    UCI_PACKET_HEADER_LEN,
};

use crate::buffer::{Block, BlockAllocator, BlockChain};
use crate::error::{Error, Result};
use crate::message::{MessageBuilder, MessageParser};
use crate::uci::registry::{HandlerEntry, HandlerStatus, Registry};
use crate::uci::segmentation::{segment, Reassembler, UciPacket};
use crate::uci::transport::Transport;
use crate::uci::uci_logger::{PacketDirection, UciLogger, UciLoggerMode, UciLoggerWrapper};

/// The side of the protocol a UciCore plays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Role {
    /// Sends commands and waits for their responses.
    Client,
    /// Answers commands.
    #[default]
    Server,
}

/// The sending half of the core: the TX queue and the attached transport.
///
/// Handlers get it to answer the messages they process.
pub struct UciSender {
    allocator: Rc<dyn BlockAllocator>,
    expected_packet_size: usize,
    role: Role,
    tx_queue: VecDeque<UciPacket>,
    transport: Option<Box<dyn Transport>>,
    // A packet was handed to the transport and not given back yet.
    send_pending: bool,
    // The last pull found the queue empty, the transport waits for packet_send_ready().
    tx_idle: bool,
    awaiting_response: Option<RoutingKey>,
    logger: UciLoggerWrapper<Box<dyn UciLogger>>,
}

impl UciSender {
    pub fn allocator(&self) -> &Rc<dyn BlockAllocator> {
        &self.allocator
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Create a builder whose blocks match the packet size of the core.
    pub fn message_builder(&self) -> MessageBuilder {
        MessageBuilder::with_packet_size(self.allocator.clone(), self.expected_packet_size)
    }

    /// Segment `payload` and queue the packets. The core owns the payload from now on.
    ///
    /// Nothing is queued when the segmentation runs out of buffers.
    pub fn send_message(&mut self, key: RoutingKey, payload: BlockChain) -> Result<()> {
        let max_payload_len =
            (self.expected_packet_size - UCI_PACKET_HEADER_LEN).min(MAX_PAYLOAD_LEN);
        let packets = segment(key, payload, &self.allocator, max_payload_len).map_err(|e| {
            warn!("Dropping message {:?}: {}", key, e);
            e
        })?;
        if self.role == Role::Client && key.message_type() == MessageType::Command {
            if let Some(awaited) = self.awaiting_response.replace(key) {
                warn!("Sending {:?} while {:?} is still waiting for its response", key, awaited);
            }
        }
        self.tx_queue.extend(packets);
        self.notify_send_ready();
        Ok(())
    }

    /// Queue a status response for the group and opcode of `key`.
    ///
    /// The packet lives in a static block, so this works even when the allocator is exhausted.
    /// Each call takes its own static block: statuses queue up behind each other and nothing
    /// bounds their number besides the transport draining the queue.
    pub fn send_status(&mut self, key: RoutingKey, status: StatusCode) {
        debug!("Sending status {:?} for {:?}", status, key);
        let mut block = Block::new_static();
        block.append(&build_status_packet(key, status));
        self.tx_queue.push_back(block.into());
        self.notify_send_ready();
    }

    fn notify_send_ready(&mut self) {
        if !self.tx_idle {
            return;
        }
        if let Some(transport) = self.transport.as_mut() {
            self.tx_idle = false;
            transport.packet_send_ready();
        }
    }
}

/// The UCI protocol engine.
///
/// It reassembles the packets received by the transport into messages, dispatches them to the
/// registered handlers, and queues the messages to send until the transport pulls them.
pub struct UciCore {
    registry: Registry,
    reassembler: Reassembler,
    sender: UciSender,
}

impl UciCore {
    pub(crate) fn new(
        allocator: Rc<dyn BlockAllocator>,
        role: Role,
        expected_packet_size: usize,
        logger: Box<dyn UciLogger>,
        logger_mode: UciLoggerMode,
    ) -> Self {
        Self {
            registry: Registry::new(),
            reassembler: Reassembler::new(),
            sender: UciSender {
                allocator,
                expected_packet_size,
                role,
                tx_queue: VecDeque::new(),
                transport: None,
                send_pending: false,
                tx_idle: true,
                awaiting_response: None,
                logger: UciLoggerWrapper::new(logger, logger_mode),
            },
        }
    }

    /// Register the handlers of one group id. See [`HandlerEntry`] for the rules.
    pub fn register_handlers(&mut self, entries: Vec<HandlerEntry>) -> Result<()> {
        self.registry.register(entries)
    }

    pub fn role(&self) -> Role {
        self.sender.role
    }

    pub fn sender(&mut self) -> &mut UciSender {
        &mut self.sender
    }

    pub fn message_builder(&self) -> MessageBuilder {
        self.sender.message_builder()
    }

    pub fn send_message(&mut self, key: RoutingKey, payload: BlockChain) -> Result<()> {
        self.sender.send_message(key, payload)
    }

    pub fn send_status(&mut self, key: RoutingKey, status: StatusCode) {
        self.sender.send_status(key, status)
    }

    pub fn set_logger_mode(&mut self, mode: UciLoggerMode) {
        self.sender.logger.set_logger_mode(mode);
    }

    /// The command waiting for its response, in the client role.
    pub fn awaiting_response(&self) -> Option<RoutingKey> {
        self.sender.awaiting_response
    }

    /// The number of packets waiting to be pulled by the transport.
    pub fn tx_queue_len(&self) -> usize {
        self.sender.tx_queue.len()
    }

    pub fn is_send_pending(&self) -> bool {
        self.sender.send_pending
    }

    pub fn is_attached(&self) -> bool {
        self.sender.transport.is_some()
    }

    /// Attach the transport. Only one transport can be attached at a time.
    pub fn attach(&mut self, mut transport: Box<dyn Transport>) -> Result<()> {
        if self.is_attached() {
            error!("A transport is already attached");
            return Err(Error::Busy);
        }
        let result = transport.attach();
        self.sender.logger.log_transport_attach(&result);
        if let Err(e) = result {
            error!("Failed to attach the transport: {}", e);
            return Err(e);
        }

        info!("Transport attached, {} packets queued", self.sender.tx_queue.len());
        self.sender.transport = Some(transport);
        self.sender.tx_idle = true;
        if !self.sender.tx_queue.is_empty() {
            self.sender.notify_send_ready();
        }
        Ok(())
    }

    /// Detach the transport and hand it back. The message being reassembled is dropped.
    pub fn detach(&mut self) -> Result<Box<dyn Transport>> {
        let mut transport = self.sender.transport.take().ok_or_else(|| {
            error!("No transport to detach");
            Error::NotAttached
        })?;
        transport.detach();
        self.sender.logger.log_transport_detach();
        info!("Transport detached");
        self.reassembler.abort();
        self.sender.send_pending = false;
        Ok(transport)
    }

    /// Take the next packet to send. When the queue is empty, the transport is told with
    /// `packet_send_ready()` once another packet is queued.
    ///
    /// Every packet returned must be given back with [`UciCore::packet_send_done`].
    pub fn packet_send_get_ready(&mut self) -> Option<UciPacket> {
        if !self.is_attached() {
            warn!("packet_send_get_ready() without transport");
            return None;
        }
        match self.sender.tx_queue.pop_front() {
            Some(packet) => {
                self.sender.send_pending = true;
                self.sender.logger.log_uci_packet(PacketDirection::Tx, &packet);
                Some(packet)
            }
            None => {
                self.sender.tx_idle = true;
                None
            }
        }
    }

    /// Give back a packet taken with [`UciCore::packet_send_get_ready`], sent or not.
    pub fn packet_send_done(&mut self, packet: UciPacket, result: Result<()>) {
        if let Err(e) = result {
            warn!("Failed to send a {} byte packet: {}", packet.len(), e);
        }
        self.sender.send_pending = false;
    }

    /// Allocate a block for the transport to receive a packet into.
    pub fn packet_recv_alloc(&self, size_hint: usize) -> Option<Block> {
        let block = Block::alloc(&self.sender.allocator, size_hint);
        if block.is_none() {
            debug!("No buffer to receive a packet");
        }
        block
    }

    /// Take a packet received by the transport. The message is dispatched once complete.
    pub fn packet_recv(&mut self, packet: UciPacket) {
        self.sender.logger.log_uci_packet(PacketDirection::Rx, &packet);
        match self.reassembler.push(packet) {
            Ok(Some((key, payload))) => self.dispatch(key, payload),
            Ok(None) => (),
            Err(e) => warn!("Dropping a received packet: {}", e),
        }
    }

    /// Release a packet whose reception failed. The message being reassembled is dropped too.
    pub fn packet_recv_free_all(&mut self, packet: UciPacket) {
        debug!("Releasing an aborted {} byte reception", packet.len());
        self.reassembler.abort();
    }

    /// Give up waiting for the response of the last command.
    ///
    /// This is ignored while a packet is being sent, as the transport may still deliver it.
    /// Otherwise the message being reassembled is dropped and the key of the command that got no
    /// response is returned.
    pub fn response_expire(&mut self) -> Option<RoutingKey> {
        if self.sender.send_pending {
            debug!("Response expiry ignored, a send is pending");
            return None;
        }
        let key = self.sender.awaiting_response.take()?;
        warn!("No response to {:?}", key);
        self.reassembler.abort();
        Some(key)
    }

    /// Tear down the core. Same as dropping it.
    pub fn uninit(self) {}

    fn dispatch(&mut self, key: RoutingKey, payload: BlockChain) {
        let message_type = key.message_type();
        if message_type == MessageType::Response {
            if let Some(awaited) = self.sender.awaiting_response {
                if awaited.is_same_signature(&key) {
                    self.sender.awaiting_response = None;
                }
            }
        }

        let status = match self.registry.find_mut(key) {
            Ok(handler) => handler(&mut self.sender, key, MessageParser::new(payload)),
            Err(status) => HandlerStatus::Failed(status),
        };
        match status {
            HandlerStatus::Ok | HandlerStatus::Handled => (),
            HandlerStatus::Failed(status) if message_type == MessageType::Command => {
                self.sender.send_status(key, status)
            }
            HandlerStatus::Failed(status) => {
                debug!("Dropping {:?}: {:?}", key, status);
            }
        }
    }
}

impl Drop for UciCore {
    fn drop(&mut self) {
        if self.is_attached() {
            let _ = self.detach();
        }
        if !self.sender.tx_queue.is_empty() {
            debug!("Dropping {} queued packets", self.sender.tx_queue.len());
        }
    }
}
