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

//! Splitting of outbound messages into UCI packets, and reassembly of inbound packets into
//! messages.

use std::mem;
use std::rc::Rc;

use bytes::Bytes;
use log::{debug, warn};
use uci_packets::{
    DecodeError, PacketBoundaryFlag, RoutingKey, UciPacketHeader, MAX_PAYLOAD_LEN,
    UCI_PACKET_HEADER_LEN,
};

use crate::buffer::{Block, BlockAllocator, BlockChain, MIN_BLOCK_SIZE};
use crate::error::{Error, Result};

/// One UCI packet on the wire, header included.
#[derive(Debug, Default)]
pub struct UciPacket(BlockChain);

impl UciPacket {
    pub fn from_chain(chain: BlockChain) -> Self {
        Self(chain)
    }

    pub fn into_chain(self) -> BlockChain {
        self.0
    }

    pub fn chain(&self) -> &BlockChain {
        &self.0
    }

    /// The packet length, header included.
    pub fn len(&self) -> usize {
        self.0.total_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode the header. The header bytes may be spread over several blocks.
    pub fn header(&self) -> std::result::Result<UciPacketHeader, DecodeError> {
        let mut bytes = [0; UCI_PACKET_HEADER_LEN];
        let mut filled = 0;
        for block in self.0.iter() {
            let n = (UCI_PACKET_HEADER_LEN - filled).min(block.len());
            bytes[filled..filled + n].copy_from_slice(&block.data()[..n]);
            filled += n;
            if filled == UCI_PACKET_HEADER_LEN {
                break;
            }
        }
        UciPacketHeader::parse(&bytes[..filled])
    }

    pub fn to_bytes(&self) -> Bytes {
        self.0.to_bytes()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl From<BlockChain> for UciPacket {
    fn from(chain: BlockChain) -> Self {
        Self(chain)
    }
}

impl From<Block> for UciPacket {
    fn from(block: Block) -> Self {
        Self(block.into())
    }
}

impl From<Vec<u8>> for UciPacket {
    fn from(bytes: Vec<u8>) -> Self {
        Block::from(bytes).into()
    }
}

/// Split `payload` into framed packets of at most `max_payload_len` payload bytes each.
///
/// Blocks that fit are moved into the packets as they are. A block straddling two packets has
/// its head copied into a new block. The header is written in the headroom of the first block of
/// each packet when there is room, otherwise in a block of its own. An empty payload gives a
/// single header-only packet.
///
/// Fails with [`Error::NoBuffer`] when the allocator is exhausted, in which case every block of
/// the message is released.
pub fn segment(
    key: RoutingKey,
    mut payload: BlockChain,
    allocator: &Rc<dyn BlockAllocator>,
    max_payload_len: usize,
) -> Result<Vec<UciPacket>> {
    let max_payload_len = max_payload_len.clamp(1, MAX_PAYLOAD_LEN);
    let mut packets = Vec::with_capacity(payload.total_len() / max_payload_len + 1);
    loop {
        let mut packet = BlockChain::new();
        while packet.total_len() < max_payload_len {
            let room = max_payload_len - packet.total_len();
            let front_len = match payload.front() {
                Some(front) => front.len(),
                None => break,
            };
            if front_len <= room {
                if let Some(block) = payload.pop_front() {
                    packet.push_back(block);
                }
                continue;
            }
            let mut head = Block::alloc_with_header_room(allocator, room + UCI_PACKET_HEADER_LEN)
                .ok_or(Error::NoBuffer)?;
            let copied = match payload.front() {
                Some(front) => head.append(&front.data()[..room]),
                None => 0,
            };
            payload.advance_front(copied);
            packet.push_back(head);
        }

        let packet_boundary_flag = match payload.total_len() {
            0 => PacketBoundaryFlag::Complete,
            _ => PacketBoundaryFlag::NotComplete,
        };
        // The gather loop bounds the payload length to MAX_PAYLOAD_LEN.
        let header =
            UciPacketHeader::new(key, packet_boundary_flag, packet.total_len() as u8).encode();
        if !packet.prepend(&header) {
            let mut header_block = Block::alloc(allocator, MIN_BLOCK_SIZE).ok_or(Error::NoBuffer)?;
            header_block.append(&header);
            packet.push_front(header_block);
        }
        packets.push(UciPacket(packet));

        if packet_boundary_flag == PacketBoundaryFlag::Complete {
            return Ok(packets);
        }
    }
}

/// Collects the packets of a segmented inbound message.
#[derive(Debug, Default)]
pub struct Reassembler {
    rx: BlockChain,
    // Key of the message being collected, if any.
    key: Option<RoutingKey>,
}

impl Reassembler {
    pub fn new() -> Self {
        Default::default()
    }

    /// Whether some packets of an incomplete message were collected.
    pub fn is_collecting(&self) -> bool {
        self.key.is_some()
    }

    /// The number of payload bytes collected so far.
    pub fn pending_len(&self) -> usize {
        self.rx.total_len()
    }

    /// Add one received packet. Returns the routing key and the payload of the message once its
    /// last packet arrived.
    ///
    /// A malformed packet aborts the message being collected. A packet of another message than
    /// the one being collected abandons it and starts over with the new packet.
    pub fn push(&mut self, packet: UciPacket) -> Result<Option<(RoutingKey, BlockChain)>> {
        let header = match packet.header() {
            Ok(header) => header,
            Err(e) => {
                self.abort();
                return Err(e.into());
            }
        };
        let actual = packet.len() - UCI_PACKET_HEADER_LEN;
        if usize::from(header.payload_length) != actual {
            self.abort();
            return Err(DecodeError::LengthMismatch {
                expected: header.payload_length.into(),
                actual,
            }
            .into());
        }

        let key = header.routing_key();
        if let Some(collecting) = self.key {
            if collecting != key {
                warn!(
                    "Packet {:?} interrupts message {:?}, dropping {} collected bytes",
                    key,
                    collecting,
                    self.rx.total_len()
                );
                self.abort();
            }
        }

        let mut payload = packet.into_chain();
        payload.advance_front(UCI_PACKET_HEADER_LEN);
        self.rx.append(payload);

        if header.is_last_segment() {
            self.key = None;
            Ok(Some((key, mem::take(&mut self.rx))))
        } else {
            self.key = Some(key);
            Ok(None)
        }
    }

    /// Release the message being collected.
    pub fn abort(&mut self) {
        if let Some(key) = self.key.take() {
            debug!("Aborting reassembly of {:?} ({} bytes)", key, self.rx.total_len());
        }
        self.rx = BlockChain::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use uci_packets::{MessageType, MAX_PACKET_LEN};

    use crate::buffer::mock_allocator::{CountingAllocator, FailingAllocator};
    use crate::message::MessageBuilder;

    fn key() -> RoutingKey {
        RoutingKey::new(MessageType::Command, 0x1, 0x3)
    }

    fn counting_allocator() -> (Rc<CountingAllocator>, Rc<dyn BlockAllocator>) {
        let counting = Rc::new(CountingAllocator::new());
        let allocator: Rc<dyn BlockAllocator> = counting.clone();
        (counting, allocator)
    }

    fn build_payload(allocator: &Rc<dyn BlockAllocator>, len: usize) -> BlockChain {
        let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let mut builder = MessageBuilder::new(allocator.clone());
        builder.put(&bytes).unwrap();
        builder.finish().unwrap()
    }

    fn reassemble(packets: Vec<UciPacket>) -> (RoutingKey, BlockChain) {
        let mut reassembler = Reassembler::new();
        let count = packets.len();
        for (i, packet) in packets.into_iter().enumerate() {
            match reassembler.push(packet).unwrap() {
                Some(message) => {
                    assert_eq!(i, count - 1);
                    return message;
                }
                None => assert!(reassembler.is_collecting()),
            }
        }
        panic!("The message was not complete");
    }

    fn assert_total_len(chain: &BlockChain) {
        assert_eq!(chain.total_len(), chain.iter().map(Block::len).sum::<usize>());
    }

    #[test]
    fn test_600_byte_message() {
        let (counting, allocator) = counting_allocator();
        let payload = build_payload(&allocator, 600);
        assert_eq!(counting.allocated(), 3);

        let packets = segment(key(), payload, &allocator, MAX_PAYLOAD_LEN).unwrap();
        // The headers went in place.
        assert_eq!(counting.allocated(), 3);
        assert_eq!(packets.len(), 3);

        let headers: Vec<UciPacketHeader> = packets.iter().map(|p| p.header().unwrap()).collect();
        let flags: Vec<PacketBoundaryFlag> =
            headers.iter().map(|h| h.packet_boundary_flag).collect();
        assert_eq!(
            flags,
            vec![
                PacketBoundaryFlag::NotComplete,
                PacketBoundaryFlag::NotComplete,
                PacketBoundaryFlag::Complete
            ]
        );
        let lengths: Vec<u8> = headers.iter().map(|h| h.payload_length).collect();
        assert_eq!(lengths, vec![255, 255, 90]);
        assert_eq!(packets[0].len(), MAX_PACKET_LEN);
        assert_eq!(&packets[0].to_vec()[..4], &[0x31, 0x03, 0x00, 0xff]);
        assert_eq!(&packets[2].to_vec()[..4], &[0x21, 0x03, 0x00, 90]);
    }

    #[test]
    fn test_segmentation_round_trip() {
        let (counting, allocator) = counting_allocator();
        for len in 0..=10 * MAX_PACKET_LEN {
            let payload = build_payload(&allocator, len);
            let expected = payload.to_vec();
            let packets = segment(key(), payload, &allocator, MAX_PAYLOAD_LEN).unwrap();
            let expected_count = match len {
                0 => 1,
                _ => (len + MAX_PAYLOAD_LEN - 1) / MAX_PAYLOAD_LEN,
            };
            assert_eq!(packets.len(), expected_count);
            for packet in packets.iter() {
                assert!(packet.len() <= MAX_PACKET_LEN);
                assert_total_len(packet.chain());
            }

            let (received_key, message) = reassemble(packets);
            assert_eq!(received_key, key());
            assert_eq!(message.total_len(), len);
            assert_total_len(&message);
            assert_eq!(message.to_vec(), expected);
        }
        assert_eq!(counting.outstanding(), 0);
    }

    #[test]
    fn test_small_packets() {
        let (_, allocator) = counting_allocator();
        let payload = build_payload(&allocator, 100);
        let packets = segment(key(), payload, &allocator, 16).unwrap();
        assert_eq!(packets.len(), 7);
        assert!(packets.iter().all(|p| p.len() <= 16 + UCI_PACKET_HEADER_LEN));
        let (_, message) = reassemble(packets);
        assert_eq!(message.total_len(), 100);
    }

    #[test]
    fn test_external_payload_without_headroom() {
        let (counting, allocator) = counting_allocator();
        let bytes: Vec<u8> = (0..600).map(|i| i as u8).collect();
        let payload = BlockChain::from(Block::from(bytes.clone()));

        let packets = segment(key(), payload, &allocator, MAX_PAYLOAD_LEN).unwrap();
        // Two copied heads; the tail of the external block takes its header in place.
        assert_eq!(counting.allocated(), 2);
        assert_eq!(packets.len(), 3);

        let (_, message) = reassemble(packets);
        assert_eq!(message.to_vec(), bytes);
    }

    #[test]
    fn test_header_block_is_allocated() {
        let (counting, allocator) = counting_allocator();
        let payload = BlockChain::from(Block::from(vec![0xaa; 10]));
        let packets = segment(key(), payload, &allocator, MAX_PAYLOAD_LEN).unwrap();
        assert_eq!(counting.allocated(), 1);
        assert_eq!(packets[0].chain().block_count(), 2);
        assert_eq!(packets[0].to_vec()[..4], [0x21, 0x03, 0x00, 10]);
    }

    #[test]
    fn test_empty_payload() {
        let (_, allocator) = counting_allocator();
        let packets = segment(key(), BlockChain::new(), &allocator, MAX_PAYLOAD_LEN).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].to_vec(), vec![0x21, 0x03, 0x00, 0x00]);

        let (_, message) = reassemble(packets);
        assert_eq!(message.total_len(), 0);
    }

    #[test]
    fn test_allocation_failure_drops_message() {
        let allocator: Rc<dyn BlockAllocator> = Rc::new(FailingAllocator);
        assert_eq!(
            segment(key(), BlockChain::new(), &allocator, MAX_PAYLOAD_LEN).err(),
            Some(Error::NoBuffer)
        );

        let (counting, allocator) = counting_allocator();
        let payload = build_payload(&allocator, 400);
        let mut payload_with_external = BlockChain::from(Block::from(vec![0; 300]));
        payload_with_external.append(payload);
        counting.fail_after(1);
        assert_eq!(
            segment(key(), payload_with_external, &allocator, MAX_PAYLOAD_LEN).err(),
            Some(Error::NoBuffer)
        );
        assert_eq!(counting.outstanding(), 0);
    }

    #[test]
    fn test_reassembly_rejects_length_mismatch() {
        let mut reassembler = Reassembler::new();
        let first = vec![0x31, 0x03, 0x00, 0x02, 0xaa, 0xbb];
        assert!(reassembler.push(first.into()).unwrap().is_none());
        assert!(reassembler.is_collecting());

        assert_eq!(
            reassembler.push(vec![0x21, 0x03, 0x00, 0x03, 0xcc].into()).err(),
            Some(Error::Parse(DecodeError::LengthMismatch { expected: 3, actual: 1 }))
        );
        assert!(!reassembler.is_collecting());
        assert_eq!(reassembler.pending_len(), 0);
    }

    #[test]
    fn test_reassembly_rejects_bad_header() {
        let mut reassembler = Reassembler::new();
        assert_eq!(
            reassembler.push(vec![0x21, 0x03].into()).err(),
            Some(Error::Parse(DecodeError::TooShort(2)))
        );
        assert_eq!(
            reassembler.push(vec![0x01, 0x03, 0x00, 0x00].into()).err(),
            Some(Error::Parse(DecodeError::InvalidMessageType(0)))
        );
    }

    #[test]
    fn test_interleaved_message_restarts_reassembly() {
        let mut reassembler = Reassembler::new();
        assert!(reassembler.push(vec![0x31, 0x03, 0x00, 0x01, 0xaa].into()).unwrap().is_none());

        let (key, message) =
            reassembler.push(vec![0x62, 0x05, 0x00, 0x01, 0xbb].into()).unwrap().unwrap();
        assert_eq!(key, RoutingKey::new(MessageType::Notification, 0x2, 0x5));
        assert_eq!(message.to_vec(), vec![0xbb]);
        assert!(!reassembler.is_collecting());
    }

    #[test]
    fn test_header_across_blocks() {
        let chain: BlockChain =
            vec![Block::from(vec![0x41]), Block::from(vec![0x03, 0x00]), Block::from(vec![1, 0])]
                .into_iter()
                .collect();
        let packet = UciPacket::from(chain);
        let header = packet.header().unwrap();
        assert_eq!(header.routing_key(), RoutingKey::new(MessageType::Response, 0x1, 0x3));
        assert_eq!(header.payload_length, 1);

        let (_, message) = Reassembler::new().push(packet).unwrap().unwrap();
        assert_eq!(message.to_vec(), vec![0]);
    }
}
