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

//! Wire-level definitions of UCI control packets: the 4-byte packet header, the routing key
//! derived from it, and the closed set of status codes carried by responses.

use log::error;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

mod debug_display;

/// Maximum payload carried by a single UCI control packet.
pub const MAX_PAYLOAD_LEN: usize = 255;
/// Length of the UCI packet header that precedes every packet payload.
pub const UCI_PACKET_HEADER_LEN: usize = 4;
/// Maximum size of a UCI control packet on the wire.
pub const MAX_PACKET_LEN: usize = UCI_PACKET_HEADER_LEN + MAX_PAYLOAD_LEN;
/// A status response is a header followed by one status byte.
pub const STATUS_PACKET_LEN: usize = UCI_PACKET_HEADER_LEN + 1;

// Header field byte positions, shifts and masks.
const UCI_HEADER_MT_BYTE_POSITION: usize = 0;
const UCI_HEADER_MT_BIT_SHIFT: u8 = 5;
const UCI_HEADER_MT_MASK: u8 = 0x7;

const UCI_HEADER_PBF_BYTE_POSITION: usize = 0;
const UCI_HEADER_PBF_BIT_SHIFT: u8 = 4;
const UCI_HEADER_PBF_MASK: u8 = 0x1;

const UCI_CONTROL_HEADER_GID_BYTE_POSITION: usize = 0;
const UCI_CONTROL_HEADER_GID_MASK: u8 = 0xF;

const UCI_CONTROL_HEADER_OID_BYTE_POSITION: usize = 1;
const UCI_CONTROL_HEADER_OID_MASK: u8 = 0x3F;

// Byte 2 is reserved (extended length), byte 3 holds the payload length.
const UCI_HEADER_RFU_BYTE_POSITION: usize = 2;
const UCI_HEADER_LEN_BYTE_POSITION: usize = 3;

const ROUTING_KEY_MT_SHIFT: u16 = 13;
const ROUTING_KEY_GID_SHIFT: u16 = 8;

/// The error raised when bytes cannot be decoded as a UCI control packet.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Packet too short: {0} bytes")]
    TooShort(usize),
    #[error("Unknown message type: {0}")]
    InvalidMessageType(u8),
    #[error("Reserved header bits are set")]
    ReservedBitsSet,
    #[error("Payload length {expected} does not match the {actual} bytes present")]
    LengthMismatch { expected: usize, actual: usize },
}

/// The message type (MT) field of the UCI packet header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
pub enum MessageType {
    Rfu = 0x0,
    Command = 0x1,
    Response = 0x2,
    Notification = 0x3,
    ReservedForTesting1 = 0x4,
    ReservedForTesting2 = 0x5,
}

impl MessageType {
    /// Whether the message type can appear on a control packet.
    pub fn is_control(self) -> bool {
        !matches!(self, MessageType::Rfu)
    }
}

impl TryFrom<u8> for MessageType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, DecodeError> {
        MessageType::from_u8(value).ok_or(DecodeError::InvalidMessageType(value))
    }
}

/// The packet boundary flag (PBF), the continuation bit of segmented messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum PacketBoundaryFlag {
    /// Last (or only) packet of a message.
    Complete = 0x0,
    /// More packets of the same message follow.
    NotComplete = 0x1,
}

/// The group identifiers defined by the UCI generic specification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
pub enum GroupId {
    Core = 0x0,
    SessionConfig = 0x1,
    SessionControl = 0x2,
    DataControl = 0x3,
    VendorReserved9 = 0x9,
    VendorReservedA = 0xa,
    VendorReservedB = 0xb,
    VendorAndroid = 0xc,
    Test = 0xd,
    VendorReservedE = 0xe,
    VendorReservedF = 0xf,
}

/// The status codes carried in the first payload byte of UCI responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
pub enum StatusCode {
    // Generic status codes.
    UciStatusOk = 0x00,
    UciStatusRejected = 0x01,
    UciStatusFailed = 0x02,
    UciStatusSyntaxError = 0x03,
    UciStatusInvalidParam = 0x04,
    UciStatusInvalidRange = 0x05,
    UciStatusInvalidMsgSize = 0x06,
    UciStatusUnknownGid = 0x07,
    UciStatusUnknownOid = 0x08,
    UciStatusReadOnly = 0x09,
    UciStatusCommandRetry = 0x0A,
    UciStatusUnknown = 0x0B,
    UciStatusNotApplicable = 0x0C,

    // Session specific status codes.
    UciStatusSessionNotExist = 0x11,
    UciStatusSessionDuplicate = 0x12,
    UciStatusSessionActive = 0x13,
    UciStatusMaxSessionsExceeded = 0x14,
    UciStatusSessionNotConfigured = 0x15,
    UciStatusActiveSessionsOngoing = 0x16,
    UciStatusMulticastListFull = 0x17,
    UciStatusAddressNotFound = 0x18,
    UciStatusAddressAlreadyPresent = 0x19,
    UciStatusErrorUwbInitiationTimeTooOld = 0x1A,
    UciStatusOkNegativeDistanceReport = 0x1B,

    // Ranging specific status codes.
    UciStatusRangingTxFailed = 0x20,
    UciStatusRangingRxTimeout = 0x21,
    UciStatusRangingRxPhyDecFailed = 0x22,
    UciStatusRangingRxPhyToaFailed = 0x23,
    UciStatusRangingRxPhyStsFailed = 0x24,
    UciStatusRangingRxMacDecFailed = 0x25,
    UciStatusRangingRxMacIeDecFailed = 0x26,
    UciStatusRangingRxMacIeMissing = 0x27,
    UciStatusErrorRoundIndexNotActivated = 0x28,
    UciStatusErrorNumberOfActiveRangingRoundsExceeded = 0x29,
    UciStatusErrorDlTdoaDeviceAddressNotMatchingInReplyTimeList = 0x2A,

    // Data transfer status codes.
    UciStatusDataMaxTxPsduSizeExceeded = 0x30,
    UciStatusDataRxCrcError = 0x31,
}

impl StatusCode {
    /// Decodes a status byte, mapping values outside the known set to `UciStatusUnknown`.
    pub fn from_byte(value: u8) -> Self {
        StatusCode::from_u8(value).unwrap_or_else(|| {
            error!("Unknown UCI status code: {:#x}", value);
            StatusCode::UciStatusUnknown
        })
    }
}

/// The (message-type, group-id, opcode-id) triple used to route a UCI message, packed as
/// `mt << 13 | gid << 8 | oid`. This is the first two header bytes with the PBF bit masked out.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoutingKey(u16);

impl RoutingKey {
    pub fn new(message_type: MessageType, gid: u8, oid: u8) -> Self {
        Self(
            (message_type as u16) << ROUTING_KEY_MT_SHIFT
                | u16::from(gid & UCI_CONTROL_HEADER_GID_MASK) << ROUTING_KEY_GID_SHIFT
                | u16::from(oid & UCI_CONTROL_HEADER_OID_MASK),
        )
    }

    pub fn message_type(&self) -> MessageType {
        // The three MT bits only hold values produced by `new()`.
        MessageType::from_u16(self.0 >> ROUTING_KEY_MT_SHIFT).unwrap_or(MessageType::Rfu)
    }

    pub fn gid(&self) -> u8 {
        ((self.0 >> ROUTING_KEY_GID_SHIFT) as u8) & UCI_CONTROL_HEADER_GID_MASK
    }

    pub fn oid(&self) -> u8 {
        (self.0 as u8) & UCI_CONTROL_HEADER_OID_MASK
    }

    /// The same group and opcode with a different message type, e.g. the response to a command.
    pub fn with_message_type(&self, message_type: MessageType) -> Self {
        Self::new(message_type, self.gid(), self.oid())
    }

    /// Whether both keys name the same group and opcode, regardless of message type.
    pub fn is_same_signature(&self, other: &RoutingKey) -> bool {
        self.gid() == other.gid() && self.oid() == other.oid()
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl From<&UciPacketHeader> for RoutingKey {
    fn from(header: &UciPacketHeader) -> Self {
        RoutingKey::new(header.message_type, header.group_id, header.opcode)
    }
}

/// The 4-byte header of a UCI control packet.
#[derive(Clone, PartialEq, Eq)]
pub struct UciPacketHeader {
    pub message_type: MessageType,
    pub packet_boundary_flag: PacketBoundaryFlag,
    pub group_id: u8,
    pub opcode: u8,
    pub payload_length: u8,
}

impl UciPacketHeader {
    pub fn new(key: RoutingKey, packet_boundary_flag: PacketBoundaryFlag, len: u8) -> Self {
        Self {
            message_type: key.message_type(),
            packet_boundary_flag,
            group_id: key.gid(),
            opcode: key.oid(),
            payload_length: len,
        }
    }

    pub fn routing_key(&self) -> RoutingKey {
        self.into()
    }

    pub fn is_last_segment(&self) -> bool {
        self.packet_boundary_flag == PacketBoundaryFlag::Complete
    }

    pub fn encode(&self) -> [u8; UCI_PACKET_HEADER_LEN] {
        let mut bytes = [0; UCI_PACKET_HEADER_LEN];
        bytes[UCI_HEADER_MT_BYTE_POSITION] |=
            ((self.message_type as u8) & UCI_HEADER_MT_MASK) << UCI_HEADER_MT_BIT_SHIFT;
        bytes[UCI_HEADER_PBF_BYTE_POSITION] |=
            ((self.packet_boundary_flag as u8) & UCI_HEADER_PBF_MASK) << UCI_HEADER_PBF_BIT_SHIFT;
        bytes[UCI_CONTROL_HEADER_GID_BYTE_POSITION] |= self.group_id & UCI_CONTROL_HEADER_GID_MASK;
        bytes[UCI_CONTROL_HEADER_OID_BYTE_POSITION] = self.opcode & UCI_CONTROL_HEADER_OID_MASK;
        bytes[UCI_HEADER_LEN_BYTE_POSITION] = self.payload_length;
        bytes
    }

    /// Decodes the header at the start of `packet`. Only the header bytes are inspected.
    pub fn parse(packet: &[u8]) -> Result<Self, DecodeError> {
        if packet.len() < UCI_PACKET_HEADER_LEN {
            return Err(DecodeError::TooShort(packet.len()));
        }
        if packet[UCI_CONTROL_HEADER_OID_BYTE_POSITION] & !UCI_CONTROL_HEADER_OID_MASK != 0
            || packet[UCI_HEADER_RFU_BYTE_POSITION] != 0
        {
            return Err(DecodeError::ReservedBitsSet);
        }
        let message_type = MessageType::try_from(get_mt_from_uci_packet(packet))?;
        if !message_type.is_control() {
            return Err(DecodeError::InvalidMessageType(message_type as u8));
        }
        let packet_boundary_flag = match get_pbf_from_uci_packet(packet) {
            0 => PacketBoundaryFlag::Complete,
            _ => PacketBoundaryFlag::NotComplete,
        };
        Ok(Self {
            message_type,
            packet_boundary_flag,
            group_id: get_gid_from_uci_control_packet(packet),
            opcode: get_oid_from_uci_control_packet(packet),
            payload_length: packet[UCI_HEADER_LEN_BYTE_POSITION],
        })
    }
}

// Helper methods to extract the UCI Packet header fields.
fn get_mt_from_uci_packet(packet: &[u8]) -> u8 {
    (packet[UCI_HEADER_MT_BYTE_POSITION] >> UCI_HEADER_MT_BIT_SHIFT) & UCI_HEADER_MT_MASK
}

fn get_pbf_from_uci_packet(packet: &[u8]) -> u8 {
    (packet[UCI_HEADER_PBF_BYTE_POSITION] >> UCI_HEADER_PBF_BIT_SHIFT) & UCI_HEADER_PBF_MASK
}

fn get_gid_from_uci_control_packet(packet: &[u8]) -> u8 {
    packet[UCI_CONTROL_HEADER_GID_BYTE_POSITION] & UCI_CONTROL_HEADER_GID_MASK
}

fn get_oid_from_uci_control_packet(packet: &[u8]) -> u8 {
    packet[UCI_CONTROL_HEADER_OID_BYTE_POSITION] & UCI_CONTROL_HEADER_OID_MASK
}

/// Builds the bytes of a status response for the group and opcode of `key`.
pub fn build_status_packet(key: RoutingKey, status: StatusCode) -> [u8; STATUS_PACKET_LEN] {
    let header = UciPacketHeader::new(
        key.with_message_type(MessageType::Response),
        PacketBoundaryFlag::Complete,
        1,
    );
    let mut bytes = [0; STATUS_PACKET_LEN];
    bytes[..UCI_PACKET_HEADER_LEN].copy_from_slice(&header.encode());
    bytes[UCI_PACKET_HEADER_LEN] = status as u8;
    bytes
}
