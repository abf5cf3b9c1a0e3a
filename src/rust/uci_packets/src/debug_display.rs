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

use std::fmt::{Debug, Formatter, Result};

use num_traits::FromPrimitive;

use crate::{GroupId, RoutingKey, UciPacketHeader};

// Prints the symbolic group name for the standard GIDs.
struct GidDisplay(u8);

impl Debug for GidDisplay {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match GroupId::from_u8(self.0) {
            Some(gid) => write!(f, "{:?}({:#x})", gid, self.0),
            None => write!(f, "{:#x}", self.0),
        }
    }
}

impl Debug for RoutingKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_struct("RoutingKey")
            .field("mt", &self.message_type())
            .field("gid", &GidDisplay(self.gid()))
            .field("oid", &format_args!("{:#x}", self.oid()))
            .finish()
    }
}

impl Debug for UciPacketHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_struct("UciPacketHeader")
            .field("mt", &self.message_type)
            .field("pbf", &self.packet_boundary_flag)
            .field("gid", &GidDisplay(self.group_id))
            .field("oid", &format_args!("{:#x}", self.opcode))
            .field("len", &self.payload_length)
            .finish()
    }
}
