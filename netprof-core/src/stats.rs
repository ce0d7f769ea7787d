//! Per-category traffic counters.

use crate::token::{ChannelType, CHANNEL_TYPE_COUNT};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bunch counters for one channel type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelStats {
    pub count: u64,
    pub size_bits: u64,
    pub header_bits: u64,
    pub payload_bits: u64,
}

impl ChannelStats {
    fn merge(&mut self, other: &Self) {
        self.count += other.count;
        self.size_bits += other.size_bits;
        self.header_bits += other.header_bits;
        self.payload_bits += other.payload_bits;
    }
}

/// Category counters for a frame or a range of frames.
///
/// All fields are plain sums, so counters for a range equal the sum of the
/// counters of its frames.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrameStats {
    /// Frames folded into these counters.
    pub frame_count: u64,
    pub event_count: u64,

    // Socket level
    pub unreal_socket_count: u64,
    /// Bytes sent on the engine socket.
    pub unreal_socket_size: u64,
    pub other_socket_count: u64,
    /// Bytes sent on any other socket.
    pub other_socket_size: u64,
    pub packet_id_bits: u64,
    pub packet_bunch_bits: u64,
    pub packet_ack_bits: u64,
    pub packet_padding_bits: u64,
    pub raw_socket_data_count: u64,
    pub raw_socket_data_bytes: u64,

    // Bunches
    pub send_bunch_count: u64,
    pub send_bunch_size_bits: u64,
    pub send_bunch_header_size_bits: u64,
    pub send_bunch_payload_size_bits: u64,
    pub channels: [ChannelStats; CHANNEL_TYPE_COUNT],

    // RPCs
    pub rpc_count: u64,
    pub rpc_size_bits: u64,

    // Actors and properties
    pub actor_count: u64,
    /// Actors that replicated at least one property.
    pub replicated_actor_count: u64,
    pub actor_replicate_time_ms: f64,
    pub property_count: u64,
    pub property_size_bits: u64,
    pub property_header_count: u64,
    pub property_header_size_bits: u64,

    // Protocol bookkeeping
    pub ack_count: u64,
    pub ack_size_bits: u64,
    pub export_bunch_count: u64,
    pub export_bunch_size_bits: u64,
    pub must_be_mapped_guid_count: u64,
    pub must_be_mapped_guid_size_bits: u64,
    pub content_block_header_count: u64,
    pub content_block_header_size_bits: u64,
    pub content_block_footer_count: u64,
    pub content_block_footer_size_bits: u64,
    pub property_handle_count: u64,
    pub property_handle_size_bits: u64,
}

impl FrameStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds another set of counters into this one.
    pub fn merge(&mut self, other: &Self) {
        self.frame_count += other.frame_count;
        self.event_count += other.event_count;

        self.unreal_socket_count += other.unreal_socket_count;
        self.unreal_socket_size += other.unreal_socket_size;
        self.other_socket_count += other.other_socket_count;
        self.other_socket_size += other.other_socket_size;
        self.packet_id_bits += other.packet_id_bits;
        self.packet_bunch_bits += other.packet_bunch_bits;
        self.packet_ack_bits += other.packet_ack_bits;
        self.packet_padding_bits += other.packet_padding_bits;
        self.raw_socket_data_count += other.raw_socket_data_count;
        self.raw_socket_data_bytes += other.raw_socket_data_bytes;

        self.send_bunch_count += other.send_bunch_count;
        self.send_bunch_size_bits += other.send_bunch_size_bits;
        self.send_bunch_header_size_bits += other.send_bunch_header_size_bits;
        self.send_bunch_payload_size_bits += other.send_bunch_payload_size_bits;
        for (mine, theirs) in self.channels.iter_mut().zip(&other.channels) {
            mine.merge(theirs);
        }

        self.rpc_count += other.rpc_count;
        self.rpc_size_bits += other.rpc_size_bits;

        self.actor_count += other.actor_count;
        self.replicated_actor_count += other.replicated_actor_count;
        self.actor_replicate_time_ms += other.actor_replicate_time_ms;
        self.property_count += other.property_count;
        self.property_size_bits += other.property_size_bits;
        self.property_header_count += other.property_header_count;
        self.property_header_size_bits += other.property_header_size_bits;

        self.ack_count += other.ack_count;
        self.ack_size_bits += other.ack_size_bits;
        self.export_bunch_count += other.export_bunch_count;
        self.export_bunch_size_bits += other.export_bunch_size_bits;
        self.must_be_mapped_guid_count += other.must_be_mapped_guid_count;
        self.must_be_mapped_guid_size_bits += other.must_be_mapped_guid_size_bits;
        self.content_block_header_count += other.content_block_header_count;
        self.content_block_header_size_bits += other.content_block_header_size_bits;
        self.content_block_footer_count += other.content_block_footer_count;
        self.content_block_footer_size_bits += other.content_block_footer_size_bits;
        self.property_handle_count += other.property_handle_count;
        self.property_handle_size_bits += other.property_handle_size_bits;
    }

    /// Bunch counters for one channel type.
    #[must_use]
    pub fn channel(&self, channel: ChannelType) -> &ChannelStats {
        &self.channels[channel.index()]
    }

    /// Mutable bunch counters for one channel type.
    pub fn channel_mut(&mut self, channel: ChannelType) -> &mut ChannelStats {
        &mut self.channels[channel.index()]
    }

    /// Bits spent on bunch framing rather than replicated content.
    ///
    /// Sum of bunch headers, content block headers and footers, property
    /// handles, exported GUIDs and must-be-mapped GUIDs.
    #[must_use]
    pub fn bunch_protocol_overhead_bits(&self) -> u64 {
        self.send_bunch_header_size_bits
            + self.content_block_header_size_bits
            + self.content_block_footer_size_bits
            + self.property_handle_size_bits
            + self.export_bunch_size_bits
            + self.must_be_mapped_guid_size_bits
    }

    /// Bytes sent on all sockets.
    #[must_use]
    pub fn total_socket_bytes(&self) -> u64 {
        self.unreal_socket_size + self.other_socket_size
    }

    /// Socket sends on all sockets.
    #[must_use]
    pub fn total_socket_count(&self) -> u64 {
        self.unreal_socket_count + self.other_socket_count
    }
}

impl std::ops::AddAssign<&FrameStats> for FrameStats {
    fn add_assign(&mut self, rhs: &FrameStats) {
        self.merge(rhs);
    }
}
