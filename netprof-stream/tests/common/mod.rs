//! Synthetic capture bytes for loader tests.
#![allow(dead_code, clippy::cast_possible_truncation)]

use netprof_stream::{ByteOrder, CAPTURE_MAGIC, CAPTURE_VERSION};

pub const FRAME_MARKER: u8 = 0;
pub const SOCKET_SEND_TO: u8 = 1;
pub const SEND_BUNCH: u8 = 2;
pub const SEND_RPC: u8 = 3;
pub const REPLICATE_ACTOR: u8 = 4;
pub const REPLICATE_PROPERTY: u8 = 5;
pub const END_OF_STREAM: u8 = 6;
pub const SEND_ACK: u8 = 9;
pub const WRITE_PROPERTY_HEADER: u8 = 10;
pub const CONNECTION_CHANGE: u8 = 16;
pub const NAME_REFERENCE: u8 = 17;
pub const CONNECTION_REFERENCE: u8 = 18;

/// Writes a capture header and tokens in a chosen byte order.
pub struct CaptureBuilder {
    order: ByteOrder,
    bytes: Vec<u8>,
}

impl CaptureBuilder {
    pub fn new(order: ByteOrder) -> Self {
        Self::with_version(order, CAPTURE_VERSION)
    }

    pub fn with_version(order: ByteOrder, version: u32) -> Self {
        let mut builder = Self {
            order,
            bytes: Vec::new(),
        };
        builder.u32(CAPTURE_MAGIC);
        builder.u32(version);
        builder.string("test-run");
        builder.string("ShooterGame");
        builder.string("127.0.0.1:7777/Game/Maps/Arena");
        builder
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn build(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    fn u8(&mut self, v: u8) -> &mut Self {
        self.bytes.push(v);
        self
    }

    fn u16(&mut self, v: u16) -> &mut Self {
        match self.order {
            ByteOrder::Little => self.bytes.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => self.bytes.extend_from_slice(&v.to_be_bytes()),
        }
        self
    }

    fn u32(&mut self, v: u32) -> &mut Self {
        match self.order {
            ByteOrder::Little => self.bytes.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => self.bytes.extend_from_slice(&v.to_be_bytes()),
        }
        self
    }

    fn u64(&mut self, v: u64) -> &mut Self {
        match self.order {
            ByteOrder::Little => self.bytes.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => self.bytes.extend_from_slice(&v.to_be_bytes()),
        }
        self
    }

    fn f32(&mut self, v: f32) -> &mut Self {
        self.u32(v.to_bits())
    }

    fn packed(&mut self, mut v: u32) -> &mut Self {
        loop {
            let mut byte = ((v & 0x7f) << 1) as u8;
            v >>= 7;
            if v != 0 {
                byte |= 1;
            }
            self.bytes.push(byte);
            if v == 0 {
                return self;
            }
        }
    }

    fn string(&mut self, s: &str) -> &mut Self {
        self.u32(s.len() as u32);
        self.bytes.extend_from_slice(s.as_bytes());
        self
    }

    pub fn raw_tag(&mut self, tag: u8) -> &mut Self {
        self.u8(tag)
    }

    pub fn name(&mut self, name: &str) -> &mut Self {
        self.u8(NAME_REFERENCE).string(name)
    }

    pub fn connection(&mut self, ip: [u8; 4], port: u32) -> &mut Self {
        let address = (u64::from(u32::from_be_bytes(ip)) << 32) | u64::from(port);
        self.u8(CONNECTION_REFERENCE).u64(address)
    }

    pub fn switch_connection(&mut self, address_index: u32) -> &mut Self {
        self.u8(CONNECTION_CHANGE).packed(address_index)
    }

    pub fn frame_marker(&mut self, relative_time: f32) -> &mut Self {
        self.u8(FRAME_MARKER).f32(relative_time)
    }

    pub fn socket_send(&mut self, socket_name: u32, bytes_sent: u16) -> &mut Self {
        self.u8(SOCKET_SEND_TO)
            .packed(socket_name)
            .u16(bytes_sent)
            .u16(14)
            .u16(bytes_sent.saturating_mul(8).saturating_sub(30))
            .u16(8)
            .u16(2)
    }

    pub fn bunch(&mut self, channel_type: u8, header_bits: u16, payload_bits: u16) -> &mut Self {
        self.u8(SEND_BUNCH)
            .u16(0)
            .u8(channel_type)
            .u16(header_bits)
            .u16(payload_bits)
    }

    pub fn rpc(&mut self, actor: u32, function: u32, parameter_bits: u16) -> &mut Self {
        self.u8(SEND_RPC)
            .packed(actor)
            .packed(function)
            .u16(6)
            .u16(parameter_bits)
            .u16(1)
    }

    pub fn actor(&mut self, actor_name: u32, time_ms: f32) -> &mut Self {
        self.u8(REPLICATE_ACTOR).u8(1).packed(actor_name).f32(time_ms)
    }

    pub fn property(&mut self, property_name: u32, size_bits: u16) -> &mut Self {
        self.u8(REPLICATE_PROPERTY).packed(property_name).u16(size_bits)
    }

    pub fn property_header(&mut self, property_name: u32, size_bits: u16) -> &mut Self {
        self.u8(WRITE_PROPERTY_HEADER)
            .packed(property_name)
            .u16(size_bits)
    }

    pub fn ack(&mut self, size_bits: u16) -> &mut Self {
        self.u8(SEND_ACK).u16(size_bits)
    }

    pub fn end_of_stream(&mut self) -> &mut Self {
        self.u8(END_OF_STREAM)
    }
}

/// Names used by [`game_session`], in table order.
pub const SESSION_NAMES: [&str; 6] = [
    "Unreal",
    "PlayerPawn_12",
    "Health",
    "Ammo",
    "ServerFire",
    "Steam",
];

/// A few seconds of two-connection traffic, `frames` frames long.
pub fn game_session(order: ByteOrder, frames: u32) -> CaptureBuilder {
    let mut b = CaptureBuilder::new(order);
    for name in SESSION_NAMES {
        b.name(name);
    }
    b.connection([127, 0, 0, 1], 7777)
        .connection([10, 0, 0, 2], 7778)
        .switch_connection(0)
        .frame_marker(0.0);

    for i in 0..frames {
        let connection = i % 2;
        b.switch_connection(connection)
            .property(2, 10 + (i % 5) as u16)
            .property_header(2, 4);
        if i % 3 == 0 {
            b.property(3, 6);
        }
        b.actor(1, 0.05 * (i + 1) as f32)
            .bunch(2, 32, 96 + (i % 7) as u16)
            .socket_send(if i % 4 == 0 { 5 } else { 0 }, 40 + i as u16);
        if i % 2 == 0 {
            b.rpc(1, 4, 24);
        }
        b.ack(16).frame_marker((i + 1) as f32 / 30.0);
    }
    b.end_of_stream();
    b
}
