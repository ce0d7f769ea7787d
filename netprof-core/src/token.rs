//! Replication token types.
//!
//! A capture is a stream of tagged records. Each tag maps to one payload
//! struct below; [`Token`] is the closed sum over all of them. Sizes that
//! describe serialized traffic are kept in bits, exactly as recorded.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of distinct token tags.
pub const TOKEN_KIND_COUNT: usize = 19;

/// Number of channel type buckets.
pub const CHANNEL_TYPE_COUNT: usize = 5;

/// Token type tags as written in the capture stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum TokenKind {
    FrameMarker = 0,
    SocketSendTo = 1,
    SendBunch = 2,
    SendRpc = 3,
    ReplicateActor = 4,
    ReplicateProperty = 5,
    EndOfStreamMarker = 6,
    Event = 7,
    RawSocketData = 8,
    SendAck = 9,
    WritePropertyHeader = 10,
    ExportBunch = 11,
    MustBeMappedGuids = 12,
    BeginContentBlock = 13,
    EndContentBlock = 14,
    WritePropertyHandle = 15,
    ConnectionChange = 16,
    NameReference = 17,
    ConnectionReference = 18,
}

impl TokenKind {
    /// All tags in wire order.
    pub const ALL: [TokenKind; TOKEN_KIND_COUNT] = [
        TokenKind::FrameMarker,
        TokenKind::SocketSendTo,
        TokenKind::SendBunch,
        TokenKind::SendRpc,
        TokenKind::ReplicateActor,
        TokenKind::ReplicateProperty,
        TokenKind::EndOfStreamMarker,
        TokenKind::Event,
        TokenKind::RawSocketData,
        TokenKind::SendAck,
        TokenKind::WritePropertyHeader,
        TokenKind::ExportBunch,
        TokenKind::MustBeMappedGuids,
        TokenKind::BeginContentBlock,
        TokenKind::EndContentBlock,
        TokenKind::WritePropertyHandle,
        TokenKind::ConnectionChange,
        TokenKind::NameReference,
        TokenKind::ConnectionReference,
    ];

    /// Creates a `TokenKind` from the raw tag byte.
    #[must_use]
    pub fn from_u8(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }

    /// Raw tag byte.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns true for tags that maintain the name/address tables or the
    /// current connection rather than describing traffic.
    #[must_use]
    pub fn is_table_maintenance(self) -> bool {
        matches!(
            self,
            TokenKind::ConnectionChange | TokenKind::NameReference | TokenKind::ConnectionReference
        )
    }

    /// Human-readable tag name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::FrameMarker => "FrameMarker",
            TokenKind::SocketSendTo => "SocketSendTo",
            TokenKind::SendBunch => "SendBunch",
            TokenKind::SendRpc => "SendRPC",
            TokenKind::ReplicateActor => "ReplicateActor",
            TokenKind::ReplicateProperty => "ReplicateProperty",
            TokenKind::EndOfStreamMarker => "EndOfStreamMarker",
            TokenKind::Event => "Event",
            TokenKind::RawSocketData => "RawSocketData",
            TokenKind::SendAck => "SendAck",
            TokenKind::WritePropertyHeader => "WritePropertyHeader",
            TokenKind::ExportBunch => "ExportBunch",
            TokenKind::MustBeMappedGuids => "MustBeMappedGuids",
            TokenKind::BeginContentBlock => "BeginContentBlock",
            TokenKind::EndContentBlock => "EndContentBlock",
            TokenKind::WritePropertyHandle => "WritePropertyHandle",
            TokenKind::ConnectionChange => "ConnectionChange",
            TokenKind::NameReference => "NameReference",
            TokenKind::ConnectionReference => "ConnectionReference",
        }
    }
}

/// Logical channel types a bunch can be sent on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum ChannelType {
    Invalid = 0,
    Control = 1,
    Actor = 2,
    File = 3,
    Voice = 4,
}

impl ChannelType {
    /// All channel types in wire order.
    pub const ALL: [ChannelType; CHANNEL_TYPE_COUNT] = [
        ChannelType::Invalid,
        ChannelType::Control,
        ChannelType::Actor,
        ChannelType::File,
        ChannelType::Voice,
    ];

    /// Maps a raw channel type byte. Unknown values land in `Invalid`.
    #[must_use]
    pub fn from_u8(raw: u8) -> Self {
        Self::ALL
            .get(raw as usize)
            .copied()
            .unwrap_or(ChannelType::Invalid)
    }

    /// Bucket index for per-channel counters.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Human-readable channel type name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ChannelType::Invalid => "Invalid",
            ChannelType::Control => "Control",
            ChannelType::Actor => "Actor",
            ChannelType::File => "File",
            ChannelType::Voice => "Voice",
        }
    }
}

/// Start-of-frame marker.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrameMarker {
    pub connection_index: u32,
    /// Seconds since capture start.
    pub relative_time: f32,
}

/// Low-level socket send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SocketSendTo {
    pub connection_index: u32,
    pub socket_name_index: u32,
    /// Bytes handed to the socket.
    pub bytes_sent: u16,
    pub packet_id_bits: u16,
    pub bunch_bits: u16,
    pub ack_bits: u16,
    pub padding_bits: u16,
}

/// A bunch sent on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SendBunch {
    pub connection_index: u32,
    pub channel_index: u16,
    /// Raw channel type byte; see [`SendBunch::channel`].
    pub channel_type: u8,
    pub header_bits: u16,
    pub payload_bits: u16,
}

impl SendBunch {
    /// Decoded channel type.
    #[must_use]
    pub fn channel(&self) -> ChannelType {
        ChannelType::from_u8(self.channel_type)
    }

    /// Header plus payload bits.
    #[must_use]
    pub fn size_bits(&self) -> u64 {
        u64::from(self.header_bits) + u64::from(self.payload_bits)
    }
}

/// A replicated remote procedure call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SendRpc {
    pub connection_index: u32,
    pub actor_name_index: u32,
    pub function_name_index: u32,
    pub header_bits: u16,
    pub parameter_bits: u16,
    pub footer_bits: u16,
}

impl SendRpc {
    /// Header, parameter and footer bits.
    #[must_use]
    pub fn size_bits(&self) -> u64 {
        u64::from(self.header_bits) + u64::from(self.parameter_bits) + u64::from(self.footer_bits)
    }
}

/// Replication flags on an actor record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ActorFlags(pub u8);

impl ActorFlags {
    pub const DIRTY: u8 = 1 << 0;
    pub const INITIAL: u8 = 1 << 1;
    pub const OWNER: u8 = 1 << 2;

    #[must_use]
    pub fn is_dirty(self) -> bool {
        self.0 & Self::DIRTY != 0
    }

    #[must_use]
    pub fn is_initial(self) -> bool {
        self.0 & Self::INITIAL != 0
    }

    #[must_use]
    pub fn is_owner(self) -> bool {
        self.0 & Self::OWNER != 0
    }
}

/// A replicated property or a property header write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PropertyRecord {
    pub connection_index: u32,
    pub property_name_index: u32,
    pub size_bits: u16,
}

/// An actor replication pass.
///
/// `properties` and `property_headers` are empty at decode time; the
/// stream assembler attaches the records that belong to this actor.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReplicateActor {
    pub connection_index: u32,
    pub flags: ActorFlags,
    pub actor_name_index: u32,
    /// Derived class name index, resolved during assembly.
    pub class_name_index: u32,
    pub time_ms: f32,
    pub properties: Vec<PropertyRecord>,
    pub property_headers: Vec<PropertyRecord>,
}

impl ReplicateActor {
    /// Creates an actor record with no attached properties.
    pub fn new(connection_index: u32, flags: ActorFlags, actor_name_index: u32, time_ms: f32) -> Self {
        Self {
            connection_index,
            flags,
            actor_name_index,
            class_name_index: 0,
            time_ms,
            properties: Vec::new(),
            property_headers: Vec::new(),
        }
    }

    /// Bits of all attached properties and property headers.
    #[must_use]
    pub fn replicated_bits(&self) -> u64 {
        self.properties
            .iter()
            .chain(&self.property_headers)
            .map(|p| u64::from(p.size_bits))
            .sum()
    }
}

/// End of the token stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EndOfStream {
    pub connection_index: u32,
}

/// A named engine event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    pub connection_index: u32,
    pub event_name_index: u32,
    pub description_index: u32,
}

/// Raw bytes captured from the socket layer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawSocketData {
    pub connection_index: u32,
    pub data: Vec<u8>,
}

/// Records that carry only a size: acks, GUID exports, property handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SizedRecord {
    pub connection_index: u32,
    pub size_bits: u16,
}

/// Must-be-mapped GUID list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MustBeMappedGuids {
    pub connection_index: u32,
    pub num_guids: u16,
    pub size_bits: u16,
}

/// Content block header or footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContentBlock {
    pub connection_index: u32,
    pub object_name_index: u32,
    pub size_bits: u16,
}

/// Switches the current connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConnectionChange {
    pub address_index: u32,
}

/// Interns a name.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NameReference {
    /// Index assigned in the name table.
    pub index: u32,
    pub name: String,
}

/// Registers a connection address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConnectionReference {
    /// Index assigned in the address table.
    pub index: u32,
    pub address: u64,
}

/// A decoded capture record.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Token {
    FrameMarker(FrameMarker),
    SocketSendTo(SocketSendTo),
    SendBunch(SendBunch),
    SendRpc(SendRpc),
    ReplicateActor(ReplicateActor),
    ReplicateProperty(PropertyRecord),
    EndOfStream(EndOfStream),
    Event(Event),
    RawSocketData(RawSocketData),
    SendAck(SizedRecord),
    WritePropertyHeader(PropertyRecord),
    ExportBunch(SizedRecord),
    MustBeMappedGuids(MustBeMappedGuids),
    BeginContentBlock(ContentBlock),
    EndContentBlock(ContentBlock),
    WritePropertyHandle(SizedRecord),
    ConnectionChange(ConnectionChange),
    NameReference(NameReference),
    ConnectionReference(ConnectionReference),
}

impl Token {
    /// Tag of this token.
    #[must_use]
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::FrameMarker(_) => TokenKind::FrameMarker,
            Token::SocketSendTo(_) => TokenKind::SocketSendTo,
            Token::SendBunch(_) => TokenKind::SendBunch,
            Token::SendRpc(_) => TokenKind::SendRpc,
            Token::ReplicateActor(_) => TokenKind::ReplicateActor,
            Token::ReplicateProperty(_) => TokenKind::ReplicateProperty,
            Token::EndOfStream(_) => TokenKind::EndOfStreamMarker,
            Token::Event(_) => TokenKind::Event,
            Token::RawSocketData(_) => TokenKind::RawSocketData,
            Token::SendAck(_) => TokenKind::SendAck,
            Token::WritePropertyHeader(_) => TokenKind::WritePropertyHeader,
            Token::ExportBunch(_) => TokenKind::ExportBunch,
            Token::MustBeMappedGuids(_) => TokenKind::MustBeMappedGuids,
            Token::BeginContentBlock(_) => TokenKind::BeginContentBlock,
            Token::EndContentBlock(_) => TokenKind::EndContentBlock,
            Token::WritePropertyHandle(_) => TokenKind::WritePropertyHandle,
            Token::ConnectionChange(_) => TokenKind::ConnectionChange,
            Token::NameReference(_) => TokenKind::NameReference,
            Token::ConnectionReference(_) => TokenKind::ConnectionReference,
        }
    }

    /// Connection index captured at decode time.
    ///
    /// Table-maintenance tokens carry none.
    #[must_use]
    pub fn connection_index(&self) -> Option<u32> {
        match self {
            Token::FrameMarker(t) => Some(t.connection_index),
            Token::SocketSendTo(t) => Some(t.connection_index),
            Token::SendBunch(t) => Some(t.connection_index),
            Token::SendRpc(t) => Some(t.connection_index),
            Token::ReplicateActor(t) => Some(t.connection_index),
            Token::ReplicateProperty(t) | Token::WritePropertyHeader(t) => Some(t.connection_index),
            Token::EndOfStream(t) => Some(t.connection_index),
            Token::Event(t) => Some(t.connection_index),
            Token::RawSocketData(t) => Some(t.connection_index),
            Token::SendAck(t) | Token::ExportBunch(t) | Token::WritePropertyHandle(t) => {
                Some(t.connection_index)
            }
            Token::MustBeMappedGuids(t) => Some(t.connection_index),
            Token::BeginContentBlock(t) | Token::EndContentBlock(t) => Some(t.connection_index),
            Token::ConnectionChange(_) | Token::NameReference(_) | Token::ConnectionReference(_) => {
                None
            }
        }
    }

    /// Returns true for name/address/connection bookkeeping tokens.
    #[must_use]
    pub fn is_table_maintenance(&self) -> bool {
        self.kind().is_table_maintenance()
    }

    /// Serialized size of the traffic this token describes, in bits.
    #[must_use]
    pub fn size_bits(&self) -> u64 {
        match self {
            Token::SocketSendTo(t) => u64::from(t.bytes_sent) * 8,
            Token::SendBunch(t) => t.size_bits(),
            Token::SendRpc(t) => t.size_bits(),
            Token::ReplicateActor(t) => t.replicated_bits(),
            Token::ReplicateProperty(t) | Token::WritePropertyHeader(t) => u64::from(t.size_bits),
            Token::RawSocketData(t) => t.data.len() as u64 * 8,
            Token::SendAck(t) | Token::ExportBunch(t) | Token::WritePropertyHandle(t) => {
                u64::from(t.size_bits)
            }
            Token::MustBeMappedGuids(t) => u64::from(t.size_bits),
            Token::BeginContentBlock(t) | Token::EndContentBlock(t) => u64::from(t.size_bits),
            Token::FrameMarker(_)
            | Token::EndOfStream(_)
            | Token::Event(_)
            | Token::ConnectionChange(_)
            | Token::NameReference(_)
            | Token::ConnectionReference(_) => 0,
        }
    }

    /// Time spent producing this token, in milliseconds.
    #[must_use]
    pub fn time_ms(&self) -> f32 {
        match self {
            Token::ReplicateActor(t) => t.time_ms,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_kind_round_trip_tags() {
        for (tag, kind) in TokenKind::ALL.iter().enumerate() {
            assert_eq!(kind.as_u8() as usize, tag);
            assert_eq!(TokenKind::from_u8(tag as u8), Some(*kind));
        }
        assert_eq!(TokenKind::from_u8(19), None);
        assert_eq!(TokenKind::from_u8(0xFF), None);
    }

    #[test]
    fn test_table_maintenance_kinds() {
        let maintenance: Vec<_> = TokenKind::ALL
            .iter()
            .filter(|k| k.is_table_maintenance())
            .collect();
        assert_eq!(maintenance.len(), 3);
        assert!(!TokenKind::FrameMarker.is_table_maintenance());
    }

    #[test]
    fn test_channel_type_mapping() {
        assert_eq!(ChannelType::from_u8(2), ChannelType::Actor);
        assert_eq!(ChannelType::from_u8(4), ChannelType::Voice);
        assert_eq!(ChannelType::from_u8(9), ChannelType::Invalid);
    }

    #[test]
    fn test_actor_flags() {
        let flags = ActorFlags(ActorFlags::DIRTY | ActorFlags::OWNER);
        assert!(flags.is_dirty());
        assert!(!flags.is_initial());
        assert!(flags.is_owner());
    }

    #[test]
    fn test_actor_replicated_bits() {
        let mut actor = ReplicateActor::new(0, ActorFlags::default(), 1, 0.5);
        assert_eq!(actor.replicated_bits(), 0);
        actor.properties.push(PropertyRecord {
            connection_index: 0,
            property_name_index: 2,
            size_bits: 12,
        });
        actor.property_headers.push(PropertyRecord {
            connection_index: 0,
            property_name_index: 2,
            size_bits: 6,
        });
        assert_eq!(actor.replicated_bits(), 18);
        assert_eq!(Token::ReplicateActor(actor).size_bits(), 18);
    }

    #[test]
    fn test_connection_index_snapshot() {
        let bunch = Token::SendBunch(SendBunch {
            connection_index: 3,
            channel_index: 0,
            channel_type: 2,
            header_bits: 32,
            payload_bits: 96,
        });
        assert_eq!(bunch.connection_index(), Some(3));
        assert_eq!(bunch.size_bits(), 128);

        let change = Token::ConnectionChange(ConnectionChange { address_index: 1 });
        assert_eq!(change.connection_index(), None);
        assert!(change.is_table_maintenance());
    }
}
