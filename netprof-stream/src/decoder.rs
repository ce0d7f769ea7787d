//! Token decoder.
//!
//! Reads one `{tag, payload}` record at a time and applies the side
//! effects of table-maintenance tokens: name and address tables grow, and
//! a connection change sets the connection stamped on later tokens.

use netprof_core::names::{AddressTable, NameTable};
use netprof_core::token::{
    ActorFlags, ConnectionChange, ConnectionReference, ContentBlock, EndOfStream, Event,
    FrameMarker, MustBeMappedGuids, NameReference, PropertyRecord, RawSocketData,
    ReplicateActor, SendBunch, SendRpc, SizedRecord, SocketSendTo, Token, TokenKind,
    TOKEN_KIND_COUNT,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, Result};
use crate::reader::PrimitiveReader;

/// Number of decoded tokens per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TokenCounts {
    counts: [u64; TOKEN_KIND_COUNT],
}

impl TokenCounts {
    pub fn record(&mut self, kind: TokenKind) {
        self.counts[usize::from(kind.as_u8())] += 1;
    }

    #[must_use]
    pub fn get(&self, kind: TokenKind) -> u64 {
        self.counts[usize::from(kind.as_u8())]
    }

    /// Total across all kinds.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Kinds seen at least once, in tag order.
    pub fn iter(&self) -> impl Iterator<Item = (TokenKind, u64)> + '_ {
        TokenKind::ALL
            .iter()
            .map(|&kind| (kind, self.get(kind)))
            .filter(|&(_, count)| count > 0)
    }
}

/// Stateful decoder over the token section of a capture.
#[derive(Debug, Clone)]
pub struct TokenDecoder {
    names: NameTable,
    addresses: AddressTable,
    current_connection: u32,
    counts: TokenCounts,
}

impl TokenDecoder {
    /// Creates a decoder that fills `names`.
    ///
    /// The table decides which socket name counts as engine traffic.
    pub fn new(names: NameTable) -> Self {
        Self {
            names,
            addresses: AddressTable::new(),
            current_connection: 0,
            counts: TokenCounts::default(),
        }
    }

    #[must_use]
    pub fn names(&self) -> &NameTable {
        &self.names
    }

    #[must_use]
    pub fn addresses(&self) -> &AddressTable {
        &self.addresses
    }

    /// Connection stamped on the next trace token.
    #[must_use]
    pub fn current_connection(&self) -> u32 {
        self.current_connection
    }

    #[must_use]
    pub fn counts(&self) -> &TokenCounts {
        &self.counts
    }

    /// Releases the tables and counts built so far.
    #[must_use]
    pub fn into_parts(self) -> (NameTable, AddressTable, TokenCounts) {
        (self.names, self.addresses, self.counts)
    }

    /// Decodes the next token.
    ///
    /// Fails with [`DecodeError::Truncated`] if the input ends inside the
    /// record and with [`DecodeError::UnknownTokenType`] on an unknown tag.
    /// Tables are only touched once the whole record has been read.
    pub fn decode_next(&mut self, reader: &mut PrimitiveReader<'_>) -> Result<Token> {
        let offset = reader.position();
        let tag = reader.read_u8()?;
        let kind = TokenKind::from_u8(tag).ok_or(DecodeError::UnknownTokenType { tag, offset })?;
        let connection_index = self.current_connection;

        let token = match kind {
            TokenKind::FrameMarker => Token::FrameMarker(FrameMarker {
                connection_index,
                relative_time: reader.read_f32()?,
            }),
            TokenKind::SocketSendTo => Token::SocketSendTo(SocketSendTo {
                connection_index,
                socket_name_index: reader.read_packed_uint()?,
                bytes_sent: reader.read_u16()?,
                packet_id_bits: reader.read_u16()?,
                bunch_bits: reader.read_u16()?,
                ack_bits: reader.read_u16()?,
                padding_bits: reader.read_u16()?,
            }),
            TokenKind::SendBunch => Token::SendBunch(SendBunch {
                connection_index,
                channel_index: reader.read_u16()?,
                channel_type: reader.read_u8()?,
                header_bits: reader.read_u16()?,
                payload_bits: reader.read_u16()?,
            }),
            TokenKind::SendRpc => Token::SendRpc(SendRpc {
                connection_index,
                actor_name_index: reader.read_packed_uint()?,
                function_name_index: reader.read_packed_uint()?,
                header_bits: reader.read_u16()?,
                parameter_bits: reader.read_u16()?,
                footer_bits: reader.read_u16()?,
            }),
            TokenKind::ReplicateActor => {
                let flags = ActorFlags(reader.read_u8()?);
                let actor_name_index = reader.read_packed_uint()?;
                let time_ms = reader.read_f32()?;
                Token::ReplicateActor(ReplicateActor::new(
                    connection_index,
                    flags,
                    actor_name_index,
                    time_ms,
                ))
            }
            TokenKind::ReplicateProperty => {
                Token::ReplicateProperty(read_property(reader, connection_index)?)
            }
            TokenKind::EndOfStreamMarker => Token::EndOfStream(EndOfStream { connection_index }),
            TokenKind::Event => Token::Event(Event {
                connection_index,
                event_name_index: reader.read_packed_uint()?,
                description_index: reader.read_packed_uint()?,
            }),
            TokenKind::RawSocketData => {
                let size = usize::from(reader.read_u16()?);
                Token::RawSocketData(RawSocketData {
                    connection_index,
                    data: reader.read_bytes(size)?.to_vec(),
                })
            }
            TokenKind::SendAck => Token::SendAck(read_sized(reader, connection_index)?),
            TokenKind::WritePropertyHeader => {
                Token::WritePropertyHeader(read_property(reader, connection_index)?)
            }
            TokenKind::ExportBunch => Token::ExportBunch(read_sized(reader, connection_index)?),
            TokenKind::MustBeMappedGuids => Token::MustBeMappedGuids(MustBeMappedGuids {
                connection_index,
                num_guids: reader.read_u16()?,
                size_bits: reader.read_u16()?,
            }),
            TokenKind::BeginContentBlock => {
                Token::BeginContentBlock(read_content_block(reader, connection_index)?)
            }
            TokenKind::EndContentBlock => {
                Token::EndContentBlock(read_content_block(reader, connection_index)?)
            }
            TokenKind::WritePropertyHandle => {
                Token::WritePropertyHandle(read_sized(reader, connection_index)?)
            }
            TokenKind::ConnectionChange => {
                let address_index = reader.read_packed_uint()?;
                self.current_connection = address_index;
                Token::ConnectionChange(ConnectionChange { address_index })
            }
            TokenKind::NameReference => {
                let name = reader.read_string()?;
                let index = self.names.push(name.clone());
                Token::NameReference(NameReference { index, name })
            }
            TokenKind::ConnectionReference => {
                let address = reader.read_u64()?;
                let index = self.addresses.push(address);
                Token::ConnectionReference(ConnectionReference { index, address })
            }
        };

        self.counts.record(kind);
        Ok(token)
    }
}

fn read_property(reader: &mut PrimitiveReader<'_>, connection_index: u32) -> Result<PropertyRecord> {
    Ok(PropertyRecord {
        connection_index,
        property_name_index: reader.read_packed_uint()?,
        size_bits: reader.read_u16()?,
    })
}

fn read_sized(reader: &mut PrimitiveReader<'_>, connection_index: u32) -> Result<SizedRecord> {
    Ok(SizedRecord {
        connection_index,
        size_bits: reader.read_u16()?,
    })
}

fn read_content_block(reader: &mut PrimitiveReader<'_>, connection_index: u32) -> Result<ContentBlock> {
    Ok(ContentBlock {
        connection_index,
        object_name_index: reader.read_packed_uint()?,
        size_bits: reader.read_u16()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{encode_packed_uint, ByteOrder};

    fn decoder() -> TokenDecoder {
        TokenDecoder::new(NameTable::new())
    }

    fn name_reference(name: &str) -> Vec<u8> {
        let mut out = vec![TokenKind::NameReference.as_u8()];
        #[allow(clippy::cast_possible_truncation)]
        out.extend_from_slice(&(name.len() as u32).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out
    }

    #[test]
    fn test_tables_grow_from_stream() {
        let mut bytes = name_reference("Unreal");
        bytes.extend(name_reference("PlayerPawn_3"));
        bytes.push(TokenKind::ConnectionReference.as_u8());
        bytes.extend_from_slice(&((0x7f00_0001u64 << 32) | 7777).to_le_bytes());
        bytes.push(TokenKind::ConnectionChange.as_u8());
        encode_packed_uint(0, &mut bytes);

        let mut reader = PrimitiveReader::new(&bytes, ByteOrder::Little);
        let mut decoder = decoder();
        for _ in 0..4 {
            let token = decoder.decode_next(&mut reader).unwrap();
            assert!(token.is_table_maintenance());
        }

        assert_eq!(decoder.names().get(1), Some("PlayerPawn_3"));
        assert_eq!(
            decoder.addresses().endpoint(0).unwrap().to_string(),
            "127.0.0.1:7777"
        );
        assert_eq!(decoder.counts().get(TokenKind::NameReference), 2);
        assert_eq!(decoder.counts().total(), 4);
    }

    #[test]
    fn test_connection_change_stamps_later_tokens() {
        let mut bytes = vec![TokenKind::ConnectionChange.as_u8()];
        encode_packed_uint(3, &mut bytes);
        bytes.push(TokenKind::SendAck.as_u8());
        bytes.extend_from_slice(&16u16.to_le_bytes());

        let mut reader = PrimitiveReader::new(&bytes, ByteOrder::Little);
        let mut decoder = decoder();
        decoder.decode_next(&mut reader).unwrap();
        let ack = decoder.decode_next(&mut reader).unwrap();
        assert_eq!(ack.connection_index(), Some(3));
        assert_eq!(ack.size_bits(), 16);
    }

    #[test]
    fn test_send_bunch_big_endian() {
        let mut bytes = vec![TokenKind::SendBunch.as_u8()];
        bytes.extend_from_slice(&5u16.to_be_bytes());
        bytes.push(2);
        bytes.extend_from_slice(&32u16.to_be_bytes());
        bytes.extend_from_slice(&96u16.to_be_bytes());

        let mut reader = PrimitiveReader::new(&bytes, ByteOrder::Big);
        let token = decoder().decode_next(&mut reader).unwrap();
        let Token::SendBunch(bunch) = token else {
            panic!("expected bunch, got {token:?}");
        };
        assert_eq!(bunch.channel_index, 5);
        assert_eq!(bunch.size_bits(), 128);
    }

    #[test]
    fn test_unknown_tag() {
        let bytes = [TokenKind::EndOfStreamMarker.as_u8(), 42];
        let mut reader = PrimitiveReader::new(&bytes, ByteOrder::Little);
        let mut decoder = decoder();
        let end = decoder.decode_next(&mut reader).unwrap();
        assert!(matches!(end, Token::EndOfStream(_)));
        assert_eq!(decoder.counts().get(TokenKind::EndOfStreamMarker), 1);
        assert!(matches!(
            decoder.decode_next(&mut reader),
            Err(DecodeError::UnknownTokenType { tag: 42, offset: 1 })
        ));
    }

    #[test]
    fn test_truncated_record_leaves_tables_alone() {
        let mut bytes = name_reference("Unreal");
        bytes.truncate(bytes.len() - 2);
        let mut reader = PrimitiveReader::new(&bytes, ByteOrder::Little);
        let mut decoder = decoder();
        assert!(decoder.decode_next(&mut reader).unwrap_err().is_truncated());
        assert!(decoder.names().is_empty());
        assert_eq!(decoder.counts().total(), 0);
    }

    #[test]
    fn test_raw_socket_data() {
        let mut bytes = vec![TokenKind::RawSocketData.as_u8()];
        bytes.extend_from_slice(&3u16.to_le_bytes());
        bytes.extend_from_slice(&[9, 8, 7]);
        let mut reader = PrimitiveReader::new(&bytes, ByteOrder::Little);
        let token = decoder().decode_next(&mut reader).unwrap();
        assert_eq!(
            token,
            Token::RawSocketData(RawSocketData {
                connection_index: 0,
                data: vec![9, 8, 7],
            })
        );
    }
}
