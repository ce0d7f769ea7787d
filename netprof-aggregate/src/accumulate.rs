//! Per-token counter accumulation.

use netprof_core::filter::FilterSpec;
use netprof_core::names::NameTable;
use netprof_core::stats::FrameStats;
use netprof_core::token::{ReplicateActor, Token};

/// Adds one token to `stats` if it passes `filter`.
///
/// Returns whether the token passed. Frame markers and end-of-stream
/// markers contribute nothing; they are never part of a frame.
pub fn accumulate_token(
    stats: &mut FrameStats,
    token: &Token,
    filter: &FilterSpec,
    names: &NameTable,
) -> bool {
    if !filter.token_passes(token, names) {
        return false;
    }

    match token {
        Token::SocketSendTo(send) => {
            let bytes = u64::from(send.bytes_sent);
            if names.engine_socket_index() == Some(send.socket_name_index) {
                stats.unreal_socket_count += 1;
                stats.unreal_socket_size += bytes;
            } else {
                stats.other_socket_count += 1;
                stats.other_socket_size += bytes;
            }
            stats.packet_id_bits += u64::from(send.packet_id_bits);
            stats.packet_bunch_bits += u64::from(send.bunch_bits);
            stats.packet_ack_bits += u64::from(send.ack_bits);
            stats.packet_padding_bits += u64::from(send.padding_bits);
        }
        Token::SendBunch(bunch) => {
            let header = u64::from(bunch.header_bits);
            let payload = u64::from(bunch.payload_bits);
            stats.send_bunch_count += 1;
            stats.send_bunch_size_bits += header + payload;
            stats.send_bunch_header_size_bits += header;
            stats.send_bunch_payload_size_bits += payload;

            let channel = stats.channel_mut(bunch.channel());
            channel.count += 1;
            channel.size_bits += header + payload;
            channel.header_bits += header;
            channel.payload_bits += payload;
        }
        Token::SendRpc(rpc) => {
            stats.rpc_count += 1;
            stats.rpc_size_bits += rpc.size_bits();
        }
        Token::ReplicateActor(actor) => accumulate_actor(stats, actor, filter, names),
        Token::ReplicateProperty(property) => {
            stats.property_count += 1;
            stats.property_size_bits += u64::from(property.size_bits);
        }
        Token::WritePropertyHeader(header) => {
            stats.property_header_count += 1;
            stats.property_header_size_bits += u64::from(header.size_bits);
        }
        Token::Event(_) => stats.event_count += 1,
        Token::RawSocketData(raw) => {
            stats.raw_socket_data_count += 1;
            stats.raw_socket_data_bytes += raw.data.len() as u64;
        }
        Token::SendAck(ack) => {
            stats.ack_count += 1;
            stats.ack_size_bits += u64::from(ack.size_bits);
        }
        Token::ExportBunch(export) => {
            stats.export_bunch_count += 1;
            stats.export_bunch_size_bits += u64::from(export.size_bits);
        }
        Token::MustBeMappedGuids(guids) => {
            stats.must_be_mapped_guid_count += u64::from(guids.num_guids);
            stats.must_be_mapped_guid_size_bits += u64::from(guids.size_bits);
        }
        Token::BeginContentBlock(block) => {
            stats.content_block_header_count += 1;
            stats.content_block_header_size_bits += u64::from(block.size_bits);
        }
        Token::EndContentBlock(block) => {
            stats.content_block_footer_count += 1;
            stats.content_block_footer_size_bits += u64::from(block.size_bits);
        }
        Token::WritePropertyHandle(handle) => {
            stats.property_handle_count += 1;
            stats.property_handle_size_bits += u64::from(handle.size_bits);
        }
        Token::FrameMarker(_)
        | Token::EndOfStream(_)
        | Token::ConnectionChange(_)
        | Token::NameReference(_)
        | Token::ConnectionReference(_) => {}
    }

    true
}

fn accumulate_actor(
    stats: &mut FrameStats,
    actor: &ReplicateActor,
    filter: &FilterSpec,
    names: &NameTable,
) {
    stats.actor_count += 1;
    stats.actor_replicate_time_ms += f64::from(actor.time_ms);

    let mut replicated = false;
    for property in actor
        .properties
        .iter()
        .filter(|p| filter.property_passes(p, names))
    {
        stats.property_count += 1;
        stats.property_size_bits += u64::from(property.size_bits);
        replicated = true;
    }
    for header in actor
        .property_headers
        .iter()
        .filter(|h| filter.property_passes(h, names))
    {
        stats.property_header_count += 1;
        stats.property_header_size_bits += u64::from(header.size_bits);
    }

    if replicated {
        stats.replicated_actor_count += 1;
    }
}

/// Counters for one frame's tokens under `filter`.
///
/// The result counts as a single frame.
#[must_use]
pub fn frame_stats(tokens: &[Token], filter: &FilterSpec, names: &NameTable) -> FrameStats {
    let mut stats = FrameStats {
        frame_count: 1,
        ..FrameStats::default()
    };
    for token in tokens {
        accumulate_token(&mut stats, token, filter, names);
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use netprof_core::token::{
        ActorFlags, ChannelType, MustBeMappedGuids, PropertyRecord, SendBunch, SizedRecord,
        SocketSendTo,
    };

    fn names() -> NameTable {
        let mut names = NameTable::new();
        names.push("Unreal"); // 0
        names.push("Steam"); // 1
        names.push("Pawn_1"); // 2
        names.push("Health"); // 3
        names.push("Ammo"); // 4
        names
    }

    fn socket(name: u32, bytes: u16) -> Token {
        Token::SocketSendTo(SocketSendTo {
            connection_index: 0,
            socket_name_index: name,
            bytes_sent: bytes,
            packet_id_bits: 14,
            bunch_bits: 100,
            ack_bits: 8,
            padding_bits: 2,
        })
    }

    fn property(name: u32, size_bits: u16) -> PropertyRecord {
        PropertyRecord {
            connection_index: 0,
            property_name_index: name,
            size_bits,
        }
    }

    #[test]
    fn test_socket_bandwidth_split() {
        let names = names();
        let stats = frame_stats(
            &[socket(0, 20), socket(1, 7), socket(0, 3)],
            &FilterSpec::new(),
            &names,
        );
        assert_eq!(stats.unreal_socket_count, 2);
        assert_eq!(stats.unreal_socket_size, 23);
        assert_eq!(stats.other_socket_count, 1);
        assert_eq!(stats.other_socket_size, 7);
        assert_eq!(stats.packet_id_bits, 42);
    }

    #[test]
    fn test_bunch_channel_breakdown() {
        let names = names();
        let bunch = Token::SendBunch(SendBunch {
            connection_index: 0,
            channel_index: 0,
            channel_type: ChannelType::Actor as u8,
            header_bits: 32,
            payload_bits: 96,
        });
        let stats = frame_stats(&[bunch], &FilterSpec::new(), &names);
        assert_eq!(stats.send_bunch_count, 1);
        assert_eq!(stats.send_bunch_size_bits, 128);
        assert_eq!(stats.send_bunch_header_size_bits, 32);
        let actor_channel = stats.channel(ChannelType::Actor);
        assert_eq!(actor_channel.count, 1);
        assert_eq!(actor_channel.payload_bits, 96);
        assert_eq!(stats.channel(ChannelType::Control).count, 0);
    }

    #[test]
    fn test_actor_property_counts_respect_filter() {
        let names = names();
        let mut actor = ReplicateActor::new(0, ActorFlags::default(), 2, 0.5);
        actor.properties.push(property(3, 10));
        actor.properties.push(property(4, 6));
        actor.property_headers.push(property(3, 4));
        let token = Token::ReplicateActor(actor);

        let all = frame_stats(std::slice::from_ref(&token), &FilterSpec::new(), &names);
        assert_eq!(all.actor_count, 1);
        assert_eq!(all.replicated_actor_count, 1);
        assert_eq!(all.property_count, 2);
        assert_eq!(all.property_size_bits, 16);
        assert_eq!(all.property_header_size_bits, 4);

        let health = frame_stats(
            std::slice::from_ref(&token),
            &FilterSpec::new().with_property("health"),
            &names,
        );
        assert_eq!(health.property_count, 1);
        assert_eq!(health.property_size_bits, 10);

        let none = frame_stats(&[token], &FilterSpec::new().with_property("armor"), &names);
        assert_eq!(none.actor_count, 0);
        assert_eq!(none.property_count, 0);
    }

    #[test]
    fn test_actor_without_properties_counts_but_not_replicated() {
        let names = names();
        let actor = Token::ReplicateActor(ReplicateActor::new(0, ActorFlags::default(), 2, 0.25));
        let stats = frame_stats(&[actor], &FilterSpec::new(), &names);
        assert_eq!(stats.actor_count, 1);
        assert_eq!(stats.replicated_actor_count, 0);
    }

    #[test]
    fn test_bookkeeping_tokens() {
        let names = names();
        let sized = |size_bits| SizedRecord {
            connection_index: 0,
            size_bits,
        };
        let tokens = [
            Token::SendAck(sized(16)),
            Token::ExportBunch(sized(40)),
            Token::WritePropertyHandle(sized(8)),
            Token::MustBeMappedGuids(MustBeMappedGuids {
                connection_index: 0,
                num_guids: 3,
                size_bits: 96,
            }),
        ];
        let stats = frame_stats(&tokens, &FilterSpec::new(), &names);
        assert_eq!(stats.ack_count, 1);
        assert_eq!(stats.ack_size_bits, 16);
        assert_eq!(stats.export_bunch_size_bits, 40);
        assert_eq!(stats.must_be_mapped_guid_count, 3);
        assert_eq!(stats.bunch_protocol_overhead_bits(), 40 + 8 + 96);
    }
}
