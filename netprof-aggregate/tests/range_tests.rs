#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
use std::sync::atomic::AtomicBool;

use approx::assert_relative_eq;
use netprof_aggregate::{frame_stats, AggregateConfig, Aggregator, FilterSpec, TokenRef};
use netprof_core::frame::Frame;
use netprof_core::names::NameTable;
use netprof_core::token::{
    ActorFlags, ChannelType, PropertyRecord, ReplicateActor, SendBunch, SendRpc, Token,
};

const PAWN: u32 = 1;
const DOOR: u32 = 2;
const HEALTH: u32 = 3;
const AMMO: u32 = 4;
const FIRE: u32 = 5;

fn names() -> NameTable {
    let mut names = NameTable::new();
    for name in ["Unreal", "PlayerPawn", "Door", "Health", "Ammo", "ServerFire"] {
        names.push(name);
    }
    names
}

fn actor(name: u32, connection: u32, properties: &[(u32, u16)]) -> Token {
    let mut actor = ReplicateActor::new(connection, ActorFlags::default(), name, 0.5);
    actor.class_name_index = name;
    for &(property_name_index, size_bits) in properties {
        actor.properties.push(PropertyRecord {
            connection_index: connection,
            property_name_index,
            size_bits,
        });
    }
    Token::ReplicateActor(actor)
}

fn frames(count: usize, names: &NameTable) -> Vec<Frame> {
    (0..count)
        .map(|i| {
            let connection = (i % 3) as u32;
            let mut tokens = vec![
                actor(PAWN, connection, &[(HEALTH, 10), (AMMO, 6)]),
                Token::SendBunch(SendBunch {
                    connection_index: connection,
                    channel_index: 1,
                    channel_type: ChannelType::Actor as u8,
                    header_bits: 20,
                    payload_bits: 100 + i as u16,
                }),
            ];
            if i % 4 == 0 {
                tokens.push(actor(DOOR, connection, &[]));
                tokens.push(Token::SendRpc(SendRpc {
                    connection_index: connection,
                    actor_name_index: DOOR,
                    function_name_index: FIRE,
                    header_bits: 4,
                    parameter_bits: 12,
                    footer_bits: 2,
                }));
            }
            let stats = frame_stats(&tokens, &FilterSpec::new(), names);
            let end = (i + 1) as f32 / 30.0;
            Frame::new(tokens, end, 1.0 / 30.0, stats)
        })
        .collect()
}

#[test]
fn test_parallel_matches_sequential() {
    let names = names();
    let frames = frames(600, &names);
    let filter = FilterSpec::new().with_property("health");

    let sequential = Aggregator::with_config(&names, AggregateConfig::new().with_parallel(false))
        .aggregate_frames(&frames, 0, &filter);
    let parallel = Aggregator::with_config(
        &names,
        AggregateConfig::new().with_min_parallel_frames(16),
    )
    .aggregate_frames(&frames, 0, &filter);

    assert_eq!(sequential.stats.frame_count, 600);
    assert_eq!(parallel.stats.property_count, sequential.stats.property_count);
    assert_eq!(parallel.stats.send_bunch_size_bits, sequential.stats.send_bunch_size_bits);
    assert_relative_eq!(
        parallel.stats.actor_replicate_time_ms,
        sequential.stats.actor_replicate_time_ms,
        max_relative = 1e-9
    );
    assert_relative_eq!(parallel.start_time, sequential.start_time);
    assert_relative_eq!(parallel.end_time, sequential.end_time);

    let pawn_seq = sequential.actor_classes.get(&PAWN).unwrap();
    let pawn_par = parallel.actor_classes.get(&PAWN).unwrap();
    assert_eq!(pawn_seq.rollup.count, pawn_par.rollup.count);
    assert_eq!(pawn_seq.rollup.first_seen, pawn_par.rollup.first_seen);
    assert_eq!(pawn_seq.rollup.first_seen, Some(TokenRef::new(0, 0)));
}

#[test]
fn test_class_rollup_nests_properties() {
    let names = names();
    let frames = frames(8, &names);
    let aggregate = Aggregator::new(&names).aggregate_frames(&frames, 0, &FilterSpec::new());

    let pawn = aggregate.actor_classes.get(&PAWN).unwrap();
    assert_eq!(pawn.rollup.count, 8);
    assert_eq!(pawn.rollup.size_bits, 8 * 16);
    assert_eq!(pawn.rollup.replicated_count, 8);

    let properties = aggregate.class_properties(PAWN).unwrap();
    assert_eq!(properties.get(&HEALTH).unwrap().rollup.size_bits, 80);
    assert_eq!(properties.get(&AMMO).unwrap().rollup.count, 8);

    let door = aggregate.actor_classes.get(&DOOR).unwrap();
    assert_eq!(door.rollup.count, 2);
    assert_eq!(door.rollup.replicated_count, 0);
    assert_eq!(aggregate.rpcs.get(&FIRE).unwrap().rollup.size_bits, 36);
}

#[test]
fn test_sub_range_offsets_token_refs() {
    let names = names();
    let frames = frames(12, &names);
    let aggregate =
        Aggregator::new(&names).aggregate_frames(&frames[5..9], 5, &FilterSpec::new());
    assert_eq!(aggregate.stats.frame_count, 4);
    let door = aggregate.actor_classes.get(&DOOR).unwrap();
    assert_eq!(door.rollup.first_seen, Some(TokenRef::new(8, 2)));
    assert_relative_eq!(aggregate.start_time, 5.0 / 30.0);
    assert_relative_eq!(aggregate.end_time, 9.0 / 30.0);
}

#[test]
fn test_connection_filter_splits_traffic() {
    let names = names();
    let frames = frames(30, &names);
    let aggregator = Aggregator::new(&names);
    let all = aggregator.aggregate_frames(&frames, 0, &FilterSpec::new());

    let mut bunches = 0;
    for connection in 0..3 {
        let filter = FilterSpec::new().with_connections([connection]);
        bunches += aggregator
            .aggregate_frames(&frames, 0, &filter)
            .stats
            .send_bunch_count;
    }
    assert_eq!(bunches, all.stats.send_bunch_count);
}

#[test]
fn test_cancelled_fold_returns_none() {
    let names = names();
    let frames = frames(40, &names);
    let cancel = AtomicBool::new(true);
    let aggregator =
        Aggregator::with_config(&names, AggregateConfig::new().with_parallel(false));
    assert!(aggregator
        .aggregate_frames_cancellable(&frames, 0, &FilterSpec::new(), &cancel)
        .is_none());

    let go = AtomicBool::new(false);
    let done = aggregator
        .aggregate_frames_cancellable(&frames, 0, &FilterSpec::new(), &go)
        .unwrap();
    assert_eq!(done.stats.frame_count, 40);
}

#[test]
fn test_per_second() {
    let names = names();
    let frames = frames(30, &names);
    let aggregate = Aggregator::new(&names).aggregate_frames(&frames, 0, &FilterSpec::new());
    let rate = aggregate
        .per_second(aggregate.stats.send_bunch_count as f64)
        .unwrap();
    assert_relative_eq!(rate, 30.0, max_relative = 1e-5);
    assert!(netprof_aggregate::Aggregate::new().per_second(1.0).is_none());
}
