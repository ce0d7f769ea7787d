//! netprof-core: Core types for network replication capture analysis.
//!
//! This crate provides the foundational data model shared by the decoder
//! and the aggregation engine: interned name and address tables, the
//! replication token types, the filter predicate, and the counters and
//! rollups that aggregates are built from.
//!

pub mod error;
pub mod filter;
pub mod frame;
pub mod names;
pub mod stats;
pub mod summary;
pub mod token;
pub mod tracker;

pub use error::{Error, Result};
pub use filter::FilterSpec;
pub use frame::Frame;
pub use names::{derive_class_name, AddressTable, Endpoint, NameTable, DEFAULT_ENGINE_SOCKET_NAME};
pub use stats::{ChannelStats, FrameStats};
pub use summary::{Summary, SummaryMap};
pub use token::{
    ActorFlags, ChannelType, ConnectionChange, ConnectionReference, ContentBlock, EndOfStream,
    Event, FrameMarker, MustBeMappedGuids, NameReference, PropertyRecord, RawSocketData,
    ReplicateActor, SendBunch, SendRpc, SizedRecord, SocketSendTo, Token, TokenKind,
    CHANNEL_TYPE_COUNT, TOKEN_KIND_COUNT,
};
pub use tracker::{ItemRollup, Merge, TokenRef, TrackedItem, UniqueItemTracker};
