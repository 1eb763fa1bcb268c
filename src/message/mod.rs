//! This module exports a minimal message-passing API, which is encapsulated
//! by a `Communicator` trait. Implementors only need to write `send` and
//! `recv` operations for a given transport layer (an in-process channel
//! transport is included). The trait then provides default implementations
//! for broadcast, reduce, all-reduce, all-gather, and barrier operations.
//!

pub mod channel;
pub mod comm;
pub mod util;

pub use channel::{ChannelCommunicator, SingleRank};
pub use comm::Communicator;

use thiserror::Error;

/// Errors from encoding or decoding typed values exchanged in collectives.
///
#[derive(Debug, Error)]
pub enum CommError {
    #[error("failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("collective over an empty group")]
    Empty,

    #[error("rank {rank} hung up")]
    Disconnected { rank: usize },

    #[error("no message from rank {rank} is pending and none can arrive")]
    NothingPending { rank: usize },

    #[error("rank {rank} is not in a group of {size}")]
    NoSuchRank { rank: usize, size: usize },
}
