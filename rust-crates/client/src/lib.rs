//! Client library for the on-chain bingo game.
//!
//! An intent is encoded through [`bingo_abi`], broadcast by the
//! [`rpc::ChainClient`], followed by the [`tracker::Tracker`] until it
//! settles, and only then reflected in the [`view_model::ViewModel`].

pub use connection::{
    ClientConfig,
    Connection,
    ContractAddresses,
    connect,
};
pub use error::{
    ContractError,
    Error,
    ErrorKind,
    Result,
    classify_rpc_error,
};
pub use game::{
    GameClient,
    PendingAction,
    UserConfirmed,
};

pub mod connection;

pub mod game;

pub mod model;

pub mod retry;

pub mod rpc;

pub mod tracker;

pub mod view_model;

mod error;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
