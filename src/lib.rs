//! Synthetic user-activity event producer.
//!
//! A pool of [`worker::PublishWorker`]s synthesizes events, stamps them with a
//! [`clock::SimClock`] running an hour per second, occasionally swaps in a
//! malformed payload, and publishes to a topic through a pluggable
//! [`transport::Transport`].

pub mod clock;
pub mod config;
pub mod event;
pub mod ident;
pub mod logging;
pub mod metrics;
pub mod payload;
pub mod rate;
pub mod supervisor;
pub mod topic;
pub mod transport;
pub mod worker;
