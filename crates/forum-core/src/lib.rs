//! Core types and decision logic for the classroom forum.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the visibility model, the reply tree, the authorization engine, the
//! dashboard aggregator and the notification router, plus the collaborator
//! traits ([`store::ForumStore`], [`files::FileStore`],
//! [`notify::NotificationTransport`]) that the other crates implement.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod authz;
pub mod dashboard;
pub mod directory;
pub mod error;
pub mod files;
pub mod forum;
pub mod ids;
pub mod notify;
pub mod store;
pub mod thread;
pub mod tree;
pub mod visibility;

pub use error::{Error, Result};
pub use forum::Forum;
