//! submgr-node: talks to one node's administrative API.
//!
//! ```text
//! Retrying<A>                 bounded backoff on Unreachable only
//!   └── NodeAdmin (trait)
//!       └── HttpNodeClient    one HTTP call per operation, per-call timeout
//!           GET    {admin}/inbounds/{tag}/users
//!           POST   {admin}/inbounds/{tag}/users
//!           DELETE {admin}/inbounds/{tag}/users/{email}
//! ```
//!
//! Adds and removes are idempotent: adding an identical entry succeeds,
//! adding a changed entry replaces it, and removing an absent entry
//! succeeds. The node's proxy process is never restarted.

pub mod admin;
pub mod client;
pub mod error;
pub mod retry;

pub use admin::NodeAdmin;
pub use client::HttpNodeClient;
pub use error::{NodeError, NodeErrorKind};
pub use retry::{RetryPolicy, Retrying};
