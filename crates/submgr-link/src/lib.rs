//! submgr-link: client-importable share links.
//!
//! Turns (node, inbound, credential) tuples into the URI formats proxy
//! clients import, and assembles a subscriber's full feed.
//!
//! # Formats
//!
//! | Protocol | Link |
//! |---|---|
//! | VMess | `vmess://` + base64 of the v2rayN JSON object |
//! | VLESS | `vless://{uuid}@{host}:{port}?{params}#{remark}` |
//! | Trojan | `trojan://{password}@{host}:{port}?{params}#{remark}` |
//! | Shadowsocks | `ss://{base64url(method:password)}@{host}:{port}#{remark}` (SIP002) |
//!
//! Every encoder is a pure function of its input. The assembler skips
//! links that fail to encode and reports them next to the feed.

pub mod assemble;
pub mod encode;

pub use assemble::{LinkFailure, Subscription, assemble};
pub use encode::{LinkInput, encode};
