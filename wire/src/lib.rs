//! # Wire
//!
//! Typed marshaling between Rust values and the bus's binary message format.
//!
//! ## Philosophy
//!
//! - **Signatures come from types**: the body signature is derived from the
//!   static types written, never inferred from runtime content.
//! - **Exact consumption**: readers must consume precisely what was written.
//!   Reading the wrong type, reading past the end or leaving arguments unread
//!   are distinct local errors.
//! - **Bytes only at the boundary**: messages are framed into bytes by
//!   [`Message::encode`] and parsed by [`Message::decode`]; everything above
//!   the transport works with owned [`Message`] values.
//!
//! ## Key Types
//!
//! - [`Message`]: call, return, error or signal with header and body
//! - [`MessageWriter`] / [`MessageReader`]: typed body cursors
//! - [`Type`]: static mapping from a Rust type to one wire type
//! - [`Arguments`] / [`MessageBody`]: whole-body marshaling for calls, replies and signals
//! - [`MatchRule`]: signal subscription filter

pub mod body;
pub mod codec;
pub mod cursor;
pub mod error;
pub mod match_rule;
pub mod message;
pub mod signature;
pub mod types;
pub mod value;

pub use body::{Arguments, MessageBody};
pub use cursor::{MessageReader, MessageWriter};
pub use error::WireError;
pub use match_rule::MatchRule;
pub use message::{next_serial, Message, MessageFlags, MessageType};
pub use signature::{SigType, Signature};
pub use types::{Type, Variant};
pub use value::Value;
