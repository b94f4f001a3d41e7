//! # Bus Types
//!
//! This crate defines the addressing vocabulary shared by every layer of the
//! bus stack.
//!
//! ## Philosophy
//!
//! - **Validated, not stringly-typed**: a [`BusName`] or [`ObjectPath`] can only
//!   exist if it satisfies the bus grammar.
//! - **Explicit ownership semantics**: name requests carry [`RequestNameFlags`]
//!   whose bits map one-to-one onto the daemon's ownership rules.
//!
//! ## Key Types
//!
//! - [`BusName`]: well-known (`org.example.Service`) or unique (`:1.42`) name
//! - [`ObjectPath`]: `/`-delimited node inside a service
//! - [`RequestNameFlags`], [`RequestNameReply`], [`ReleaseNameReply`]
//! - [`WellKnownBus`]: session, system or starter bus selection
//! - [`BusId`]: identity of one bus instance
//! - [`error_names`]: standard error names for error replies

pub mod error_names;
pub mod flags;
pub mod ids;
pub mod names;
pub mod well_known;

pub use flags::{ReleaseNameReply, RequestNameFlags, RequestNameReply};
pub use ids::BusId;
pub use names::{
    validate_error_name, validate_interface_name, validate_member_name, BusName, NameError,
    ObjectPath,
};
pub use well_known::{WellKnownBus, DBUS_INTERFACE, DBUS_PATH, DBUS_SERVICE};
