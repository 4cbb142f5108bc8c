//! Foundation types for Slotwise.
//!
//! This crate provides the identity, appointment, and key-payload types used
//! throughout the system. Every other Slotwise crate depends on
//! `slotwise-types`.
//!
//! # Key Types
//!
//! - [`ActorId`] -- Stable actor identifier (SHA-256 of a public signing key)
//! - [`Appointment`] / [`Slot`] -- What providers publish
//! - [`Booking`] -- A user's claim on one slot
//! - [`ActorKeyData`] -- Identity payload vouched for by a higher authority
//! - [`TokenData`] -- Server-signed binding of a user key to a priority token
//! - [`DistanceEdge`] -- Weighted edge of the location graph

pub mod actor;
pub mod appointment;
pub mod bytes;
pub mod distance;
pub mod error;
pub mod identity;
pub mod temporal;

pub use actor::{ActorKeyData, CodeActor, PublicProviderData, QueueData, TokenData};
pub use appointment::{Appointment, Booking, EncryptedData, PublicAppointment, Slot};
pub use distance::{edge_score, radius_score, DistanceEdge, DistanceKind};
pub use error::TypeError;
pub use identity::ActorId;
pub use temporal::{date_key, date_keys_between, parse_date_key, Timestamped};
