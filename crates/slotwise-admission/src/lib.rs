//! Admission control for Slotwise.
//!
//! - [`CodeBook`] -- provisioned signup codes per actor class, each usable a
//!   bounded number of times
//! - [`PriorityTokens`] -- sequential, HMAC-signed queue tokens that also act
//!   as the system-wide anti-double-booking credential

pub mod codes;
pub mod error;
pub mod tokens;

pub use codes::{CodeBook, CodeSettings, CODES_TABLE, CODE_SCORES_TABLE};
pub use error::{AdmissionError, AdmissionResult};
pub use tokens::{PriorityToken, PriorityTokens, PRIORITY_TABLE};
