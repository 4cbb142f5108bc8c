//! Operation handlers for Slotwise.
//!
//! [`AppointmentsService`] exposes one typed handler per operation. Each
//! handler takes its statically typed params (wrapped in a signed envelope
//! when the operation is authenticated), runs the trust gate for the
//! required authority, calls into admission control or the booking engine,
//! and returns a [`ServiceResult`]. Transports translate that sealed result
//! into their own wire format; nothing here knows about HTTP.
//!
//! | Operation | Signed by |
//! |---|---|
//! | `addMediatorPublicKeys`, `uploadDistances`, `addCodes`, `resetDB` | root |
//! | `getPendingProviderData`, `confirmProvider`, `revokeProvider` | mediator |
//! | `publishAppointments`, `getProviderAppointments` | provider |
//! | `storeProviderData`, `checkProviderData`, `getToken` | own key |
//! | `bookAppointment`, `cancelAppointment` | user token key |
//! | `getAppointmentsByZipCode`, `getAppointment`, `getKeys` | nobody |

pub mod error;
pub mod params;
pub mod service;
pub mod settings;
#[cfg(test)]
pub(crate) mod testing;

pub use error::{ServiceError, ServiceResult};
pub use params::*;
pub use service::{AppointmentsService, MAX_PENDING_LIMIT};
pub use settings::{CodeConfig, Settings, SettingsError};
