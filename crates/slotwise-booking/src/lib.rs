//! Booking engine for Slotwise.
//!
//! - [`BookingEngine`] -- publish appointments, book and cancel slots under a
//!   per-provider lock, and answer lock-free lookups
//! - [`ProviderDirectory`] -- encrypted provider submissions and the public
//!   listings shown in search results
//! - [`DistanceIndex`] -- symmetric distance graph behind radius searches
//! - [`Meter`] -- hook for counting booking events; [`StoreMeter`] keeps
//!   daily counters in the database
//!
//! All components borrow a [`slotwise_store::Database`] and hold no state of
//! their own, so any number of service instances can share one store.

pub mod config;
pub mod directory;
pub mod distance;
pub mod engine;
pub mod error;
pub mod meter;
pub mod record;
#[cfg(test)]
pub(crate) mod testing;

pub use config::{EngineConfig, SearchSettings};
pub use directory::{ProviderDirectory, ProviderRecord, PROVIDER_DATA_TABLE};
pub use distance::{DistanceIndex, Neighbor, DISTANCES_TABLE};
pub use engine::{
    BookingEngine, BookingRequest, ProviderAppointments, PublishReport, APPOINTMENTS_TABLE,
    TOKENS_TABLE,
};
pub use error::{BookingError, BookingResult};
pub use meter::{Meter, MeterEvent, NoopMeter, StoreMeter, STATS_TABLE};
pub use record::StoredAppointment;
