//! Appointment publication, booking, cancellation and lookups.
//!
//! Storage layout, per provider `p` (hex ID) in [`APPOINTMENTS_TABLE`]:
//!
//! - `dates:<p>` map: appointment ID -> day key it is filed under
//! - `day:<p>:<YYYY-MM-DD>` map: appointment ID -> [`StoredAppointment`],
//!   expiring `retention` after the end of the day
//!
//! Every publish prunes `dates:<p>` entries whose day bucket has expired and
//! sets the index to expire with its newest bucket.
//!
//! Spent priority tokens live in the `used` set of [`TOKENS_TABLE`].
//!
//! Publish, book and cancel hold the provider lock for their whole
//! read-modify-write. Lookups take no locks and may read slightly stale data.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use slotwise_crypto::SignedEnvelope;
use slotwise_gate::KeyRegistry;
use slotwise_store::{Database, LockGuard, OptionalExt};
use slotwise_types::{
    date_keys_between, parse_date_key, ActorId, Appointment, Booking, DistanceKind,
    EncryptedData, PublicAppointment, PublicProviderData,
};

use crate::config::EngineConfig;
use crate::directory::ProviderDirectory;
use crate::distance::{DistanceIndex, Neighbor};
use crate::error::{BookingError, BookingResult};
use crate::meter::{Meter, MeterEvent};
use crate::record::StoredAppointment;

pub const APPOINTMENTS_TABLE: &str = "appointments";
pub const TOKENS_TABLE: &str = "tokens";
const USED_TOKENS: &[u8] = b"used";

/// A user's request to take a slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingRequest {
    pub provider: ActorId,
    pub appointment_id: Vec<u8>,
    pub user_public_key: Vec<u8>,
    pub token: Vec<u8>,
    pub encrypted_data: EncryptedData,
}

/// What a publish call changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReport {
    pub published: usize,
    /// Bookings dropped (and tokens released) because their slot was removed.
    pub released: usize,
}

/// A provider in search results, with its bookable appointments.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAppointments {
    pub provider: ActorId,
    pub distance_km: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SignedEnvelope<PublicProviderData>>,
    pub appointments: Vec<PublicAppointment>,
}

pub struct BookingEngine<'a> {
    db: &'a dyn Database,
    meter: &'a dyn Meter,
    config: &'a EngineConfig,
}

impl<'a> BookingEngine<'a> {
    pub fn new(db: &'a dyn Database, meter: &'a dyn Meter, config: &'a EngineConfig) -> Self {
        Self { db, meter, config }
    }

    // -----------------------------------------------------------------------
    // Publish
    // -----------------------------------------------------------------------

    /// Store a provider's appointments, replacing earlier versions with the
    /// same ID.
    ///
    /// Bookings on slots that survive the republish are kept verbatim.
    /// Bookings on removed slots are dropped and their tokens released so the
    /// user can book elsewhere. Every appointment in the batch is checked
    /// before anything is written.
    pub fn publish(
        &self,
        provider: &ActorId,
        appointments: Vec<SignedEnvelope<Appointment>>,
    ) -> BookingResult<PublishReport> {
        let now = Utc::now();
        let mut batch = Vec::with_capacity(appointments.len());
        for appointment in appointments {
            validate_appointment(provider, &appointment)?;
            let date = appointment.data().date_key();
            let ttl = self.bucket_ttl(&date, now)?;
            batch.push((appointment, date, ttl));
        }

        let _guard = self.provider_lock(provider)?;
        let mut report = PublishReport::default();

        for (appointment, date, ttl) in batch {
            let id = appointment.data().id.clone();

            let previous = self.locate(provider, &id)?;
            let mut record = StoredAppointment::new(appointment, now);

            if let Some((old_date, old)) = previous {
                for booking in old.bookings {
                    if record.appointment.data().has_slot(&booking.slot_id) {
                        record.bookings.push(booking);
                    } else {
                        self.release_token(&booking.token)?;
                        report.released += 1;
                    }
                }
                if old_date != date {
                    self.db
                        .map(APPOINTMENTS_TABLE, &day_key(provider, &old_date))
                        .del(&id)?;
                }
            }

            self.store(provider, &date, &record)?;
            self.db
                .map(APPOINTMENTS_TABLE, &day_key(provider, &date))
                .expire(ttl)?;
            self.db
                .map(APPOINTMENTS_TABLE, &dates_key(provider))
                .set(&id, date.as_bytes())?;
            report.published += 1;
        }
        self.prune_index(provider, now)?;

        self.meter
            .record(MeterEvent::Published, report.published as u64, now);
        self.meter
            .record(MeterEvent::Released, report.released as u64, now);
        tracing::debug!(
            provider = %provider.short_id(),
            published = report.published,
            released = report.released,
            "appointments published"
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Book / cancel
    // -----------------------------------------------------------------------

    /// Take the first open slot of an appointment.
    ///
    /// The token is claimed first; any failure afterwards gives it back, so
    /// only a successful booking consumes a token.
    pub fn book(&self, request: BookingRequest) -> BookingResult<Booking> {
        let _guard = self.provider_lock(&request.provider)?;

        let used = self.db.set(TOKENS_TABLE, USED_TOKENS);
        if !used.add(&request.token)? {
            return Err(BookingError::TokenUsed);
        }

        let result = self.book_claimed(&request);
        if result.is_err() {
            if let Err(e) = used.del(&request.token) {
                tracing::error!(error = %e, "failed to release token after rejected booking");
            }
        }
        result
    }

    fn book_claimed(&self, request: &BookingRequest) -> BookingResult<Booking> {
        if KeyRegistry::new(self.db)
            .verified_provider_by_id(&request.provider, &self.config.root_keys)?
            .is_none()
        {
            return Err(BookingError::ProviderInactive);
        }

        let (date, mut record) = self
            .locate(&request.provider, &request.appointment_id)?
            .ok_or_else(|| BookingError::not_found("appointment"))?;

        let slot_id = record
            .first_open_slot()
            .map(|slot| slot.id.clone())
            .ok_or(BookingError::FullyBooked)?;

        let booking = Booking {
            slot_id,
            user_public_key: request.user_public_key.clone(),
            token: request.token.clone(),
            encrypted_data: request.encrypted_data.clone(),
        };
        record.bookings.push(booking.clone());
        record.updated_at = Utc::now();
        self.store(&request.provider, &date, &record)?;

        self.meter.record(MeterEvent::Booked, 1, record.updated_at);
        tracing::debug!(
            provider = %request.provider.short_id(),
            appointment = %hex::encode(&request.appointment_id),
            "slot booked"
        );
        Ok(booking)
    }

    /// Remove the booking made with `token` and release the token.
    pub fn cancel(
        &self,
        provider: &ActorId,
        appointment_id: &[u8],
        token: &[u8],
    ) -> BookingResult<()> {
        let _guard = self.provider_lock(provider)?;

        let (date, mut record) = self
            .locate(provider, appointment_id)?
            .ok_or_else(|| BookingError::not_found("appointment"))?;
        let position = record
            .bookings
            .iter()
            .position(|b| b.token == token)
            .ok_or_else(|| BookingError::not_found("booking"))?;

        record.bookings.remove(position);
        record.updated_at = Utc::now();
        self.store(provider, &date, &record)?;
        self.release_token(token)?;

        self.meter.record(MeterEvent::Cancelled, 1, record.updated_at);
        tracing::debug!(
            provider = %provider.short_id(),
            appointment = %hex::encode(appointment_id),
            "booking cancelled"
        );
        Ok(())
    }

    /// Whether `token` has been spent on a live booking.
    pub fn is_token_used(&self, token: &[u8]) -> BookingResult<bool> {
        Ok(self.db.set(TOKENS_TABLE, USED_TOKENS).has(token)?)
    }

    // -----------------------------------------------------------------------
    // Lookups (lock-free)
    // -----------------------------------------------------------------------

    /// One appointment with booking details stripped.
    pub fn get_appointment(
        &self,
        provider: &ActorId,
        appointment_id: &[u8],
    ) -> BookingResult<PublicAppointment> {
        self.locate(provider, appointment_id)?
            .map(|(_, record)| record.to_public())
            .ok_or_else(|| BookingError::not_found("appointment"))
    }

    /// A provider's own appointments between two days, with full bookings,
    /// ordered by start time.
    pub fn get_provider_appointments(
        &self,
        provider: &ActorId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> BookingResult<Vec<StoredAppointment>> {
        let days = self.day_range(from, to)?;
        let mut records = Vec::new();
        for day in days {
            records.extend(self.day(provider, &day)?);
        }
        records.sort_by(|a, b| {
            (a.appointment.data().timestamp, a.id()).cmp(&(b.appointment.data().timestamp, b.id()))
        });
        Ok(records)
    }

    /// Bookable appointments of providers within `radius_km` of `zip_code`,
    /// nearest provider first.
    pub fn get_appointments_by_zip_code(
        &self,
        zip_code: &str,
        radius_km: f64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> BookingResult<Vec<ProviderAppointments>> {
        let limits = &self.config.search;
        if !(0.0..=limits.max_radius_km).contains(&radius_km) {
            return Err(BookingError::InvalidRange(format!(
                "radius must be between 0 and {} km",
                limits.max_radius_km
            )));
        }
        let days = self.day_range(from, to)?;

        let reachable: HashMap<String, Neighbor> = DistanceIndex::new(self.db)
            .neighbors(DistanceKind::ZipCode, zip_code, radius_km)?
            .into_iter()
            .map(|n| (n.key.clone(), n))
            .collect();

        let directory = ProviderDirectory::new(self.db);
        let mut results = Vec::new();
        for key in KeyRegistry::new(self.db).verified_providers(&self.config.root_keys)? {
            let Some(queue) = &key.data().queue_data else {
                continue;
            };
            let Some(neighbor) = reachable.get(&queue.zip_code) else {
                continue;
            };
            let provider = key.data().actor_id();

            let mut appointments = Vec::new();
            for day in &days {
                appointments.extend(
                    self.day(&provider, day)?
                        .into_iter()
                        .filter(|record| !record.is_fully_booked())
                        .map(|record| record.to_public()),
                );
            }
            if appointments.is_empty() {
                continue;
            }
            appointments.sort_by(|a, b| {
                (a.appointment.timestamp, &a.appointment.id)
                    .cmp(&(b.appointment.timestamp, &b.appointment.id))
            });
            appointments.truncate(limits.max_appointments_per_provider);

            results.push((
                neighbor.distance,
                ProviderAppointments {
                    provider,
                    distance_km: neighbor.distance_km(),
                    data: directory.public_data(&provider)?,
                    appointments,
                },
            ));
        }

        results.sort_by(|(dist_a, a), (dist_b, b)| (dist_a, a.provider).cmp(&(dist_b, b.provider)));
        results.truncate(limits.max_providers);
        Ok(results.into_iter().map(|(_, r)| r).collect())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn provider_lock(&self, provider: &ActorId) -> BookingResult<LockGuard> {
        Ok(self.db.lock(&format!("provider:{}", provider.to_hex()))?)
    }

    /// Find an appointment through the provider's date index.
    fn locate(
        &self,
        provider: &ActorId,
        appointment_id: &[u8],
    ) -> BookingResult<Option<(String, StoredAppointment)>> {
        let Some(date) = self
            .db
            .map(APPOINTMENTS_TABLE, &dates_key(provider))
            .get(appointment_id)
            .optional()?
        else {
            return Ok(None);
        };
        let date = String::from_utf8_lossy(&date).into_owned();
        let record = self
            .db
            .map(APPOINTMENTS_TABLE, &day_key(provider, &date))
            .get(appointment_id)
            .optional()?;
        match record {
            Some(bytes) => Ok(Some((date, serde_json::from_slice(&bytes)?))),
            None => Ok(None),
        }
    }

    /// All appointments filed under one day.
    fn day(&self, provider: &ActorId, date: &str) -> BookingResult<Vec<StoredAppointment>> {
        let entries = self
            .db
            .map(APPOINTMENTS_TABLE, &day_key(provider, date))
            .get_all()?;
        let mut records = Vec::with_capacity(entries.len());
        for (id, bytes) in entries {
            match serde_json::from_slice(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => tracing::error!(
                    provider = %provider.short_id(),
                    appointment = %hex::encode(&id),
                    error = %e,
                    "skipping corrupt appointment record"
                ),
            }
        }
        Ok(records)
    }

    fn store(&self, provider: &ActorId, date: &str, record: &StoredAppointment) -> BookingResult<()> {
        self.db
            .map(APPOINTMENTS_TABLE, &day_key(provider, date))
            .set(record.id(), &serde_json::to_vec(record)?)?;
        Ok(())
    }

    /// Drop index entries whose day bucket has expired, then let the index
    /// expire together with its newest bucket.
    fn prune_index(&self, provider: &ActorId, now: DateTime<Utc>) -> BookingResult<()> {
        let key = dates_key(provider);
        let index = self.db.map(APPOINTMENTS_TABLE, &key);
        let mut newest: Option<String> = None;
        for (id, date) in index.get_all()? {
            let date = String::from_utf8_lossy(&date).into_owned();
            let live = self
                .db
                .map(APPOINTMENTS_TABLE, &day_key(provider, &date))
                .get(&id)
                .optional()?
                .is_some();
            if !live {
                index.del(&id)?;
                tracing::debug!(
                    provider = %provider.short_id(),
                    appointment = %hex::encode(&id),
                    "pruned expired appointment from index"
                );
                continue;
            }
            if newest.as_ref().map_or(true, |n| date > *n) {
                newest = Some(date);
            }
        }
        if let Some(date) = newest {
            // A bucket at the edge of retention may still be live.
            if let Ok(ttl) = self.bucket_ttl(&date, now) {
                index.expire(ttl)?;
            }
        }
        Ok(())
    }

    fn release_token(&self, token: &[u8]) -> BookingResult<()> {
        self.db.set(TOKENS_TABLE, USED_TOKENS).del(token)?;
        Ok(())
    }

    /// Time left until a day bucket may be dropped.
    fn bucket_ttl(&self, date: &str, now: DateTime<Utc>) -> BookingResult<std::time::Duration> {
        let day = parse_date_key(date).map_err(|e| BookingError::InvalidAppointment(e.to_string()))?;
        let end_of_day = day
            .succ_opt()
            .and_then(|next| next.and_hms_opt(0, 0, 0))
            .map(|t| t.and_utc())
            .ok_or_else(|| BookingError::InvalidAppointment(format!("date {date} out of range")))?;
        (end_of_day + self.config.retention - now)
            .to_std()
            .map_err(|_| BookingError::InvalidAppointment(format!("appointment on {date} is past retention")))
    }

    fn day_range(&self, from: NaiveDate, to: NaiveDate) -> BookingResult<Vec<String>> {
        if to < from {
            return Err(BookingError::InvalidRange("range ends before it starts".into()));
        }
        let span = (to - from).num_days() + 1;
        let max = i64::from(self.config.search.max_range_days);
        if span > max {
            return Err(BookingError::InvalidRange(format!(
                "range spans {span} days, at most {max} allowed"
            )));
        }
        Ok(date_keys_between(from, to))
    }
}

fn validate_appointment(
    provider: &ActorId,
    appointment: &SignedEnvelope<Appointment>,
) -> BookingResult<()> {
    let data = appointment.data();
    if appointment.signer_id() != *provider || data.public_key != appointment.public_key() {
        return Err(BookingError::InvalidAppointment(
            "appointment is not signed by the publishing provider".into(),
        ));
    }
    if appointment.verify().is_err() {
        return Err(BookingError::InvalidAppointment("bad appointment signature".into()));
    }
    if data.id.is_empty() {
        return Err(BookingError::InvalidAppointment("empty appointment id".into()));
    }
    let mut seen = HashSet::with_capacity(data.slots.len());
    if !data.slots.iter().all(|slot| seen.insert(slot.id.as_slice())) {
        return Err(BookingError::InvalidAppointment(format!(
            "duplicate slot id in appointment {}",
            hex::encode(&data.id)
        )));
    }
    Ok(())
}

fn dates_key(provider: &ActorId) -> Vec<u8> {
    format!("dates:{}", provider.to_hex()).into_bytes()
}

fn day_key(provider: &ActorId, date: &str) -> Vec<u8> {
    format!("day:{}:{date}", provider.to_hex()).into_bytes()
}
