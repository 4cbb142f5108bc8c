use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slotwise_crypto::SignedEnvelope;
use slotwise_types::{Appointment, Booking, PublicAppointment, Slot};

/// An appointment as persisted: the provider-signed appointment plus the
/// server-maintained update time and bookings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAppointment {
    pub appointment: SignedEnvelope<Appointment>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub bookings: Vec<Booking>,
}

impl StoredAppointment {
    pub fn new(appointment: SignedEnvelope<Appointment>, updated_at: DateTime<Utc>) -> Self {
        Self {
            appointment,
            updated_at,
            bookings: Vec::new(),
        }
    }

    pub fn id(&self) -> &[u8] {
        &self.appointment.data().id
    }

    pub fn booking_for_slot(&self, slot_id: &[u8]) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.slot_id == slot_id)
    }

    /// First slot, in slot-list order, without a booking.
    pub fn first_open_slot(&self) -> Option<&Slot> {
        self.appointment
            .data()
            .slots
            .iter()
            .find(|slot| self.booking_for_slot(&slot.id).is_none())
    }

    pub fn is_fully_booked(&self) -> bool {
        self.first_open_slot().is_none()
    }

    /// View for other users: which slots are taken, never by whom.
    pub fn to_public(&self) -> PublicAppointment {
        PublicAppointment {
            appointment: self.appointment.data().clone(),
            updated_at: self.updated_at,
            booked_slots: self.bookings.iter().map(|b| b.slot_id.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use slotwise_crypto::SigningKey;
    use slotwise_types::EncryptedData;
    use std::collections::BTreeMap;

    fn record(slots: &[u8]) -> StoredAppointment {
        let key = SigningKey::generate();
        let appointment = Appointment {
            id: vec![1],
            public_key: key.verifying_key().to_bytes(),
            timestamp: Utc::now() + TimeDelta::days(1),
            duration: 15,
            properties: BTreeMap::new(),
            slots: slots.iter().map(|s| Slot::new(vec![*s])).collect(),
        };
        StoredAppointment::new(SignedEnvelope::sign(&appointment, &key).unwrap(), Utc::now())
    }

    fn booking(slot: u8) -> Booking {
        Booking {
            slot_id: vec![slot],
            user_public_key: vec![9; 65],
            token: vec![slot; 32],
            encrypted_data: EncryptedData::default(),
        }
    }

    #[test]
    fn first_open_slot_follows_slot_order() {
        let mut rec = record(&[3, 1, 2]);
        assert_eq!(rec.first_open_slot().unwrap().id, vec![3]);
        rec.bookings.push(booking(3));
        assert_eq!(rec.first_open_slot().unwrap().id, vec![1]);
    }

    #[test]
    fn fully_booked_when_every_slot_taken() {
        let mut rec = record(&[1, 2]);
        rec.bookings.push(booking(2));
        assert!(!rec.is_fully_booked());
        rec.bookings.push(booking(1));
        assert!(rec.is_fully_booked());
    }

    #[test]
    fn public_view_hides_booking_details() {
        let mut rec = record(&[1, 2]);
        rec.bookings.push(booking(1));
        let public = rec.to_public();
        assert_eq!(public.booked_slots, vec![vec![1]]);
        assert_eq!(public.open_slots(), 1);
        let json = serde_json::to_string(&public).unwrap();
        assert!(!json.contains("userPublicKey"));
        assert!(!json.contains("token"));
    }

    #[test]
    fn stored_form_survives_serialization() {
        let mut rec = record(&[1]);
        rec.bookings.push(booking(1));
        let bytes = serde_json::to_vec(&rec).unwrap();
        let parsed: StoredAppointment = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, rec);
        assert!(parsed.appointment.verify().is_ok());
    }
}
