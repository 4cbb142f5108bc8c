use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bytes::hex_bytes;
use crate::temporal::{date_key, Timestamped};

/// One bookable unit within an appointment, identified by an opaque ID.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    #[serde(with = "hex_bytes")]
    pub id: Vec<u8>,
}

impl Slot {
    pub fn new(id: impl Into<Vec<u8>>) -> Self {
        Self { id: id.into() }
    }
}

/// An appointment as published (and signed) by a provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    /// Opaque, provider-chosen identifier.
    #[serde(with = "hex_bytes")]
    pub id: Vec<u8>,
    /// The provider's public signing key.
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    /// Start time of the appointment.
    pub timestamp: DateTime<Utc>,
    /// Duration in minutes.
    pub duration: u32,
    /// Free-form descriptive properties (vaccine, location hints, ...).
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Slots in assignment order.
    pub slots: Vec<Slot>,
}

impl Appointment {
    /// Day bucket this appointment is filed under.
    pub fn date_key(&self) -> String {
        date_key(&self.timestamp)
    }

    /// Whether a slot with the given ID is part of this appointment.
    pub fn has_slot(&self, slot_id: &[u8]) -> bool {
        self.slots.iter().any(|s| s.id == slot_id)
    }
}

impl Timestamped for Appointment {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Opaque end-to-end encrypted payload (ECDH + symmetric cipher on the client).
///
/// The server stores and returns it without looking inside.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedData {
    #[serde(with = "hex_bytes")]
    pub iv: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
}

/// A user's claim on a single slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(with = "hex_bytes")]
    pub slot_id: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub user_public_key: Vec<u8>,
    /// Priority token spent on this booking; unique system-wide.
    #[serde(with = "hex_bytes")]
    pub token: Vec<u8>,
    pub encrypted_data: EncryptedData,
}

/// Appointment view with booking details removed: only which slots are taken.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAppointment {
    pub appointment: Appointment,
    pub updated_at: DateTime<Utc>,
    #[serde(with = "crate::bytes::hex_bytes_list")]
    pub booked_slots: Vec<Vec<u8>>,
}

impl PublicAppointment {
    /// Number of slots that are still open.
    pub fn open_slots(&self) -> usize {
        self.appointment.slots.len().saturating_sub(self.booked_slots.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Appointment {
        Appointment {
            id: vec![1, 2, 3],
            public_key: vec![4; 65],
            timestamp: Utc.with_ymd_and_hms(2021, 5, 20, 9, 30, 0).unwrap(),
            duration: 30,
            properties: BTreeMap::from([("vaccine".to_string(), "mrna".to_string())]),
            slots: vec![Slot::new(vec![0xa]), Slot::new(vec![0xb])],
        }
    }

    #[test]
    fn date_key_uses_start_day() {
        assert_eq!(sample().date_key(), "2021-05-20");
    }

    #[test]
    fn has_slot() {
        let appointment = sample();
        assert!(appointment.has_slot(&[0xa]));
        assert!(!appointment.has_slot(&[0xc]));
    }

    #[test]
    fn json_uses_camel_case_and_hex() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["id"], "010203");
        assert!(json.get("publicKey").is_some());
        assert_eq!(json["slots"][1]["id"], "0b");
    }

    #[test]
    fn properties_default_to_empty() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json.as_object_mut().unwrap().remove("properties");
        let parsed: Appointment = serde_json::from_value(json).unwrap();
        assert!(parsed.properties.is_empty());
    }

    #[test]
    fn open_slots_counts_unbooked() {
        let public = PublicAppointment {
            appointment: sample(),
            updated_at: Utc::now(),
            booked_slots: vec![vec![0xa]],
        };
        assert_eq!(public.open_slots(), 1);
    }
}
