//! Typed request and response payloads, one struct per operation.
//!
//! Signed operations receive their params wrapped in a
//! [`SignedEnvelope`](slotwise_crypto::SignedEnvelope); the timestamp inside
//! the params is what the freshness check looks at.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use slotwise_crypto::SignedEnvelope;
use slotwise_gate::ActorKey;
use slotwise_types::bytes::{hex_bytes, hex_bytes_list};
use slotwise_types::{
    ActorId, Appointment, CodeActor, DistanceEdge, DistanceKind, EncryptedData,
    PublicProviderData, Timestamped, TokenData,
};

macro_rules! timestamped {
    ($($name:ty),+ $(,)?) => {
        $(
            impl Timestamped for $name {
                fn timestamp(&self) -> DateTime<Utc> {
                    self.timestamp
                }
            }
        )+
    };
}

// -- root -------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMediatorPublicKeysParams {
    pub signed_key_data: ActorKey,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDistancesParams {
    #[serde(rename = "type")]
    pub kind: DistanceKind,
    pub distances: Vec<DistanceEdge>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCodesParams {
    pub actor: CodeActor,
    #[serde(with = "hex_bytes_list")]
    pub codes: Vec<Vec<u8>>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetDbParams {
    pub timestamp: DateTime<Utc>,
}

// -- mediator ---------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPendingProviderDataParams {
    #[serde(default = "default_pending_limit")]
    pub limit: usize,
    pub timestamp: DateTime<Utc>,
}

fn default_pending_limit() -> usize {
    100
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmProviderParams {
    /// Provider key signed by the confirming mediator; carries queue data.
    pub signed_key_data: ActorKey,
    /// Provider data re-encrypted for mediators.
    pub encrypted_provider_data: EncryptedData,
    /// Listing shown in search results, signed by the confirming mediator.
    pub signed_public_provider_data: SignedEnvelope<PublicProviderData>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeProviderParams {
    pub provider_id: ActorId,
    pub timestamp: DateTime<Utc>,
}

// -- provider ---------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreProviderDataParams {
    pub encrypted_data: EncryptedData,
    #[serde(default, with = "opt_hex", skip_serializing_if = "Option::is_none")]
    pub code: Option<Vec<u8>>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckProviderDataParams {
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishAppointmentsParams {
    pub appointments: Vec<SignedEnvelope<Appointment>>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetProviderAppointmentsParams {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub timestamp: DateTime<Utc>,
}

// -- user -------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTokenParams {
    /// Client-side hash of the user's contact data.
    #[serde(with = "hex_bytes")]
    pub hash: Vec<u8>,
    #[serde(default, with = "opt_hex", skip_serializing_if = "Option::is_none")]
    pub code: Option<Vec<u8>>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookAppointmentParams {
    pub provider_id: ActorId,
    #[serde(with = "hex_bytes")]
    pub id: Vec<u8>,
    pub encrypted_data: EncryptedData,
    pub signed_token_data: SignedEnvelope<TokenData>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelAppointmentParams {
    pub provider_id: ActorId,
    #[serde(with = "hex_bytes")]
    pub id: Vec<u8>,
    pub signed_token_data: SignedEnvelope<TokenData>,
    pub timestamp: DateTime<Utc>,
}

timestamped!(
    AddMediatorPublicKeysParams,
    UploadDistancesParams,
    AddCodesParams,
    ResetDbParams,
    GetPendingProviderDataParams,
    ConfirmProviderParams,
    RevokeProviderParams,
    StoreProviderDataParams,
    CheckProviderDataParams,
    PublishAppointmentsParams,
    GetProviderAppointmentsParams,
    GetTokenParams,
    BookAppointmentParams,
    CancelAppointmentParams,
);

// -- anonymous --------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAppointmentsByZipCodeParams {
    pub zip_code: String,
    /// Search radius in km.
    pub radius: f64,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAppointmentParams {
    pub provider_id: ActorId,
    #[serde(with = "hex_bytes")]
    pub id: Vec<u8>,
}

/// Public key material clients need.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keys {
    #[serde(with = "hex_bytes_list")]
    pub root_keys: Vec<Vec<u8>>,
    #[serde(with = "hex_bytes")]
    pub token_key: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub provider_data_key: Vec<u8>,
    pub mediators: Vec<ActorKey>,
}

mod opt_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_some(&hex::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
