//! HTTP transport for Slotwise.
//!
//! Serves every operation of [`slotwise_service::AppointmentsService`] as a
//! JSON-RPC 2.0 method on `POST /jsonrpc`, plus a `GET /health` check.
//! Handlers run on the blocking pool since store locks are synchronous.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod rpc;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use rpc::{JsonRpcId, JsonRpcRequest, JsonRpcResponse, RpcError};
pub use server::SlotwiseServer;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use chrono::{TimeDelta, Utc};
    use serde::Serialize;
    use serde_json::{json, Value};
    use slotwise_crypto::{EncryptionKey, SignedEnvelope, SigningKey};
    use slotwise_service::*;
    use slotwise_store::InMemoryDatabase;
    use slotwise_types::{
        ActorKeyData, Appointment, EncryptedData, PublicProviderData, QueueData, Slot, TokenData,
    };
    use tower::util::ServiceExt;

    struct TestServer {
        app: axum::Router,
        root: SigningKey,
    }

    impl TestServer {
        fn new() -> Self {
            let root = SigningKey::generate();
            let mut settings = Settings::new(
                vec![root.verifying_key().to_bytes()],
                SigningKey::generate().to_bytes(),
                EncryptionKey::generate().public_key_bytes(),
                vec![7; 32],
            );
            settings.codes.user.enabled = false;
            settings.codes.provider.enabled = false;
            let server =
                SlotwiseServer::new(ServerConfig::new(settings), Arc::new(InMemoryDatabase::new()))
                    .unwrap();
            Self {
                app: server.router(),
                root,
            }
        }

        async fn post(&self, body: impl Into<Body>) -> Value {
            let response = self
                .app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/jsonrpc")
                        .header("content-type", "application/json")
                        .body(body.into())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), 200);
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            serde_json::from_slice(&bytes).unwrap()
        }

        async fn call(&self, method: &str, params: Value) -> Value {
            let request = json!({ "jsonrpc": "2.0", "method": method, "params": params, "id": 1 });
            self.post(request.to_string()).await
        }

        async fn signed<T: Serialize + serde::de::DeserializeOwned>(
            &self,
            method: &str,
            params: &T,
            key: &SigningKey,
        ) -> Value {
            let envelope = SignedEnvelope::sign(params, key).unwrap();
            self.call(method, serde_json::to_value(envelope).unwrap()).await
        }
    }

    fn error_code(response: &Value) -> i64 {
        response["error"]["code"].as_i64().unwrap()
    }

    fn key_data(key: &SigningKey, queue_data: Option<QueueData>) -> ActorKeyData {
        ActorKeyData {
            signing: key.verifying_key().to_bytes(),
            encryption: EncryptionKey::generate().public_key_bytes(),
            queue_data,
            timestamp: Utc::now(),
        }
    }

    // -----------------------------------------------------------------------
    // 1. Transport basics
    // -----------------------------------------------------------------------
    #[tokio::test]
    async fn health_endpoint() {
        let server = TestServer::new();
        let response = server
            .app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn malformed_body_is_a_parse_error() {
        let server = TestServer::new();
        let response = server.post("{not json").await;
        assert_eq!(error_code(&response), -32700);
        assert_eq!(response["id"], Value::Null);
    }

    #[tokio::test]
    async fn unknown_method_echoes_id() {
        let server = TestServer::new();
        let response = server
            .post(json!({ "jsonrpc": "2.0", "method": "dropTables", "id": "x9" }).to_string())
            .await;
        assert_eq!(error_code(&response), -32601);
        assert_eq!(response["id"], "x9");
    }

    #[tokio::test]
    async fn wrong_protocol_version_is_rejected() {
        let server = TestServer::new();
        let response = server
            .post(json!({ "jsonrpc": "1.0", "method": "getKeys", "id": 1 }).to_string())
            .await;
        assert_eq!(error_code(&response), -32600);
    }

    #[tokio::test]
    async fn missing_fields_are_invalid_params() {
        let server = TestServer::new();
        let response = server.call("getAppointment", json!({ "id": "abcd" })).await;
        assert_eq!(error_code(&response), -32602);
    }

    #[tokio::test]
    async fn get_keys_lists_root_key() {
        let server = TestServer::new();
        let response = server.call("getKeys", Value::Null).await;
        let root = hex::encode(server.root.verifying_key().to_bytes());
        assert_eq!(response["result"]["rootKeys"][0], root.as_str());
    }

    // -----------------------------------------------------------------------
    // 2. Error codes
    // -----------------------------------------------------------------------
    #[tokio::test]
    async fn signature_failures_have_distinct_codes() {
        let server = TestServer::new();
        let params = AddCodesParams {
            actor: slotwise_types::CodeActor::User,
            codes: vec![b"c".to_vec()],
            timestamp: Utc::now(),
        };
        let stranger = server.signed("addCodes", &params, &SigningKey::generate()).await;
        assert_eq!(error_code(&stranger), 401);

        let stale = AddCodesParams {
            timestamp: Utc::now() - TimeDelta::minutes(10),
            ..params.clone()
        };
        let response = server.signed("addCodes", &stale, &server.root).await;
        assert_eq!(error_code(&response), 403);

        let mut forged = serde_json::to_value(SignedEnvelope::sign(&params, &server.root).unwrap()).unwrap();
        forged["signature"] = hex::encode([1u8; 64]).into();
        let response = server.call("addCodes", forged).await;
        assert_eq!(error_code(&response), 402);

        let response = server.signed("addCodes", &params, &server.root).await;
        assert_eq!(response["result"], 1);
    }

    #[tokio::test]
    async fn unknown_appointment_is_not_found() {
        let server = TestServer::new();
        let provider = SigningKey::generate().verifying_key().to_actor_id();
        let response = server
            .call(
                "getAppointment",
                serde_json::to_value(GetAppointmentParams {
                    provider_id: provider,
                    id: b"nope".to_vec(),
                })
                .unwrap(),
            )
            .await;
        assert_eq!(error_code(&response), 404);
        assert_eq!(response["error"]["data"]["kind"], "not_found");
    }

    // -----------------------------------------------------------------------
    // 3. End to end
    // -----------------------------------------------------------------------
    #[tokio::test]
    async fn register_publish_and_book_over_rpc() {
        let server = TestServer::new();

        let mediator = SigningKey::generate();
        let register = AddMediatorPublicKeysParams {
            signed_key_data: SignedEnvelope::sign(&key_data(&mediator, None), &server.root).unwrap(),
            timestamp: Utc::now(),
        };
        let response = server.signed("addMediatorPublicKeys", &register, &server.root).await;
        assert!(response.get("error").is_none(), "{response}");

        let provider = SigningKey::generate();
        let queue = QueueData {
            zip_code: "10115".into(),
            accessible: false,
        };
        let listing = PublicProviderData {
            name: "Praxis Mitte".into(),
            street: "Invalidenstr. 10".into(),
            city: "Berlin".into(),
            zip_code: "10115".into(),
            description: None,
            accessible: false,
        };
        let confirm = ConfirmProviderParams {
            signed_key_data: SignedEnvelope::sign(&key_data(&provider, Some(queue)), &mediator)
                .unwrap(),
            encrypted_provider_data: EncryptedData::default(),
            signed_public_provider_data: SignedEnvelope::sign(&listing, &mediator).unwrap(),
            timestamp: Utc::now(),
        };
        let response = server.signed("confirmProvider", &confirm, &mediator).await;
        assert!(response.get("error").is_none(), "{response}");

        let day = Utc::now().date_naive() + TimeDelta::days(1);
        let appointment = Appointment {
            id: b"appt".to_vec(),
            public_key: provider.verifying_key().to_bytes(),
            timestamp: day.and_hms_opt(14, 30, 0).unwrap().and_utc(),
            duration: 30,
            properties: BTreeMap::new(),
            slots: vec![Slot::new(b"S1".to_vec())],
        };
        let publish = PublishAppointmentsParams {
            appointments: vec![SignedEnvelope::sign(&appointment, &provider).unwrap()],
            timestamp: Utc::now(),
        };
        let response = server.signed("publishAppointments", &publish, &provider).await;
        assert_eq!(response["result"]["published"], 1);

        let search = server
            .call(
                "getAppointmentsByZipCode",
                json!({ "zipCode": "10115", "radius": 5.0, "from": day, "to": day }),
            )
            .await;
        assert_eq!(search["result"].as_array().unwrap().len(), 1);

        let user = SigningKey::generate();
        let token_request = GetTokenParams {
            hash: vec![0x11; 32],
            code: None,
            timestamp: Utc::now(),
        };
        let response = server.signed("getToken", &token_request, &user).await;
        let token: SignedEnvelope<TokenData> =
            serde_json::from_value(response["result"].clone()).unwrap();

        let book = BookAppointmentParams {
            provider_id: provider.verifying_key().to_actor_id(),
            id: b"appt".to_vec(),
            encrypted_data: EncryptedData::default(),
            signed_token_data: token,
            timestamp: Utc::now(),
        };
        let response = server.signed("bookAppointment", &book, &user).await;
        assert!(response.get("error").is_none(), "{response}");

        let again = server.signed("bookAppointment", &book, &user).await;
        assert_eq!(error_code(&again), 409);
    }
}
