use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use slotwise_service::{AppointmentsService, ServiceError, ServiceResult};

use crate::rpc::{JsonRpcRequest, JsonRpcResponse, RpcError};

pub type AppState = Arc<AppointmentsService>;

pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "name": "slotwise-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /jsonrpc`. Errors are always reported in the JSON-RPC body.
pub async fn jsonrpc_handler(State(service): State<AppState>, body: Bytes) -> Json<JsonRpcResponse> {
    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return Json(JsonRpcResponse::failure(None, RpcError::parse_error(e))),
    };
    if request.jsonrpc != "2.0" {
        return Json(JsonRpcResponse::failure(
            request.id,
            RpcError::invalid_request("jsonrpc must be \"2.0\""),
        ));
    }

    let JsonRpcRequest { method, params, id, .. } = request;
    tracing::debug!(%method, "rpc call");

    // Handlers take store locks and may block.
    let outcome = tokio::task::spawn_blocking(move || dispatch(&service, &method, params)).await;
    let response = match outcome {
        Ok(Ok(result)) => JsonRpcResponse::success(id, result),
        Ok(Err(error)) => JsonRpcResponse::failure(id, error),
        Err(e) => {
            tracing::error!(error = %e, "handler task failed");
            JsonRpcResponse::failure(id, RpcError::new(crate::rpc::codes::INTERNAL, "internal error"))
        }
    };
    Json(response)
}

/// Route a method name to its typed handler.
pub fn dispatch(service: &AppointmentsService, method: &str, params: Value) -> Result<Value, RpcError> {
    match method {
        // root
        "addMediatorPublicKeys" => call(params, |p| service.add_mediator_public_keys(p)),
        "uploadDistances" => call(params, |p| service.upload_distances(p)),
        "addCodes" => call(params, |p| service.add_codes(p)),
        "resetDB" => call(params, |p| service.reset_db(p)),
        // mediator
        "getPendingProviderData" => call(params, |p| service.get_pending_provider_data(p)),
        "confirmProvider" => call(params, |p| service.confirm_provider(p)),
        "revokeProvider" => call(params, |p| service.revoke_provider(p)),
        // provider
        "storeProviderData" => call(params, |p| service.store_provider_data(p)),
        "checkProviderData" => call(params, |p| service.check_provider_data(p)),
        "publishAppointments" => call(params, |p| service.publish_appointments(p)),
        "getProviderAppointments" => call(params, |p| service.get_provider_appointments(p)),
        // user
        "getToken" => call(params, |p| service.get_token(p)),
        "bookAppointment" => call(params, |p| service.book_appointment(p)),
        "cancelAppointment" => call(params, |p| service.cancel_appointment(p)),
        // anonymous
        "getAppointmentsByZipCode" => call(params, |p| service.get_appointments_by_zip_code(p)),
        "getAppointment" => call(params, |p| service.get_appointment(p)),
        "getKeys" => to_value(service.get_keys()),
        other => Err(RpcError::method_not_found(other)),
    }
}

fn call<P, R>(params: Value, handler: impl FnOnce(P) -> ServiceResult<R>) -> Result<Value, RpcError>
where
    P: DeserializeOwned,
    R: Serialize,
{
    let params = serde_json::from_value(params).map_err(RpcError::invalid_params)?;
    to_value(handler(params))
}

fn to_value<R: Serialize>(result: ServiceResult<R>) -> Result<Value, RpcError> {
    let result = result.map_err(|e| {
        // Internal failures were logged where they were translated.
        if !matches!(e, ServiceError::Internal { .. }) {
            tracing::debug!(kind = e.kind(), error = %e, "request refused");
        }
        RpcError::from(e)
    })?;
    serde_json::to_value(result).map_err(|e| {
        tracing::error!(error = %e, "response serialization failed");
        RpcError::new(crate::rpc::codes::INTERNAL, "internal error")
    })
}
