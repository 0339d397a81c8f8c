//! Principal middleware

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use bson::oid::ObjectId;
use cadrive::{AuthenticatedPrincipal, PrincipalRole};
use tracing::{debug, warn};

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const ROLE_HEADER: &str = "x-principal-role";
pub const CLIENT_HEADER: &str = "x-client-id";
pub const ACTOR_HEADER: &str = "x-actor";

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Build the principal asserted by the identity layer's headers
pub fn principal_from_headers(headers: &HeaderMap) -> Result<AuthenticatedPrincipal, String> {
    let tenant = header_value(headers, TENANT_HEADER).ok_or("Missing tenant")?;
    let tenant_id = ObjectId::parse_str(tenant).map_err(|_| "Invalid tenant".to_string())?;

    let role = match header_value(headers, ROLE_HEADER).map(str::to_lowercase) {
        Some(role) if role == "staff" => PrincipalRole::Staff,
        Some(role) if role == "client" => PrincipalRole::Client,
        Some(role) => return Err(format!("Unknown principal role: {}", role)),
        None => return Err("Missing principal role".to_string()),
    };

    let actor = header_value(headers, ACTOR_HEADER).map(str::to_string);
    match role {
        PrincipalRole::Staff => Ok(AuthenticatedPrincipal::staff(
            tenant_id,
            actor.unwrap_or_else(|| "staff".to_string()),
        )),
        PrincipalRole::Client => {
            let client = header_value(headers, CLIENT_HEADER).ok_or("Missing client id")?;
            let client_id =
                ObjectId::parse_str(client).map_err(|_| "Invalid client id".to_string())?;
            let mut principal = AuthenticatedPrincipal::client(tenant_id, client_id);
            if let Some(actor) = actor {
                principal.actor = actor;
            }
            Ok(principal)
        }
    }
}

/// Attach an `AuthenticatedPrincipal` to the request or reject it with 401
pub async fn principal_middleware(mut request: Request<Body>, next: Next) -> Response {
    match principal_from_headers(request.headers()) {
        Ok(principal) => {
            debug!(
                "Principal {} ({:?}) for {}",
                principal.actor,
                principal.role,
                request.uri().path()
            );
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(reason) => {
            warn!("Rejected request to {}: {}", request.uri().path(), reason);
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "code": "UNAUTHORIZED",
                    "message": reason,
                })),
            )
                .into_response()
        }
    }
}
