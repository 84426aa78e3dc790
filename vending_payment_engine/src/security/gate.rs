use std::sync::Arc;

use log::*;
use serde_json::Value;
use thiserror::Error;

use crate::{
    db_types::NewAuditEntry,
    security::{
        envelope::{signing_payload, SecureEnvelope},
        hmac_signature::verify_payload,
        replay::{ReplayConfig, ReplayError, ReplayGuard},
    },
    traits::{DeviceAuthApiError, DeviceRegistry},
};

/// The output of a successful gate check: the verified machine identity and the payload the
/// machine actually signed. Handlers never see the raw envelope.
#[derive(Debug, Clone)]
pub struct AuthorizedRequest {
    pub machine_id: i64,
    pub data: Value,
    pub session_id: Option<String>,
}

/// Why a request was turned away. The variants carry enough detail for the server log; clients
/// only ever receive [`GateRejection::client_code`] and [`GateRejection::client_message`].
#[derive(Debug, Clone, Error)]
pub enum GateRejection {
    #[error("Missing or invalid JSON body")]
    MissingBody,
    #[error("Missing '{0}' field")]
    MissingFields(&'static str),
    #[error("No machine id in request")]
    IdentityRequired,
    #[error("No device identity for machine {0}")]
    DeviceNotFound(i64),
    #[error("Machine {0} is revoked")]
    DeviceRevoked(i64),
    #[error("HMAC mismatch for machine {0}")]
    InvalidSignature(i64),
    #[error("{0}")]
    Timestamp(ReplayError),
    #[error("{0}")]
    Nonce(ReplayError),
    #[error("Session {0} not found, revoked or expired")]
    SessionInvalid(String),
    #[error("Internal security error: {0}")]
    Internal(String),
}

impl GateRejection {
    /// Stable error code for client-side debugging. Deliberately coarse.
    pub fn client_code(&self) -> &'static str {
        match self {
            GateRejection::MissingBody => "E001",
            GateRejection::MissingFields(_) => "E002",
            GateRejection::DeviceNotFound(_) => "E003",
            GateRejection::DeviceRevoked(_) => "E004",
            GateRejection::InvalidSignature(_) => "E005",
            GateRejection::Timestamp(_) => "E006",
            GateRejection::Nonce(_) => "E007",
            GateRejection::SessionInvalid(_) => "E008",
            GateRejection::IdentityRequired => "E009",
            GateRejection::Internal(_) => "E011",
        }
    }

    /// The generic message sent to the client. Never includes specifics.
    pub fn client_message(&self) -> &'static str {
        match self {
            GateRejection::MissingBody => "Invalid request",
            GateRejection::MissingFields(_) => "Invalid request format",
            GateRejection::DeviceNotFound(_) => "Device not registered",
            GateRejection::DeviceRevoked(_) => "Device access revoked",
            GateRejection::InvalidSignature(_) => "Authentication failed",
            GateRejection::Timestamp(_) => "Request expired",
            GateRejection::Nonce(_) => "Request rejected",
            GateRejection::SessionInvalid(_) => "Session invalid",
            GateRejection::IdentityRequired => "Authentication required",
            GateRejection::Internal(_) => "Internal security error",
        }
    }
}

// Fail closed: a registry failure is indistinguishable from an unauthorized request as far as
// the client is concerned.
impl From<DeviceAuthApiError> for GateRejection {
    fn from(e: DeviceAuthApiError) -> Self {
        GateRejection::Internal(e.to_string())
    }
}

/// Runs the full security pipeline over a raw request body.
///
/// Check order is fixed: body shape, device identity and revocation, timestamp, nonce, and only
/// then the HMAC, so that the expensive comparison never runs for requests that are already
/// dead. The optional session check comes last since it only applies to envelopes that carry a
/// `session_id`.
pub struct SecureRequestGate<B> {
    registry: B,
    guard: Arc<ReplayGuard>,
}

impl<B> Clone for SecureRequestGate<B>
where B: Clone
{
    fn clone(&self) -> Self {
        Self { registry: self.registry.clone(), guard: Arc::clone(&self.guard) }
    }
}

impl<B> SecureRequestGate<B>
where B: DeviceRegistry
{
    pub fn new(registry: B, config: ReplayConfig) -> Self {
        Self { registry, guard: Arc::new(ReplayGuard::new(config)) }
    }

    /// Validates the request and writes the outcome to the audit trail. `remote_ip` is recorded
    /// for the audit entry only; it takes no part in any decision.
    pub async fn authorize(
        &self,
        endpoint: &str,
        body: &[u8],
        header_machine_id: Option<i64>,
        remote_ip: Option<String>,
    ) -> Result<AuthorizedRequest, GateRejection> {
        let result = self.run_checks(body, header_machine_id).await;
        let entry = match &result {
            Ok(auth) => {
                info!("🛡️ Request authorized: machine={}, endpoint={endpoint}", auth.machine_id);
                NewAuditEntry::accepted(auth.machine_id, endpoint).with_remote_ip(remote_ip)
            },
            Err(rejection) => {
                warn!("🛡️ Security rejected [{}]: {rejection}", rejection.client_code());
                let machine_id = header_machine_id;
                NewAuditEntry::rejected(machine_id, endpoint, rejection.to_string()).with_remote_ip(remote_ip)
            },
        };
        if let Err(e) = self.registry.record_gate_event(entry).await {
            error!("🛡️ Failed to write audit log entry: {e}");
        }
        result
    }

    async fn run_checks(&self, body: &[u8], header_machine_id: Option<i64>) -> Result<AuthorizedRequest, GateRejection> {
        let envelope: SecureEnvelope = serde_json::from_slice(body).map_err(|_| GateRejection::MissingBody)?;
        let data = match envelope.data {
            Some(data) if !data.is_null() => data,
            _ => return Err(GateRejection::MissingFields("data")),
        };
        let signature = envelope.signature.ok_or(GateRejection::MissingFields("signature"))?;
        let machine_id = envelope.meta.machine_id.or(header_machine_id).ok_or(GateRejection::IdentityRequired)?;

        let device = self
            .registry
            .fetch_device(machine_id)
            .await?
            .ok_or(GateRejection::DeviceNotFound(machine_id))?;
        if !device.is_active() {
            return Err(GateRejection::DeviceRevoked(machine_id));
        }

        let timestamp = envelope.meta.timestamp.ok_or(GateRejection::MissingFields("meta.timestamp"))?;
        self.guard.check_timestamp(timestamp).map_err(GateRejection::Timestamp)?;

        let nonce = envelope.meta.nonce.ok_or(GateRejection::MissingFields("meta.nonce"))?;
        self.guard.check_and_store_nonce(machine_id, &nonce).map_err(GateRejection::Nonce)?;

        let payload = signing_payload(&data, timestamp, &nonce);
        if !verify_payload(&device.shared_secret, &payload, &signature) {
            return Err(GateRejection::InvalidSignature(machine_id));
        }

        let session_id = envelope.meta.session_id;
        if let Some(sid) = &session_id {
            let session = self
                .registry
                .fetch_session(machine_id, sid)
                .await?
                .ok_or_else(|| GateRejection::SessionInvalid(sid.clone()))?;
            if !session.is_valid_at(chrono::Utc::now()) {
                return Err(GateRejection::SessionInvalid(sid.clone()));
            }
        }

        Ok(AuthorizedRequest { machine_id, data, session_id })
    }
}
