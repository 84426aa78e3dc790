use thiserror::Error;

use crate::db_types::{DeviceIdentity, DeviceSession, NewAuditEntry, NewDeviceIdentity};

/// Storage for device identities, sessions and the IoT audit trail.
///
/// Revocation must take effect on the very next lookup: there is no caching layer between this
/// trait and the security gate.
#[allow(async_fn_in_trait)]
pub trait DeviceRegistry: Clone {
    /// Fetches the identity record for the given machine, if it has been provisioned.
    async fn fetch_device(&self, machine_id: i64) -> Result<Option<DeviceIdentity>, DeviceAuthApiError>;

    /// Creates or updates a device identity. Re-provisioning a revoked device is refused; it must
    /// be dealt with out of band.
    async fn upsert_device(&self, device: NewDeviceIdentity) -> Result<DeviceIdentity, DeviceAuthApiError>;

    /// Marks the device as revoked. Returns the updated record.
    async fn revoke_device(&self, machine_id: i64) -> Result<DeviceIdentity, DeviceAuthApiError>;

    /// Fetches the session with the given id for the machine, regardless of validity.
    async fn fetch_session(&self, machine_id: i64, session_id: &str)
        -> Result<Option<DeviceSession>, DeviceAuthApiError>;

    /// Extends the machine's current session by `ttl_seconds`, creating one if none is live.
    async fn touch_session(&self, machine_id: i64, ttl_seconds: i64) -> Result<DeviceSession, DeviceAuthApiError>;

    /// Appends an entry to the IoT audit trail.
    async fn record_gate_event(&self, entry: NewAuditEntry) -> Result<(), DeviceAuthApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum DeviceAuthApiError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("Machine {0} is not provisioned")]
    DeviceNotFound(i64),
    #[error("Machine {0} has been revoked")]
    DeviceRevoked(i64),
    #[error("Session not found or no longer valid")]
    SessionNotFound,
}

impl From<sqlx::Error> for DeviceAuthApiError {
    fn from(e: sqlx::Error) -> Self {
        DeviceAuthApiError::DatabaseError(e.to_string())
    }
}
