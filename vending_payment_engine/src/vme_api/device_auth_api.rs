use log::*;

use crate::{
    db_types::{DeviceIdentity, DeviceSession, NewDeviceIdentity},
    helpers::generate_nonce,
    traits::{DeviceAuthApiError, DeviceRegistry},
};

/// Sessions last an hour unless the machine heartbeats sooner.
pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 3600;

/// Provisioning and session management for machine identities.
///
/// This API is for the *staff* side of device security. Request verification itself lives in
/// [`crate::security::SecureRequestGate`], which talks to the registry directly.
pub struct DeviceAuthApi<B> {
    db: B,
}

impl<B> DeviceAuthApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> DeviceAuthApi<B>
where B: DeviceRegistry
{
    /// Provisions a device, or rotates the secret of an existing active one. The shared secret is
    /// generated server-side and returned exactly once, inside the result; it is never logged.
    pub async fn register_device(
        &self,
        machine_id: i64,
        firmware_version: Option<String>,
        location: Option<String>,
    ) -> Result<DeviceIdentity, DeviceAuthApiError> {
        let device = NewDeviceIdentity {
            machine_id,
            shared_secret: generate_nonce(32),
            firmware_version,
            location,
        };
        let stored = self.db.upsert_device(device).await?;
        info!("🔑️ Device identity provisioned for machine {machine_id}");
        Ok(stored)
    }

    /// Revokes the device. Takes effect on the machine's very next request.
    pub async fn revoke_device(&self, machine_id: i64) -> Result<DeviceIdentity, DeviceAuthApiError> {
        let device = self.db.revoke_device(machine_id).await?;
        warn!("🔑️ Device identity for machine {machine_id} has been REVOKED");
        Ok(device)
    }

    /// Handles a machine heartbeat: extends the live session, or issues a fresh one.
    pub async fn heartbeat(&self, machine_id: i64) -> Result<DeviceSession, DeviceAuthApiError> {
        let session = self.db.touch_session(machine_id, DEFAULT_SESSION_TTL_SECONDS).await?;
        trace!("🔑️ Session for machine {machine_id} extended to {}", session.expires_at);
        Ok(session)
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
