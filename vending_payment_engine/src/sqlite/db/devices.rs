use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{DeviceIdentity, DeviceSession, DeviceStatus, NewDeviceIdentity},
    helpers::generate_nonce,
    traits::DeviceAuthApiError,
};

pub async fn fetch_device(
    machine_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<DeviceIdentity>, sqlx::Error> {
    let device = sqlx::query_as("SELECT * FROM device_identities WHERE machine_id = $1")
        .bind(machine_id)
        .fetch_optional(conn)
        .await?;
    Ok(device)
}

/// Creates the device identity, or rotates the secret of an existing one. Revoked devices are
/// refused: revocation is permanent from the machine's point of view and must be undone out of
/// band, if ever.
pub async fn upsert_device(
    device: NewDeviceIdentity,
    conn: &mut SqliteConnection,
) -> Result<DeviceIdentity, DeviceAuthApiError> {
    if let Some(existing) = fetch_device(device.machine_id, conn).await? {
        if existing.status == DeviceStatus::Revoked {
            return Err(DeviceAuthApiError::DeviceRevoked(device.machine_id));
        }
    }
    let stored: DeviceIdentity = sqlx::query_as(
        r#"
            INSERT INTO device_identities (machine_id, shared_secret, firmware_version, location)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (machine_id) DO UPDATE
                SET shared_secret = excluded.shared_secret,
                    firmware_version = excluded.firmware_version,
                    location = excluded.location,
                    updated_at = CURRENT_TIMESTAMP
            RETURNING *;
        "#,
    )
    .bind(device.machine_id)
    .bind(device.shared_secret)
    .bind(device.firmware_version)
    .bind(device.location)
    .fetch_one(conn)
    .await?;
    debug!("🗝️ Device identity stored for machine {}", stored.machine_id);
    Ok(stored)
}

pub async fn revoke_device(
    machine_id: i64,
    conn: &mut SqliteConnection,
) -> Result<DeviceIdentity, DeviceAuthApiError> {
    let device = sqlx::query_as(
        r#"
            UPDATE device_identities
            SET status = 'Revoked', revoked_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP
            WHERE machine_id = $1
            RETURNING *;
        "#,
    )
    .bind(machine_id)
    .fetch_optional(conn)
    .await?
    .ok_or(DeviceAuthApiError::DeviceNotFound(machine_id))?;
    Ok(device)
}

pub async fn fetch_session(
    machine_id: i64,
    session_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<DeviceSession>, sqlx::Error> {
    let session = sqlx::query_as("SELECT * FROM device_sessions WHERE machine_id = $1 AND session_id = $2")
        .bind(machine_id)
        .bind(session_id)
        .fetch_optional(conn)
        .await?;
    Ok(session)
}

/// Extends the machine's live session by `ttl_seconds` from now, or issues a new session if
/// there is no live one. The session id is a fresh random token on issue and never changes on
/// extension.
pub async fn touch_session(
    machine_id: i64,
    ttl_seconds: i64,
    conn: &mut SqliteConnection,
) -> Result<DeviceSession, DeviceAuthApiError> {
    let extended: Option<DeviceSession> = sqlx::query_as(
        r#"
            UPDATE device_sessions
            SET expires_at = datetime(CURRENT_TIMESTAMP, '+' || $1 || ' seconds'),
                updated_at = CURRENT_TIMESTAMP
            WHERE machine_id = $2 AND revoked = 0 AND expires_at > CURRENT_TIMESTAMP
            RETURNING *;
        "#,
    )
    .bind(ttl_seconds)
    .bind(machine_id)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(session) = extended {
        return Ok(session);
    }
    let session = sqlx::query_as(
        r#"
            INSERT INTO device_sessions (machine_id, session_id, expires_at)
            VALUES ($1, $2, datetime(CURRENT_TIMESTAMP, '+' || $3 || ' seconds'))
            RETURNING *;
        "#,
    )
    .bind(machine_id)
    .bind(generate_nonce(16))
    .bind(ttl_seconds)
    .fetch_one(conn)
    .await?;
    debug!("🗝️ New session issued for machine {machine_id}");
    Ok(session)
}
