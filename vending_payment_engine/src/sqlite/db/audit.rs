use sqlx::SqliteConnection;

use crate::db_types::NewAuditEntry;

pub async fn insert_entry(entry: NewAuditEntry, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO iot_audit_log (machine_id, endpoint, outcome, detail, remote_ip)
            VALUES ($1, $2, $3, $4, $5);
        "#,
    )
    .bind(entry.machine_id)
    .bind(entry.endpoint)
    .bind(entry.outcome)
    .bind(entry.detail)
    .bind(entry.remote_ip)
    .execute(conn)
    .await?;
    Ok(())
}
