use sqlx::SqliteConnection;

use crate::db_types::Slot;

/// Decrements stock by one for the slot carrying `product_id` in the machine. When a machine has
/// several slots with the same product, the fullest one is drawn down first. Returns `None` if
/// every matching slot is empty.
pub async fn reduce_stock(
    machine_id: i64,
    product_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Slot>, sqlx::Error> {
    let slot = sqlx::query_as(
        r#"
            UPDATE slots
            SET stock = stock - 1, updated_at = CURRENT_TIMESTAMP
            WHERE id = (
                SELECT id FROM slots
                WHERE machine_id = $1 AND product_id = $2 AND stock > 0
                ORDER BY stock DESC, id ASC
                LIMIT 1
            )
            RETURNING *;
        "#,
    )
    .bind(machine_id)
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    Ok(slot)
}

pub async fn set_slot_stock(
    machine_id: i64,
    slot_code: &str,
    stock: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Slot>, sqlx::Error> {
    let slot = sqlx::query_as(
        r#"
            UPDATE slots
            SET stock = $1, updated_at = CURRENT_TIMESTAMP
            WHERE machine_id = $2 AND slot_code = $3
            RETURNING *;
        "#,
    )
    .bind(stock)
    .bind(machine_id)
    .bind(slot_code)
    .fetch_optional(conn)
    .await?;
    Ok(slot)
}

pub async fn fetch_slots(machine_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Slot>, sqlx::Error> {
    let slots = sqlx::query_as("SELECT * FROM slots WHERE machine_id = $1 ORDER BY slot_code ASC")
        .bind(machine_id)
        .fetch_all(conn)
        .await?;
    Ok(slots)
}

pub async fn upsert_slot(
    machine_id: i64,
    slot_code: &str,
    product_id: i64,
    stock: i64,
    conn: &mut SqliteConnection,
) -> Result<Slot, sqlx::Error> {
    let slot = sqlx::query_as(
        r#"
            INSERT INTO slots (machine_id, slot_code, product_id, stock)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (machine_id, slot_code) DO UPDATE
                SET product_id = excluded.product_id,
                    stock = excluded.stock,
                    updated_at = CURRENT_TIMESTAMP
            RETURNING *;
        "#,
    )
    .bind(machine_id)
    .bind(slot_code)
    .bind(product_id)
    .bind(stock)
    .fetch_one(conn)
    .await?;
    Ok(slot)
}
