use log::debug;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, NewPaymentTransaction, Order, OrderCode, OrderStatusType},
    traits::PaymentGatewayError,
};

/// Inserts the order into the database, returning `false` in the second parameter if an order
/// with the same order code already exists.
///
/// Two concurrent submissions of a brand-new code can both pass the initial lookup; the unique
/// constraint on `order_code` then rejects the loser, which re-fetches the winner's row instead
/// of surfacing the constraint violation.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), PaymentGatewayError> {
    let code = order.order_code;
    if let Some(existing) = fetch_order_by_code(&code, conn).await? {
        return Ok((existing, false));
    }
    match insert_order(order, conn).await {
        Ok(order) => {
            debug!("📝️ Order [{}] inserted with id {}", order.order_code, order.id);
            Ok((order, true))
        },
        Err(e) if e.as_database_error().is_some_and(|db| db.is_unique_violation()) => {
            let order = fetch_order_by_code(&code, conn).await?.ok_or(PaymentGatewayError::OrderNotFound(code))?;
            Ok((order, false))
        },
        Err(e) => Err(e.into()),
    }
}

/// Inserts a new order using the given connection. This is not atomic on its own. You can embed
/// this call inside a transaction if you need atomicity, and pass `&mut *tx` as the connection
/// argument.
async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_code,
                machine_id,
                product_id,
                amount,
                payment_url,
                qr_code
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(order.order_code)
    .bind(order.machine_id)
    .bind(order.product_id)
    .bind(order.amount)
    .bind(order.payment_url)
    .bind(order.qr_code)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_order_by_code(code: &OrderCode, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_code = $1").bind(code).fetch_optional(conn).await?;
    Ok(order)
}

/// All orders for the machine in the given status, oldest first.
pub async fn fetch_orders_in_status(
    machine_id: i64,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders =
        sqlx::query_as("SELECT * FROM orders WHERE machine_id = $1 AND status = $2 ORDER BY created_at ASC, id ASC")
            .bind(machine_id)
            .bind(status.to_string())
            .fetch_all(conn)
            .await?;
    Ok(orders)
}

/// Moves the order onto `target` if its current status is one of the states `target` may be
/// entered from. The guard and the update are a single statement, so exactly one of any number
/// of concurrent callers gets the row back; the others get `None`.
pub async fn advance_order_status(
    code: &OrderCode,
    target: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let mut builder =
        QueryBuilder::new("UPDATE orders SET updated_at = CURRENT_TIMESTAMP, status = ");
    builder.push_bind(target.to_string());
    builder.push(" WHERE order_code = ");
    builder.push_bind(code);
    builder.push(" AND status IN (");
    let mut statuses = builder.separated(", ");
    for from in target.entered_from() {
        statuses.push_bind(from.to_string());
    }
    builder.push(") RETURNING *");
    let order = builder.build_query_as::<Order>().fetch_optional(conn).await?;
    Ok(order)
}

/// Claims the stock decrement for this order. The flag only ever goes from 0 to 1, so exactly
/// one caller over the lifetime of the order sees `true`.
pub async fn try_mark_stock_adjusted(code: &OrderCode, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE orders SET stock_adjusted = 1 WHERE order_code = $1 AND stock_adjusted = 0")
        .bind(code)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Records a settled gateway payment. The unique constraint on `order_code` absorbs duplicate
/// webhook deliveries; the second delivery simply inserts nothing.
pub async fn insert_payment_transaction(
    tx: NewPaymentTransaction,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            INSERT INTO payment_transactions (order_code, amount, source, reference)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (order_code) DO NOTHING;
        "#,
    )
    .bind(tx.order_code)
    .bind(tx.amount)
    .bind(tx.source.to_string())
    .bind(tx.reference)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
