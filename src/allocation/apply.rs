use chrono::NaiveDateTime;
use sqlx::MySqlConnection;

/// Sets `assigned_guard_id` on a shift if it is still open. The row is
/// locked first, so a concurrent run cannot give the same shift a second
/// guard. Returns false when the shift is gone or already taken.
pub async fn claim_shift(
    conn: &mut MySqlConnection,
    shift_id: u64,
    guard_id: u64,
    at: NaiveDateTime,
) -> Result<bool, sqlx::Error> {
    let current = sqlx::query_scalar::<_, Option<u64>>(
        "SELECT assigned_guard_id FROM shifts WHERE id = ? FOR UPDATE",
    )
    .bind(shift_id)
    .fetch_optional(&mut *conn)
    .await?;

    match current {
        Some(None) => {}
        Some(Some(holder)) => {
            tracing::debug!(shift_id, holder, "Shift already taken, skipping");
            return Ok(false);
        }
        None => return Ok(false),
    }

    sqlx::query(
        "UPDATE shifts SET assigned_guard_id = ?, assigned_at = ? WHERE id = ? AND assigned_guard_id IS NULL",
    )
    .bind(guard_id)
    .bind(at)
    .bind(shift_id)
    .execute(&mut *conn)
    .await
    .map(|r| r.rows_affected() == 1)
}
