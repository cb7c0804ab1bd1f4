//! Per-tenant invoice numbering.
//!
//! Each company owns one counter row in `invoice_sequences`. Reserving a
//! number upserts that row and returns the incremented value while holding
//! its row lock until the surrounding transaction ends, so two concurrent
//! invoices for the same company never see the same value, and a rolled-back
//! insert gives its number back.

use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use sqlx::PgConnection;
use std::collections::HashMap;

/// Format `INV-{company_id}-{sequence}` with the sequence zero-padded to four digits.
pub fn format_invoice_number(company_id: i64, sequence: i64) -> String {
    format!("INV-{}-{:04}", company_id, sequence)
}

/// Reserve the next sequence value for `company_id` inside the caller's transaction.
pub async fn reserve_invoice_sequence(
    conn: &mut PgConnection,
    company_id: i64,
) -> Result<i64, AppError> {
    let timer = DB_QUERY_DURATION
        .with_label_values(&["reserve_invoice_sequence"])
        .start_timer();

    let value = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO invoice_sequences (company_id, last_value)
        VALUES ($1, 1)
        ON CONFLICT (company_id)
        DO UPDATE SET last_value = invoice_sequences.last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(company_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        AppError::DatabaseError(anyhow::anyhow!(
            "Failed to reserve invoice sequence: {}",
            e
        ))
    })?;

    timer.observe_duration();
    Ok(value)
}

/// In-process counterpart of the `invoice_sequences` table. Callers must
/// hold the lock that guards the invoice insert.
#[derive(Debug, Default)]
pub struct TenantCounters {
    last_values: HashMap<i64, i64>,
}

impl TenantCounters {
    pub fn reserve(&mut self, company_id: i64) -> i64 {
        let value = self.last_values.entry(company_id).or_insert(0);
        *value += 1;
        *value
    }
}
