//! Document number allocation.
//!
//! `next_number` must run inside the transaction that inserts the numbered
//! document: the sequence lock is held until that transaction ends, so two
//! creators for the same tenant and year never read the same maximum.

use tracing::debug;

use brewhouse_core::{DocumentKind, DocumentNumber, TenantId};

use crate::error::ServiceResult;
use crate::store::StoreTx;

/// Allocate the next `kind` number for `tenant_id` in `year`.
pub async fn next_number<T: StoreTx>(
    tx: &mut T,
    tenant_id: TenantId,
    kind: DocumentKind,
    year: i32,
) -> ServiceResult<DocumentNumber> {
    tx.lock_sequence(tenant_id, kind, year).await?;
    let issued = tx.document_numbers(tenant_id, kind, year).await?;
    let highest = DocumentNumber::highest_sequence(kind, year, issued.iter().map(String::as_str));
    let next = DocumentNumber::next_after(kind, year, highest)?;
    debug!(tenant_id = %tenant_id, number = %next, "allocated document number");
    Ok(next)
}
