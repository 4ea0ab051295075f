use chrono::{DateTime, Utc};

/// A domain event.
///
/// Events are immutable facts. Some of them are persisted verbatim as audit
/// records (stock movements, batch status history).
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name (e.g. "inventory.stock.in").
    fn event_type(&self) -> &'static str;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
