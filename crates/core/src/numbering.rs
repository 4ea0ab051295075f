//! Human-readable document numbers (`BR-2025-007`, `PO-2025-0042`).
//!
//! Numbers are scoped by tenant and calendar year: the year is part of the
//! prefix, so the sequence restarts at 1 every January. Allocation (finding the
//! highest existing sequence under a lock) lives in the store layer; this module
//! only owns the format.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Kinds of sequentially numbered documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentKind {
    Batch,
    PurchaseOrder,
}

impl DocumentKind {
    pub fn prefix(self) -> &'static str {
        match self {
            DocumentKind::Batch => "BR",
            DocumentKind::PurchaseOrder => "PO",
        }
    }

    /// Minimum zero-padded width of the sequence part.
    pub fn width(self) -> usize {
        match self {
            DocumentKind::Batch => 3,
            DocumentKind::PurchaseOrder => 4,
        }
    }

    /// Prefix shared by every number of this kind in `year`, e.g. `BR-2025-`.
    pub fn year_prefix(self, year: i32) -> String {
        format!("{}-{}-", self.prefix(), year)
    }
}

/// A parsed document number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentNumber {
    pub kind: DocumentKind,
    pub year: i32,
    pub sequence: u32,
}

impl DocumentNumber {
    pub fn new(kind: DocumentKind, year: i32, sequence: u32) -> Self {
        Self { kind, year, sequence }
    }

    /// Successor of the highest sequence already issued for `kind` in `year`.
    ///
    /// Fails with `Conflict` once the sequence space for the year is used up.
    pub fn next_after(kind: DocumentKind, year: i32, highest: Option<u32>) -> Result<Self, DomainError> {
        let sequence = match highest {
            None => 1,
            Some(h) => h.checked_add(1).ok_or_else(|| {
                DomainError::conflict(format!("{} numbers exhausted for {year}", kind.prefix()))
            })?,
        };
        Ok(Self::new(kind, year, sequence))
    }

    /// Parse a number of the given kind; `None` for anything malformed.
    ///
    /// Sequences wider than the padding (`BR-2025-1000`) are accepted.
    pub fn parse(kind: DocumentKind, s: &str) -> Option<Self> {
        let mut parts = s.splitn(3, '-');
        if parts.next()? != kind.prefix() {
            return None;
        }
        let year = parts.next()?;
        let sequence = parts.next()?;
        if year.is_empty() || !year.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if sequence.is_empty() || !sequence.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self::new(kind, year.parse().ok()?, sequence.parse().ok()?))
    }

    /// Highest sequence among `numbers` that belong to `kind` and `year`.
    pub fn highest_sequence<'a>(
        kind: DocumentKind,
        year: i32,
        numbers: impl IntoIterator<Item = &'a str>,
    ) -> Option<u32> {
        numbers
            .into_iter()
            .filter_map(|n| Self::parse(kind, n))
            .filter(|n| n.year == year)
            .map(|n| n.sequence)
            .max()
    }
}

impl core::fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}{:0width$}",
            self.kind.year_prefix(self.year),
            self.sequence,
            width = self.kind.width()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn formats_with_kind_specific_padding() {
        assert_eq!(DocumentNumber::new(DocumentKind::Batch, 2025, 7).to_string(), "BR-2025-007");
        assert_eq!(
            DocumentNumber::new(DocumentKind::PurchaseOrder, 2025, 42).to_string(),
            "PO-2025-0042"
        );
        assert_eq!(DocumentNumber::new(DocumentKind::Batch, 2025, 1000).to_string(), "BR-2025-1000");
    }

    #[test]
    fn first_number_of_the_year_starts_at_one() {
        let n = DocumentNumber::next_after(DocumentKind::Batch, 2026, None).unwrap();
        assert_eq!(n.to_string(), "BR-2026-001");
    }

    #[test]
    fn exhausted_sequence_is_a_conflict() {
        let err = DocumentNumber::next_after(DocumentKind::PurchaseOrder, 2025, Some(u32::MAX)).unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
        let last = DocumentNumber::next_after(DocumentKind::PurchaseOrder, 2025, Some(u32::MAX - 1)).unwrap();
        assert_eq!(last.sequence, u32::MAX);
    }

    #[test]
    fn highest_sequence_is_numeric_not_lexicographic() {
        let issued = ["BR-2025-999", "BR-2025-1000", "BR-2024-5000", "PO-2025-2000", "garbage"];
        assert_eq!(
            DocumentNumber::highest_sequence(DocumentKind::Batch, 2025, issued),
            Some(1000)
        );
        assert_eq!(DocumentNumber::highest_sequence(DocumentKind::Batch, 2023, issued), None);
    }

    #[test]
    fn kind_uses_screaming_snake_case_on_the_wire() {
        let json = serde_json::to_string(&DocumentKind::PurchaseOrder).unwrap();
        assert_eq!(json, "\"PURCHASE_ORDER\"");
        let back: DocumentKind = serde_json::from_str("\"BATCH\"").unwrap();
        assert_eq!(back, DocumentKind::Batch);
    }

    #[test]
    fn parse_rejects_other_kinds_and_junk() {
        assert!(DocumentNumber::parse(DocumentKind::Batch, "PO-2025-001").is_none());
        assert!(DocumentNumber::parse(DocumentKind::Batch, "BR-2025-").is_none());
        assert!(DocumentNumber::parse(DocumentKind::Batch, "BR-20x5-001").is_none());
        assert!(DocumentNumber::parse(DocumentKind::Batch, "BR-2025-00a").is_none());
    }

    proptest! {
        /// Property: every formatted number parses back to the same parts.
        #[test]
        fn formatted_numbers_parse_back(year in 2000i32..2100, sequence in 1u32..100_000) {
            for kind in [DocumentKind::Batch, DocumentKind::PurchaseOrder] {
                let number = DocumentNumber::new(kind, year, sequence);
                prop_assert_eq!(DocumentNumber::parse(kind, &number.to_string()), Some(number));
            }
        }

        /// Property: the next number is strictly greater than everything issued.
        #[test]
        fn next_number_exceeds_all_issued(sequences in prop::collection::vec(1u32..5_000, 0..20)) {
            let issued: Vec<String> = sequences
                .iter()
                .map(|s| DocumentNumber::new(DocumentKind::PurchaseOrder, 2025, *s).to_string())
                .collect();
            let highest = DocumentNumber::highest_sequence(
                DocumentKind::PurchaseOrder,
                2025,
                issued.iter().map(String::as_str),
            );
            let next = DocumentNumber::next_after(DocumentKind::PurchaseOrder, 2025, highest).unwrap();
            prop_assert!(sequences.iter().all(|s| next.sequence > *s));
        }
    }
}
