use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use brewhouse_core::{
    Aggregate, AggregateRoot, BatchId, DomainError, Event, LocationId, RecipeId, StatusHistoryId,
    TankId, TenantId, TenantScoped, UserId,
};

/// Batch lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Planned,
    Brewing,
    Fermenting,
    Conditioning,
    Packaging,
    Finished,
    Cancelled,
}

impl BatchStatus {
    pub const ALL: [BatchStatus; 7] = [
        BatchStatus::Planned,
        BatchStatus::Brewing,
        BatchStatus::Fermenting,
        BatchStatus::Conditioning,
        BatchStatus::Packaging,
        BatchStatus::Finished,
        BatchStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Planned => "PLANNED",
            BatchStatus::Brewing => "BREWING",
            BatchStatus::Fermenting => "FERMENTING",
            BatchStatus::Conditioning => "CONDITIONING",
            BatchStatus::Packaging => "PACKAGING",
            BatchStatus::Finished => "FINISHED",
            BatchStatus::Cancelled => "CANCELLED",
        }
    }

    /// Statuses reachable in one step.
    pub fn allowed_transitions(self) -> &'static [BatchStatus] {
        match self {
            BatchStatus::Planned => &[BatchStatus::Brewing, BatchStatus::Cancelled],
            BatchStatus::Brewing => &[BatchStatus::Fermenting, BatchStatus::Cancelled],
            BatchStatus::Fermenting => &[BatchStatus::Conditioning, BatchStatus::Cancelled],
            BatchStatus::Conditioning => &[BatchStatus::Packaging, BatchStatus::Cancelled],
            BatchStatus::Packaging => &[BatchStatus::Finished, BatchStatus::Cancelled],
            BatchStatus::Finished | BatchStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: BatchStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// In production: past planning and not yet finished or cancelled.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            BatchStatus::Brewing | BatchStatus::Fermenting | BatchStatus::Conditioning | BatchStatus::Packaging
        )
    }
}

impl core::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown batch status: {s}")))
    }
}

/// `round((og - fg) * 131.25, 2)`, half away from zero.
pub fn compute_abv(og: Decimal, fg: Decimal) -> Decimal {
    ((og - fg) * Decimal::new(13125, 2)).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Aggregate root: Batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub tenant_id: TenantId,
    pub recipe_id: RecipeId,
    pub location_id: Option<LocationId>,
    pub tank_id: Option<TankId>,
    pub batch_number: String,
    pub status: BatchStatus,
    pub expected_volume: Decimal,
    pub actual_volume: Option<Decimal>,
    pub og: Option<Decimal>,
    pub fg: Option<Decimal>,
    pub abv: Option<Decimal>,
    pub brew_date: DateTime<Utc>,
    pub fermentation_start_date: Option<DateTime<Utc>>,
    pub packaged_date: Option<DateTime<Utc>>,
    pub finished_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

/// Command: PlanBatch.
///
/// Recipe, location and tank references are resolved by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanBatch {
    pub tenant_id: TenantId,
    pub batch_id: BatchId,
    pub recipe_id: RecipeId,
    pub location_id: Option<LocationId>,
    pub tank_id: Option<TankId>,
    pub expected_volume: Decimal,
    pub brew_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPatch {
    pub status: Option<BatchStatus>,
    pub actual_volume: Option<Decimal>,
    pub og: Option<Decimal>,
    pub fg: Option<Decimal>,
    /// Also annotates the status-history entry when the status changes.
    pub notes: Option<String>,
}

/// Command: UpdateBatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBatch {
    pub tenant_id: TenantId,
    pub batch_id: BatchId,
    pub changed_by: UserId,
    pub patch: BatchPatch,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BatchStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStatusChanged {
    pub tenant_id: TenantId,
    pub batch_id: BatchId,
    pub from: BatchStatus,
    pub to: BatchStatus,
    pub changed_by: UserId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BatchDetailsUpdated.
///
/// `abv` is set when the merged gravities are both known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDetailsUpdated {
    pub tenant_id: TenantId,
    pub batch_id: BatchId,
    pub actual_volume: Option<Decimal>,
    pub og: Option<Decimal>,
    pub fg: Option<Decimal>,
    pub abv: Option<Decimal>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchEvent {
    StatusChanged(BatchStatusChanged),
    DetailsUpdated(BatchDetailsUpdated),
}

impl Event for BatchEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BatchEvent::StatusChanged(_) => "production.batch.status_changed",
            BatchEvent::DetailsUpdated(_) => "production.batch.details_updated",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BatchEvent::StatusChanged(e) => e.occurred_at,
            BatchEvent::DetailsUpdated(e) => e.occurred_at,
        }
    }
}

/// Append-only audit record, one per status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStatusHistory {
    pub id: StatusHistoryId,
    pub tenant_id: TenantId,
    pub batch_id: BatchId,
    pub from_status: BatchStatus,
    pub to_status: BatchStatus,
    pub changed_by: UserId,
    pub notes: Option<String>,
    pub changed_at: DateTime<Utc>,
}

impl BatchStatusHistory {
    pub fn record(id: StatusHistoryId, event: &BatchStatusChanged) -> Self {
        Self {
            id,
            tenant_id: event.tenant_id,
            batch_id: event.batch_id,
            from_status: event.from,
            to_status: event.to,
            changed_by: event.changed_by,
            notes: event.notes.clone(),
            changed_at: event.occurred_at,
        }
    }
}

impl Batch {
    /// A new batch in `PLANNED`.
    pub fn plan(cmd: &PlanBatch, batch_number: impl Into<String>) -> Result<Self, DomainError> {
        if cmd.expected_volume <= Decimal::ZERO {
            return Err(DomainError::validation("expected volume must be positive"));
        }
        Ok(Self {
            id: cmd.batch_id,
            tenant_id: cmd.tenant_id,
            recipe_id: cmd.recipe_id,
            location_id: cmd.location_id,
            tank_id: cmd.tank_id,
            batch_number: batch_number.into(),
            status: BatchStatus::Planned,
            expected_volume: cmd.expected_volume,
            actual_volume: None,
            og: None,
            fg: None,
            abv: None,
            brew_date: cmd.brew_date,
            fermentation_start_date: None,
            packaged_date: None,
            finished_date: None,
            notes: cmd.notes.clone(),
            created_by: cmd.created_by,
            created_at: cmd.occurred_at,
            version: 0,
        })
    }

    /// Deletion keeps the ledger intact: only unstarted or cancelled batches
    /// that no movement points at may go.
    pub fn ensure_removable(&self, referenced_by_movements: bool) -> Result<(), DomainError> {
        if !matches!(self.status, BatchStatus::Planned | BatchStatus::Cancelled) {
            return Err(DomainError::conflict(format!(
                "cannot delete batch in status {}",
                self.status
            )));
        }
        if referenced_by_movements {
            return Err(DomainError::conflict("batch is referenced by stock movements"));
        }
        Ok(())
    }

    fn handle_update(&self, cmd: &UpdateBatch) -> Result<Vec<BatchEvent>, DomainError> {
        if cmd.tenant_id != self.tenant_id || cmd.batch_id != self.id {
            return Err(DomainError::not_found("Batch"));
        }

        let patch = &cmd.patch;
        for (field, value) in [("actual volume", patch.actual_volume), ("og", patch.og), ("fg", patch.fg)] {
            if value.is_some_and(|v| v <= Decimal::ZERO) {
                return Err(DomainError::validation(format!("{field} must be positive")));
            }
        }

        let mut events = Vec::new();

        // Self-transitions are not in the table either.
        if let Some(to) = patch.status {
            if !self.status.can_transition_to(to) {
                return Err(DomainError::invalid_transition(self.status, to));
            }
            events.push(BatchEvent::StatusChanged(BatchStatusChanged {
                tenant_id: cmd.tenant_id,
                batch_id: cmd.batch_id,
                from: self.status,
                to,
                changed_by: cmd.changed_by,
                notes: patch.notes.clone(),
                occurred_at: cmd.occurred_at,
            }));
        }

        let abv = match (patch.og.or(self.og), patch.fg.or(self.fg)) {
            (Some(og), Some(fg)) => Some(compute_abv(og, fg)),
            _ => None,
        };
        let details_changed = patch.actual_volume.is_some()
            || patch.og.is_some()
            || patch.fg.is_some()
            || patch.notes.is_some()
            || (abv.is_some() && abv != self.abv);

        if details_changed {
            events.push(BatchEvent::DetailsUpdated(BatchDetailsUpdated {
                tenant_id: cmd.tenant_id,
                batch_id: cmd.batch_id,
                actual_volume: patch.actual_volume,
                og: patch.og,
                fg: patch.fg,
                abv,
                notes: patch.notes.clone(),
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }
}

impl AggregateRoot for Batch {
    type Id = BatchId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl TenantScoped for Batch {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl Aggregate for Batch {
    type Command = UpdateBatch;
    type Event = BatchEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BatchEvent::StatusChanged(e) => {
                self.status = e.to;
                let stamp = match e.to {
                    BatchStatus::Fermenting => Some(&mut self.fermentation_start_date),
                    BatchStatus::Packaging => Some(&mut self.packaged_date),
                    BatchStatus::Finished => Some(&mut self.finished_date),
                    _ => None,
                };
                if let Some(slot) = stamp {
                    slot.get_or_insert(e.occurred_at);
                }
            }
            BatchEvent::DetailsUpdated(e) => {
                if let Some(v) = e.actual_volume {
                    self.actual_volume = Some(v);
                }
                if let Some(og) = e.og {
                    self.og = Some(og);
                }
                if let Some(fg) = e.fg {
                    self.fg = Some(fg);
                }
                if let Some(abv) = e.abv {
                    self.abv = Some(abv);
                }
                if let Some(notes) = &e.notes {
                    self.notes = Some(notes.clone());
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        self.handle_update(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn planned() -> Batch {
        let now = Utc::now();
        Batch::plan(
            &PlanBatch {
                tenant_id: TenantId::new(),
                batch_id: BatchId::new(),
                recipe_id: RecipeId::new(),
                location_id: None,
                tank_id: None,
                expected_volume: dec!(20),
                brew_date: now,
                notes: None,
                created_by: UserId::new(),
                occurred_at: now,
            },
            "BR-2025-001",
        )
        .unwrap()
    }

    fn update(batch: &Batch, patch: BatchPatch) -> UpdateBatch {
        UpdateBatch {
            tenant_id: batch.tenant_id,
            batch_id: batch.id,
            changed_by: UserId::new(),
            patch,
            occurred_at: Utc::now(),
        }
    }

    fn to_status(batch: &Batch, status: BatchStatus) -> UpdateBatch {
        update(
            batch,
            BatchPatch {
                status: Some(status),
                ..BatchPatch::default()
            },
        )
    }

    #[test]
    fn plan_starts_in_planned() {
        let batch = planned();
        assert_eq!(batch.status, BatchStatus::Planned);
        assert_eq!(batch.batch_number, "BR-2025-001");
        assert_eq!(batch.version, 0);
    }

    #[test]
    fn plan_rejects_non_positive_volume() {
        let now = Utc::now();
        let err = Batch::plan(
            &PlanBatch {
                tenant_id: TenantId::new(),
                batch_id: BatchId::new(),
                recipe_id: RecipeId::new(),
                location_id: None,
                tank_id: None,
                expected_volume: dec!(0),
                brew_date: now,
                notes: None,
                created_by: UserId::new(),
                occurred_at: now,
            },
            "BR-2025-001",
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn planned_cannot_skip_to_fermenting() {
        let batch = planned();
        let err = batch.handle(&to_status(&batch, BatchStatus::Fermenting)).unwrap_err();
        assert_eq!(err, DomainError::invalid_transition("PLANNED", "FERMENTING"));
    }

    #[test]
    fn fermentation_start_is_set_once() {
        let mut batch = planned();
        batch.execute(&to_status(&batch, BatchStatus::Brewing)).unwrap();

        let cmd = to_status(&batch, BatchStatus::Fermenting);
        let events = batch.execute(&cmd).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(batch.status, BatchStatus::Fermenting);
        assert_eq!(batch.fermentation_start_date, Some(cmd.occurred_at));

        let mut again = to_status(&batch, BatchStatus::Fermenting);
        again.occurred_at = cmd.occurred_at + Duration::hours(1);
        let err = batch.execute(&again).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
        assert_eq!(batch.fermentation_start_date, Some(cmd.occurred_at));
    }

    #[test]
    fn full_lifecycle_stamps_dates() {
        let mut batch = planned();
        for status in [
            BatchStatus::Brewing,
            BatchStatus::Fermenting,
            BatchStatus::Conditioning,
            BatchStatus::Packaging,
            BatchStatus::Finished,
        ] {
            batch.execute(&to_status(&batch, status)).unwrap();
        }
        assert_eq!(batch.status, BatchStatus::Finished);
        assert!(batch.fermentation_start_date.is_some());
        assert!(batch.packaged_date.is_some());
        assert!(batch.finished_date.is_some());
        assert_eq!(batch.version, 5);
    }

    #[test]
    fn cancel_from_any_non_terminal_state() {
        let mut batch = planned();
        batch.execute(&to_status(&batch, BatchStatus::Brewing)).unwrap();
        batch.execute(&to_status(&batch, BatchStatus::Cancelled)).unwrap();
        assert!(batch.status.is_terminal());

        let err = batch.handle(&to_status(&batch, BatchStatus::Brewing)).unwrap_err();
        assert_eq!(err, DomainError::invalid_transition("CANCELLED", "BREWING"));
    }

    #[test]
    fn abv_is_computed_from_merged_gravities() {
        assert_eq!(compute_abv(dec!(1.055), dec!(1.012)), dec!(5.64));

        let mut batch = planned();
        batch
            .execute(&update(
                &batch,
                BatchPatch {
                    og: Some(dec!(1.055)),
                    ..BatchPatch::default()
                },
            ))
            .unwrap();
        assert_eq!(batch.abv, None);

        batch
            .execute(&update(
                &batch,
                BatchPatch {
                    fg: Some(dec!(1.012)),
                    ..BatchPatch::default()
                },
            ))
            .unwrap();
        assert_eq!(batch.og, Some(dec!(1.055)));
        assert_eq!(batch.abv, Some(dec!(5.64)));
    }

    #[test]
    fn status_change_carries_patch_notes_into_history() {
        let mut batch = planned();
        let cmd = update(
            &batch,
            BatchPatch {
                status: Some(BatchStatus::Brewing),
                notes: Some("mash in at 67C".to_string()),
                ..BatchPatch::default()
            },
        );
        let events = batch.execute(&cmd).unwrap();
        assert_eq!(events.len(), 2);

        let BatchEvent::StatusChanged(changed) = &events[0] else {
            panic!("expected StatusChanged first");
        };
        let history = BatchStatusHistory::record(StatusHistoryId::new(), changed);
        assert_eq!(history.from_status, BatchStatus::Planned);
        assert_eq!(history.to_status, BatchStatus::Brewing);
        assert_eq!(history.changed_by, cmd.changed_by);
        assert_eq!(history.notes.as_deref(), Some("mash in at 67C"));
        assert_eq!(batch.notes.as_deref(), Some("mash in at 67C"));
    }

    #[test]
    fn empty_patch_emits_nothing() {
        let batch = planned();
        let events = batch.handle(&update(&batch, BatchPatch::default())).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn foreign_tenant_update_is_not_found() {
        let batch = planned();
        let mut cmd = to_status(&batch, BatchStatus::Brewing);
        cmd.tenant_id = TenantId::new();
        let err = batch.handle(&cmd).unwrap_err();
        assert_eq!(err, DomainError::not_found("Batch"));
    }

    #[test]
    fn only_planned_or_cancelled_unreferenced_batches_are_removable() {
        let mut batch = planned();
        assert!(batch.ensure_removable(false).is_ok());
        assert!(matches!(batch.ensure_removable(true), Err(DomainError::Conflict(_))));

        batch.execute(&to_status(&batch, BatchStatus::Brewing)).unwrap();
        assert!(matches!(batch.ensure_removable(false), Err(DomainError::Conflict(_))));

        batch.execute(&to_status(&batch, BatchStatus::Cancelled)).unwrap();
        assert!(batch.ensure_removable(false).is_ok());
    }

    #[test]
    fn status_round_trips_through_its_name() {
        for status in BatchStatus::ALL {
            assert_eq!(status.as_str().parse::<BatchStatus>().unwrap(), status);
        }
        assert!("BOTTLED".parse::<BatchStatus>().is_err());
    }

    proptest! {
        #[test]
        fn walks_never_leave_a_terminal_state(steps in prop::collection::vec(0usize..7, 1..20)) {
            let mut batch = planned();
            for step in steps {
                let target = BatchStatus::ALL[step];
                let before = batch.status;
                match batch.execute(&to_status(&batch, target)) {
                    Ok(_) => prop_assert!(before.can_transition_to(target)),
                    Err(_) => prop_assert_eq!(batch.status, before),
                }
                if before.is_terminal() {
                    prop_assert_eq!(batch.status, before);
                }
            }
        }
    }
}
