//! Applier service (C11, spec §4.10). Runs the three idempotent phases
//! (independent masters, dependent masters, business rows) in order inside
//! one transaction.

use xlm_db::ApplierRepository;

use crate::error::PipelineResult;

pub struct ApplyOutcome {
    pub warehouses_inserted: u64,
    pub units_inserted: u64,
    pub doc_types_inserted: u64,
    pub statuses_inserted: u64,
    pub retention_periods_inserted: u64,
    pub locations_inserted: u64,
    pub boxes_inserted: u64,
    pub case_details_inserted: u64,
}

impl ApplyOutcome {
    /// Used when a job is short-circuited with zero valid rows (spec §4.8) —
    /// Apply never runs, so every counter is trivially zero.
    pub fn empty() -> Self {
        Self {
            warehouses_inserted: 0,
            units_inserted: 0,
            doc_types_inserted: 0,
            statuses_inserted: 0,
            retention_periods_inserted: 0,
            locations_inserted: 0,
            boxes_inserted: 0,
            case_details_inserted: 0,
        }
    }

    pub fn total_rows_inserted(&self) -> u64 {
        self.warehouses_inserted
            + self.units_inserted
            + self.doc_types_inserted
            + self.statuses_inserted
            + self.retention_periods_inserted
            + self.locations_inserted
            + self.boxes_inserted
            + self.case_details_inserted
    }
}

#[derive(Clone)]
pub struct ApplyService {
    applier: ApplierRepository,
}

/// `(partition, source field)` pairs the status master is derived from
/// (spec §4.10 P1: three type-partitions).
const STATUS_SOURCES: &[(&str, &str)] = &[
    ("CASE_PDM", "case_pdm_status"),
    ("BOX_STATUS", "box_status"),
    ("BOX_STATE", "box_state"),
];

impl ApplyService {
    pub fn new(applier: ApplierRepository) -> Self {
        Self { applier }
    }

    /// P1 (independent masters) must fully commit before P2 (dependent
    /// masters) runs, which must commit before P3 (business rows) runs — P2
    /// joins against P1's rows and P3 joins against both (spec §4.10).
    pub async fn apply(&self, job_id: &str) -> PipelineResult<ApplyOutcome> {
        let mut tx = self.applier.begin().await?;

        // P1: independent masters.
        let warehouses_inserted = self.applier.apply_warehouses(&mut tx, job_id).await?;
        let units_inserted = self.applier.apply_units(&mut tx, job_id).await?;
        let doc_types_inserted = self.applier.apply_doc_types(&mut tx, job_id).await?;
        let mut statuses_inserted = 0u64;
        for (partition, field) in STATUS_SOURCES {
            statuses_inserted += self.applier.apply_statuses(&mut tx, job_id, partition, field).await?;
        }
        let retention_periods_inserted = self.applier.apply_retention_periods(&mut tx, job_id).await?;

        // P2: dependent masters.
        let locations_inserted = self.applier.apply_locations(&mut tx, job_id).await?;
        let boxes_inserted = self.applier.apply_boxes(&mut tx, job_id).await?;

        // P3: business rows.
        let case_details_inserted = self.applier.apply_case_details(&mut tx, job_id).await?;

        tx.commit().await.map_err(xlm_db::DbError::from)?;

        Ok(ApplyOutcome {
            warehouses_inserted,
            units_inserted,
            doc_types_inserted,
            statuses_inserted,
            retention_periods_inserted,
            locations_inserted,
            boxes_inserted,
            case_details_inserted,
        })
    }
}
