pub mod business;
pub mod job;
pub mod job_sheet;
pub mod master;
pub mod staging;

pub use business::CaseDetailRow;
pub use job::JobRow;
pub use job_sheet::JobSheetRow;
pub use master::{
    BoxRow, DocTypeRow, LocationRow, RetentionPeriodRow, StatusPartition, StatusRow, UnitRow,
    WarehouseRow,
};
pub use staging::{StagingErrorRow, StagingRawRow, StagingValidRow};
