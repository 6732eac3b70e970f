//! Staging: the durable handoff between pipeline stages.

mod audit;

pub use audit::{
    AUDIT_COLUMNS, AuditStamper, EXTRACT_DT, PROC_STATUS, SOURCE, Stage, StagedFile, staged_file_name,
    staged_path, write_staged,
};
