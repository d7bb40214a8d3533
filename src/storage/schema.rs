//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Ledger postings.
#[derive(Iden)]
pub enum ProfitDetail {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "ssn"]
    Ssn,
    #[iden = "profit_year"]
    ProfitYear,
    #[iden = "profit_year_iteration"]
    ProfitYearIteration,
    #[iden = "profit_code_id"]
    ProfitCodeId,
    #[iden = "distribution_sequence"]
    DistributionSequence,
    #[iden = "contribution"]
    Contribution,
    #[iden = "earnings"]
    Earnings,
    #[iden = "forfeiture"]
    Forfeiture,
    #[iden = "federal_taxes"]
    FederalTaxes,
    #[iden = "state_taxes"]
    StateTaxes,
    #[iden = "month_to_date"]
    MonthToDate,
    #[iden = "year_to_date"]
    YearToDate,
    #[iden = "remark"]
    Remark,
    #[iden = "zero_contribution_reason_id"]
    ZeroContributionReasonId,
    #[iden = "tax_code_id"]
    TaxCodeId,
    #[iden = "years_of_service_credit"]
    YearsOfServiceCredit,
    #[iden = "reversed_from_profit_detail_id"]
    ReversedFromProfitDetailId,
    #[iden = "reversal_reason"]
    ReversalReason,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "user_name"]
    UserName,
}

#[derive(Iden)]
pub enum CheckRunWorkflow {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "profit_year"]
    ProfitYear,
    #[iden = "check_run_date"]
    CheckRunDate,
    #[iden = "step_number"]
    StepNumber,
    #[iden = "step_status"]
    StepStatus,
    #[iden = "check_number"]
    CheckNumber,
    #[iden = "reprint_count"]
    ReprintCount,
    #[iden = "max_reprint_count"]
    MaxReprintCount,
    #[iden = "version"]
    Version,
    #[iden = "failure_reason"]
    FailureReason,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "created_by"]
    CreatedBy,
    #[iden = "modified_at"]
    ModifiedAt,
    #[iden = "modified_by"]
    ModifiedBy,
}

#[derive(Iden)]
pub enum CheckRunPayee {
    Table,
    #[iden = "check_run_workflow_id"]
    CheckRunWorkflowId,
    #[iden = "line_number"]
    LineNumber,
    #[iden = "ssn"]
    Ssn,
    #[iden = "demographic_id"]
    DemographicId,
    #[iden = "payable_name"]
    PayableName,
    #[iden = "amount"]
    Amount,
    #[iden = "tax_code_id"]
    TaxCodeId,
    #[iden = "payment_sequence"]
    PaymentSequence,
}

#[derive(Iden)]
pub enum ProfitShareCheck {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "check_number"]
    CheckNumber,
    #[iden = "psc_check_id"]
    PscCheckId,
    #[iden = "check_run_workflow_id"]
    CheckRunWorkflowId,
    #[iden = "ssn"]
    Ssn,
    #[iden = "demographic_id"]
    DemographicId,
    #[iden = "payable_name"]
    PayableName,
    #[iden = "check_amount"]
    CheckAmount,
    #[iden = "tax_code_id"]
    TaxCodeId,
    #[iden = "check_date"]
    CheckDate,
    #[iden = "check_run_date"]
    CheckRunDate,
    #[iden = "void_flag"]
    VoidFlag,
    #[iden = "void_check_date"]
    VoidCheckDate,
    #[iden = "void_recon_date"]
    VoidReconDate,
    #[iden = "clear_date"]
    ClearDate,
    #[iden = "clear_date_loaded"]
    ClearDateLoaded,
    #[iden = "manual_check"]
    ManualCheck,
    #[iden = "replace_check"]
    ReplaceCheck,
    #[iden = "other_beneficiary"]
    OtherBeneficiary,
    #[iden = "user_name"]
    UserName,
}

#[derive(Iden)]
pub enum FileTransferAudit {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "timestamp"]
    Timestamp,
    #[iden = "check_run_workflow_id"]
    CheckRunWorkflowId,
    #[iden = "file_name"]
    FileName,
    #[iden = "destination"]
    Destination,
    #[iden = "file_size"]
    FileSize,
    #[iden = "transfer_duration_ms"]
    TransferDurationMs,
    #[iden = "is_success"]
    IsSuccess,
    #[iden = "error_message"]
    ErrorMessage,
    #[iden = "user_name"]
    UserName,
    #[iden = "payload"]
    Payload,
    #[iden = "payload_digest"]
    PayloadDigest,
}

#[derive(Iden)]
pub enum FtpOperationLog {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "check_run_workflow_id"]
    CheckRunWorkflowId,
    #[iden = "operation_type"]
    OperationType,
    #[iden = "file_name"]
    FileName,
    #[iden = "destination"]
    Destination,
    #[iden = "is_success"]
    IsSuccess,
    #[iden = "error_message"]
    ErrorMessage,
    #[iden = "duration_ms"]
    DurationMs,
    #[iden = "timestamp"]
    Timestamp,
    #[iden = "user_name"]
    UserName,
}

#[derive(Iden)]
pub enum AuditEvent {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "table_name"]
    TableName,
    #[iden = "operation"]
    Operation,
    #[iden = "primary_key"]
    PrimaryKey,
    #[iden = "user_name"]
    UserName,
    #[iden = "changes_json"]
    ChangesJson,
    #[iden = "changes_hash"]
    ChangesHash,
    #[iden = "created_at"]
    CreatedAt,
}

#[derive(Iden)]
pub enum SequenceCounter {
    Table,
    #[iden = "name"]
    Name,
    #[iden = "next_value"]
    NextValue,
}

/// Ledger postings. The posting key and the reversal reference are unique.
pub const CREATE_PROFIT_DETAIL_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS profit_detail (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ssn INTEGER NOT NULL,
    profit_year INTEGER NOT NULL,
    profit_year_iteration INTEGER NOT NULL DEFAULT 0,
    profit_code_id INTEGER NOT NULL,
    distribution_sequence INTEGER NOT NULL,
    contribution TEXT NOT NULL,
    earnings TEXT NOT NULL,
    forfeiture TEXT NOT NULL,
    federal_taxes TEXT NOT NULL,
    state_taxes TEXT NOT NULL,
    month_to_date INTEGER NOT NULL DEFAULT 0,
    year_to_date INTEGER NOT NULL DEFAULT 0,
    remark TEXT,
    zero_contribution_reason_id INTEGER,
    tax_code_id TEXT,
    years_of_service_credit INTEGER NOT NULL DEFAULT 0,
    reversed_from_profit_detail_id INTEGER UNIQUE REFERENCES profit_detail(id),
    reversal_reason TEXT,
    created_at TEXT NOT NULL,
    user_name TEXT NOT NULL,
    UNIQUE (ssn, profit_year, profit_code_id, distribution_sequence)
);

CREATE INDEX IF NOT EXISTS idx_profit_detail_ssn_year ON profit_detail(ssn, profit_year);
"#;

/// Check-run workflows. At most one non-failed run per (year, date).
pub const CREATE_CHECK_RUN_WORKFLOW_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS check_run_workflow (
    id TEXT PRIMARY KEY,
    profit_year INTEGER NOT NULL,
    check_run_date TEXT NOT NULL,
    step_number INTEGER NOT NULL,
    step_status INTEGER NOT NULL,
    check_number INTEGER,
    reprint_count INTEGER NOT NULL DEFAULT 0,
    max_reprint_count INTEGER NOT NULL DEFAULT 2,
    version INTEGER NOT NULL DEFAULT 0,
    failure_reason TEXT,
    created_at TEXT NOT NULL,
    created_by TEXT NOT NULL,
    modified_at TEXT,
    modified_by TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS ux_check_run_workflow_active
    ON check_run_workflow(profit_year, check_run_date) WHERE step_status <> 2;

CREATE TABLE IF NOT EXISTS check_run_payee (
    check_run_workflow_id TEXT NOT NULL REFERENCES check_run_workflow(id),
    line_number INTEGER NOT NULL,
    ssn INTEGER NOT NULL,
    demographic_id INTEGER NOT NULL,
    payable_name TEXT NOT NULL,
    amount TEXT NOT NULL,
    tax_code_id TEXT NOT NULL,
    payment_sequence INTEGER,
    PRIMARY KEY (check_run_workflow_id, line_number)
);
"#;

pub const CREATE_PROFIT_SHARE_CHECK_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS profit_share_check (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    check_number INTEGER NOT NULL UNIQUE,
    psc_check_id INTEGER NOT NULL UNIQUE,
    check_run_workflow_id TEXT,
    ssn INTEGER NOT NULL,
    demographic_id INTEGER NOT NULL,
    payable_name TEXT NOT NULL,
    check_amount TEXT NOT NULL,
    tax_code_id TEXT NOT NULL,
    check_date TEXT NOT NULL,
    check_run_date TEXT NOT NULL,
    void_flag INTEGER NOT NULL DEFAULT 0,
    void_check_date TEXT,
    void_recon_date TEXT,
    clear_date TEXT,
    clear_date_loaded TEXT,
    manual_check INTEGER NOT NULL DEFAULT 0,
    replace_check INTEGER,
    other_beneficiary INTEGER NOT NULL DEFAULT 0,
    user_name TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_profit_share_check_run ON profit_share_check(check_run_workflow_id);
"#;

pub const CREATE_TRANSFER_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS file_transfer_audit (
    id TEXT PRIMARY KEY,
    timestamp TEXT NOT NULL,
    check_run_workflow_id TEXT,
    file_name TEXT NOT NULL,
    destination TEXT NOT NULL,
    file_size INTEGER NOT NULL,
    transfer_duration_ms INTEGER NOT NULL,
    is_success INTEGER NOT NULL,
    error_message TEXT,
    user_name TEXT NOT NULL,
    payload BLOB,
    payload_digest TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_file_transfer_audit_run ON file_transfer_audit(check_run_workflow_id);

CREATE TABLE IF NOT EXISTS ftp_operation_log (
    id TEXT PRIMARY KEY,
    check_run_workflow_id TEXT NOT NULL,
    operation_type TEXT NOT NULL,
    file_name TEXT NOT NULL,
    destination TEXT NOT NULL,
    is_success INTEGER NOT NULL,
    error_message TEXT,
    duration_ms INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    user_name TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_ftp_operation_log_run ON ftp_operation_log(check_run_workflow_id);
"#;

pub const CREATE_AUDIT_EVENT_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS audit_event (
    id TEXT PRIMARY KEY,
    table_name TEXT NOT NULL,
    operation TEXT NOT NULL,
    primary_key TEXT NOT NULL,
    user_name TEXT NOT NULL,
    changes_json TEXT NOT NULL,
    changes_hash TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_event_row ON audit_event(table_name, primary_key);
"#;

pub const CREATE_SEQUENCE_COUNTER_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sequence_counter (
    name TEXT PRIMARY KEY,
    next_value INTEGER NOT NULL
);
"#;
