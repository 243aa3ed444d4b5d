//! Initial database migration.
//!
//! Creates the ledger tables, their indexes, and the triggers that keep
//! posted history immutable.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: CHART OF ACCOUNTS
        // ============================================================
        db.execute_unprepared(ACCOUNTS_SQL).await?;

        // ============================================================
        // PART 2: JOURNAL
        // ============================================================
        db.execute_unprepared(ACCOUNTING_PERIODS_SQL).await?;
        db.execute_unprepared(JOURNAL_ENTRIES_SQL).await?;
        db.execute_unprepared(JOURNAL_LINES_SQL).await?;

        // ============================================================
        // PART 3: RECONCILIATION
        // ============================================================
        db.execute_unprepared(RECONCILIATION_SNAPSHOTS_SQL).await?;
        db.execute_unprepared(TRANSACTION_SNAPSHOTS_SQL).await?;
        db.execute_unprepared(RECONCILIATIONS_SQL).await?;
        db.execute_unprepared(RECONCILIATION_DIFFERENCES_SQL).await?;

        // ============================================================
        // PART 4: AUDIT
        // ============================================================
        db.execute_unprepared(AUDIT_LOG_SQL).await?;

        // ============================================================
        // PART 5: TRIGGERS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id UUID PRIMARY KEY,
    code VARCHAR(20) NOT NULL,
    name VARCHAR(255) NOT NULL,
    account_type VARCHAR(16) NOT NULL,
    category VARCHAR(100),
    parent_id UUID REFERENCES accounts(id),
    level INTEGER NOT NULL DEFAULT 1,
    is_header BOOLEAN NOT NULL DEFAULT false,
    is_system_critical BOOLEAN NOT NULL DEFAULT false,
    status VARCHAR(16) NOT NULL DEFAULT 'ACTIVE',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_account_type CHECK (
        account_type IN ('ASSET', 'LIABILITY', 'EQUITY', 'REVENUE', 'EXPENSE')
    ),
    CONSTRAINT chk_account_status CHECK (status IN ('ACTIVE', 'INACTIVE')),
    CONSTRAINT chk_account_level CHECK (level >= 1),
    CONSTRAINT chk_account_not_own_parent CHECK (parent_id IS NULL OR parent_id <> id)
);

-- A code may be reused once the account holding it is deactivated
CREATE UNIQUE INDEX uq_accounts_active_code ON accounts(code) WHERE status = 'ACTIVE';
CREATE INDEX idx_accounts_parent ON accounts(parent_id) WHERE parent_id IS NOT NULL;
CREATE INDEX idx_accounts_type ON accounts(account_type);
";

const ACCOUNTING_PERIODS_SQL: &str = r"
CREATE TABLE accounting_periods (
    id UUID PRIMARY KEY,
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    status VARCHAR(24) NOT NULL,
    locked BOOLEAN NOT NULL DEFAULT false,
    locked_at TIMESTAMPTZ,
    locked_by VARCHAR(255),
    total_revenue NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_expense NUMERIC(19, 4) NOT NULL DEFAULT 0,
    net_income NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_entries BIGINT NOT NULL DEFAULT 0,
    closing_entry_id UUID,
    retained_earnings_id UUID NOT NULL REFERENCES accounts(id),
    closed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    reopened_at TIMESTAMPTZ,
    reopen_reason TEXT,
    notes TEXT,
    CONSTRAINT chk_period_dates CHECK (start_date <= end_date),
    CONSTRAINT chk_period_status CHECK (status IN ('CLOSED', 'REOPENED')),
    CONSTRAINT chk_period_reopened CHECK (status <> 'REOPENED' OR reopened_at IS NOT NULL)
);

CREATE INDEX idx_periods_range ON accounting_periods(start_date, end_date);
CREATE INDEX idx_periods_closed ON accounting_periods(start_date) WHERE status = 'CLOSED';
";

const JOURNAL_ENTRIES_SQL: &str = r"
CREATE TABLE journal_entries (
    id UUID PRIMARY KEY,
    code VARCHAR(100) NOT NULL,
    entry_date DATE NOT NULL,
    description TEXT NOT NULL,
    status VARCHAR(16) NOT NULL DEFAULT 'DRAFT',
    total_debit NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_credit NUMERIC(19, 4) NOT NULL DEFAULT 0,
    source_doc_type VARCHAR(50),
    source_doc_id VARCHAR(100),
    closing_period_id UUID,
    reversal_of UUID REFERENCES journal_entries(id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    posted_at TIMESTAMPTZ,
    cancelled_at TIMESTAMPTZ,
    CONSTRAINT chk_entry_status CHECK (status IN ('DRAFT', 'POSTED', 'CANCELLED')),
    CONSTRAINT chk_entry_posted_balanced CHECK (
        status <> 'POSTED' OR (total_debit = total_credit AND posted_at IS NOT NULL)
    ),
    CONSTRAINT chk_entry_source_pair CHECK (
        (source_doc_type IS NULL) = (source_doc_id IS NULL)
    )
);

-- An entry is reversed at most once
CREATE UNIQUE INDEX uq_journal_entries_reversal_of ON journal_entries(reversal_of)
    WHERE reversal_of IS NOT NULL;
CREATE INDEX idx_journal_entries_posted ON journal_entries(entry_date, posted_at)
    WHERE status = 'POSTED';
CREATE INDEX idx_journal_entries_code ON journal_entries(code);
";

const JOURNAL_LINES_SQL: &str = r"
CREATE TABLE journal_lines (
    id UUID PRIMARY KEY,
    entry_id UUID NOT NULL REFERENCES journal_entries(id) ON DELETE CASCADE,
    account_id UUID NOT NULL REFERENCES accounts(id),
    debit NUMERIC(19, 4) NOT NULL DEFAULT 0,
    credit NUMERIC(19, 4) NOT NULL DEFAULT 0,
    description TEXT,
    line_number INTEGER NOT NULL,
    CONSTRAINT chk_debit_or_credit CHECK (
        (debit > 0 AND credit = 0) OR (debit = 0 AND credit > 0)
    ),
    UNIQUE (entry_id, line_number)
);

CREATE INDEX idx_journal_lines_account ON journal_lines(account_id);
";

const RECONCILIATION_SNAPSHOTS_SQL: &str = r"
CREATE TABLE reconciliation_snapshots (
    id UUID PRIMARY KEY,
    account_id UUID NOT NULL REFERENCES accounts(id),
    period CHAR(7) NOT NULL,
    snapshot_date DATE NOT NULL,
    captured_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    opening_balance NUMERIC(19, 4) NOT NULL,
    closing_balance NUMERIC(19, 4) NOT NULL,
    total_debit NUMERIC(19, 4) NOT NULL,
    total_credit NUMERIC(19, 4) NOT NULL,
    transaction_count BIGINT NOT NULL,
    data_hash CHAR(64) NOT NULL,
    locked BOOLEAN NOT NULL DEFAULT false,
    locked_at TIMESTAMPTZ,
    locked_by VARCHAR(255),
    status VARCHAR(16) NOT NULL DEFAULT 'ACTIVE',
    notes TEXT,
    CONSTRAINT chk_snapshot_status CHECK (status IN ('ACTIVE', 'SUPERSEDED', 'ARCHIVED')),
    CONSTRAINT chk_snapshot_period CHECK (period ~ '^[0-9]{4}-(0[1-9]|1[0-2])$')
);

CREATE INDEX idx_snapshots_account ON reconciliation_snapshots(account_id, captured_at DESC);
CREATE UNIQUE INDEX uq_snapshots_active ON reconciliation_snapshots(account_id, period)
    WHERE status = 'ACTIVE';
";

const TRANSACTION_SNAPSHOTS_SQL: &str = r"
CREATE TABLE transaction_snapshots (
    id UUID PRIMARY KEY,
    snapshot_id UUID NOT NULL REFERENCES reconciliation_snapshots(id) ON DELETE CASCADE,
    line_number INTEGER NOT NULL,
    entry_id UUID NOT NULL REFERENCES journal_entries(id),
    entry_date DATE NOT NULL,
    reference VARCHAR(100) NOT NULL,
    description TEXT NOT NULL,
    debit NUMERIC(19, 4) NOT NULL,
    credit NUMERIC(19, 4) NOT NULL,
    running_balance NUMERIC(19, 4) NOT NULL,
    UNIQUE (snapshot_id, line_number)
);
";

const RECONCILIATIONS_SQL: &str = r"
CREATE TABLE reconciliations (
    id UUID PRIMARY KEY,
    account_id UUID NOT NULL REFERENCES accounts(id),
    base_snapshot_id UUID NOT NULL REFERENCES reconciliation_snapshots(id),
    comparison_snapshot_id UUID NOT NULL REFERENCES reconciliation_snapshots(id),
    base_balance NUMERIC(19, 4) NOT NULL,
    current_balance NUMERIC(19, 4) NOT NULL,
    variance NUMERIC(19, 4) NOT NULL,
    base_count BIGINT NOT NULL,
    current_count BIGINT NOT NULL,
    missing_count BIGINT NOT NULL DEFAULT 0,
    added_count BIGINT NOT NULL DEFAULT 0,
    modified_count BIGINT NOT NULL DEFAULT 0,
    status VARCHAR(16) NOT NULL DEFAULT 'PENDING',
    is_balanced BOOLEAN NOT NULL,
    review_notes TEXT,
    reviewed_by VARCHAR(255),
    reviewed_at TIMESTAMPTZ,
    created_by VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_reconciliation_status CHECK (
        status IN ('PENDING', 'APPROVED', 'REJECTED', 'NEEDS_REVIEW')
    )
);

CREATE INDEX idx_reconciliations_account ON reconciliations(account_id, created_at DESC);
";

const RECONCILIATION_DIFFERENCES_SQL: &str = r"
CREATE TABLE reconciliation_differences (
    id UUID PRIMARY KEY,
    reconciliation_id UUID NOT NULL REFERENCES reconciliations(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    kind VARCHAR(24) NOT NULL,
    severity VARCHAR(16) NOT NULL,
    reference VARCHAR(100),
    field VARCHAR(50),
    old_value TEXT,
    new_value TEXT,
    amount_difference NUMERIC(19, 4) NOT NULL DEFAULT 0,
    resolution VARCHAR(16) NOT NULL DEFAULT 'PENDING',
    resolution_notes TEXT,
    resolved_at TIMESTAMPTZ,
    CONSTRAINT chk_difference_kind CHECK (kind IN (
        'MISSING', 'ADDED', 'MODIFIED', 'AMOUNT_CHANGE', 'DATE_CHANGE', 'INTEGRITY_VIOLATION'
    )),
    CONSTRAINT chk_difference_severity CHECK (severity IN ('LOW', 'MEDIUM', 'HIGH', 'CRITICAL')),
    CONSTRAINT chk_difference_resolution CHECK (
        resolution IN ('PENDING', 'RESOLVED', 'IGNORED', 'ESCALATED')
    ),
    UNIQUE (reconciliation_id, position)
);
";

const AUDIT_LOG_SQL: &str = r"
CREATE TABLE audit_log (
    id UUID PRIMARY KEY,
    entity VARCHAR(24) NOT NULL,
    entity_id UUID NOT NULL,
    action VARCHAR(24) NOT NULL,
    detail JSONB NOT NULL DEFAULT '{}',
    recorded_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_audit_log_entity ON audit_log(entity_id, recorded_at);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: check_entry_balance
-- Ensures double-entry balance (debit = credit) for posted entries
-- ============================================================
CREATE OR REPLACE FUNCTION check_entry_balance()
RETURNS TRIGGER AS $$
DECLARE
    line_debit NUMERIC(19, 4);
    line_credit NUMERIC(19, 4);
BEGIN
    IF NEW.status = 'POSTED' THEN
        SELECT
            COALESCE(SUM(debit), 0),
            COALESCE(SUM(credit), 0)
        INTO line_debit, line_credit
        FROM journal_lines
        WHERE entry_id = NEW.id;

        IF line_debit <> line_credit THEN
            RAISE EXCEPTION 'Journal entry is not balanced. Debit: %, Credit: %',
                line_debit, line_credit;
        END IF;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE CONSTRAINT TRIGGER trg_check_entry_balance
AFTER INSERT OR UPDATE ON journal_entries
DEFERRABLE INITIALLY DEFERRED
FOR EACH ROW
EXECUTE FUNCTION check_entry_balance();

-- ============================================================
-- FUNCTION: prevent_posted_entry_modification
-- Posted entries are corrected by reversing entries only
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_posted_entry_modification()
RETURNS TRIGGER AS $$
BEGIN
    IF OLD.status = 'POSTED' THEN
        RAISE EXCEPTION 'Cannot modify posted journal entry. Create a reversing entry instead.';
    END IF;

    IF OLD.status = 'CANCELLED' THEN
        RAISE EXCEPTION 'Cannot modify cancelled journal entry.';
    END IF;

    IF TG_OP = 'DELETE' THEN
        RETURN OLD;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_posted_entry_mod
BEFORE UPDATE OR DELETE ON journal_entries
FOR EACH ROW
EXECUTE FUNCTION prevent_posted_entry_modification();

-- ============================================================
-- FUNCTION: prevent_posted_line_modification
-- Lines may only change while their entry is a draft
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_posted_line_modification()
RETURNS TRIGGER AS $$
DECLARE
    entry_status VARCHAR(16);
BEGIN
    SELECT status INTO entry_status
    FROM journal_entries
    WHERE id = OLD.entry_id;

    IF entry_status <> 'DRAFT' THEN
        RAISE EXCEPTION 'Cannot modify lines of a % journal entry.', entry_status;
    END IF;

    IF TG_OP = 'DELETE' THEN
        RETURN OLD;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_posted_line_mod
BEFORE UPDATE OR DELETE ON journal_lines
FOR EACH ROW
EXECUTE FUNCTION prevent_posted_line_modification();

-- ============================================================
-- FUNCTION: prevent_locked_snapshot_rows
-- Frozen rows of a locked snapshot never change
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_locked_snapshot_rows()
RETURNS TRIGGER AS $$
DECLARE
    is_locked BOOLEAN;
BEGIN
    SELECT locked INTO is_locked
    FROM reconciliation_snapshots
    WHERE id = COALESCE(NEW.snapshot_id, OLD.snapshot_id);

    IF is_locked THEN
        RAISE EXCEPTION 'Snapshot % is locked', COALESCE(NEW.snapshot_id, OLD.snapshot_id);
    END IF;

    IF TG_OP = 'DELETE' THEN
        RETURN OLD;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_locked_snapshot_rows
BEFORE INSERT OR UPDATE OR DELETE ON transaction_snapshots
FOR EACH ROW
EXECUTE FUNCTION prevent_locked_snapshot_rows();

-- ============================================================
-- FUNCTION: prevent_audit_modification
-- The audit log is append-only
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_audit_modification()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'audit_log is append-only';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_audit_mod
BEFORE UPDATE OR DELETE ON audit_log
FOR EACH ROW
EXECUTE FUNCTION prevent_audit_modification();
";

const DROP_ALL_SQL: &str = r"
-- ============================================================
-- DROP ALL: Rollback migration
-- Order matters due to foreign key constraints
-- ============================================================

-- Drop triggers
DROP TRIGGER IF EXISTS trg_prevent_audit_mod ON audit_log;
DROP TRIGGER IF EXISTS trg_prevent_locked_snapshot_rows ON transaction_snapshots;
DROP TRIGGER IF EXISTS trg_prevent_posted_line_mod ON journal_lines;
DROP TRIGGER IF EXISTS trg_prevent_posted_entry_mod ON journal_entries;
DROP TRIGGER IF EXISTS trg_check_entry_balance ON journal_entries;

-- Drop functions
DROP FUNCTION IF EXISTS prevent_audit_modification();
DROP FUNCTION IF EXISTS prevent_locked_snapshot_rows();
DROP FUNCTION IF EXISTS prevent_posted_line_modification();
DROP FUNCTION IF EXISTS prevent_posted_entry_modification();
DROP FUNCTION IF EXISTS check_entry_balance();

-- Drop tables (reverse order of creation)
DROP TABLE IF EXISTS audit_log CASCADE;
DROP TABLE IF EXISTS reconciliation_differences CASCADE;
DROP TABLE IF EXISTS reconciliations CASCADE;
DROP TABLE IF EXISTS transaction_snapshots CASCADE;
DROP TABLE IF EXISTS reconciliation_snapshots CASCADE;
DROP TABLE IF EXISTS journal_lines CASCADE;
DROP TABLE IF EXISTS journal_entries CASCADE;
DROP TABLE IF EXISTS accounting_periods CASCADE;
DROP TABLE IF EXISTS accounts CASCADE;
";
