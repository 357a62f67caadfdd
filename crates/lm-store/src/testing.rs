//! Test fixtures for pipeline tests.
//!
//! The operational source tables belong to the lending platform, not to the
//! warehouse migrations, so tests create them here. Helpers return
//! `StoreResult` and leave unwrapping to the test body.

use crate::error::{StoreError, StoreResult};
use duckdb::Connection;

/// DDL for the operational tables the pipeline extracts from.
const SOURCE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS "user" (
    id           BIGINT PRIMARY KEY,
    email        VARCHAR,
    full_name    VARCHAR,
    role         VARCHAR,
    credit_score INTEGER,
    is_active    BOOLEAN DEFAULT true,
    created_at   TIMESTAMP,
    updated_at   TIMESTAMP
);

CREATE TABLE IF NOT EXISTS loan (
    id                  BIGINT PRIMARY KEY,
    application_id      BIGINT,
    borrower_id         BIGINT,
    lender_id           BIGINT,
    principal_amount    DECIMAL(15,2),
    interest_rate       DECIMAL(8,4),
    term_months         INTEGER,
    monthly_payment     DECIMAL(15,2),
    outstanding_balance DECIMAL(15,2),
    status              VARCHAR,
    currency_code       VARCHAR DEFAULT 'USD',
    disbursed_at        TIMESTAMP,
    maturity_date       DATE,
    created_at          TIMESTAMP,
    updated_at          TIMESTAMP
);

CREATE TABLE IF NOT EXISTS loan_application (
    id            BIGINT PRIMARY KEY,
    applicant_id  BIGINT,
    amount        DECIMAL(15,2),
    purpose       VARCHAR,
    term_months   INTEGER,
    interest_rate DECIMAL(8,4),
    status        VARCHAR,
    reviewed_by   BIGINT,
    created_at    TIMESTAMP,
    updated_at    TIMESTAMP
);

CREATE TABLE IF NOT EXISTS transaction_ledger (
    id               BIGINT PRIMARY KEY,
    wallet_id        BIGINT,
    loan_id          BIGINT,
    transaction_type VARCHAR,
    amount           DECIMAL(15,2),
    balance_before   DECIMAL(15,2),
    balance_after    DECIMAL(15,2),
    description      VARCHAR,
    reference_number VARCHAR,
    created_at       TIMESTAMP
);

CREATE TABLE IF NOT EXISTS repayment_schedule (
    id                 BIGINT PRIMARY KEY,
    loan_id            BIGINT,
    installment_number INTEGER,
    due_date           DATE,
    principal_amount   DECIMAL(15,2),
    interest_amount    DECIMAL(15,2),
    total_amount       DECIMAL(15,2),
    paid_amount        DECIMAL(15,2),
    status             VARCHAR,
    paid_at            TIMESTAMP,
    created_at         TIMESTAMP,
    updated_at         TIMESTAMP
);

CREATE TABLE IF NOT EXISTS ref_currency (
    currency_code VARCHAR PRIMARY KEY,
    currency_name VARCHAR,
    is_active     BOOLEAN DEFAULT true
);

CREATE TABLE IF NOT EXISTS ref_loan_product (
    product_code       VARCHAR PRIMARY KEY,
    product_name       VARCHAR,
    category           VARCHAR,
    min_amount         DECIMAL(15,2),
    max_amount         DECIMAL(15,2),
    min_term_months    INTEGER,
    max_term_months    INTEGER,
    base_interest_rate DECIMAL(8,4),
    is_active          BOOLEAN DEFAULT true
);

CREATE TABLE IF NOT EXISTS ref_region (
    region_code VARCHAR PRIMARY KEY,
    region_name VARCHAR,
    is_active   BOOLEAN DEFAULT true
);

CREATE TABLE IF NOT EXISTS ref_credit_tier (
    tier_code VARCHAR PRIMARY KEY,
    tier_name VARCHAR,
    min_score INTEGER,
    max_score INTEGER
);

CREATE TABLE IF NOT EXISTS market_fx_rates (
    rate_date      DATE,
    base_currency  VARCHAR,
    quote_currency VARCHAR,
    rate           DECIMAL(12,6)
);

CREATE TABLE IF NOT EXISTS market_interest_benchmarks (
    effective_date DATE,
    benchmark_code VARCHAR,
    rate           DECIMAL(8,4)
);

CREATE TABLE IF NOT EXISTS market_credit_spreads (
    effective_date DATE,
    tier_code      VARCHAR,
    spread_bps     INTEGER
);
"#;

fn exec_batch(conn: &Connection, sql: &str) -> StoreResult<()> {
    conn.execute_batch(sql)
        .map_err(|e| StoreError::QueryError(format!("fixture SQL failed: {e}")))
}

/// Create the operational source tables.
pub fn create_source_schema(conn: &Connection) -> StoreResult<()> {
    exec_batch(conn, SOURCE_SCHEMA)
}

/// Seed the reference tables with a small realistic set.
pub fn seed_reference_data(conn: &Connection) -> StoreResult<()> {
    exec_batch(
        conn,
        "INSERT INTO ref_currency VALUES
             ('USD', 'US Dollar', true),
             ('EUR', 'Euro', true),
             ('GBP', 'Pound Sterling', true);
         INSERT INTO ref_loan_product VALUES
             ('PAYDAY', 'Payday Advance', 'short_term', 100, 2000, 1, 3, 24.0, true),
             ('PERSONAL', 'Personal Loan', 'installment', 1000, 25000, 6, 36, 9.5, true),
             ('BUSINESS', 'Small Business Loan', 'installment', 5000, 100000, 12, 60, 7.25, true);
         INSERT INTO ref_region VALUES
             ('NA', 'North America', true),
             ('EU', 'Europe', true);
         INSERT INTO ref_credit_tier VALUES
             ('EXC', 'Excellent', 750, 850),
             ('GOO', 'Good', 650, 749),
             ('FAI', 'Fair', 550, 649),
             ('POO', 'Poor', 300, 549);",
    )
}

/// Seed the market tables with one day of data quoted against USD.
pub fn seed_market_data(conn: &Connection, rate_date: &str) -> StoreResult<()> {
    exec_batch(
        conn,
        &format!(
            "INSERT INTO market_fx_rates VALUES
                 (DATE '{rate_date}', 'USD', 'EUR', 0.8),
                 (DATE '{rate_date}', 'USD', 'GBP', 0.75);
             INSERT INTO market_interest_benchmarks VALUES
                 (DATE '{rate_date}', 'SOFR', 4.31),
                 (DATE '{rate_date}', 'PRIME', 7.50);
             INSERT INTO market_credit_spreads VALUES
                 (DATE '{rate_date}', 'EXC', 150),
                 (DATE '{rate_date}', 'GOO', 300),
                 (DATE '{rate_date}', 'FAI', 550),
                 (DATE '{rate_date}', 'POO', 900);"
        ),
    )
}

/// Insert one operational user row.
pub fn insert_user(
    conn: &Connection,
    id: i64,
    email: &str,
    role: &str,
    credit_score: Option<i64>,
    updated_at: &str,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO \"user\" (id, email, full_name, role, credit_score, is_active, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, true, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))",
        duckdb::params![id, email, format!("User {id}"), role, credit_score, updated_at, updated_at],
    )
    .map_err(|e| StoreError::QueryError(format!("insert user: {e}")))?;
    Ok(())
}

/// Insert one operational loan row. `principal` and `rate` are SQL literals
/// so DECIMAL values stay exact.
#[allow(clippy::too_many_arguments)]
pub fn insert_loan(
    conn: &Connection,
    id: i64,
    borrower_id: i64,
    principal: &str,
    rate: &str,
    term_months: i64,
    status: &str,
    currency: &str,
    created_at: &str,
) -> StoreResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO loan (id, application_id, borrower_id, principal_amount, interest_rate,
                               term_months, outstanding_balance, status, currency_code,
                               created_at, updated_at)
             VALUES (?, NULL, ?, {principal}, {rate}, ?, {principal}, ?, ?,
                     CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))"
        ),
        duckdb::params![id, borrower_id, term_months, status, currency, created_at, created_at],
    )
    .map_err(|e| StoreError::QueryError(format!("insert loan: {e}")))?;
    Ok(())
}

/// Insert one ledger transaction row.
pub fn insert_transaction(
    conn: &Connection,
    id: i64,
    loan_id: i64,
    amount: &str,
    created_at: &str,
) -> StoreResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO transaction_ledger (id, wallet_id, loan_id, transaction_type, amount,
                                             balance_before, balance_after, created_at)
             VALUES (?, 1, ?, 'disbursement', {amount}, 0, {amount}, CAST(? AS TIMESTAMP))"
        ),
        duckdb::params![id, loan_id, created_at],
    )
    .map_err(|e| StoreError::QueryError(format!("insert transaction: {e}")))?;
    Ok(())
}

/// Insert one repayment-schedule row.
pub fn insert_repayment(
    conn: &Connection,
    id: i64,
    loan_id: i64,
    installment: i64,
    updated_at: &str,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO repayment_schedule (id, loan_id, installment_number, due_date,
                                         principal_amount, interest_amount, total_amount,
                                         status, created_at, updated_at)
         VALUES (?, ?, ?, DATE '2026-01-01', 400.00, 35.42, 435.42,
                 'pending', CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))",
        duckdb::params![id, loan_id, installment, updated_at, updated_at],
    )
    .map_err(|e| StoreError::QueryError(format!("insert repayment: {e}")))?;
    Ok(())
}

/// Insert one loan-application row.
pub fn insert_application(
    conn: &Connection,
    id: i64,
    applicant_id: i64,
    updated_at: &str,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO loan_application (id, applicant_id, amount, purpose, term_months,
                                       interest_rate, status, created_at, updated_at)
         VALUES (?, ?, 5000.00, 'working capital', 12, 8.5, 'approved',
                 CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))",
        duckdb::params![id, applicant_id, updated_at, updated_at],
    )
    .map_err(|e| StoreError::QueryError(format!("insert application: {e}")))?;
    Ok(())
}
