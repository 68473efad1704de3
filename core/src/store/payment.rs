use super::{money_col, money_text, opt_time_col, time_col, LedgerStore};
use crate::{
    disbursement::{Payment, PaymentStatus, PaymentView},
    error::LedgerResult,
    types::{EntityId, GroupId, Money},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, types::Type, OptionalExtension, Row};

const PAYMENT_COLUMNS: &str =
    "p.id, p.citizen_id, p.allocation_id, p.amount, p.status, p.queue_order,
     p.transaction_date, p.completed_at";

fn status_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<PaymentStatus> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
    })
}

fn payment_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: row.get(0)?,
        citizen_id: row.get(1)?,
        allocation_id: row.get(2)?,
        amount: money_col(row, 3)?,
        status: status_col(row, 4)?,
        queue_order: row.get(5)?,
        transaction_date: time_col(row, 6)?,
        completed_at: opt_time_col(row, 7)?,
    })
}

/// The slice of a payment the report aggregates over.
#[derive(Debug, Clone)]
pub struct AllocationPaymentRow {
    pub citizen_id: EntityId,
    pub amount: Money,
    pub status: PaymentStatus,
}

impl LedgerStore {
    // ── Payment queue ─────────────────────────────────────────────

    /// `max(queue_order) + 1`. Call inside the same transaction as the insert.
    pub fn next_queue_order(&self) -> LedgerResult<i64> {
        let next = self.conn.query_row(
            "SELECT COALESCE(MAX(queue_order), 0) + 1 FROM payment",
            [],
            |row| row.get(0),
        )?;
        Ok(next)
    }

    pub fn insert_payment(
        &self,
        citizen_id: EntityId,
        allocation_id: EntityId,
        amount: Money,
        queue_order: i64,
        now: DateTime<Utc>,
    ) -> LedgerResult<EntityId> {
        self.conn.execute(
            "INSERT INTO payment
                (citizen_id, allocation_id, amount, status, queue_order, transaction_date)
             VALUES (?1, ?2, ?3, 'pending', ?4, ?5)",
            params![
                citizen_id,
                allocation_id,
                money_text(amount),
                queue_order,
                now.to_rfc3339()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_payment(&self, payment_id: EntityId) -> LedgerResult<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payment p WHERE p.id = ?1");
        let payment = self
            .conn
            .query_row(&sql, params![payment_id], payment_row)
            .optional()?;
        Ok(payment)
    }

    /// Pending → completed. Returns rows changed; 0 means it was not pending.
    pub fn mark_payment_completed(
        &self,
        payment_id: EntityId,
        now: DateTime<Utc>,
    ) -> LedgerResult<usize> {
        let changed = self.conn.execute(
            "UPDATE payment SET status = 'completed', completed_at = ?1
             WHERE id = ?2 AND status = 'pending'",
            params![now.to_rfc3339(), payment_id],
        )?;
        Ok(changed)
    }

    pub fn latest_payment_for_citizen(&self, citizen_id: EntityId) -> LedgerResult<Option<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payment p
             WHERE p.citizen_id = ?1
             ORDER BY p.transaction_date DESC, p.id DESC LIMIT 1"
        );
        let payment = self
            .conn
            .query_row(&sql, params![citizen_id], payment_row)
            .optional()?;
        Ok(payment)
    }

    pub fn next_pending_for_group(&self, target_group_id: GroupId) -> LedgerResult<Option<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payment p
             JOIN allocation a ON p.allocation_id = a.id
             WHERE a.target_group_id = ?1 AND p.status = 'pending'
             ORDER BY p.queue_order ASC LIMIT 1"
        );
        let payment = self
            .conn
            .query_row(&sql, params![target_group_id], payment_row)
            .optional()?;
        Ok(payment)
    }

    pub fn payment_count_for_citizen(&self, citizen_id: EntityId) -> LedgerResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM payment WHERE citizen_id = ?1",
            params![citizen_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn completed_payment_count_for_citizen(&self, citizen_id: EntityId) -> LedgerResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM payment WHERE citizen_id = ?1 AND status = 'completed'",
            params![citizen_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn delete_pending_payments_for_citizen(&self, citizen_id: EntityId) -> LedgerResult<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM payment WHERE citizen_id = ?1 AND status = 'pending'",
            params![citizen_id],
        )?;
        Ok(deleted)
    }

    pub fn payments_for_allocation(
        &self,
        allocation_id: EntityId,
    ) -> LedgerResult<Vec<AllocationPaymentRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT citizen_id, amount, status FROM payment
             WHERE allocation_id = ?1 ORDER BY queue_order ASC",
        )?;
        let rows = stmt.query_map(params![allocation_id], |row| {
            Ok(AllocationPaymentRow {
                citizen_id: row.get(0)?,
                amount: money_col(row, 1)?,
                status: status_col(row, 2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn payment_views(&self, budget_id: Option<EntityId>) -> LedgerResult<Vec<PaymentView>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.queue_order, c.id, c.national_id, c.first_name, c.last_name,
                    a.target_group_id, g.name, a.budget_id, p.allocation_id, p.amount,
                    p.status, p.transaction_date
             FROM payment p
             JOIN citizen c      ON p.citizen_id = c.id
             JOIN allocation a   ON p.allocation_id = a.id
             JOIN target_group g ON a.target_group_id = g.target_group_id
             WHERE (?1 IS NULL OR a.budget_id = ?1)
             ORDER BY a.target_group_id ASC, p.queue_order ASC",
        )?;
        let rows = stmt.query_map(params![budget_id], |row| {
            Ok(PaymentView {
                payment_id: row.get(0)?,
                queue_order: row.get(1)?,
                citizen_id: row.get(2)?,
                national_id: row.get(3)?,
                first_name: row.get(4)?,
                last_name: row.get(5)?,
                target_group_id: row.get(6)?,
                group_name: row.get(7)?,
                budget_id: row.get(8)?,
                allocation_id: row.get(9)?,
                amount: money_col(row, 10)?,
                status: status_col(row, 11)?,
                transaction_date: time_col(row, 12)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Distribution schedule ─────────────────────────────────────

    pub fn insert_distribution_event(
        &self,
        target_group_id: GroupId,
        payment_id: EntityId,
        at: DateTime<Utc>,
    ) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO distribution_event (target_group_id, payment_id, distribution_date)
             VALUES (?1, ?2, ?3)",
            params![target_group_id, payment_id, at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn last_distribution_date(
        &self,
        target_group_id: GroupId,
    ) -> LedgerResult<Option<DateTime<Utc>>> {
        let last = self
            .conn
            .query_row(
                "SELECT distribution_date FROM distribution_event
                 WHERE target_group_id = ?1
                 ORDER BY distribution_date DESC, id DESC LIMIT 1",
                params![target_group_id],
                |row| time_col(row, 0),
            )
            .optional()?;
        Ok(last)
    }

    pub fn distribution_event_count(&self, target_group_id: GroupId) -> LedgerResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM distribution_event WHERE target_group_id = ?1",
            params![target_group_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
