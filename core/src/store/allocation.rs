use super::{budget::stale_unless_changed, money_col, money_text, LedgerStore};
use crate::{
    allocation_ledger::{Allocation, AllocationView},
    error::LedgerResult,
    money,
    types::{EntityId, GroupId, Money},
};
use rusqlite::{params, OptionalExtension, Row};
use rust_decimal::Decimal;

const ALLOCATION_COLUMNS: &str = "a.id, a.budget_id, a.target_group_id, a.allocation_percentage,
     a.max_recipients, a.allocated_amount, a.version";

fn allocation_row(row: &Row<'_>) -> rusqlite::Result<Allocation> {
    Ok(Allocation {
        id: row.get(0)?,
        budget_id: row.get(1)?,
        target_group_id: row.get(2)?,
        allocation_percentage: money_col(row, 3)?,
        max_recipients: row.get(4)?,
        allocated_amount: money_col(row, 5)?,
        version: row.get(6)?,
    })
}

fn view_row(row: &Row<'_>) -> rusqlite::Result<AllocationView> {
    let allocated_amount = money_col(row, 6)?;
    let max_recipients: i64 = row.get(7)?;
    Ok(AllocationView {
        allocation_id: row.get(0)?,
        budget_id: row.get(1)?,
        project_name: row.get(2)?,
        target_group_id: row.get(3)?,
        target_group: row.get(4)?,
        allocation_percentage: money_col(row, 5)?,
        allocated_amount,
        max_recipients,
        remaining_budget: money_col(row, 8)?,
        amount_per_person: money::per_person(allocated_amount, max_recipients),
    })
}

const VIEW_SELECT: &str = "SELECT a.id, a.budget_id, b.project_name, a.target_group_id, g.name,
            a.allocation_percentage, a.allocated_amount, a.max_recipients, b.remaining_budget
     FROM allocation a
     JOIN budget_account b ON a.budget_id = b.id
     JOIN target_group g ON a.target_group_id = g.target_group_id";

impl LedgerStore {
    // ── Allocation ────────────────────────────────────────────────

    pub fn insert_allocation(
        &self,
        budget_id: EntityId,
        target_group_id: GroupId,
        percentage: Decimal,
        max_recipients: i64,
        allocated_amount: Money,
    ) -> LedgerResult<EntityId> {
        self.conn.execute(
            "INSERT INTO allocation
                (budget_id, target_group_id, allocation_percentage, max_recipients, allocated_amount, version)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            params![
                budget_id,
                target_group_id,
                money_text(percentage),
                max_recipients,
                money_text(allocated_amount)
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_allocation(&self, allocation_id: EntityId) -> LedgerResult<Option<Allocation>> {
        let sql = format!("SELECT {ALLOCATION_COLUMNS} FROM allocation a WHERE a.id = ?1");
        let allocation = self
            .conn
            .query_row(&sql, params![allocation_id], allocation_row)
            .optional()?;
        Ok(allocation)
    }

    pub fn allocations_for_budget(&self, budget_id: EntityId) -> LedgerResult<Vec<Allocation>> {
        let sql = format!(
            "SELECT {ALLOCATION_COLUMNS} FROM allocation a
             WHERE a.budget_id = ?1 ORDER BY a.target_group_id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![budget_id], allocation_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn allocation_count_for_budget(&self, budget_id: EntityId) -> LedgerResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM allocation WHERE budget_id = ?1",
            params![budget_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// The group's allocation on its most recent budget (highest year, then highest id).
    pub fn current_allocation_for_group(
        &self,
        target_group_id: GroupId,
    ) -> LedgerResult<Option<Allocation>> {
        let sql = format!(
            "SELECT {ALLOCATION_COLUMNS} FROM allocation a
             JOIN budget_account b ON a.budget_id = b.id
             WHERE a.target_group_id = ?1
             ORDER BY b.year DESC, b.id DESC LIMIT 1"
        );
        let allocation = self
            .conn
            .query_row(&sql, params![target_group_id], allocation_row)
            .optional()?;
        Ok(allocation)
    }

    pub fn update_allocation_terms(
        &self,
        allocation_id: EntityId,
        expected_version: i64,
        percentage: Decimal,
        max_recipients: i64,
        allocated_amount: Money,
    ) -> LedgerResult<()> {
        let changed = self.conn.execute(
            "UPDATE allocation
             SET allocation_percentage = ?1, max_recipients = ?2, allocated_amount = ?3,
                 version = version + 1
             WHERE id = ?4 AND version = ?5",
            params![
                money_text(percentage),
                max_recipients,
                money_text(allocated_amount),
                allocation_id,
                expected_version
            ],
        )?;
        stale_unless_changed(changed, "allocation", allocation_id)
    }

    pub fn set_allocated_amount(
        &self,
        allocation_id: EntityId,
        expected_version: i64,
        allocated_amount: Money,
    ) -> LedgerResult<()> {
        let changed = self.conn.execute(
            "UPDATE allocation SET allocated_amount = ?1, version = version + 1
             WHERE id = ?2 AND version = ?3",
            params![money_text(allocated_amount), allocation_id, expected_version],
        )?;
        stale_unless_changed(changed, "allocation", allocation_id)
    }

    pub fn allocation_view(&self, allocation_id: EntityId) -> LedgerResult<Option<AllocationView>> {
        let sql = format!("{VIEW_SELECT} WHERE a.id = ?1");
        let view = self
            .conn
            .query_row(&sql, params![allocation_id], view_row)
            .optional()?;
        Ok(view)
    }

    pub fn allocation_views(&self, budget_id: Option<EntityId>) -> LedgerResult<Vec<AllocationView>> {
        let sql = format!(
            "{VIEW_SELECT}
             WHERE (?1 IS NULL OR a.budget_id = ?1)
             ORDER BY a.budget_id ASC, a.target_group_id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![budget_id], view_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
