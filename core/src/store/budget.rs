use super::{money_col, money_text, time_col, LedgerStore};
use crate::{
    budget::BudgetAccount,
    error::{LedgerError, LedgerResult},
    types::{EntityId, Money},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

const BUDGET_COLUMNS: &str =
    "id, year, project_name, total_budget, remaining_budget, version, created_at, updated_at";

fn budget_row(row: &Row<'_>) -> rusqlite::Result<BudgetAccount> {
    Ok(BudgetAccount {
        id: row.get(0)?,
        year: row.get(1)?,
        project_name: row.get(2)?,
        total_budget: money_col(row, 3)?,
        remaining_budget: money_col(row, 4)?,
        version: row.get(5)?,
        created_at: time_col(row, 6)?,
        updated_at: time_col(row, 7)?,
    })
}

impl LedgerStore {
    // ── Budget account ────────────────────────────────────────────

    pub fn insert_budget(
        &self,
        year: i32,
        project_name: &str,
        total_budget: Money,
        now: DateTime<Utc>,
    ) -> LedgerResult<EntityId> {
        self.conn.execute(
            "INSERT INTO budget_account
                (year, project_name, total_budget, remaining_budget, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3, 0, ?4, ?4)",
            params![year, project_name, money_text(total_budget), now.to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_budget(&self, budget_id: EntityId) -> LedgerResult<Option<BudgetAccount>> {
        let sql = format!("SELECT {BUDGET_COLUMNS} FROM budget_account WHERE id = ?1");
        let budget = self
            .conn
            .query_row(&sql, params![budget_id], budget_row)
            .optional()?;
        Ok(budget)
    }

    pub fn list_budgets(&self) -> LedgerResult<Vec<BudgetAccount>> {
        let sql = format!("SELECT {BUDGET_COLUMNS} FROM budget_account ORDER BY year DESC, id ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], budget_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn update_budget_fields(
        &self,
        budget_id: EntityId,
        expected_version: i64,
        project_name: &str,
        total_budget: Money,
        remaining_budget: Money,
        now: DateTime<Utc>,
    ) -> LedgerResult<()> {
        let changed = self.conn.execute(
            "UPDATE budget_account
             SET project_name = ?1, total_budget = ?2, remaining_budget = ?3,
                 updated_at = ?4, version = version + 1
             WHERE id = ?5 AND version = ?6",
            params![
                project_name,
                money_text(total_budget),
                money_text(remaining_budget),
                now.to_rfc3339(),
                budget_id,
                expected_version
            ],
        )?;
        stale_unless_changed(changed, "budget", budget_id)
    }

    pub fn set_remaining_budget(
        &self,
        budget_id: EntityId,
        expected_version: i64,
        remaining_budget: Money,
    ) -> LedgerResult<()> {
        let changed = self.conn.execute(
            "UPDATE budget_account SET remaining_budget = ?1, version = version + 1
             WHERE id = ?2 AND version = ?3",
            params![money_text(remaining_budget), budget_id, expected_version],
        )?;
        stale_unless_changed(changed, "budget", budget_id)
    }

    pub fn delete_budget(&self, budget_id: EntityId) -> LedgerResult<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM budget_account WHERE id = ?1", params![budget_id])?;
        Ok(deleted)
    }
}

/// Zero affected rows on a versioned update means another writer got there first.
pub(super) fn stale_unless_changed(
    changed: usize,
    entity: &'static str,
    id: EntityId,
) -> LedgerResult<()> {
    if changed == 0 {
        return Err(LedgerError::StaleVersion { entity, id });
    }
    Ok(())
}
