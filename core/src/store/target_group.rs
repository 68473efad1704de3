use super::{opt_money_col, LedgerStore};
use crate::{classifier::TargetGroup, error::LedgerResult, types::GroupId};
use rusqlite::{params, OptionalExtension};

impl LedgerStore {
    // ── Target groups (reference data) ─────────────────────────────

    /// All groups in id order; the band-table classifier takes the first match.
    pub fn target_groups(&self) -> LedgerResult<Vec<TargetGroup>> {
        let mut stmt = self.conn.prepare(
            "SELECT target_group_id, name, age_min, age_max, income_range_min, income_range_max
             FROM target_group ORDER BY target_group_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(TargetGroup {
                id: row.get(0)?,
                name: row.get(1)?,
                age_min: row.get(2)?,
                age_max: row.get(3)?,
                income_range_min: opt_money_col(row, 4)?,
                income_range_max: opt_money_col(row, 5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn target_group_exists(&self, group_id: GroupId) -> LedgerResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM target_group WHERE target_group_id = ?1",
                params![group_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn target_group_name(&self, group_id: GroupId) -> LedgerResult<Option<String>> {
        let name = self
            .conn
            .query_row(
                "SELECT name FROM target_group WHERE target_group_id = ?1",
                params![group_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name)
    }
}
