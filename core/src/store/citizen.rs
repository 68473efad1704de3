use super::{date_col, money_col, money_text, time_col, LedgerStore};
use crate::{
    error::LedgerResult,
    registry::{Citizen, CitizenFields},
    types::{EntityId, GroupId},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

const CITIZEN_COLUMNS: &str = "id, national_id, first_name, last_name, birth_date, age,
     income, occupation, target_group_id, created_at";

fn citizen_row(row: &Row<'_>) -> rusqlite::Result<Citizen> {
    Ok(Citizen {
        id: row.get(0)?,
        national_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        birth_date: date_col(row, 4)?,
        age: row.get(5)?,
        income: money_col(row, 6)?,
        occupation: row.get(7)?,
        target_group_id: row.get(8)?,
        created_at: time_col(row, 9)?,
    })
}

impl LedgerStore {
    // ── Citizen ───────────────────────────────────────────────────

    pub(crate) fn insert_citizen(
        &self,
        national_id: &str,
        c: &CitizenFields<'_>,
        now: DateTime<Utc>,
    ) -> LedgerResult<EntityId> {
        self.conn.execute(
            "INSERT INTO citizen (
                national_id, first_name, last_name, birth_date, age,
                income, occupation, target_group_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                national_id,
                c.first_name,
                c.last_name,
                c.birth_date.format("%Y-%m-%d").to_string(),
                c.age,
                money_text(c.income),
                c.occupation,
                c.target_group_id,
                now.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub(crate) fn update_citizen(&self, citizen_id: EntityId, c: &CitizenFields<'_>) -> LedgerResult<()> {
        self.conn.execute(
            "UPDATE citizen
             SET first_name = ?1, last_name = ?2, birth_date = ?3, age = ?4,
                 income = ?5, occupation = ?6, target_group_id = ?7
             WHERE id = ?8",
            params![
                c.first_name,
                c.last_name,
                c.birth_date.format("%Y-%m-%d").to_string(),
                c.age,
                money_text(c.income),
                c.occupation,
                c.target_group_id,
                citizen_id,
            ],
        )?;
        Ok(())
    }

    pub fn get_citizen(&self, citizen_id: EntityId) -> LedgerResult<Option<Citizen>> {
        let sql = format!("SELECT {CITIZEN_COLUMNS} FROM citizen WHERE id = ?1");
        let citizen = self
            .conn
            .query_row(&sql, params![citizen_id], citizen_row)
            .optional()?;
        Ok(citizen)
    }

    pub fn find_citizen_by_national_id(&self, national_id: &str) -> LedgerResult<Option<Citizen>> {
        let sql = format!("SELECT {CITIZEN_COLUMNS} FROM citizen WHERE national_id = ?1");
        let citizen = self
            .conn
            .query_row(&sql, params![national_id], citizen_row)
            .optional()?;
        Ok(citizen)
    }

    pub fn list_citizens(&self) -> LedgerResult<Vec<Citizen>> {
        let sql = format!("SELECT {CITIZEN_COLUMNS} FROM citizen ORDER BY created_at DESC, id DESC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], citizen_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn citizen_count_for_group(&self, target_group_id: GroupId) -> LedgerResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM citizen WHERE target_group_id = ?1",
            params![target_group_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn delete_citizen(&self, citizen_id: EntityId) -> LedgerResult<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM citizen WHERE id = ?1", params![citizen_id])?;
        Ok(deleted)
    }
}
