//! Per-stage progress counts.

use crate::database::Database;
use crate::error::DbResult;
use rusqlite::params;
use vitae_core::{Eligibility, Stage, StageCounts};

impl Database {
    /// Completed, pending, failing and dead-lettered counts for one stage.
    pub fn stage_counts(&self, stage: Stage) -> DbResult<StageCounts> {
        let pending = self.count_eligible(stage.as_str(), &Eligibility::for_stage(stage))?;

        let conn = self.conn()?;
        let completed = conn.query_row(
            "SELECT COUNT(DISTINCT file_id) FROM stage_results WHERE process = ?1",
            params![stage.as_str()],
            |row| row.get(0),
        )?;
        let (failing, dead_lettered) = conn.query_row(
            "SELECT COALESCE(SUM(dead_lettered = 0), 0), COALESCE(SUM(dead_lettered = 1), 0)
             FROM stage_failures WHERE stage = ?1",
            params![stage.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(StageCounts {
            completed,
            pending,
            failing,
            dead_lettered,
        })
    }
}
