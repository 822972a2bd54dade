use chrono::NaiveDate;
use tracing::info;

use crate::limits::*;
use crate::model::*;

use super::conflict::check_len;
use super::error::StoreResultExt;
use super::{Engine, EngineError};

fn validate_config(config: &ScheduleConfig) -> Result<(), EngineError> {
    if config.day_of_week > 6 {
        return Err(EngineError::invalid("day of week must be 0 (Sunday) to 6 (Saturday)")
            .with_detail("day_of_week", config.day_of_week));
    }
    if config.is_open && config.open_time >= config.close_time {
        return Err(EngineError::invalid("open time must be before close time")
            .with_detail("open_time", config.open_time)
            .with_detail("close_time", config.close_time));
    }
    if !(0..=MAX_BUFFER_MINUTES).contains(&config.buffer_minutes) {
        return Err(EngineError::invalid("buffer out of range").with_detail("max", MAX_BUFFER_MINUTES));
    }
    Ok(())
}

impl Engine {
    /// Replace the weekly row for `config.day_of_week`.
    pub async fn upsert_schedule_config(
        &self,
        admin_user_id: Id,
        config: ScheduleConfig,
    ) -> Result<ScheduleConfig, EngineError> {
        self.require_admin(admin_user_id).await?;
        validate_config(&config)?;
        let saved = self
            .repos
            .schedule
            .upsert_schedule_config(config)
            .await
            .context("save schedule config")?;
        info!(
            "schedule day {}: {} {}-{} buffer {}",
            saved.day_of_week,
            if saved.is_open { "open" } else { "closed" },
            saved.open_time,
            saved.close_time,
            saved.buffer_minutes
        );
        Ok(saved)
    }

    /// Weekly rows ordered by day.
    pub async fn list_schedule(&self) -> Result<Vec<ScheduleConfig>, EngineError> {
        let mut rows = self
            .repos
            .schedule
            .list_schedule_configs()
            .await
            .context("list schedule configs")?;
        rows.sort_by_key(|c| c.day_of_week);
        Ok(rows)
    }

    /// Close a whole date. Adding a date twice updates its reason.
    pub async fn add_blackout(
        &self,
        admin_user_id: Id,
        date: NaiveDate,
        reason: Option<String>,
    ) -> Result<ScheduleBlackout, EngineError> {
        self.require_admin(admin_user_id).await?;
        if let Some(r) = &reason {
            check_len("reason", r, MAX_REASON_LEN)?;
        }
        let blackout = self
            .repos
            .schedule
            .add_blackout(date, reason)
            .await
            .context("add blackout")?;
        info!("blackout added for {date}");
        Ok(blackout)
    }

    pub async fn remove_blackout(&self, admin_user_id: Id, date: NaiveDate) -> Result<(), EngineError> {
        self.require_admin(admin_user_id).await?;
        let removed = self
            .repos
            .schedule
            .remove_blackout(date)
            .await
            .context("remove blackout")?;
        if !removed {
            return Err(EngineError::not_exist("no blackout on that date").with_detail("date", date));
        }
        info!("blackout removed for {date}");
        Ok(())
    }

    pub async fn list_blackouts(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<ScheduleBlackout>, EngineError> {
        if from > to {
            return Err(EngineError::invalid("range start is after range end")
                .with_detail("from", from)
                .with_detail("to", to));
        }
        self.repos
            .schedule
            .list_blackouts(from, to)
            .await
            .context("list blackouts")
    }
}
