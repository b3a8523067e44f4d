// Journal upkeep: VACUUM on a cron schedule (local time) or a fixed interval.
// Pruning itself happens in the journal writer after each flush.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{info, instrument, warn};

use crate::config::JournalConfig;
use crate::journal::Journal;

/// Fallback wait when a cron expression has no upcoming fire time.
const IDLE_RECHECK: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub enum VacuumSchedule {
    Cron(Box<cron::Schedule>),
    Every(Duration),
}

impl VacuumSchedule {
    pub fn from_config(config: &JournalConfig) -> anyhow::Result<Self> {
        match &config.vacuum_schedule {
            Some(expr) => {
                let schedule = cron::Schedule::from_str(expr)
                    .map_err(|e| anyhow::anyhow!("invalid vacuum_schedule {:?}: {}", expr, e))?;
                Ok(VacuumSchedule::Cron(Box::new(schedule)))
            }
            None => Ok(VacuumSchedule::Every(Duration::from_secs(
                config.vacuum_interval_secs,
            ))),
        }
    }

    /// Time to wait from `now` until the next VACUUM.
    pub fn next_delay(&self, now: DateTime<Local>) -> Duration {
        match self {
            VacuumSchedule::Every(d) => *d,
            VacuumSchedule::Cron(schedule) => match schedule.after(&now).next() {
                Some(next) => (next - now).to_std().unwrap_or(Duration::from_secs(1)),
                None => IDLE_RECHECK,
            },
        }
    }
}

/// Spawns the maintenance task. Runs until aborted.
pub fn spawn(journal: Arc<Journal>, schedule: VacuumSchedule) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(journal, schedule))
}

#[instrument(skip_all, fields(task = "maintenance"))]
async fn run(journal: Arc<Journal>, schedule: VacuumSchedule) {
    loop {
        tokio::time::sleep(schedule.next_delay(Local::now())).await;
        if let Err(e) = journal.vacuum().await {
            warn!(error = %e, "vacuum failed");
        } else {
            info!("vacuum complete");
        }
    }
}
