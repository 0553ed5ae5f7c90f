use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

mod config;
mod dedup;
mod error;
mod extract;
mod models;
mod normalize;
mod outlet_pulse;
mod scrapers;
mod sheets;
mod traits;

use config::Config;
use outlet_pulse::OutletPulse;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    info!("Starting outlet-pulse dashboard sync");

    let config = Config::from_env()?;
    let schedule = config.cron_schedule.clone();
    let pulse = OutletPulse::new(config)?;

    // Run once immediately to test
    if let Err(e) = pulse.run_once().await {
        error!("Error during initial sync: {e:#}");
    }

    // Set up scheduler for the daily pass
    let sched = JobScheduler::new().await?;

    let job_pulse = pulse.clone();
    sched
        .add(Job::new_async(schedule.as_str(), move |_uuid, _l| {
            let pulse = job_pulse.clone();
            Box::pin(async move {
                if let Err(e) = pulse.run_once().await {
                    error!("Error during scheduled sync: {e:#}");
                }
            })
        })?)
        .await?;

    info!("Scheduler started with cron '{schedule}'");
    sched.start().await?;

    // Keep the program running
    loop {
        tokio::time::sleep(tokio::time::Duration::from_secs(30)).await;
    }
}
