use std::{env, time::Duration};

use chrono::Utc;
use cnecbiz::{
    config::Config,
    jobs::{run_unpaid_points_scan, run_weekly_withdrawal_report, unpaid_scan_due, weekly_report_due},
    region::RegionalDatabases,
};
use tokio::time::interval;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let dbs = RegionalDatabases::connect(&config).await;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_default();

    let args: Vec<String> = env::args().collect();
    let weekly_once = args.iter().any(|a| a == "--weekly-withdrawal-report");
    let unpaid_once = args.iter().any(|a| a == "--unpaid-points");

    if weekly_once || unpaid_once {
        if weekly_once {
            if let Err(e) = run_weekly_withdrawal_report(&config, &dbs, &http).await {
                error!(?e, "weekly-withdrawal-report job failed");
            }
        }
        if unpaid_once {
            if let Err(e) = run_unpaid_points_scan(&config, &dbs, &http).await {
                error!(?e, "unpaid-points job failed");
            }
        }
        return;
    }

    info!("Worker starting; checking schedules every hour");

    let mut ticker = interval(Duration::from_secs(60 * 60));
    loop {
        ticker.tick().await;
        let now = Utc::now();

        if weekly_report_due(now) {
            if let Err(e) = run_weekly_withdrawal_report(&config, &dbs, &http).await {
                error!(?e, "weekly-withdrawal-report job failed");
            }
        }
        if unpaid_scan_due(now) {
            if let Err(e) = run_unpaid_points_scan(&config, &dbs, &http).await {
                error!(?e, "unpaid-points job failed");
            }
        }
    }
}
