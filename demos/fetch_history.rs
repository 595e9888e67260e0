//! Fetch activity history from a ZeTime watch
//!
//! Run with: cargo run --example fetch_history

use std::time::Duration;
use zetime_rust_ble::{
    ActivitySample, DeviceEvent, EngineConfig, Result, SessionState, Watch, WatchScanner,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zetime_rust_ble=info".into()),
        )
        .init();

    println!("ZeTime History Download");
    println!("=======================\n");
    println!("Looking for watches...\n");

    let scanner = WatchScanner::new().await?;
    let found = scanner.find_first(Duration::from_secs(15)).await?;
    scanner.stop_scanning().await?;

    let config = EngineConfig::default().with_delete_after_fetch(false);
    let watch = Watch::from_discovery(&found, config);
    println!(
        "Found watch: {} ({})",
        watch.name().unwrap_or("unnamed"),
        watch.identifier()
    );
    println!("Connecting...\n");

    let mut events = watch.subscribe();
    watch.connect(false).await?.wait().await?;
    println!("Connected!\n");

    let start_time = std::time::Instant::now();
    let mut summary_seen = false;

    loop {
        let event = match tokio::time::timeout(Duration::from_secs(30), events.recv()).await {
            Ok(Ok(event)) => event,
            Ok(Err(_)) => break,
            Err(_) => {
                println!("\nNo data for 30 seconds, giving up.");
                break;
            }
        };

        match event {
            DeviceEvent::Battery(info) => println!("Battery: {}%", info.level),
            DeviceEvent::Version(info) => println!("{:?} version: {}", info.kind, info.version),
            DeviceEvent::DataSummary(summary) => {
                summary_seen = true;
                println!(
                    "Pending records: {} steps, {} heart rate, {} sleep\n",
                    summary.steps, summary.heart_rate, summary.sleep
                );
                if summary.is_empty() {
                    break;
                }
            }
            DeviceEvent::Sample(ActivitySample::Steps(s)) => println!(
                "{}  steps {:>6}  kcal {:>4}  {:>5} m",
                s.timestamp, s.steps, s.calories, s.distance_meters
            ),
            DeviceEvent::Sample(ActivitySample::HeartRate(s)) => {
                println!("{}  heart rate {:>3} bpm", s.timestamp, s.bpm)
            }
            DeviceEvent::Sample(ActivitySample::Sleep(s)) => {
                println!("{}  sleep {:?}", s.timestamp, s.kind)
            }
            DeviceEvent::FetchComplete { category } => println!("-- {} done --", category),
            DeviceEvent::SessionStateChanged {
                to: SessionState::Initialized,
                ..
            } if summary_seen && watch.engine().active_fetch().is_none() => break,
            DeviceEvent::SessionStateChanged {
                to: SessionState::Disconnected,
                ..
            } => {
                println!("Watch disconnected.");
                break;
            }
            DeviceEvent::TransactionFailed { name, reason } => {
                println!("{} failed: {}", name, reason)
            }
            _ => {}
        }
    }

    println!("\nFinished in {:.1}s", start_time.elapsed().as_secs_f64());
    watch.disconnect().await?;
    Ok(())
}
