use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use pb_domain::config::Config;
use pb_domain::trace::TraceEvent;

use crate::api::devices::{status_message, DeviceStatus};
use crate::bootstrap;
use crate::cli::DevicesCommand;
use crate::runtime::registration;
use crate::runtime::scheduler::PollingScheduler;

pub async fn run(config: Config, command: DevicesCommand) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(Arc::new(config))?;

    match command {
        DevicesCommand::List { json } => {
            let devices = pb_catalog::blocking(&state.catalog, |c| c.list_devices())
                .await
                .context("listing devices")?;
            if json {
                let view: Vec<DeviceStatus> = devices.iter().map(DeviceStatus::from).collect();
                println!("{}", serde_json::to_string_pretty(&view)?);
                return Ok(());
            }
            if devices.is_empty() {
                println!("No devices registered.");
                return Ok(());
            }
            println!("{:>6}  {:<32}  {:>6}  STATUS", "DEVICE", "ADDRESS", "POINTS");
            for device in &devices {
                println!(
                    "{:>6}  {:<32}  {:>6}  {}",
                    device.device_no,
                    device.address,
                    device.point_count,
                    status_message(device)
                );
            }
        }
        DevicesCommand::Register { device_no, address } => {
            let reg = registration::register(&state, device_no, address.trim())
                .await
                .with_context(|| format!("registering device {device_no}"))?;
            println!(
                "Registered PLC {} at {}: {} point(s), heartbeat {}, link {}, liveness {}",
                reg.device_no,
                reg.address,
                reg.points_registered,
                reg.heartbeat_point.as_deref().unwrap_or("none"),
                reg.link_status,
                reg.liveness_status,
            );
        }
        DevicesCommand::Remove { device_no } => {
            let report = pb_catalog::blocking(&state.catalog, move |c| c.remove_device(device_no))
                .await
                .with_context(|| format!("removing device {device_no}"))?;
            TraceEvent::DeviceRemoved {
                device_no,
                devices_removed: report.devices_removed,
                points_removed: report.points_removed,
            }
            .emit();
            println!(
                "Removed PLC {device_no}: {} device row(s), {} point(s)",
                report.devices_removed, report.points_removed
            );
        }
        DevicesCommand::Reconcile => {
            let scheduler = PollingScheduler::new(
                state.catalog.clone(),
                state.reconciler(),
                state.config.polling.interval(),
                state.scheduler.clone(),
            );
            let summary = scheduler.sweep(&CancellationToken::new()).await;
            println!(
                "Reconciled {} of {} device(s), {} failed",
                summary.reconciled, summary.devices, summary.failed
            );
        }
    }

    Ok(())
}
