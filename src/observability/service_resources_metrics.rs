use crate::helpers::time::now_i64;
use crate::observability::metrics::get_metrics;
use std::time::Duration;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use tokio_util::sync::CancellationToken;
use tracing::warn;

const SCRAPE_INTERVAL: Duration = Duration::from_secs(5);

/// Refresh process gauges until `shutdown` fires.
pub async fn collect_process_metrics(shutdown: CancellationToken) {
    let metrics = get_metrics().await;
    let pid = match sysinfo::get_current_pid() {
        Ok(pid) => pid,
        Err(err) => {
            warn!("process metrics disabled: {}", err);
            return;
        }
    };
    let mut sys = System::new();

    let start_time_unix = now_i64();
    metrics.process_start_time.set(start_time_unix);

    loop {
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            false,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );

        if let Some(proc) = sys.process(pid) {
            metrics.process_cpu_usage.set(proc.cpu_usage().into());
            metrics.process_memory_usage.set(proc.memory() as i64);

            #[cfg(target_family = "unix")]
            {
                if let Ok(entries) = std::fs::read_dir(format!("/proc/{}/fd", pid.as_u32())) {
                    metrics.process_open_fds.set(entries.count() as i64);
                }
            }

            metrics.process_uptime.set(now_i64() - start_time_unix);
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(SCRAPE_INTERVAL) => {}
        }
    }
}
