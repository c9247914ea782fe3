/*!
 * MyOS Kernel - Main Entry Point
 *
 * Boots the simulated kernel, admits an init process and runs the timer
 * loop until Ctrl+C.
 */

use anyhow::Context;
use myos_kernel::{init_tracing, Kernel, KernelConfig};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("MyOS kernel starting...");
    info!("================================================");

    let config = KernelConfig::from_env().context("invalid kernel configuration")?;
    info!(
        total_memory = config.memory.total_memory,
        page_size = config.memory.page_size,
        policy = ?config.scheduler.policy,
        "Configuration loaded"
    );

    let kernel = Kernel::with_config(config).context("failed to assemble kernel")?;

    let (init, admission) = kernel.create_process("init", 0, kernel.config().memory.page_size);
    info!(pid = init.pid, ?admission, "init process admitted");
    kernel.schedule();

    kernel.start_timer();
    info!("Kernel initialization complete");
    info!("================================================");
    info!("Press Ctrl+C to exit");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    info!("Shutdown requested");
    kernel.stop_timer().await;
    if !kernel.check_invariants() {
        warn!("Kernel invariants violated at shutdown");
    }
    info!(stats = ?kernel.scheduler().stats(), "Kernel stopped");
    Ok(())
}
