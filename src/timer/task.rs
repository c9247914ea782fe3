/*!
 * Timer Task
 *
 * Background loop that drives the kernel forward. Three independently
 * configured intervals feed it: the device sweep (one clock tick), the
 * interrupt dispatch pass and the scheduling watchdog. A fourth, slower
 * interval logs queue status.
 *
 * # Shutdown
 *
 * Call `shutdown().await` to stop the loop and wait for it. Dropping the
 * handle without it aborts the task and logs a warning.
 */

use super::clock::Timer;
use crate::config::TimerConfig;
use crate::interrupt::InterruptManager;
use crate::monitoring::timer_span;
use crate::process::Scheduler;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn, Instrument};

/// Control messages for the timer task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    /// Stop ticking; commands are still served
    Pause,
    Resume,
    /// Run one device sweep immediately
    TickNow,
    Shutdown,
}

/// Handle to the timer background task
pub struct TimerTask {
    command_tx: mpsc::UnboundedSender<TimerCommand>,
    handle: Option<tokio::task::JoinHandle<()>>,
    shutdown_initiated: Arc<AtomicBool>,
}

struct Drivers {
    timer: Arc<Timer>,
    interrupts: Arc<InterruptManager>,
    scheduler: Arc<Scheduler>,
}

impl TimerTask {
    /// Spawn the loop on the current tokio runtime
    pub fn spawn(
        config: &TimerConfig,
        timer: Arc<Timer>,
        interrupts: Arc<InterruptManager>,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let config = config.clone();
        let drivers = Drivers {
            timer,
            interrupts,
            scheduler,
        };

        let handle = tokio::spawn(async move {
            run_timer_loop(config, drivers, command_rx).await;
        });
        info!("Timer task spawned");

        Self {
            command_tx,
            handle: Some(handle),
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn pause(&self) {
        let _ = self.command_tx.send(TimerCommand::Pause);
    }

    pub fn resume(&self) {
        let _ = self.command_tx.send(TimerCommand::Resume);
    }

    pub fn tick_now(&self) {
        let _ = self.command_tx.send(TimerCommand::TickNow);
    }

    /// Stop the loop and wait for it to finish
    pub async fn shutdown(mut self) {
        self.shutdown_initiated.store(true, Ordering::SeqCst);
        let _ = self.command_tx.send(TimerCommand::Shutdown);

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Timer task shutdown error: {}", e);
            } else {
                info!("Timer task shutdown complete");
            }
        }
    }
}

fn periodic(period: Duration) -> Interval {
    let mut interval = interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn run_timer_loop(
    config: TimerConfig,
    drivers: Drivers,
    mut command_rx: mpsc::UnboundedReceiver<TimerCommand>,
) {
    let mut sweep = periodic(config.device_sweep_period);
    let mut dispatch = periodic(config.dispatch_period);
    let mut watchdog = periodic(config.watchdog_period);
    let mut status = periodic(config.status_period);
    let mut active = true;

    info!(
        sweep_ms = config.device_sweep_period.as_millis() as u64,
        dispatch_ms = config.dispatch_period.as_millis() as u64,
        watchdog_ms = config.watchdog_period.as_millis() as u64,
        "Timer loop started"
    );

    loop {
        tokio::select! {
            _ = sweep.tick() => {
                if active {
                    sweep_once(&drivers.timer);
                }
            }

            _ = dispatch.tick() => {
                if active {
                    let interrupts = drivers.interrupts.clone();
                    let span = timer_span("dispatch", drivers.timer.current_time());
                    let handled = tokio::task::spawn_blocking(move || interrupts.dispatch_pass())
                        .instrument(span)
                        .await;
                    match handled {
                        Ok(Some(handled)) => trace!(interrupt_id = handled.interrupt.id, "dispatched"),
                        Ok(None) => {}
                        Err(e) => warn!("Interrupt dispatch failed: {}", e),
                    }
                }
            }

            _ = watchdog.tick() => {
                if active {
                    if let Some(process) = drivers.scheduler.watchdog() {
                        debug!(pid = process.pid, "watchdog scheduled process");
                    }
                }
            }

            _ = status.tick() => {
                if active {
                    drivers.scheduler.log_queue_status();
                }
            }

            Some(cmd) = command_rx.recv() => {
                match cmd {
                    TimerCommand::Pause => {
                        info!("Timer task paused");
                        active = false;
                    }
                    TimerCommand::Resume => {
                        info!("Timer task resumed");
                        active = true;
                    }
                    TimerCommand::TickNow => sweep_once(&drivers.timer),
                    TimerCommand::Shutdown => {
                        info!("Timer task shutting down");
                        break;
                    }
                }
            }

            else => break,
        }
    }
}

fn sweep_once(timer: &Timer) {
    let span = timer_span("sweep", timer.current_time());
    let _guard = span.enter();
    if let Some(report) = timer.tick() {
        if !report.reclaimed.is_empty() {
            info!(
                tick = report.tick,
                reclaimed = report.reclaimed.len(),
                "device sweep reclaimed devices"
            );
        }
    }
}

impl Drop for TimerTask {
    fn drop(&mut self) {
        if self.shutdown_initiated.load(Ordering::SeqCst) {
            return;
        }

        if let Some(handle) = self.handle.take() {
            warn!("TimerTask dropped without calling shutdown() - aborting task");
            handle.abort();
        }
    }
}
