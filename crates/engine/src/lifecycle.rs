use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use common::RunnerCommand;

use crate::strategy_engine::StrategyEngine;

/// Cloneable handle for controlling a running `Runner`.
#[derive(Clone)]
pub struct RunnerHandle {
    command_tx: mpsc::Sender<RunnerCommand>,
}

impl RunnerHandle {
    pub async fn send(&self, cmd: RunnerCommand) {
        let _ = self.command_tx.send(cmd).await;
    }
}

/// Drives a `StrategyEngine` on a fixed interval for live and paper trading.
///
/// The first tick fires immediately. Ticks run inline in the loop, so a
/// slow tick delays the next one and ticks never overlap. Commands are
/// handled between ticks.
pub struct Runner {
    engine: StrategyEngine,
    interval: Duration,
    command_rx: mpsc::Receiver<RunnerCommand>,
    ticks: u64,
}

impl Runner {
    pub fn new(engine: StrategyEngine) -> (Self, RunnerHandle) {
        let (command_tx, command_rx) = mpsc::channel(8);
        let interval = engine.config().tick_interval;

        let runner = Runner {
            engine,
            interval,
            command_rx,
            ticks: 0,
        };

        (runner, RunnerHandle { command_tx })
    }

    /// Run until `Stop` arrives or every handle is dropped. Returns the
    /// engine so callers can inspect its final state.
    pub async fn run(mut self) -> StrategyEngine {
        info!(interval = ?self.interval, "Runner started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.ticks += 1;
                    let outcome = self.engine.run_tick().await;
                    debug!(tick = self.ticks, outcome = ?outcome, "Tick complete");
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(RunnerCommand::Stop) => {
                            info!(ticks = self.ticks, "Runner stopping");
                            break;
                        }
                        None => {
                            warn!("Runner command channel closed, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        self.engine
    }
}
