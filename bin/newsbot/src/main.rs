use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use backtest::{Backtest, PriceSeries, SimulatedBroker, SimulatedClock};
use common::{Clock, Config, RunnerCommand, TradingMode};
use engine::{AlpacaClient, HttpClassifier, OrderExecutor, Runner, StrategyEngine, WallClock};
use strategy::{SentimentSignal, StrategyFileConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("loading environment config")?;
    let strategy_cfg = StrategyFileConfig::load(&cfg.strategy_config_path)
        .context("loading strategy config")?
        .strategy;
    info!(
        mode = %cfg.trading_mode,
        symbol = %strategy_cfg.symbol,
        cash_at_risk = strategy_cfg.cash_at_risk,
        "Newsbot starting"
    );

    // ── Collaborators ─────────────────────────────────────────────────────────
    // News always comes from Alpaca, backtests included
    let alpaca = Arc::new(
        AlpacaClient::new(
            &cfg.alpaca_api_key,
            &cfg.alpaca_api_secret,
            &cfg.alpaca_trading_url,
            &cfg.alpaca_data_url,
        )
        .context("building Alpaca client")?,
    );
    let classifier = Arc::new(
        HttpClassifier::new(&cfg.sentiment_url).context("building sentiment client")?,
    );
    let signal = SentimentSignal::new(alpaca.clone(), classifier);

    match cfg.trading_mode {
        TradingMode::Live | TradingMode::Paper => {
            info!(url = %cfg.alpaca_trading_url, "Trading through Alpaca");
            let clock: Arc<dyn Clock> = Arc::new(WallClock);
            let engine = StrategyEngine::new(
                strategy_cfg,
                alpaca.clone(),
                signal,
                OrderExecutor::new(alpaca),
                clock,
            );

            let (runner, handle) = Runner::new(engine);
            let task = tokio::spawn(runner.run());

            info!("Runner started. Waiting for shutdown signal.");
            tokio::signal::ctrl_c()
                .await
                .context("listening for shutdown signal")?;
            info!("Shutdown signal received. Stopping runner.");
            handle.send(RunnerCommand::Stop).await;

            let engine = task.await.context("runner task panicked")?;
            info!(last_action = %engine.last_action(), "Exited");
        }

        TradingMode::Backtest => {
            info!(
                start = %cfg.backtest_start,
                end = %cfg.backtest_end,
                cash = cfg.backtest_initial_cash,
                prices = %cfg.backtest_prices_path,
                "Backtesting"
            );
            let prices = PriceSeries::load_csv(&cfg.backtest_prices_path)
                .context("loading backtest prices")?;
            let broker = Arc::new(SimulatedBroker::new(
                cfg.backtest_initial_cash,
                cfg.paper_slippage_bps,
            ));
            let start = cfg
                .backtest_start
                .and_hms_opt(0, 0, 0)
                .context("backtest start time")?
                .and_utc();
            let clock = SimulatedClock::new(start);

            let engine = StrategyEngine::new(
                strategy_cfg,
                broker.clone(),
                signal,
                OrderExecutor::new(broker.clone()),
                Arc::new(clock.clone()),
            );
            let summary = Backtest::new(
                engine,
                broker,
                clock,
                prices,
                cfg.backtest_start,
                cfg.backtest_end,
            )
            .context("setting up backtest")?
            .run()
            .await
            .context("running backtest")?;

            let initial = cfg.backtest_initial_cash;
            info!(
                ticks = summary.ticks,
                entries = summary.entries,
                final_value = summary.final_value,
                return_pct = (summary.final_value - initial) / initial * 100.0,
                "Backtest complete"
            );
        }
    }

    Ok(())
}
