mod config; // brings `config.rs` in as `crate::config`
mod fade;
mod sink;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use softpwm_core::{Level, PinSink, PwmEngine};
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

use crate::config::Settings;
use crate::fade::Fade;
use crate::sink::TraceSink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!("Software PWM fade demo started.");
    let settings = config::load_config().context("loading configuration")?;

    let sink = Arc::new(TraceSink::new(settings.sink.spin_threshold_us));
    let mut engine = PwmEngine::with_config(sink, settings.pwm.engine_config())
        .context("creating PWM engine")?;

    for channel in &settings.channels {
        engine
            .create_channel(channel.id)
            .with_context(|| format!("creating channel {}", channel.id))?;
        engine.set_range(channel.id, settings.fade.range);
        for &pin in &channel.pins {
            engine.assign_pin(channel.id, pin)?;
        }
        info!(channel = channel.id, pins = ?channel.pins, "Channel configured");
    }
    if settings.channels.is_empty() {
        warn!("No channels configured; nothing will be driven.");
    }

    engine.start_all_channels().context("starting channels")?;
    let result = run_fade(&engine, &settings).await;

    info!("Stopping channels...");
    engine.close();
    let sink = engine.sink();
    for pin in settings.all_pins() {
        sink.set_level(pin, Level::Low);
    }
    info!("All pins driven low.");

    result
}

/// Sweeps every channel's data up and down until Ctrl-C.
async fn run_fade(engine: &PwmEngine<TraceSink>, settings: &Settings) -> anyhow::Result<()> {
    let mut fade = Fade::new(settings.fade.range);
    let mut ticker =
        tokio::time::interval(Duration::from_millis(settings.fade.step_interval_ms.max(1)));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let data = fade.step();
                for channel in &settings.channels {
                    engine.set_data(channel.id, data);
                }
            }
            signal = &mut ctrl_c => {
                signal.context("listening for Ctrl-C")?;
                info!(data = fade.value(), "Ctrl-C received.");
                return Ok(());
            }
        }
    }
}
