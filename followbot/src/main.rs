// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::Parser;
use rppal::gpio::{Gpio, OutputPin};
use rppal::hal::Delay;
use rppal::i2c::I2c;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use followbot::config::Config;
use followbot::control::{Released, ShutdownError, TrackingController};
use followbot::drivers::Pca9685;
use followbot::hw::BoardConfig;
use followbot::motors::WheelMotors;
use followbot::vision::{feed_frames, ChannelSensor};

/// Follow the largest block of the locked colour signature, reading frames from stdin.
///
/// One block per line as `signature x y width height`; a blank line ends each frame.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many seconds instead of at end of input
    #[arg(short, long)]
    seconds: Option<u64>,

    /// How long to wait for the tracking loop to stop the wheels
    #[arg(long, default_value_t = 3000)]
    shutdown_timeout_ms: u64,
}

type Wheels = WheelMotors<I2c, OutputPin>;

fn open_wheels(board: &BoardConfig) -> anyhow::Result<Wheels> {
    let i2c = I2c::with_bus(board.i2c_bus)
        .with_context(|| format!("opening I2C bus {}", board.i2c_bus))?;

    let gpio = Gpio::new().context("opening GPIO")?;
    let left = gpio
        .get(board.left.direction_pin)
        .with_context(|| format!("claiming left direction pin {}", board.left.direction_pin))?
        .into_output();
    let right = gpio
        .get(board.right.direction_pin)
        .with_context(|| format!("claiming right direction pin {}", board.right.direction_pin))?
        .into_output();

    let mut wheels = WheelMotors::new(Pca9685::new(i2c, board.pwm_address), left, right, board);
    wheels
        .init(&mut Delay::new())
        .context("initializing motor shield")?;

    Ok(wheels)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "followbot=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };

    let wheels = open_wheels(&config.board)?;

    let (frames, sensor) = ChannelSensor::channel();
    let feed = thread::Builder::new()
        .name("block-feed".into())
        .spawn(move || feed_frames(io::stdin().lock(), &frames))
        .context("spawning block feed")?;

    let handle = TrackingController::new(sensor, wheels, config.tracking)
        .run()
        .context("starting tracking loop")?;

    let deadline = args.seconds.map(|s| Instant::now() + Duration::from_secs(s));
    while !feed.is_finished()
        && !handle.is_finished()
        && deadline.map_or(true, |d| Instant::now() < d)
    {
        thread::sleep(Duration::from_millis(50));
    }

    let timeout = Duration::from_millis(args.shutdown_timeout_ms);
    let released = match handle.shutdown(timeout) {
        Ok(released) => released,
        Err(ShutdownError::TimedOut(handle)) => {
            warn!("waiting once more for the tracking loop");
            match handle.shutdown(timeout) {
                Ok(released) => released,
                Err(e) => bail!("{e}; wheels may still be powered"),
            }
        }
        Err(e @ ShutdownError::Panicked) => bail!("{e}"),
    };

    let Released { drive, .. } = released;
    drive.free();

    // The feed may still be blocked reading stdin
    if feed.is_finished() {
        match feed.join() {
            Ok(Ok(frames)) => info!(frames, "block feed finished"),
            Ok(Err(e)) => warn!(error = %e, "block feed failed"),
            Err(_) => warn!("block feed panicked"),
        }
    }

    info!("followbot stopped");
    Ok(())
}
