// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Motor shield bring-up check.
//!
//! Ramps both wheels from 20% to 100% in opposite directions, swapping directions every step,
//! then runs each wheel alone at half power. Watch the wheels, not the log.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use rppal::gpio::Gpio;
use rppal::hal::Delay;
use rppal::i2c::I2c;
use tracing::info;
use tracing_subscriber::EnvFilter;

use followbot::config::Config;
use followbot::drivers::Pca9685;
use followbot::motors::{Direction, Side, WheelMotors};

/// Exercise both wheels of the motor shield.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// TOML configuration file (only the `[board]` table is used)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sound the buzzer before moving
    #[arg(long)]
    beep: bool,
}

const RAMP_STEP: Duration = Duration::from_millis(1500);
const SOLO_RUN: Duration = Duration::from_secs(2);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "motor_check=info,followbot=info".into()),
        )
        .init();

    let args = Args::parse();
    let board = match &args.config {
        Some(path) => {
            Config::load(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?
                .board
        }
        None => Config::default().board,
    };

    let i2c = I2c::with_bus(board.i2c_bus)
        .with_context(|| format!("opening I2C bus {}", board.i2c_bus))?;
    let gpio = Gpio::new().context("opening GPIO")?;
    let left = gpio
        .get(board.left.direction_pin)
        .context("claiming left direction pin")?
        .into_output();
    let right = gpio
        .get(board.right.direction_pin)
        .context("claiming right direction pin")?
        .into_output();

    let mut motors = WheelMotors::new(Pca9685::new(i2c, board.pwm_address), left, right, &board);
    motors
        .init(&mut Delay::new())
        .context("initializing motor shield")?;

    if args.beep {
        motors.set_buzzer(true)?;
        thread::sleep(Duration::from_millis(500));
        motors.set_buzzer(false)?;
    }

    let mut flip = false;
    for percent in (20..=100).step_by(20) {
        let power = percent as f32 / 100.0;
        let (left_dir, right_dir) = if flip {
            (Direction::Backward, Direction::Forward)
        } else {
            (Direction::Forward, Direction::Backward)
        };

        info!(percent, ?left_dir, ?right_dir, "ramp");
        motors.set_wheel_power(Side::Left, left_dir, power)?;
        motors.set_wheel_power(Side::Right, right_dir, power)?;

        flip = !flip;
        thread::sleep(RAMP_STEP);
    }

    motors.stop_all()?;
    thread::sleep(Duration::from_secs(1));

    for side in Side::BOTH {
        info!(?side, "solo run at 50%");
        motors.set_wheel_power(side, Direction::Forward, 0.5)?;
        thread::sleep(SOLO_RUN);
        motors.stop(side)?;
        thread::sleep(Duration::from_millis(500));
    }

    motors.free();
    info!("motor check complete");
    Ok(())
}
