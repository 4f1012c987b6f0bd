/*
 *  main.rs
 *
 *  CellScope - every gram counts
 *	(c) 2024-25 CellScope authors
 *
 *	TODO:
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use anyhow::{Context, bail};
use clap::{Arg, ArgAction, Command};
use env_logger::Env;
use log::{debug, error, info, warn};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use cellscope::calibration::{Calibration, default_calibration_path};
use cellscope::config::{self, Overrides};
use cellscope::frame::MonoFrame;
use cellscope::monitor::{Monitor, PipelineState};
use cellscope::pacer::FrameClock;
use cellscope::trace::TraceView;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

const DEFAULT_URL: &str = "http://load-cell/load.bin";
const DEFAULT_FPS: u32 = 30;
const DEFAULT_WIDTH: u32 = 128;
const DEFAULT_HEIGHT: u32 = 64;
// full raw i16 span until the user narrows the view in config
const DEFAULT_VIEW_MIN: f64 = -32768.0;
const DEFAULT_VIEW_MAX: f64 = 32767.0;

/// Asynchronously waits for a SIGINT, SIGTERM, or SIGHUP signal.
async fn signal_handler() -> anyhow::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(Arg::new("debug")
        .action(ArgAction::SetTrue)
        .long("debug")
        .short('v')
        .alias("verbose")
        .help("Enable debug log level")
        .required(false))
        .arg(Arg::new("url")
        .short('u')
        .long("url")
        .help("Device stream endpoint")
        .required(false))
        .arg(Arg::new("fps")
        .short('f')
        .long("fps")
        .value_parser(clap::value_parser!(u32))
        .help("Redraw ceiling, frames per second")
        .required(false))
        .arg(Arg::new("capacity")
        .long("capacity")
        .value_parser(clap::value_parser!(usize))
        .help("Raw samples retained for the trace")
        .required(false))
        .arg(Arg::new("width")
        .long("width")
        .value_parser(clap::value_parser!(u32))
        .help("Trace panel width in pixels")
        .required(false))
        .arg(Arg::new("height")
        .long("height")
        .value_parser(clap::value_parser!(u32))
        .help("Trace panel height in pixels")
        .required(false))
        .arg(Arg::new("offset")
        .long("offset")
        .value_parser(clap::value_parser!(f64))
        .help("Apply and persist this calibration offset")
        .required(false))
        .arg(Arg::new("scale")
        .long("scale")
        .value_parser(clap::value_parser!(f64))
        .help("Apply and persist this calibration scale (non-zero)")
        .required(false))
        .arg(Arg::new("config")
        .short('c')
        .long("config")
        .value_parser(clap::value_parser!(PathBuf))
        .help("monitor config file")
        .required(false))
        .arg(Arg::new("headless")
        .long("headless")
        .help("Log readouts only, no terminal trace")
        .action(ArgAction::SetTrue)
        .required(false))
        .arg(Arg::new("dump-config")
        .long("dump-config")
        .help("Print the effective config and exit")
        .action(ArgAction::SetTrue)
        .required(false))
        .after_help("cellscope:\
            \nload-cell monitor\
            \n\n\tStreams raw samples from the device and renders the live\
            \n\ttrace, current value, and peak in the terminal.\
            \n\nSIGNALS:\
            \n\tSIGUSR1 zeroes the peak indicator.")
        .get_matches();

    let debug_enabled = matches.get_flag("debug");
    let headless = matches.get_flag("headless");

    env_logger::Builder::from_env(Env::default().default_filter_or(if debug_enabled {"debug"} else {"info"}))
        .format_timestamp_secs()
        .init();

    info!("{} - every gram counts", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let overrides = Overrides {
        device_url: matches.get_one::<String>("url").cloned(),
        fps: matches.get_one::<u32>("fps").copied(),
        ring_capacity: matches.get_one::<usize>("capacity").copied(),
        display_width: matches.get_one::<u32>("width").copied(),
        display_height: matches.get_one::<u32>("height").copied(),
    };
    let cfg = config::load(matches.get_one::<PathBuf>("config").map(|p| p.as_path()), &overrides)?;

    if matches.get_flag("dump-config") {
        println!("{}", config::dump(&cfg)?);
        return Ok(());
    }

    // Calibration: explicit CLI values are validated, persisted, and take
    // effect immediately; otherwise whatever was stored last time.
    let cal_path = default_calibration_path().context("cannot determine home directory")?;
    let calibration = match (matches.get_one::<f64>("offset"), matches.get_one::<f64>("scale")) {
        (None, None) => Calibration::load(&cal_path),
        (offset, scale) => {
            let stored = Calibration::load(&cal_path);
            let cal = match Calibration::new(
                offset.copied().unwrap_or_else(|| stored.offset()),
                scale.copied().unwrap_or_else(|| stored.scale()),
            ) {
                Ok(cal) => cal,
                Err(e) => bail!("invalid calibration: {}", e),
            };
            cal.store(&cal_path)
                .with_context(|| format!("persisting calibration to {}", cal_path.display()))?;
            info!("calibration persisted: {}", cal);
            cal
        }
    };
    debug!("active calibration: {}", calibration);

    let url = cfg.device_url.clone().unwrap_or_else(|| DEFAULT_URL.to_string());
    let fps = cfg.fps.unwrap_or(DEFAULT_FPS);
    let capacity = cfg.ring_capacity.unwrap_or(cellscope::ring::DEFAULT_CAPACITY);
    let width = cfg.display.as_ref().and_then(|d| d.width).unwrap_or(DEFAULT_WIDTH);
    let height = cfg.display.as_ref().and_then(|d| d.height).unwrap_or(DEFAULT_HEIGHT);
    let view_min = cfg.view.as_ref().and_then(|r| r.min).unwrap_or(DEFAULT_VIEW_MIN);
    let view_max = cfg.view.as_ref().and_then(|r| r.max).unwrap_or(DEFAULT_VIEW_MAX);

    info!("monitoring {} ({} samples, {}x{} @ {}fps)", url, capacity, width, height, fps);

    let monitor = Monitor::spawn(capacity, calibration, url);
    let mut state_rx = monitor.lock().await.subscribe_state();

    // SIGUSR1 zeroes the peak indicator, same as the dashboard's reset button
    #[cfg(unix)]
    {
        let monitor_for_reset = std::sync::Arc::clone(&monitor);
        let mut sigusr1 = signal(SignalKind::user_defined1())?;
        tokio::spawn(async move {
            while sigusr1.recv().await.is_some() {
                monitor_for_reset.lock().await.reset_peak();
                info!("peak indicator zeroed");
            }
        });
    }

    let view = TraceView::new(width, height, view_min, view_max);
    let mut frame = MonoFrame::new(width, height);
    let mut clock = FrameClock::new(fps);
    let poll_duration = Duration::from_millis(5);

    if !headless {
        print!("\x1b[2J"); // start from a clean terminal
    }

    tokio::select! {
        _ = signal_handler() => {
            // logged by the handler; fall through to shutdown
        }

        result = async {
            loop {
                if state_rx.has_changed().unwrap_or(false) {
                    let state = state_rx.borrow_and_update().clone();
                    match state {
                        PipelineState::Streaming => info!("device connected"),
                        PipelineState::Ended => {
                            warn!("device closed the stream; no reconnect policy, exiting");
                            return Ok(());
                        }
                        PipelineState::Failed(e) => {
                            error!("stream failed: {}", e);
                            bail!("stream failed: {}", e);
                        }
                        PipelineState::Idle => {}
                    }
                }

                if clock.frame_due() {
                    let snapshot = monitor.lock().await.take_render();
                    if let Some(snap) = snapshot {
                        frame.clear_frame();
                        view.draw(&mut frame, &snap.samples, &snap.calibration, snap.peak_raw)?;

                        let current = snap
                            .samples
                            .last()
                            .map(|&raw| snap.calibration.display(f64::from(raw)))
                            .unwrap_or(0.0);
                        let peak = snap.calibration.display(snap.peak_raw);
                        if headless {
                            info!("current {:.2}  peak {:.2}", current, peak);
                        } else {
                            print!("\x1b[H{}", frame.to_terminal());
                            std::io::stdout().flush()?;
                            debug!("current {:.2}  peak {:.2}", current, peak);
                        }
                    }
                }

                tokio::time::sleep(poll_duration).await;
            }
        } => {
            result?
        }
    }

    info!("Main application exiting.");
    drop(monitor);

    Ok(())
}
