/*
 *  cellscope-emulator.rs
 *
 *  CellScope - every gram counts
 *	(c) 2024-25 CellScope authors
 *
 *	Stands in for the load-cell device: answers GET /load.bin the way the
 *	firmware does and streams synthetic samples so the monitor can be
 *	exercised without hardware.
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

use clap::{Arg, ArgAction, Command};
use env_logger::Env;
use log::{debug, info, warn};
use rand::Rng;
use std::f64::consts::TAU;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// the firmware flushes its 8-sample buffer as soon as it has data,
// so the wire sees small frequent bursts
const BURST_INTERVAL: Duration = Duration::from_millis(100);
const STREAM_HEADER: &[u8] = b"HTTP/1.1 200 OK\r\n\
Content-Type: application/octet-stream\r\n\
Access-Control-Allow-Origin: *\r\n\
Connection: close\r\n\r\n";
const NOT_FOUND: &[u8] = b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n";
const BAD_METHOD: &[u8] = b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n";

#[derive(Clone, Copy)]
struct Signal {
    rate: u32,
    amplitude: f64,
    period_secs: f64,
}

impl Signal {
    /// Synthetic load: a slow sine "press" with sensor noise on top.
    fn sample(&self, t: f64) -> i16 {
        let clean = self.amplitude * (TAU * t / self.period_secs).sin();
        let noise = rand::rng().random_range(-24.0..24.0);
        (clean + noise).clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
    }
}

async fn serve_client(mut socket: TcpStream, peer: String, signal: Signal) {
    // one small read is enough for the GET requests we answer
    let mut request = [0u8; 1024];
    let n = match socket.read(&mut request).await {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let head = String::from_utf8_lossy(&request[..n]);
    let mut parts = head.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("");

    if path != "/load.bin" {
        debug!("{}: {} {} -> 404", peer, method, path);
        let _ = socket.write_all(NOT_FOUND).await;
        return;
    }
    if method != "GET" {
        debug!("{}: {} /load.bin -> 405", peer, method);
        let _ = socket.write_all(BAD_METHOD).await;
        return;
    }

    if socket.write_all(STREAM_HEADER).await.is_err() {
        return;
    }
    let _ = socket.set_nodelay(true);
    info!("{}: streaming at {} SPS", peer, signal.rate);

    let per_burst = ((signal.rate as f64 * BURST_INTERVAL.as_secs_f64()).round() as usize).max(1);
    let dt = 1.0 / signal.rate as f64;
    let mut t = 0.0f64;
    let mut ticker = tokio::time::interval(BURST_INTERVAL);

    loop {
        ticker.tick().await;
        let mut burst = Vec::with_capacity(per_burst * 2);
        for _ in 0..per_burst {
            burst.extend_from_slice(&signal.sample(t).to_le_bytes());
            t += dt;
        }
        if socket.write_all(&burst).await.is_err() {
            info!("{}: client gone", peer);
            return;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = Command::new("cellscope-emulator")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Fake load-cell device streaming synthetic samples")
        .arg(Arg::new("debug")
        .action(ArgAction::SetTrue)
        .long("debug")
        .short('v')
        .help("Enable debug log level")
        .required(false))
        .arg(Arg::new("port")
        .short('p')
        .long("port")
        .value_parser(clap::value_parser!(u16))
        .default_value("8080")
        .help("Listen port")
        .required(false))
        .arg(Arg::new("rate")
        .short('r')
        .long("rate")
        .value_parser(clap::value_parser!(u32).range(1..=10_000))
        .default_value("80")
        .help("Samples per second")
        .required(false))
        .arg(Arg::new("amplitude")
        .short('a')
        .long("amplitude")
        .value_parser(clap::value_parser!(f64))
        .default_value("12000")
        .help("Peak raw amplitude of the synthetic press")
        .required(false))
        .arg(Arg::new("period")
        .long("period")
        .value_parser(clap::value_parser!(f64))
        .default_value("8.0")
        .help("Seconds per press cycle")
        .required(false))
        .get_matches();

    let debug_enabled = matches.get_flag("debug");
    env_logger::Builder::from_env(Env::default().default_filter_or(if debug_enabled {"debug"} else {"info"}))
        .format_timestamp_secs()
        .init();

    let port = *matches.get_one::<u16>("port").expect("defaulted");
    let signal = Signal {
        rate: *matches.get_one::<u32>("rate").expect("defaulted"),
        amplitude: *matches.get_one::<f64>("amplitude").expect("defaulted"),
        period_secs: matches.get_one::<f64>("period").expect("defaulted").max(0.1),
    };

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("emulated load-cell on http://0.0.0.0:{}/load.bin", port);

    loop {
        match listener.accept().await {
            Ok((socket, addr)) => {
                tokio::spawn(serve_client(socket, addr.to_string(), signal));
            }
            Err(e) => warn!("accept failed: {}", e),
        }
    }
}
