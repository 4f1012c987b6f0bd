//! Core pipeline for the CellScope load-cell dashboard: stream decoding,
//! the sample ring, calibration, peak tracking, and frame-coalesced
//! rendering. The binaries in `src/main.rs` and `src/bin/` are thin
//! shells over these modules.

pub mod calibration;
pub mod config;
pub mod frame;
pub mod monitor;
pub mod pacer;
pub mod peak;
pub mod ring;
pub mod stream;
pub mod trace;
