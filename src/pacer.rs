/*
 *  pacer.rs
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
use std::time::{Duration, Instant};

/// Deadline-based frame clock for the render loop.
pub struct FrameClock {
    next_deadline: Instant,
    frame: Duration,
}

// the HX711 delivers 10-80 SPS but the stream lands in bursts;
// the terminal mirror is comfortable at 30fps
impl FrameClock {
    pub fn new(target_fps: u32) -> Self {
        let frame = Duration::from_micros((1_000_000u32 / target_fps.max(1)) as u64);
        Self { next_deadline: Instant::now(), frame }
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame
    }

    #[inline]
    pub fn set_fps(&mut self, fps: u32) {
        self.frame = Duration::from_micros((1_000_000u32 / fps.max(1)) as u64);
    }

    /// Returns true if a frame is due now; if true, it also schedules the
    /// next deadline.
    #[inline]
    pub fn frame_due(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.next_deadline {
            self.next_deadline = now + self.frame;
            true
        } else {
            false
        }
    }
}

/// Coalesces any number of ingested batches into at most one redraw per
/// display frame.
///
/// Ingestion calls [`mark_dirty`](Self::mark_dirty) once per batch; a mark
/// on an already-pending gate schedules nothing new. The render loop calls
/// [`take_pending`](Self::take_pending) when a frame fires, which clears
/// the flag before the redraw runs, so a batch landing mid-redraw is picked
/// up on the next frame rather than dropped.
#[derive(Debug, Default)]
pub struct RenderGate {
    update_pending: bool,
}

impl RenderGate {
    pub fn new() -> Self {
        Self { update_pending: false }
    }

    #[inline]
    pub fn mark_dirty(&mut self) {
        self.update_pending = true;
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.update_pending
    }

    /// Clear and return the pending flag.
    #[inline]
    pub fn take_pending(&mut self) -> bool {
        std::mem::take(&mut self.update_pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_starts_clear() {
        let mut gate = RenderGate::new();
        assert!(!gate.take_pending());
    }

    #[test]
    fn many_marks_coalesce_to_one_redraw() {
        let mut gate = RenderGate::new();
        for _ in 0..50 {
            gate.mark_dirty();
        }
        assert!(gate.take_pending());
        assert!(!gate.take_pending());
    }

    #[test]
    fn mark_after_take_pends_again() {
        let mut gate = RenderGate::new();
        gate.mark_dirty();
        assert!(gate.take_pending());
        gate.mark_dirty();
        assert!(gate.is_pending());
        assert!(gate.take_pending());
    }

    #[test]
    fn clock_fires_immediately_then_waits() {
        let mut clock = FrameClock::new(30);
        assert!(clock.frame_due());
        // next deadline was just pushed a full frame out
        assert!(!clock.frame_due());
    }

    #[test]
    fn clock_fires_after_a_frame_elapses() {
        let mut clock = FrameClock::new(1000);
        assert!(clock.frame_due());
        std::thread::sleep(Duration::from_millis(3));
        assert!(clock.frame_due());
    }

    #[test]
    fn zero_fps_is_clamped() {
        let clock = FrameClock::new(0);
        assert_eq!(clock.frame_duration(), Duration::from_micros(1_000_000));
    }
}
