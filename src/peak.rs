/// Running maximum over all raw samples seen since the last reset.
///
/// The tracked value lives in RAW units; the render step projects it
/// through the active calibration alongside the trace.
#[derive(Debug, Clone, Copy)]
pub struct PeakTracker {
    max_raw: f64,
}

impl PeakTracker {
    /// A fresh tracker starts at the calibration offset, the raw value
    /// that displays as zero. Starting at the decoded minimum instead
    /// would show a bogus negative peak before any load is applied.
    pub fn new(offset: f64) -> Self {
        Self { max_raw: offset }
    }

    /// Fold a batch into the running maximum. Monotonic non-decreasing
    /// between resets.
    pub fn observe(&mut self, batch: &[i16]) {
        for &sample in batch {
            let v = f64::from(sample);
            if v > self.max_raw {
                self.max_raw = v;
            }
        }
    }

    /// Zero the peak indicator: back to the raw equivalent of display
    /// zero, not to negative infinity.
    pub fn reset(&mut self, offset: f64) {
        self.max_raw = offset;
    }

    pub fn value(&self) -> f64 {
        self.max_raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_offset() {
        let peak = PeakTracker::new(42.0);
        assert_eq!(peak.value(), 42.0);
    }

    #[test]
    fn observe_is_monotonic() {
        let mut peak = PeakTracker::new(0.0);
        peak.observe(&[5, 3]);
        assert_eq!(peak.value(), 5.0);
        peak.observe(&[4, -100]);
        assert_eq!(peak.value(), 5.0);
        peak.observe(&[7]);
        assert_eq!(peak.value(), 7.0);
    }

    #[test]
    fn samples_below_offset_leave_peak_alone() {
        let mut peak = PeakTracker::new(100.0);
        peak.observe(&[50, 99]);
        assert_eq!(peak.value(), 100.0);
    }

    #[test]
    fn reset_returns_to_offset_not_minimum() {
        let mut peak = PeakTracker::new(0.0);
        peak.observe(&[-500, 900]);
        assert_eq!(peak.value(), 900.0);
        peak.reset(10.0);
        assert_eq!(peak.value(), 10.0);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let mut peak = PeakTracker::new(1.5);
        peak.observe(&[]);
        assert_eq!(peak.value(), 1.5);
    }
}
