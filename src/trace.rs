//! Scrolling load trace widget for `embedded-graphics` targets.

use embedded_graphics::{
    mono_font::{MonoTextStyle, ascii::FONT_6X10},
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{Line, Primitive, PrimitiveStyle},
    text::Text,
};

use crate::calibration::Calibration;

/// Height of the readout strip (one FONT_6X10 row plus a separator line).
const READOUT_H: i32 = 11;

/// Geometry and projection for the live trace.
///
/// The trace shows the newest samples right-aligned, one pixel column per
/// sample, capped at the panel width - the same cap the device dashboard
/// applied via its SVG viewBox.
#[derive(Debug, Clone)]
pub struct TraceView {
    width: u32,
    height: u32,
    /// Display-unit value mapped to the bottom of the trace area.
    pub view_min: f64,
    /// Display-unit value mapped to the top of the trace area.
    pub view_max: f64,
}

impl TraceView {
    pub fn new(width: u32, height: u32, view_min: f64, view_max: f64) -> Self {
        Self { width, height, view_min, view_max }
    }

    fn trace_area_top(&self) -> i32 {
        READOUT_H + 1
    }

    fn trace_area_height(&self) -> i32 {
        self.height as i32 - self.trace_area_top()
    }

    /// Project one display-unit value to a pixel row, clamped to the
    /// trace area.
    fn y_for(&self, display_value: f64) -> i32 {
        let span = self.view_max - self.view_min;
        let norm = if span != 0.0 {
            (display_value - self.view_min) / span
        } else {
            0.5
        };
        let h = (self.trace_area_height() - 1) as f64;
        let y = self.height as i64 - 1 - (norm.clamp(0.0, 1.0) * h).round() as i64;
        y as i32
    }

    /// Compute the polyline for a snapshot, oldest to newest, newest at
    /// the right edge. At most one point per pixel column.
    pub fn trace_points(&self, samples: &[i16], cal: &Calibration) -> Vec<Point> {
        let visible = samples.len().min(self.width as usize);
        let tail = &samples[samples.len() - visible..];
        let x0 = self.width as i32 - visible as i32;
        tail.iter()
            .enumerate()
            .map(|(i, &raw)| Point::new(x0 + i as i32, self.y_for(cal.display(f64::from(raw)))))
            .collect()
    }

    /// Draws the readouts and the trace onto a given DrawTarget.
    ///
    /// Everything shown passes through the SAME calibration read at this
    /// moment, so a calibration change re-projects the whole visible
    /// trace on the next frame.
    pub fn draw<D>(
        &self,
        display: &mut D,
        samples: &[i16],
        cal: &Calibration,
        peak_raw: f64,
    ) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        let text_style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);

        // --- Readout strip ---
        let current = samples
            .last()
            .map(|&raw| cal.display(f64::from(raw)))
            .unwrap_or(0.0);
        let readout = format!("{:>8.2}  pk {:>8.2}", current, cal.display(peak_raw));
        Text::new(&readout, Point::new(1, 8), text_style).draw(display)?;

        Line::new(
            Point::new(0, READOUT_H - 1),
            Point::new(self.width as i32 - 1, READOUT_H - 1),
        )
        .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
        .draw(display)?;

        // --- Trace ---
        let points = self.trace_points(samples, cal);
        if points.len() == 1 {
            display.draw_iter([Pixel(points[0], BinaryColor::On)])?;
        }
        let line_style = PrimitiveStyle::with_stroke(BinaryColor::On, 1);
        for pair in points.windows(2) {
            Line::new(pair[0], pair[1]).into_styled(line_style).draw(display)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::MonoFrame;

    fn view() -> TraceView {
        TraceView::new(128, 64, -100.0, 100.0)
    }

    #[test]
    fn newest_sample_sits_at_right_edge() {
        let cal = Calibration::default();
        let samples: Vec<i16> = (0..10).collect();
        let points = view().trace_points(&samples, &cal);
        assert_eq!(points.len(), 10);
        assert_eq!(points.last().unwrap().x, 127);
        assert_eq!(points.first().unwrap().x, 118);
    }

    #[test]
    fn trace_is_capped_at_panel_width() {
        let cal = Calibration::default();
        let samples: Vec<i16> = vec![0; 300];
        let points = view().trace_points(&samples, &cal);
        assert_eq!(points.len(), 128);
        assert_eq!(points.first().unwrap().x, 0);
    }

    #[test]
    fn values_project_through_calibration() {
        let cal = Calibration::new(10.0, 2.0).unwrap();
        let v = view();
        // raw 30 displays as 10.0; raw 10 displays as 0.0 (the midline)
        let points = v.trace_points(&[10, 30], &cal);
        let mid = v.y_for(0.0);
        assert_eq!(points[0].y, mid);
        assert!(points[1].y < mid, "larger display value must sit higher");
    }

    #[test]
    fn out_of_view_values_clamp_to_area() {
        let cal = Calibration::default();
        let v = view();
        let points = v.trace_points(&[i16::MAX, i16::MIN], &cal);
        assert_eq!(points[0].y, v.trace_area_top());
        assert_eq!(points[1].y, 63);
    }

    #[test]
    fn draw_lights_pixels_on_an_empty_frame() {
        let mut frame = MonoFrame::new(128, 64);
        let cal = Calibration::default();
        view().draw(&mut frame, &[0, 10, -10, 25], &cal, 25.0).unwrap();
        assert!(frame.lit() > 0);
    }

    #[test]
    fn draw_with_no_samples_still_renders_readouts() {
        let mut frame = MonoFrame::new(128, 64);
        let cal = Calibration::default();
        view().draw(&mut frame, &[], &cal, 0.0).unwrap();
        // separator line alone is a full row of pixels
        assert!(frame.lit() >= 128);
    }
}
