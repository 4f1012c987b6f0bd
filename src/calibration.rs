use dirs_next::home_dir;
use log::{debug, warn};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for calibration apply/persist.
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("calibration scale must be non-zero")]
    ZeroScale,
    #[error("calibration values must be finite, got offset={offset} scale={scale}")]
    NotFinite { offset: f64, scale: f64 },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Linear display calibration for raw load-cell samples.
///
/// `display(raw) = (raw - offset) / scale`. The transform is a display
/// projection only; stored raw samples are never rewritten, so re-applying
/// a calibration re-projects the whole visible trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    offset: f64,
    scale: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self { offset: 0.0, scale: 1.0 }
    }
}

impl fmt::Display for Calibration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offset={} scale={}", self.offset, self.scale)
    }
}

impl Calibration {
    /// Validated constructor. Zero or non-finite scale never reaches the
    /// display transform, so the render path cannot divide by zero or
    /// propagate NaN into the trace.
    pub fn new(offset: f64, scale: f64) -> Result<Self, CalibrationError> {
        if !offset.is_finite() || !scale.is_finite() {
            return Err(CalibrationError::NotFinite { offset, scale });
        }
        if scale == 0.0 {
            return Err(CalibrationError::ZeroScale);
        }
        Ok(Self { offset, scale })
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Project a raw sample into display units.
    #[inline]
    pub fn display(&self, raw: f64) -> f64 {
        (raw - self.offset) / self.scale
    }

    /// Inverse of [`display`](Self::display).
    #[inline]
    pub fn raw(&self, display: f64) -> f64 {
        display * self.scale + self.offset
    }

    /// Load persisted calibration, falling back to the default for any
    /// entry that is missing or does not parse. Never fails: a broken
    /// file just means default calibration.
    pub fn load(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                debug!("no calibration at {}: {}", path.display(), e);
                return Self::default();
            }
        };

        let mut cal = Self::default();
        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key.trim() {
                "offset" => match value.trim().parse::<f64>() {
                    Ok(v) if v.is_finite() => cal.offset = v,
                    _ => warn!("unparseable calibration offset {:?}, using default", value),
                },
                "scale" => match value.trim().parse::<f64>() {
                    Ok(v) if v.is_finite() && v != 0.0 => cal.scale = v,
                    _ => warn!("unparseable calibration scale {:?}, using default", value),
                },
                other => debug!("ignoring calibration key {:?}", other),
            }
        }
        cal
    }

    /// Persist as two decimal-string entries, same shape the browser
    /// dashboard kept in localStorage.
    pub fn store(&self, path: &Path) -> Result<(), CalibrationError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, format!("offset={}\nscale={}\n", self.offset, self.scale))?;
        Ok(())
    }
}

/// Default on-disk location: `~/.config/cellscope/calibration`.
pub fn default_calibration_path() -> Option<PathBuf> {
    home_dir().map(|h| h.join(".config/cellscope/calibration"))
}
