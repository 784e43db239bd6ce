//! Sample points and the rules that produce them.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A moment (seconds) or position (frame index) chosen for extraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplePoint {
    Seconds(f64),
    Frame(u64),
}

impl fmt::Display for SamplePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplePoint::Seconds(secs) => write!(f, "{}s", secs),
            SamplePoint::Frame(index) => write!(f, "frame {}", index),
        }
    }
}

impl Serialize for SamplePoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SamplePoint::Seconds(secs) => serializer.serialize_f64(*secs),
            SamplePoint::Frame(index) => serializer.serialize_u64(*index),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SampleSpecError {
    #[error("timestamp list is empty")]
    Empty,
    #[error("timestamp {0} is not a finite, non-negative number of seconds")]
    InvalidTimestamp(f64),
    #[error("timestamps must be in ascending order ({0} follows {1})")]
    OutOfOrder(f64, f64),
    #[error("every_n_frames and max_frames must both be at least 1")]
    InvalidStride,
    #[error("cannot parse sampling rule '{0}' (expected timestamps:1,2,3 or stride:30:10)")]
    Unparseable(String),
}

/// Ordered, finite set of extraction points.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleSpec {
    /// One frame per offset, in seconds.
    Timestamps(Vec<f64>),
    /// One frame every `every_n_frames` source frames, up to `max_frames`.
    Stride { every_n_frames: u32, max_frames: u32 },
}

impl SampleSpec {
    pub fn timestamps(secs: Vec<f64>) -> Result<Self, SampleSpecError> {
        if secs.is_empty() {
            return Err(SampleSpecError::Empty);
        }
        for &t in &secs {
            if !t.is_finite() || t < 0.0 {
                return Err(SampleSpecError::InvalidTimestamp(t));
            }
        }
        for pair in secs.windows(2) {
            if pair[1] < pair[0] {
                return Err(SampleSpecError::OutOfOrder(pair[1], pair[0]));
            }
        }
        Ok(SampleSpec::Timestamps(secs))
    }

    pub fn stride(every_n_frames: u32, max_frames: u32) -> Result<Self, SampleSpecError> {
        if every_n_frames == 0 || max_frames == 0 {
            return Err(SampleSpecError::InvalidStride);
        }
        Ok(SampleSpec::Stride {
            every_n_frames,
            max_frames,
        })
    }
}

impl Default for SampleSpec {
    fn default() -> Self {
        SampleSpec::Timestamps(vec![1.0, 2.0, 3.0])
    }
}

impl FromStr for SampleSpec {
    type Err = SampleSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unparseable = || SampleSpecError::Unparseable(s.to_string());
        let (mode, rest) = s.trim().split_once(':').ok_or_else(unparseable)?;

        match mode.trim() {
            "timestamps" => {
                let secs = rest
                    .split(',')
                    .map(|t| t.trim().parse::<f64>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| unparseable())?;
                SampleSpec::timestamps(secs)
            }
            "stride" => {
                let (every, max) = rest.split_once(':').ok_or_else(unparseable)?;
                let every_n_frames = every.trim().parse().map_err(|_| unparseable())?;
                let max_frames = max.trim().parse().map_err(|_| unparseable())?;
                SampleSpec::stride(every_n_frames, max_frames)
            }
            _ => Err(unparseable()),
        }
    }
}
