use std::fmt;
use std::str::FromStr;

use crate::error::{FramesmithError, Result};

/// A validated, strictly positive frame rate.
///
/// Accepts integers (`25`), decimals (`29.97`) and rationals (`30000/1001`).
/// Rationals are handed to the engine as written; other forms are normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRate {
    value: f64,
    arg: String,
}

impl FrameRate {
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let invalid = || {
            FramesmithError::Validation(format!(
                "'{}' is not a valid frame rate (e.g., 25)",
                text
            ))
        };

        let (value, arg) = match text.split_once('/') {
            Some((num, den)) => {
                let num: u64 = num.trim().parse().map_err(|_| invalid())?;
                let den: u64 = den.trim().parse().map_err(|_| invalid())?;
                if den == 0 {
                    return Err(invalid());
                }
                (num as f64 / den as f64, format!("{}/{}", num, den))
            }
            None => {
                let value: f64 = text.parse().map_err(|_| invalid())?;
                (value, value.to_string())
            }
        };

        if !value.is_finite() || value <= 0.0 {
            return Err(invalid());
        }

        Ok(Self { value, arg })
    }

    /// Frames per second
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Form passed on the engine command line
    pub fn as_arg(&self) -> &str {
        &self.arg
    }
}

impl FromStr for FrameRate {
    type Err = FramesmithError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.arg)
    }
}
