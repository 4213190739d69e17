//! This module contains the bounded sample record of one measurement run:
//! the converted pressure of every acquisition tick and the fluctuation
//! sequence derived from adjacent pressures.

use arrayvec::ArrayVec;

use crate::MeasurementError;

/// Maximum number of samples one run may record.
pub const SAMPLE_CAPACITY: usize = 1500;

/// Pressure and fluctuation storage for one run.
///
/// `fluctuation[i]` is `pressure[i-1] - pressure[i]`: positive while the
/// cuff deflates, negative when a cardiac pulse momentarily raises the
/// pressure. The pressure before the first sample is taken as 0, so
/// `fluctuation[0]` is `-pressure[0]`.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    pressures: ArrayVec<f32, SAMPLE_CAPACITY>,
    fluctuations: ArrayVec<f32, SAMPLE_CAPACITY>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self {
            pressures: ArrayVec::new(),
            fluctuations: ArrayVec::new(),
        }
    }

    /// Append one converted sample, deriving its fluctuation from the
    /// previous sample. Returns the index of the appended sample.
    pub fn push(&mut self, pressure_mmhg: f32) -> Result<usize, MeasurementError> {
        if self.pressures.is_full() {
            return Err(MeasurementError::BufferOverflow);
        }
        let previous = self.pressures.last().copied().unwrap_or(0.0);
        let index = self.pressures.len();
        self.pressures.push(pressure_mmhg);
        self.fluctuations.push(previous - pressure_mmhg);
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.pressures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pressures.is_empty()
    }

    pub fn pressure(&self, index: usize) -> f32 {
        self.pressures[index]
    }

    pub fn fluctuation(&self, index: usize) -> f32 {
        self.fluctuations[index]
    }

    pub fn last_pressure(&self) -> Option<f32> {
        self.pressures.last().copied()
    }
}
