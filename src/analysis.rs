//! This module contains the three extraction algorithms that run once the
//! cuff pressure reaches the terminal threshold: heart-rate estimation by
//! oscillation-cycle counting, and the diastolic/systolic band searches
//! around the pulse-envelope peak.
//!
//! All three scan the recorded fluctuation sequence, in which a cardiac
//! pulse is a negative excursion and the peak pulse amplitude is the most
//! negative value on record. The amplitude windows derived from that peak
//! are therefore negative too, which orients their inequalities.

use crate::samples::SampleBuffer;
use crate::{MeasurementError, SAMPLE_INTERVAL_SECONDS};

/// Number of oscillation cycles counted for one heart-rate estimate.
const BPM_CYCLE_COUNT: u32 = 10;
/// Empirical correction applied to the raw cycle rate.
const BPM_CORRECTION: f32 = 0.9;

/// The diastolic point sits where pulses shrink to this fraction of peak.
const DBP_AMPLITUDE_RATIO: f32 = 0.75;
/// The systolic point sits where pulses shrink to this fraction of peak.
const SBP_AMPLITUDE_RATIO: f32 = 0.45;
/// Accepted deviation around the target amplitude.
const AMPLITUDE_TOLERANCE: f32 = 0.2;

/// The forward diastolic scan gives up below this pressure.
const DBP_SCAN_FLOOR_MMHG: f32 = 50.0;
/// Physiologically plausible diastolic band, exclusive bounds.
const DBP_BAND_MMHG: (f32, f32) = (55.0, 85.0);
/// The backward systolic scan gives up at this pressure.
const SBP_SCAN_CEILING_MMHG: f32 = 170.0;
/// Physiologically plausible systolic band, exclusive bounds.
const SBP_BAND_MMHG: (f32, f32) = (85.0, 125.0);

/// Count ten oscillation cycles forward from the envelope peak and derive
/// beats per minute from the span they cover.
///
/// A cycle begins each time the fluctuation sequence enters a negative
/// run; the scan then skips past the run before looking for the next one.
/// The scan is bounded by the record: fewer than ten cycles before the
/// end is a `BpmUnresolved` failure.
pub fn estimate_bpm(buffer: &SampleBuffer, peak_index: usize) -> Result<u16, MeasurementError> {
    let len = buffer.len();
    let mut m = peak_index;
    let mut cycles = 0u32;
    let mut start_index = None;

    while cycles < BPM_CYCLE_COUNT {
        if m >= len {
            return Err(MeasurementError::BpmUnresolved);
        }
        if buffer.fluctuation(m) < 0.0 {
            if start_index.is_none() {
                start_index = Some(m);
            }
            cycles += 1;
            while m < len && buffer.fluctuation(m) < 0.0 {
                m += 1;
            }
        }
        m += 1;
    }
    let Some(start_index) = start_index else {
        return Err(MeasurementError::BpmUnresolved);
    };
    let end_index = m;

    let elapsed_seconds = (end_index - start_index) as f32 * SAMPLE_INTERVAL_SECONDS;
    let bpm = (BPM_CYCLE_COUNT as f32 / elapsed_seconds) * 60.0 * BPM_CORRECTION;
    Ok(bpm as u16)
}

/// Forward scan from the envelope peak for the diastolic crossing: the
/// first pulse whose amplitude lands within the window around 0.75x the
/// peak amplitude, inside the 55-85 mmHg band. Gives up once the recorded
/// pressure falls to 50 mmHg or the record ends.
pub fn search_dbp(
    buffer: &SampleBuffer,
    peak_index: usize,
    peak_amplitude: f32,
) -> Result<f32, MeasurementError> {
    let target = peak_amplitude * DBP_AMPLITUDE_RATIO;
    let (band_low, band_high) = DBP_BAND_MMHG;

    let mut j = peak_index;
    while j < buffer.len() && buffer.pressure(j) > DBP_SCAN_FLOOR_MMHG {
        let fluctuation = buffer.fluctuation(j);
        let pressure = buffer.pressure(j);
        if fluctuation < 0.0
            && fluctuation > target * (1.0 + AMPLITUDE_TOLERANCE)
            && fluctuation < target * (1.0 - AMPLITUDE_TOLERANCE)
            && pressure > band_low
            && pressure < band_high
        {
            return Ok(pressure);
        }
        j += 1;
    }
    Err(MeasurementError::DbpUnresolved)
}

/// Backward scan from the envelope peak for the systolic crossing, with
/// the window around 0.45x the peak amplitude and the 85-125 mmHg band.
/// Gives up on reaching 170 mmHg or the start of the record.
pub fn search_sbp(
    buffer: &SampleBuffer,
    peak_index: usize,
    peak_amplitude: f32,
) -> Result<f32, MeasurementError> {
    let target = peak_amplitude * SBP_AMPLITUDE_RATIO;
    let (band_low, band_high) = SBP_BAND_MMHG;

    if peak_index >= buffer.len() {
        return Err(MeasurementError::SbpUnresolved);
    }
    let mut j = peak_index;
    loop {
        let pressure = buffer.pressure(j);
        if pressure >= SBP_SCAN_CEILING_MMHG {
            return Err(MeasurementError::SbpUnresolved);
        }
        let fluctuation = buffer.fluctuation(j);
        if fluctuation < 0.0
            && fluctuation > target * (1.0 + AMPLITUDE_TOLERANCE)
            && fluctuation < target * (1.0 - AMPLITUDE_TOLERANCE)
            && pressure > band_low
            && pressure < band_high
        {
            return Ok(pressure);
        }
        if j == 0 {
            return Err(MeasurementError::SbpUnresolved);
        }
        j -= 1;
    }
}
