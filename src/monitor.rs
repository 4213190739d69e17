//! This module contains the measurement run itself: the phase state
//! machine, the per-tick pipeline, and the final report assembly.

use arrayvec::ArrayVec;

use crate::analysis;
use crate::deflation::classify_rate;
use crate::display::{self, DisplayEvent};
use crate::envelope::PulseEnvelope;
use crate::pressure::SensorCalibration;
use crate::samples::SampleBuffer;
use crate::MeasurementError;

/// Cuff pressure that ends inflation and arms the deflation pipeline.
pub const DEFLATION_START_MMHG: f32 = 150.0;
/// Cuff pressure at which the run stops and analysis begins.
pub const MEASUREMENT_END_MMHG: f32 = 30.0;

/// Display events one tick can produce at most.
pub const EVENTS_PER_TICK: usize = 8;

pub type TickEvents = ArrayVec<DisplayEvent, EVENTS_PER_TICK>;

/// Phase of a measurement run. Transitions are monotonic: Inflating to
/// Deflating to one of the terminal phases; no phase is revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Inflating,
    Deflating,
    Done,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

/// Final values of one run that reached analysis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementReport {
    pub bpm: Result<u16, MeasurementError>,
    pub dbp: Result<f32, MeasurementError>,
    pub sbp: Result<f32, MeasurementError>,
    pub peak_amplitude: f32, // Largest pulse fluctuation (negative), for diagnostics.
    pub peak_pressure: f32,  // Cuff pressure at the pulse maximum.
}

/// One oscillometric measurement run, fed one raw sample per tick.
#[derive(Debug, Clone, Default)]
pub struct BpMonitor {
    calibration: SensorCalibration,
    buffer: SampleBuffer,
    envelope: PulseEnvelope,
    phase: Phase,
    report: Option<MeasurementReport>,
}

impl BpMonitor {
    pub fn new(calibration: SensorCalibration) -> Self {
        Self {
            calibration,
            buffer: SampleBuffer::new(),
            envelope: PulseEnvelope::new(),
            phase: Phase::Inflating,
            report: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The final report, present once the run has reached Done.
    pub fn report(&self) -> Option<&MeasurementReport> {
        self.report.as_ref()
    }

    pub fn sample_count(&self) -> usize {
        self.buffer.len()
    }

    /// Run one acquisition tick through the pipeline. Returns the display
    /// events this tick produced; none once the run has ended.
    pub fn process_sample(&mut self, raw: u32) -> TickEvents {
        let mut events = TickEvents::new();
        if self.phase.is_terminal() {
            return events;
        }

        let pressure = self.calibration.convert(raw);
        let previous = self.buffer.last_pressure();

        let index = match self.buffer.push(pressure) {
            Ok(index) => index,
            Err(_) => {
                // Out of record space before the cuff finished deflating.
                self.phase = Phase::Failed;
                events.push(DisplayEvent::test_fail(display::LINE_SBP));
                return events;
            }
        };

        events.push(DisplayEvent::pressure(pressure));

        if self.phase == Phase::Inflating && pressure > DEFLATION_START_MMHG {
            self.phase = Phase::Deflating;
            events.push(DisplayEvent::advisory());
        }

        // The deflation pipeline runs from the tick that crossed the
        // inflation threshold onward, terminal tick included.
        if self.phase == Phase::Deflating {
            self.envelope
                .observe(index, pressure, self.buffer.fluctuation(index));
            let rate = classify_rate(previous.unwrap_or(0.0), pressure);
            events.push(DisplayEvent::rate(rate));

            if pressure < MEASUREMENT_END_MMHG {
                self.finish(&mut events);
            }
        }

        events
    }

    // Terminal-threshold analysis: heart rate first, then the two band
    // searches, in the order the result screen fills its lines.
    fn finish(&mut self, events: &mut TickEvents) {
        events.push(DisplayEvent::result_header());

        let report = if self.envelope.is_resolved() {
            let peak_index = self.envelope.peak_index();
            let peak_amplitude = self.envelope.peak_amplitude();
            MeasurementReport {
                bpm: analysis::estimate_bpm(&self.buffer, peak_index),
                dbp: analysis::search_dbp(&self.buffer, peak_index, peak_amplitude),
                sbp: analysis::search_sbp(&self.buffer, peak_index, peak_amplitude),
                peak_amplitude,
                peak_pressure: self.envelope.peak_pressure(),
            }
        } else {
            // No sample below the tracking ceiling was ever recorded, so
            // there is no peak to anchor any of the three scans.
            MeasurementReport {
                bpm: Err(MeasurementError::BpmUnresolved),
                dbp: Err(MeasurementError::DbpUnresolved),
                sbp: Err(MeasurementError::SbpUnresolved),
                peak_amplitude: self.envelope.peak_amplitude(),
                peak_pressure: self.envelope.peak_pressure(),
            }
        };

        match report.bpm {
            Ok(bpm) => events.push(DisplayEvent::bpm(bpm)),
            Err(_) => events.push(DisplayEvent::test_fail(display::LINE_BPM)),
        }
        match report.dbp {
            Ok(dbp) => events.push(DisplayEvent::dbp(dbp)),
            Err(_) => events.push(DisplayEvent::test_fail(display::LINE_DBP)),
        }
        match report.sbp {
            Ok(sbp) => events.push(DisplayEvent::sbp(sbp)),
            Err(_) => events.push(DisplayEvent::test_fail(display::LINE_SBP)),
        }

        self.report = Some(report);
        self.phase = Phase::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::Severity;

    // Counts-are-pressure-x-100 calibration, so raw codes in the tests
    // read as centi-mmHg.
    fn test_calibration() -> SensorCalibration {
        SensorCalibration::new(0.0, 30_000.0)
    }

    fn raw(mmhg: f32) -> u32 {
        (mmhg * 100.0).round() as u32
    }

    #[test]
    fn test_phase_transitions_fire_exactly_once() {
        let mut monitor = BpMonitor::new(test_calibration());

        assert_eq!(monitor.phase(), Phase::Inflating);
        monitor.process_sample(raw(100.0));
        assert_eq!(monitor.phase(), Phase::Inflating);

        // Crossing 150 mmHg starts deflation and emits the advisory.
        let events = monitor.process_sample(raw(155.0));
        assert_eq!(monitor.phase(), Phase::Deflating);
        assert_eq!(
            events
                .iter()
                .filter(|e| e.line == display::LINE_ADVISORY)
                .count(),
            1
        );

        // Falling back below 150 must not rewind the phase, and rising
        // again must not repeat the advisory.
        for p in [140.0, 100.0, 155.0, 60.0] {
            let events = monitor.process_sample(raw(p));
            assert_eq!(monitor.phase(), Phase::Deflating);
            assert!(events.iter().all(|e| e.line != display::LINE_ADVISORY));
        }

        // Crossing 30 mmHg ends the run.
        monitor.process_sample(raw(29.0));
        assert_eq!(monitor.phase(), Phase::Done);

        // A finished run ignores further samples.
        let events = monitor.process_sample(raw(155.0));
        assert!(events.is_empty());
        assert_eq!(monitor.phase(), Phase::Done);
    }

    #[test]
    fn test_every_tick_reports_pressure_and_deflation_reports_rate() {
        let mut monitor = BpMonitor::new(test_calibration());

        let events = monitor.process_sample(raw(80.0));
        assert_eq!(events[0].line, display::LINE_PRESSURE);
        assert_eq!(events[0].text.as_str(), "  Pressure= 80.00mmHg  ");
        // No rate line while inflating.
        assert!(events.iter().all(|e| e.line != display::LINE_RATE));

        // The 80 -> 152 jump flips the phase; the rate check sees the
        // jump and flags it on this very tick.
        let events = monitor.process_sample(raw(152.0));
        let rate = events.iter().find(|e| e.line == display::LINE_RATE).unwrap();
        assert_eq!(rate.severity, Severity::Warning);
        assert_eq!(rate.text.as_str(), "  Too fast  ");

        // A normal deflation step paints the measuring line.
        let events = monitor.process_sample(raw(151.5));
        let rate = events.iter().find(|e| e.line == display::LINE_RATE).unwrap();
        assert_eq!(rate.severity, Severity::Info);
        assert_eq!(rate.text.as_str(), "  Measuring..  ");
    }

    #[test]
    fn test_buffer_exhaustion_fails_the_run() {
        let mut monitor = BpMonitor::new(test_calibration());
        for _ in 0..crate::samples::SAMPLE_CAPACITY {
            let events = monitor.process_sample(raw(100.0));
            assert!(!events.is_empty());
        }
        assert_eq!(monitor.phase(), Phase::Inflating);

        let events = monitor.process_sample(raw(100.0));
        assert_eq!(monitor.phase(), Phase::Failed);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text.as_str(), "  Test Fail!  ");
        assert!(monitor.report().is_none());
    }

    #[test]
    fn test_pulseless_run_fails_each_metric() {
        let mut monitor = BpMonitor::new(test_calibration());
        // Straight up past 150, straight down to 29: a record with no
        // cardiac pulses at all.
        let final_events: TickEvents = [100.0, 155.0, 140.0, 100.0, 60.0, 29.0]
            .into_iter()
            .map(|p| monitor.process_sample(raw(p)))
            .last()
            .unwrap();

        assert_eq!(monitor.phase(), Phase::Done);
        let report = monitor.report().unwrap();
        assert_eq!(report.bpm, Err(MeasurementError::BpmUnresolved));
        assert_eq!(report.dbp, Err(MeasurementError::DbpUnresolved));
        assert_eq!(report.sbp, Err(MeasurementError::SbpUnresolved));

        // One "Test Fail!" line per metric.
        for line in [display::LINE_BPM, display::LINE_DBP, display::LINE_SBP] {
            let fail = final_events.iter().find(|e| e.line == line).unwrap();
            assert_eq!(fail.text.as_str(), "  Test Fail!  ");
        }
    }

    // Pulse heights for the worked end-to-end waveform: a beat lands
    // every sixth deflation tick; the envelope maximum sits at 108 mmHg
    // of base pressure, the systolic crossing at 120 and the diastolic
    // at 72.
    fn beat_height(d: usize) -> f32 {
        match d {
            4 | 10 | 16 | 22 => 2.0,
            28 => 1.5,
            34 | 40 | 46 | 52 | 58 | 64 | 70 => 2.0,
            76 => 3.5,
            82 => 2.0,
            88 => 7.0,
            124 => 5.0,
            d if (4..=166).contains(&d) && (d - 4) % 6 == 0 => 3.0,
            _ => 0.0,
        }
    }

    // Full synthetic run: inflation 0..148 mmHg in 4 mmHg steps, two
    // 24 mmHg strokes to 196, then deflation at 1 mmHg per tick with the
    // beat train above, terminating at 29 mmHg. 207 samples.
    fn fixture_raw_codes() -> Vec<u32> {
        let mut codes = Vec::new();
        for i in 0..38 {
            codes.push(raw(4.0 * i as f32));
        }
        codes.push(raw(172.0));
        codes.push(raw(196.0));
        for d in 1..=167 {
            let base = 196.0 - d as f32;
            codes.push(raw(base + beat_height(d)));
        }
        codes
    }

    #[test]
    fn test_end_to_end_measurement() {
        let mut monitor = BpMonitor::new(test_calibration());

        let codes = fixture_raw_codes();
        assert_eq!(codes.len(), 207);

        let mut advisories = 0;
        let mut warnings = 0;
        let mut last_events = TickEvents::new();
        for &code in &codes {
            let events = monitor.process_sample(code);
            advisories += events
                .iter()
                .filter(|e| e.line == display::LINE_ADVISORY)
                .count();
            warnings += events
                .iter()
                .filter(|e| e.severity == Severity::Warning)
                .count();
            last_events = events;
        }

        assert_eq!(monitor.phase(), Phase::Done);
        assert_eq!(monitor.sample_count(), 207);
        assert_eq!(advisories, 1);
        // The two 24 mmHg inflation strokes and every beat's upward jump
        // trip the rate warning; there must be at least those.
        assert!(warnings >= 2);

        // The envelope peak: the 7 mmHg beat at tick 127, recorded at
        // 115 mmHg with fluctuation -6.
        let report = monitor.report().unwrap();
        assert_eq!(report.peak_amplitude, -6.0);
        assert_eq!(report.peak_pressure, 115.0);

        // Ten cycles from tick 127 to tick 183: 56 ticks, 2.24 s, so
        // (10 / 2.24) * 60 * 0.9 = 241.07, truncated.
        assert_eq!(report.bpm, Ok(241));
        // The 5 mmHg beat on the 72 mmHg base: accepted at 77.00 mmHg.
        assert_eq!(report.dbp, Ok(77.0));
        // The 3.5 mmHg beat on the 120 mmHg base: accepted at 123.50.
        assert_eq!(report.sbp, Ok(123.5));

        // The terminal tick renders the full result screen.
        let texts: Vec<&str> = last_events.iter().map(|e| e.text.as_str()).collect();
        assert!(texts.contains(&"     Final Result:     "));
        assert!(texts.contains(&"  BPM = 241/min  "));
        assert!(texts.contains(&"  DBP = 77.00mmHg  "));
        assert!(texts.contains(&"  SBP = 123.50mmHg  "));
        let bpm_event = last_events
            .iter()
            .find(|e| e.line == display::LINE_BPM)
            .unwrap();
        assert_eq!(bpm_event.severity, Severity::Result);
    }
}
