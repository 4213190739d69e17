//! This module contains the display events the pipeline emits: a screen
//! line number, the line's text, and a severity for the renderer to map
//! to a color. The renderer itself lives with the hardware.

use core::fmt::Write;

use arrayvec::ArrayString;

use crate::deflation::RateClass;

// Screen line assignments of the device UI.
pub const LINE_PRESSURE: u8 = 1;
pub const LINE_ADVISORY: u8 = 3;
pub const LINE_RATE: u8 = 5;
pub const LINE_RESULT_HEADER: u8 = 8;
pub const LINE_BPM: u8 = 9;
pub const LINE_DBP: u8 = 10;
pub const LINE_SBP: u8 = 11;

/// How prominently a line should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,    // Default text color.
    Warning, // Red.
    Result,  // Blue, final values.
}

/// One line of display output.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayEvent {
    pub line: u8,
    pub text: ArrayString<32>,
    pub severity: Severity,
}

impl DisplayEvent {
    fn new(line: u8, severity: Severity, args: core::fmt::Arguments) -> Self {
        let mut text = ArrayString::new();
        text.write_fmt(args).expect("can't write");
        Self { line, text, severity }
    }

    /// Current cuff pressure, repainted every tick.
    pub fn pressure(mmhg: f32) -> Self {
        Self::new(
            LINE_PRESSURE,
            Severity::Info,
            format_args!("  Pressure= {:.2}mmHg  ", mmhg),
        )
    }

    /// One-time reminder shown when inflation is complete.
    pub fn advisory() -> Self {
        Self::new(
            LINE_ADVISORY,
            Severity::Info,
            format_args!("Release valve slowly"),
        )
    }

    /// Deflation-rate line, repainted every tick while deflating.
    pub fn rate(class: RateClass) -> Self {
        match class {
            RateClass::Normal => Self::new(
                LINE_RATE,
                Severity::Info,
                format_args!("  Measuring..  "),
            ),
            RateClass::TooFast => Self::new(
                LINE_RATE,
                Severity::Warning,
                format_args!("  Too fast  "),
            ),
        }
    }

    pub fn result_header() -> Self {
        Self::new(
            LINE_RESULT_HEADER,
            Severity::Info,
            format_args!("     Final Result:     "),
        )
    }

    pub fn bpm(beats_per_minute: u16) -> Self {
        Self::new(
            LINE_BPM,
            Severity::Result,
            format_args!("  BPM = {}/min  ", beats_per_minute),
        )
    }

    pub fn dbp(mmhg: f32) -> Self {
        Self::new(
            LINE_DBP,
            Severity::Result,
            format_args!("  DBP = {:.2}mmHg  ", mmhg),
        )
    }

    pub fn sbp(mmhg: f32) -> Self {
        Self::new(
            LINE_SBP,
            Severity::Result,
            format_args!("  SBP = {:.2}mmHg  ", mmhg),
        )
    }

    /// A metric (or the whole run) that could not be resolved.
    pub fn test_fail(line: u8) -> Self {
        Self::new(line, Severity::Warning, format_args!("  Test Fail!  "))
    }
}
