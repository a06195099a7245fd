//! Diagnostics collected while decoding.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::log::{ldebug, lerror, linfo, lwarn};

/// How serious a [`Diagnostic`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Details of segment parsing.
    Debug,
    /// Page and file level progress.
    Info,
    /// A segment could not be decoded and was skipped.
    Warning,
    /// Decoding of the stream stopped.
    Fatal,
}

/// A message recorded by the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// How serious the message is.
    pub severity: Severity,
    /// The segment the message is about, if any.
    pub segment_number: Option<u32>,
    /// A human readable description.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.segment_number {
            Some(number) => write!(f, "segment {number}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Collects diagnostics and mirrors them to the `log` crate.
#[derive(Debug, Clone, Default)]
pub(crate) struct Diagnostics {
    records: Vec<Diagnostic>,
}

impl Diagnostics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    pub(crate) fn take(&mut self) -> Vec<Diagnostic> {
        core::mem::take(&mut self.records)
    }

    pub(crate) fn push(&mut self, severity: Severity, segment_number: Option<u32>, message: String) {
        let diagnostic = Diagnostic {
            severity,
            segment_number,
            message,
        };

        match severity {
            Severity::Debug => {
                ldebug!("{}", diagnostic);
            }
            Severity::Info => {
                linfo!("{}", diagnostic);
            }
            Severity::Warning => {
                lwarn!("{}", diagnostic);
            }
            Severity::Fatal => {
                lerror!("{}", diagnostic);
            }
        }

        self.records.push(diagnostic);
    }

    pub(crate) fn debug(&mut self, segment_number: Option<u32>, message: String) {
        self.push(Severity::Debug, segment_number, message);
    }

    pub(crate) fn info(&mut self, segment_number: Option<u32>, message: String) {
        self.push(Severity::Info, segment_number, message);
    }

    pub(crate) fn warning(&mut self, segment_number: Option<u32>, message: String) {
        self.push(Severity::Warning, segment_number, message);
    }

    pub(crate) fn fatal(&mut self, message: String) {
        self.push(Severity::Fatal, None, message);
    }
}
