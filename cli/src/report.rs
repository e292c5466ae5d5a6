use std::io::Write;

use termcolor::{self, Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tracing::{event, Level};

use base::prelude::*;
use pager::{AccessKind, FaultDescriptor, Mode, Unwind};

/// The outcome of one reference, as the user asked for it.
pub enum Outcome {
    Translated(PhysicalAddress),
    Probed(Unsigned36Bit),
    Failed(Unwind),
}

/// Writes one line per reference, coloured by outcome when standard
/// output is a terminal.
pub struct Reporter {
    stream: StandardStream,
}

fn get_colour_choice() -> termcolor::ColorChoice {
    if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

/// Bit 1 of a MAP result word is set when the probe failed.
fn probe_failed(w: Unsigned36Bit) -> bool {
    !(w & bit(1)).is_zero()
}

impl Reporter {
    pub fn new() -> Reporter {
        Reporter {
            stream: StandardStream::stdout(get_colour_choice()),
        }
    }

    fn set_colour(&mut self, colour: Color) {
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(colour));
        if let Err(e) = self.stream.set_color(&spec) {
            event!(Level::ERROR, "Failed to select colour {:?}: {}", spec, e);
        }
    }

    fn describe_fault(&mut self, fault: &FaultDescriptor) -> Result<(), std::io::Error> {
        write!(self.stream, "page fail: {fault}")
    }

    pub fn write(
        &mut self,
        mode: Mode,
        access: AccessKind,
        va: VirtualAddress,
        outcome: &Outcome,
    ) -> Result<(), std::io::Error> {
        write!(
            self.stream,
            "{:<4} {:<5} {va} ",
            mode.to_string(),
            access.to_string()
        )?;
        match outcome {
            Outcome::Translated(pa) => {
                self.set_colour(Color::Green);
                write!(self.stream, "-> {pa}")?;
            }
            Outcome::Probed(w) => {
                self.set_colour(if probe_failed(*w) {
                    Color::Yellow
                } else {
                    Color::Green
                });
                write!(self.stream, "MAP {w:012o}")?;
            }
            Outcome::Failed(Unwind::PageFail(fault)) => {
                self.set_colour(Color::Red);
                self.describe_fault(fault)?;
            }
            Outcome::Failed(Unwind::ResumeInterrupt) => {
                self.set_colour(Color::Yellow);
                write!(self.stream, "page fail during interrupt delivery")?;
            }
            Outcome::Failed(Unwind::Halt(anomaly)) => {
                self.set_colour(Color::Magenta);
                write!(self.stream, "HALT: {anomaly}")?;
            }
        }
        self.disconnect();
        writeln!(self.stream)?;
        self.stream.flush()
    }

    pub fn disconnect(&mut self) {
        if let Err(e) = self.stream.reset() {
            event!(Level::ERROR, "Failed to reset terminal: {}", e);
        }
    }
}
