//! Leveled diagnostics, injected into the [Assembler][crate::asm::assembler::Assembler] and the
//! [Cpu][crate::emu::emulator::Cpu] at construction.

use std::fmt;

use log::Level;

/// A sink for human-readable diagnostic messages. Purely observational.
pub trait Diagnostics {
    fn log(&mut self, level: Level, message: fmt::Arguments<'_>);
}

impl<D: Diagnostics + ?Sized> Diagnostics for &mut D {
    fn log(&mut self, level: Level, message: fmt::Arguments<'_>) {
        (**self).log(level, message)
    }
}

/// Forwards everything to the [log] facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl Diagnostics for LogSink {
    fn log(&mut self, level: Level, message: fmt::Arguments<'_>) {
        log::log!(level, "{}", message);
    }
}

/// Keeps every message in memory.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    pub messages: Vec<(Level, String)>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if any message at `level` contains `needle`.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.messages
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }
}

impl Diagnostics for Recorder {
    fn log(&mut self, level: Level, message: fmt::Arguments<'_>) {
        self.messages.push((level, message.to_string()));
    }
}

/// `diag!(self.diag, Debug, "fmt", args...)`
macro_rules! diag {
    ($sink:expr, $level:ident, $($arg:tt)+) => {
        $crate::diag::Diagnostics::log(&mut $sink, ::log::Level::$level, format_args!($($arg)+))
    };
}

pub(crate) use diag;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder() {
        let mut rec = Recorder::new();
        diag!(rec, Warn, "label {} unused", "loop");
        {
            let mut borrowed = &mut rec;
            diag!(borrowed, Info, "done");
        }
        assert_eq!(rec.messages.len(), 2);
        assert!(rec.contains(Level::Warn, "loop"));
        assert!(!rec.contains(Level::Error, "loop"));
    }
}
