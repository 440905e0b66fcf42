//! Out-of-band reporting for the pipeline's own failures.
//!
//! Everything here goes straight to the process's standard error stream,
//! which is unbuffered, and never back through a pipeline. A failure to write
//! the diagnostic itself is ignored.

use std::fmt;
use std::io::Write;

const PREFIX: &str = "[logging] ";

pub fn report(args: fmt::Arguments<'_>) {
    let mut line = String::with_capacity(64);
    line.push_str(PREFIX);
    let _ = fmt::write(&mut line, args);
    line.push('\n');
    write_raw(line.as_bytes());
}

/// Writes already formatted bytes to stderr without the diagnostic prefix.
pub fn write_raw(bytes: &[u8]) {
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = handle.write_all(bytes);
    let _ = handle.flush();
}

/// `format!`-style front end for [`report`].
#[macro_export]
#[doc(hidden)]
macro_rules! diagnostic {
    ($($arg:tt)*) => {
        $crate::diagnostics::report(format_args!($($arg)*))
    };
}
