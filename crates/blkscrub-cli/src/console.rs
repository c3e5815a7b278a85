//! Terminal progress and the destructive-operation prompt.

use blkscrub::{BlockFailure, BlockNumber, Geometry, Pass, ProgressSink};
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Line-overwriting progress on `out`, failures on `err`.
///
/// Console writes are best effort: a closed terminal must not abort a scrub
/// that is halfway through a device.
pub struct ConsoleProgress<O: Write, E: Write> {
    out: O,
    err: E,
}

impl<O: Write, E: Write> ConsoleProgress<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }
}

impl<O: Write, E: Write> ProgressSink for ConsoleProgress<O, E> {
    fn on_pass_start(&mut self, pass: Pass, _geometry: &Geometry) {
        let banner = match pass {
            Pass::Write => "Pass one: writing...",
            Pass::Verify => "Pass two: reading...",
        };
        let _ = writeln!(self.out, "{banner}");
    }

    fn on_progress(&mut self, pass: Pass, block: BlockNumber, _block_count: u64) {
        let verb = match pass {
            Pass::Write => "Writing",
            Pass::Verify => "Reading",
        };
        let _ = write!(self.out, "{verb} block {block}\r");
        let _ = self.out.flush();
    }

    fn on_failure(&mut self, failure: &BlockFailure) {
        let _ = self.out.flush();
        let _ = writeln!(self.err, "{failure}");
    }

    fn on_pass_end(&mut self, _pass: Pass, _blocks_done: u64) {
        let _ = writeln!(self.out);
    }

    fn on_sync(&mut self) {
        let _ = writeln!(self.out, "Synchronizing...");
        let _ = self.out.flush();
    }
}

/// Print what is about to be overwritten.
pub fn print_geometry(out: &mut impl Write, geometry: &Geometry) -> io::Result<()> {
    writeln!(out, "Device size in bytes: {}", geometry.total_bytes())?;
    writeln!(out, "Hardware block size: {}", geometry.block_size())?;
    writeln!(out, "Number of blocks: {}", geometry.block_count())
}

/// Ask before destroying `device`. Only an answer starting with `y` or `Y`
/// proceeds; end of input counts as no.
pub fn confirm(input: &mut impl BufRead, out: &mut impl Write, device: &Path) -> io::Result<bool> {
    write!(
        out,
        "All data on {} will be lost. Proceed? (y/n) ",
        device.display()
    )?;
    out.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.as_bytes().first(), Some(b'y' | b'Y')))
}
