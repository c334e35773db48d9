use std::time::Instant;

use crate::encode::EncodeSummary;

/// Verbose and machine-parseable reporting for the coding drivers.
/// Nothing is printed unless the matching flag was set.
pub struct Progress {
    verbose:  bool,
    stats:    bool,
    time:     Instant,
}
impl Progress {
    pub fn new(verbose: bool, stats: bool) -> Progress {
        Progress {
            verbose,
            stats,
            time: Instant::now(),
        }
    }

    /// Line counter, printed once per million lines.
    pub fn line_tick(&self, lines: u64) {
        if self.verbose && lines % 1_000_000 == 0 {
            println!("Line: {}M", lines / 1_000_000);
        }
    }

    pub fn encode_done(&self, summary: &EncodeSummary) {
        let elapsed = self.time.elapsed().as_secs_f64();
        if self.verbose {
            println!("Expected distortion: {:.6}", summary.expected_mse);
            println!("Actual distortion: {:.6}", summary.distortion);
            println!("Lines: {}", summary.lines);
            println!("Columns: {}", summary.columns);
            println!("Total bytes used: {}", summary.bytes_out);
            println!("Encoding took {:.4} seconds.", elapsed);
        }
        if self.stats {
            println!("rate, {:.4}, distortion, {:.4}, time, {:.4}, size, {}",
                summary.rate, summary.distortion, elapsed, summary.bytes_out);
        }
    }

    pub fn decode_done(&self, lines: u64) {
        if self.verbose {
            println!("Decoded {} lines in {:.4} seconds.", lines, self.time.elapsed().as_secs_f64());
        }
    }
}
