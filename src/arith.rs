use std::io::{Read, Write};

use crate::{
    bitstream::{BitReader, BitWriter},
    error::QvError,
};

/// Interval precision of the range coder in bits.
pub const CODER_PRECISION: u32 = 22;

/// Count increment applied per coded outcome.
pub const STATS_STEP: u32 = 8;


/// Adaptive symbol counts for one coding context. Counts start at 1 so
/// every outcome is codeable, grow by `step` per observation, and are
/// halved (rounded up) whenever the running total crosses 2^(m-3).
#[derive(Clone, Debug)]
pub struct StreamStats {
    counts:  Vec<u32>,
    total:   u32,
    step:    u32,
}
impl StreamStats {
    /// Create stats over an alphabet of the given size with the
    /// production step.
    pub fn new(size: usize) -> StreamStats {
        StreamStats::with_step(size, STATS_STEP)
    }

    pub fn with_step(size: usize, step: u32) -> StreamStats {
        StreamStats {
            counts:  vec![1; size],
            total:   size as u32,
            step,
        }
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn count(&self, x: usize) -> u32 {
        self.counts[x]
    }

    /// Cumulative count through symbol x, inclusive.
    pub fn cum_through(&self, x: usize) -> u32 {
        self.counts[..=x].iter().sum()
    }

    /// Smallest symbol whose inclusive cumulative count exceeds the
    /// target, or the last symbol if none does.
    pub fn find(&self, target: u32) -> usize {
        let mut cum = 0;
        for (i, &count) in self.counts.iter().enumerate() {
            cum += count;
            if cum > target {
                return i;
            }
        }
        self.counts.len() - 1
    }

    /// Record one coded outcome, rescaling when the total crosses the
    /// coder's count ceiling. Non-zero counts stay non-zero.
    pub fn update(&mut self, x: usize, m: u32) {
        self.counts[x] += self.step;
        self.total += self.step;

        if self.total >= 1 << (m - 3) {
            self.total = 0;
            for count in self.counts.iter_mut() {
                if *count > 0 {
                    *count = (*count >> 1) + 1;
                    self.total += *count;
                }
            }
        }
    }
}


/// A binary range encoder over an m-bit interval with E1/E2/E3
/// rescaling. Symbols are coded against the cumulative counts of a
/// `StreamStats` context; the interval invariant 0 <= l <= u < 2^m
/// holds between steps.
pub struct Encoder<W: Write> {
    low:      u32,
    high:     u32,
    pending:  u32,  // E3 count of withheld complement bits
    m:        u32,
    out:      BitWriter<W>,
}
impl<W: Write> Encoder<W> {
    pub fn new(out: BitWriter<W>, m: u32) -> Encoder<W> {
        Encoder {
            low:      0,
            high:     (1 << m) - 1,
            pending:  0,
            m,
            out,
        }
    }

    /// Code one symbol.
    pub fn encode(&mut self, stats: &StreamStats, x: usize) -> Result<(), QvError> {
        let range = (self.high - self.low + 1) as u64;
        let n = stats.total() as u64;
        let cum_hi = stats.cum_through(x) as u64;
        let cum_lo = cum_hi - stats.count(x) as u64;

        let high = self.low + ((range * cum_hi) / n) as u32 - 1;
        let low = self.low + ((range * cum_lo) / n) as u32;
        if low > high {
            return Err(QvError::CoderInvariant { low, high });
        }
        self.low = low;
        self.high = high;

        let msb = 1 << (self.m - 1);
        let mask = (1 << self.m) - 1;
        loop {
            let msb_l = self.low >> (self.m - 1);
            let msb_u = self.high >> (self.m - 1);

            if msb_l == msb_u {
                // E1/E2: both endpoints share their MSB; emit it along
                // with any withheld complements.
                self.out.write_bit(msb_l)?;
                while self.pending > 0 {
                    self.out.write_bit(msb_l ^ 1)?;
                    self.pending -= 1;
                }
                self.low = (self.low << 1) & mask;
                self.high = ((self.high << 1) | 1) & mask;
            }
            else if (self.low >> (self.m - 2)) & 1 == 1 && (self.high >> (self.m - 2)) & 1 == 0 {
                // E3: interval straddles the midpoint too tightly;
                // expand and remember to complement the next bit.
                self.pending += 1;
                self.low = ((self.low << 1) & mask) ^ msb;
                self.high = (((self.high << 1) | 1) & mask) ^ msb;
            }
            else {
                break;
            }
        }
        Ok(())
    }

    /// Flush the final interval: the MSB of l, its complement for each
    /// withheld E3 bit, then the remaining m-1 bits of l. Returns the
    /// underlying byte sink.
    pub fn finish(mut self) -> Result<W, QvError> {
        let msb_l = self.low >> (self.m - 1);
        self.out.write_bit(msb_l)?;
        while self.pending > 0 {
            self.out.write_bit(msb_l ^ 1)?;
            self.pending -= 1;
        }
        self.out.write_bits(self.low & ((1 << (self.m - 1)) - 1), self.m - 1)?;
        Ok(self.out.finish()?)
    }
}


/// The matching range decoder. Mirrors every interval update of the
/// encoder while sliding an m-bit tag window over the coded body.
pub struct Decoder<R: Read> {
    low:    u32,
    high:   u32,
    tag:    u32,
    m:      u32,
    input:  BitReader<R>,
}
impl<R: Read> Decoder<R> {
    /// Create a decoder, priming the tag with the first m bits of the
    /// body.
    pub fn new(mut input: BitReader<R>, m: u32) -> Decoder<R> {
        let tag = input.read_bits(m);
        Decoder {
            low:  0,
            high: (1 << m) - 1,
            tag,
            m,
            input,
        }
    }

    /// Decode one symbol.
    pub fn decode(&mut self, stats: &StreamStats) -> Result<usize, QvError> {
        if self.tag < self.low || self.low > self.high {
            return Err(QvError::CoderInvariant { low: self.low, high: self.high });
        }
        let range = (self.high - self.low + 1) as u64;
        let gap = (self.tag - self.low + 1) as u64;
        let n = stats.total() as u64;
        let target = ((gap * n - 1) / range) as u32;
        let x = stats.find(target);

        let cum_hi = stats.cum_through(x) as u64;
        let cum_lo = cum_hi - stats.count(x) as u64;
        let high = self.low + ((range * cum_hi) / n) as u32 - 1;
        let low = self.low + ((range * cum_lo) / n) as u32;
        if low > high {
            return Err(QvError::CoderInvariant { low, high });
        }
        self.low = low;
        self.high = high;

        let msb = 1 << (self.m - 1);
        let mask = (1 << self.m) - 1;
        loop {
            let msb_l = self.low >> (self.m - 1);
            let msb_u = self.high >> (self.m - 1);

            if msb_l == msb_u {
                self.low = (self.low << 1) & mask;
                self.high = ((self.high << 1) | 1) & mask;
                self.tag = ((self.tag << 1) & mask) | self.input.read_bit();
            }
            else if (self.low >> (self.m - 2)) & 1 == 1 && (self.high >> (self.m - 2)) & 1 == 0 {
                self.low = ((self.low << 1) & mask) ^ msb;
                self.high = (((self.high << 1) | 1) & mask) ^ msb;
                self.tag = (((self.tag << 1) & mask) | self.input.read_bit()) ^ msb;
            }
            else {
                break;
            }
        }
        Ok(x)
    }
}
