use std::io::{self, Read, Write};

/// Writes individual bits into a byte sink. Bits fill each byte from
/// the least significant position upward; a multi-bit group of width L
/// is emitted bit L-1 down to bit 0 through the single-bit writer. The
/// final partial byte is zero-padded on flush.
pub struct BitWriter<W: Write> {
    out:   W,
    byte:  u8,
    pos:   u8,  // Next bit position within byte, 0..8
}
impl<W: Write> BitWriter<W> {
    pub fn new(out: W) -> BitWriter<W> {
        BitWriter {
            out,
            byte: 0,
            pos:  0,
        }
    }

    /// Write a single bit.
    pub fn write_bit(&mut self, bit: u32) -> io::Result<()> {
        if bit != 0 {
            self.byte |= 1 << self.pos;
        }
        self.pos += 1;
        if self.pos == 8 {
            self.out.write_all(&[self.byte])?;
            self.byte = 0;
            self.pos = 0;
        }
        Ok(())
    }

    /// Write the low `len` bits of `value`, most significant first.
    pub fn write_bits(&mut self, value: u32, len: u32) -> io::Result<()> {
        for i in (0..len).rev() {
            self.write_bit((value >> i) & 1)?;
        }
        Ok(())
    }

    /// Pad the current byte with zeros, flush, and return the sink.
    pub fn finish(mut self) -> io::Result<W> {
        if self.pos > 0 {
            self.out.write_all(&[self.byte])?;
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Reads individual bits from a byte source, mirroring `BitWriter`
/// exactly. Reads past the end of the source return zero bits, which
/// lets the arithmetic decoder drain its final interval without a
/// special last-symbol path.
pub struct BitReader<R: Read> {
    input:  R,
    byte:   u8,
    pos:    u8,  // Next bit position within byte, 0..=8 (8 = refill)
}
impl<R: Read> BitReader<R> {
    pub fn new(input: R) -> BitReader<R> {
        BitReader {
            input,
            byte: 0,
            pos:  8,
        }
    }

    /// Read a single bit, or 0 past end of stream.
    pub fn read_bit(&mut self) -> u32 {
        if self.pos == 8 {
            let mut byte = [0u8; 1];
            self.byte = match self.input.read(&mut byte) {
                Ok(1) => byte[0],
                _     => 0,
            };
            self.pos = 0;
        }
        let bit = (self.byte >> self.pos) & 1;
        self.pos += 1;
        bit as u32
    }

    /// Read `len` bits, most significant first.
    pub fn read_bits(&mut self, len: u32) -> u32 {
        let mut value = 0;
        for i in (0..len).rev() {
            value |= self.read_bit() << i;
        }
        value
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_bits_roundtrip() {
        let mut writer = BitWriter::new(Vec::new());
        let bits = [1, 0, 1, 1, 0, 0, 1, 0, 1, 1, 1];
        for &bit in bits.iter() {
            writer.write_bit(bit).unwrap();
        }
        let bytes = writer.finish().unwrap();

        let mut reader = BitReader::new(&bytes[..]);
        for &bit in bits.iter() {
            assert_eq!(reader.read_bit(), bit);
        }
    }

    #[test]
    fn groups_roundtrip() {
        let mut writer = BitWriter::new(Vec::new());
        let values = [(0u32, 1u32), (5, 3), (255, 8), (1, 1), (12345, 14), (0x3FFFFF, 22)];
        for &(value, len) in values.iter() {
            writer.write_bits(value, len).unwrap();
        }
        let bytes = writer.finish().unwrap();

        let mut reader = BitReader::new(&bytes[..]);
        for &(value, len) in values.iter() {
            assert_eq!(reader.read_bits(len), value);
        }
    }

    #[test]
    fn seventeen_bits_then_fifteen() {
        let mut writer = BitWriter::new(Vec::new());
        let singles = [1u32, 0, 0, 1, 1, 1, 0, 1, 0, 0, 1, 0, 1, 1, 0, 1, 1];
        for &bit in singles.iter() {
            writer.write_bit(bit).unwrap();
        }
        writer.write_bits(0x5ACE, 15).unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(bytes.len(), 4);

        let mut reader = BitReader::new(&bytes[..]);
        for &bit in singles.iter() {
            assert_eq!(reader.read_bit(), bit);
        }
        assert_eq!(reader.read_bits(15), 0x5ACE);
    }

    #[test]
    fn reads_past_end_are_zero() {
        let mut reader = BitReader::new(&[0xFF][..]);
        assert_eq!(reader.read_bits(8), 0xFF);
        assert_eq!(reader.read_bits(8), 0);
        assert_eq!(reader.read_bit(), 0);
    }

    #[test]
    fn random_values_roundtrip() {
        fastrand::seed(7);
        let mut values = Vec::new();
        for _ in 0..500 {
            let len = fastrand::u32(1..=32);
            let value = if len == 32 {
                fastrand::u32(..)
            }
            else {
                fastrand::u32(..) & ((1 << len) - 1)
            };
            values.push((value, len));
        }

        let mut writer = BitWriter::new(Vec::new());
        for &(value, len) in values.iter() {
            writer.write_bits(value, len).unwrap();
        }
        let bytes = writer.finish().unwrap();

        let mut reader = BitReader::new(&bytes[..]);
        for &(value, len) in values.iter() {
            assert_eq!(reader.read_bits(len), value);
        }
    }
}
