use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::{
    buffered_io::{file_len, new_input_file},
    error::QvError,
    pmf::Symbol,
};

/// Lines held per block, limiting the size of any single allocation.
pub const MAX_LINES_PER_BLOCK: usize = 1_000_000;

/// Maximum number of columns in a quality value line.
pub const MAX_READS_PER_LINE: usize = 1022;

/// Size of the quality value alphabet.
pub const ALPHABET_SIZE: usize = 41;

/// ASCII offset of the Phred quality encoding.
pub const PHRED_OFFSET: u8 = 33;


/// Convert one raw input line (no trailing newline) into symbols,
/// appending to `out`.
fn convert_line(raw: &[u8], out: &mut Vec<Symbol>) -> Result<(), QvError> {
    for &byte in raw.iter() {
        let sym = byte.checked_sub(PHRED_OFFSET)
            .filter(|&s| (s as usize) < ALPHABET_SIZE)
            .ok_or(QvError::InvalidSymbol(byte))?;
        out.push(sym);
    }
    Ok(())
}

/// Strip the line terminator from a raw buffer read with read_until.
fn strip_newline(buf: &[u8]) -> &[u8] {
    match buf.last() {
        Some(b'\n') => &buf[..buf.len() - 1],
        _           => buf,
    }
}


/// A contiguous block of training lines. Symbols for all lines in the
/// block live in one flat buffer of count * columns entries.
pub struct LineBlock {
    pub count:  usize,       // Lines in this block
    pub data:   Vec<Symbol>, // Flat symbol buffer
}
impl LineBlock {
    fn with_capacity(lines: usize, columns: usize) -> Result<LineBlock, QvError> {
        let mut data = Vec::new();
        data.try_reserve_exact(lines * columns).map_err(|_| QvError::OutOfMemory)?;
        Ok(LineBlock { count: 0, data })
    }

    pub fn line(&self, index: usize, columns: usize) -> &[Symbol] {
        &self.data[index * columns..(index + 1) * columns]
    }
}


/// An in-memory, block-structured matrix of fixed-width symbol lines
/// used to train statistics, clusters, and codebooks.
pub struct TrainingSet {
    pub columns:  usize,          // Symbols per line
    pub lines:    u64,            // Lines held in memory
    pub blocks:   Vec<LineBlock>, // Line storage
}
impl TrainingSet {
    /// Load up to `max_lines` lines from the given file (0 means all).
    /// The first line fixes the column count; every other line must
    /// match it.
    pub fn load(path: &Path, max_lines: u64) -> Result<TrainingSet, QvError> {
        let mut reader = new_input_file(path)?;
        let mut buf: Vec<u8> = Vec::new();

        reader.read_until(b'\n', &mut buf)?;
        let columns = strip_newline(&buf).len();
        if columns == 0 || columns > MAX_READS_PER_LINE {
            return Err(QvError::LineTooLong(columns));
        }

        // Size the blocks from the file length the way the line count
        // is derived everywhere else, capped by the training limit.
        let mut expected = file_len(path)? / (columns as u64 + 1);
        if max_lines > 0 && expected > max_lines {
            expected = max_lines;
        }

        let mut set = TrainingSet {
            columns,
            lines: 0,
            blocks: Vec::new(),
        };
        let block_cap = |loaded: u64| {
            (expected.saturating_sub(loaded).max(1) as usize).min(MAX_LINES_PER_BLOCK)
        };
        let mut block = LineBlock::with_capacity(block_cap(0), columns)?;

        loop {
            let line = strip_newline(&buf);
            if line.len() != columns {
                if line.is_empty() {
                    break;
                }
                return Err(QvError::LineTooLong(line.len()));
            }
            convert_line(line, &mut block.data)?;
            block.count += 1;
            set.lines += 1;

            if max_lines > 0 && set.lines >= max_lines {
                break;
            }
            if block.count == MAX_LINES_PER_BLOCK {
                set.blocks.push(block);
                block = LineBlock::with_capacity(block_cap(set.lines), columns)?;
            }

            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
        }

        if block.count > 0 {
            set.blocks.push(block);
        }
        Ok(set)
    }

    /// Iterate over all training lines in order.
    pub fn iter(&self) -> impl Iterator<Item = &[Symbol]> + '_ {
        let columns = self.columns;
        self.blocks.iter().flat_map(move |block| {
            block.data.chunks_exact(columns).take(block.count)
        })
    }
}

/// Total line count of an input file, derived from its byte length and
/// the fixed line width.
pub fn count_lines(path: &Path, columns: usize) -> Result<u64, QvError> {
    Ok(file_len(path)? / (columns as u64 + 1))
}


/// Streams symbol lines from an input file one at a time, used by the
/// coding pass which must cover the whole file rather than just the
/// training prefix.
pub struct LineSource {
    reader:   BufReader<File>,
    columns:  usize,
    buf:      Vec<u8>,
    line:     Vec<Symbol>,
}
impl LineSource {
    pub fn open(path: &Path, columns: usize) -> Result<LineSource, QvError> {
        Ok(LineSource {
            reader:  new_input_file(path)?,
            columns,
            buf:     Vec::with_capacity(columns + 1),
            line:    Vec::with_capacity(columns),
        })
    }

    /// The next line of symbols, or None at end of input.
    pub fn next_line(&mut self) -> Result<Option<&[Symbol]>, QvError> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        let raw = strip_newline(&self.buf);
        if raw.is_empty() {
            return Ok(None);
        }
        if raw.len() != self.columns {
            return Err(QvError::LineTooLong(raw.len()));
        }
        self.line.clear();
        convert_line(raw, &mut self.line)?;
        Ok(Some(&self.line))
    }
}
