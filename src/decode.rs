use std::convert::TryInto;
use std::io::{Read, Write};

use crate::{
    arith::{Decoder, StreamStats, CODER_PRECISION},
    bitstream::BitReader,
    buffered_io::{new_input_file, new_output_file},
    codebook::CondQuantizerList,
    config::Config,
    error::QvError,
    lines::{ALPHABET_SIZE, PHRED_OFFSET},
    progress::Progress,
    well::Well1024,
};

/// Results of one decoding run.
pub struct DecodeSummary {
    pub lines:    u64,
    pub columns:  usize,
}

/// Decode a container back into quality value lines.
///
/// The header supplies the WELL state, the cluster count, the line
/// count, and the codebooks; the body is then decoded in lockstep with
/// the encoder, drawing the same low/high selection per column.
pub fn decode(cfg: &Config) -> Result<DecodeSummary, QvError> {
    let progress = Progress::new(cfg.verbose, cfg.stats);
    let mut input = new_input_file(&cfg.input)?;

    let mut seed = [0u8; 128];
    input.read_exact(&mut seed)
        .map_err(|_| QvError::CodebookMalformed("truncated seed".to_string()))?;
    let mut state = [0u32; 32];
    for (word, bytes) in state.iter_mut().zip(seed.chunks_exact(4)) {
        *word = u32::from_le_bytes(bytes.try_into().unwrap());
    }

    let mut fixed = [0u8; 5];
    input.read_exact(&mut fixed)
        .map_err(|_| QvError::CodebookMalformed("truncated header".to_string()))?;
    let cluster_count = fixed[0] as usize;
    if cluster_count == 0 {
        return Err(QvError::CodebookMalformed("zero clusters".to_string()));
    }
    let total_lines = u32::from_be_bytes(fixed[1..5].try_into().unwrap()) as u64;

    let mut codebooks: Vec<CondQuantizerList> = Vec::with_capacity(cluster_count);
    for _ in 0..cluster_count {
        codebooks.push(CondQuantizerList::read_from(&mut input, ALPHABET_SIZE)?);
    }
    let columns = codebooks[0].columns;
    if codebooks.iter().any(|cb| cb.columns != columns) {
        return Err(QvError::CodebookMalformed("cluster column counts disagree".to_string()));
    }

    let mut out = new_output_file(&cfg.output)?;
    let mut well = Well1024::from_state(state);
    let mut coder_stats: Vec<Vec<Vec<StreamStats>>> =
        codebooks.iter().map(|cb| cb.stream_stats()).collect();
    let mut cluster_stats = StreamStats::new(cluster_count);
    let mut decoder = Decoder::new(BitReader::new(input), CODER_PRECISION);

    let mut line = vec![0u8; columns + 1];
    line[columns] = b'\n';

    for line_idx in 0..total_lines {
        progress.line_tick(line_idx);

        let id = if cluster_count > 1 {
            let id = decoder.decode(&cluster_stats)?;
            cluster_stats.update(id, CODER_PRECISION);
            id
        }
        else {
            0
        };

        let codebook = &codebooks[id];
        let contexts = &mut coder_stats[id];
        let mut prev = 0;
        for c in 0..columns {
            let (idx, q) = codebook.choose(c, prev, &mut well)?;
            let state = decoder.decode(&contexts[c][idx])?;
            contexts[c][idx].update(state, CODER_PRECISION);
            let qv = q.output.symbols[state];
            line[c] = qv + PHRED_OFFSET;
            prev = qv;
        }
        out.write_all(&line)?;
    }

    out.flush()?;
    progress.decode_done(total_lines);
    Ok(DecodeSummary { lines: total_lines, columns })
}
