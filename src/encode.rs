use std::io::Write;

use crate::{
    arith::{Encoder, StreamStats, CODER_PRECISION},
    bitstream::BitWriter,
    buffered_io::{file_len, new_output_file},
    cluster::ClusterSet,
    codebook::{CondPmfList, CondQuantizerList},
    config::Config,
    distortion::Distortion,
    error::QvError,
    lines::{count_lines, LineSource, TrainingSet, ALPHABET_SIZE},
    pmf::{Alphabet, Symbol},
    progress::Progress,
    well::Well1024,
};

/// Results of one encoding run.
pub struct EncodeSummary {
    pub lines:        u64,
    pub columns:      usize,
    pub bytes_out:    u64,
    pub distortion:   f64,  // Measured average per-symbol distortion
    pub expected_mse: f64,  // Codebook prediction under the design PMFs
    pub rate:         f64,  // Output bits per input symbol
}

/// Encode a quality value file into a container.
///
/// Training statistics, clusters, and codebooks come from an in-memory
/// prefix of the input; the coding pass then streams the entire file.
/// The container carries the WELL seed, the cluster count, the line
/// count, and one codebook payload per cluster ahead of the
/// arithmetic-coded body.
pub fn encode(cfg: &Config) -> Result<EncodeSummary, QvError> {
    let progress = Progress::new(cfg.verbose, cfg.stats);

    let training = TrainingSet::load(&cfg.input, cfg.training_cap)?;
    let columns = training.columns;
    let alphabet = Alphabet::new(ALPHABET_SIZE);
    let dist = Distortion::new(ALPHABET_SIZE, cfg.distortion);

    let clusters = ClusterSet::train(&training, &dist, cfg.clusters, cfg.verbose);

    // Per-cluster conditional statistics over the training prefix.
    let mut stats: Vec<CondPmfList> = (0..clusters.len())
        .map(|_| CondPmfList::new(&alphabet, columns))
        .collect();
    for (line, &id) in training.iter().zip(clusters.assignments.iter()) {
        stats[id as usize].record_line(line);
    }

    let mut codebooks: Vec<CondQuantizerList> = Vec::with_capacity(clusters.len());
    for cluster_stats in stats.iter_mut() {
        codebooks.push(CondQuantizerList::generate(cluster_stats, &dist, cfg.ratio)?);
    }

    // Codebook-level distortion prediction, weighted by each
    // cluster's share of the training lines.
    let trained = training.lines.max(1) as f64;
    let expected_mse = codebooks.iter().zip(clusters.clusters.iter())
        .map(|(cb, cluster)| cb.expected_mse * cluster.count as f64 / trained)
        .sum::<f64>();

    let total_lines = count_lines(&cfg.input, columns)?;

    // Header: WELL seed words, cluster count, line count, codebooks.
    // The seed is written before any draw so the decoder replays the
    // selector exactly.
    let mut out = new_output_file(&cfg.output)?;
    let well_state = cfg.seed.unwrap_or_else(|| *Well1024::from_entropy().state());
    for word in well_state.iter() {
        out.write_all(&word.to_le_bytes())?;
    }
    out.write_all(&[clusters.len() as u8])?;
    out.write_all(&(total_lines as u32).to_be_bytes())?;
    for codebook in codebooks.iter() {
        codebook.write_to(&mut out)?;
    }

    // Body: one adaptive context per stored quantizer, plus one for
    // the cluster ids when there is more than one cluster.
    let mut coder_stats: Vec<Vec<Vec<StreamStats>>> =
        codebooks.iter().map(|cb| cb.stream_stats()).collect();
    let mut cluster_stats = StreamStats::new(clusters.len());
    let mut well = Well1024::from_state(well_state);
    let mut encoder = Encoder::new(BitWriter::new(out), CODER_PRECISION);
    let mut source = LineSource::open(&cfg.input, columns)?;

    let mut distortion = 0.0;
    let mut line_count: u64 = 0;
    while line_count < total_lines {
        let line = match source.next_line()? {
            Some(line) => line,
            None       => break,
        };
        progress.line_tick(line_count);
        line_count += 1;

        let id = clusters.assign(line, &dist) as usize;
        if clusters.len() > 1 {
            encoder.encode(&cluster_stats, id)?;
            cluster_stats.update(id, CODER_PRECISION);
        }

        let codebook = &codebooks[id];
        let contexts = &mut coder_stats[id];
        let mut error = 0.0;
        let mut prev: Symbol = 0;
        for c in 0..columns {
            let (idx, q) = codebook.choose(c, prev, &mut well)?;
            let qv = q.map[line[c] as usize];
            let state = q.state_of(qv).unwrap();
            encoder.encode(&contexts[c][idx], state)?;
            contexts[c][idx].update(state, CODER_PRECISION);
            error += dist.get(line[c] as usize, qv as usize);
            prev = qv;
        }
        distortion += error / columns as f64;
    }

    encoder.finish()?;

    let bytes_out = file_len(&cfg.output)?;
    let symbols = (line_count * columns as u64).max(1);
    let summary = EncodeSummary {
        lines:        line_count,
        columns,
        bytes_out,
        distortion:   distortion / line_count.max(1) as f64,
        expected_mse,
        rate:         bytes_out as f64 * 8.0 / symbols as f64,
    };
    progress.encode_done(&summary);
    Ok(summary)
}
