use std::io::{Read, Write};

use crate::{
    arith::StreamStats,
    distortion::Distortion,
    error::QvError,
    pmf::{Alphabet, Pmf, Symbol},
    quantizer::Quantizer,
    well::Well1024,
};


/// Conditional PMFs for a training cohort: one unconditional PMF for
/// column 0 plus, for every later column, one PMF per possible value
/// of the previous column. All are stored in a flat array; use the
/// accessors.
pub struct CondPmfList {
    columns:        usize,
    alphabet_size:  usize,
    pmfs:           Vec<Pmf>,
}
impl CondPmfList {
    pub fn new(alphabet: &Alphabet, columns: usize) -> CondPmfList {
        let count = 1 + alphabet.size() * (columns - 1);
        CondPmfList {
            columns,
            alphabet_size: alphabet.size(),
            pmfs: (0..count).map(|_| Pmf::new(alphabet)).collect(),
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }

    /// PMF of a column conditioned on the previous column's symbol.
    /// Column 0 has a single unconditional PMF.
    pub fn pmf_mut(&mut self, column: usize, prev: Symbol) -> &mut Pmf {
        if column == 0 {
            &mut self.pmfs[0]
        }
        else {
            &mut self.pmfs[1 + (column - 1) * self.alphabet_size + prev as usize]
        }
    }

    /// Record one training line: column 0 unconditionally, every
    /// later column against its left neighbor.
    pub fn record_line(&mut self, line: &[Symbol]) {
        self.pmf_mut(0, 0).increment(line[0] as usize);
        for c in 1..line.len() {
            self.pmf_mut(c, line[c - 1]).increment(line[c] as usize);
        }
    }
}


/// Union of the output alphabets of a column's quantizers, in storage
/// order. Both the builder and the payload parser derive context
/// alphabets this way, so the two sides always agree on context
/// indices.
fn output_union(quantizers: &[Quantizer]) -> Alphabet {
    let mut union = Alphabet::default();
    for q in quantizers.iter() {
        union.union_with(&q.output);
    }
    union
}

/// Pick a (low, high) quantizer pair and mixing ratio for a PMF so
/// that the expected output entropy hits `comp` times the input
/// entropy. State counts are searched upward until the entropy target
/// is reached; the ratio interpolates between the straddling pair and
/// is snapped to percent precision so the serialized codebook drives
/// the selector with exactly the value the decoder will parse.
fn optimize_for_entropy(
    pmf: &mut Pmf,
    dist: &Distortion,
    comp: f64,
) -> Result<(Quantizer, Quantizer, f64), QvError> {
    let size = pmf.alphabet.size();
    let target = comp * pmf.entropy();

    let mut below: Option<(Quantizer, f64)> = None;
    let mut above: Option<(Quantizer, f64)> = None;
    for states in 1..=size {
        let q = Quantizer::generate(pmf, dist, states)?;
        let h = q.apply(pmf).entropy();
        if h >= target || states == size {
            above = Some((q, h));
            break;
        }
        below = Some((q, h));
    }
    let (hi, hi_h) = above.unwrap();

    let (lo, ratio) = match below {
        None => (hi.clone(), 0.0),
        Some((lo, lo_h)) => {
            let ratio = if hi_h == lo_h {
                1.0
            }
            else {
                ((target - hi_h) / (lo_h - hi_h)).max(0.0).min(1.0)
            };
            (lo, ratio)
        }
    };
    let ratio = (ratio * 100.0).round() / 100.0;
    Ok((lo, hi, ratio))
}


/// The full codebook for one cohort: for every column, an alphabet of
/// admissible left-context symbols and, per context, a low quantizer,
/// a high quantizer, and the mixing ratio between them. Quantizers are
/// stored flat per column as [low, high] pairs in context order.
pub struct CondQuantizerList {
    pub columns:          usize,
    pub input_alphabets:  Vec<Alphabet>,       // Admissible contexts per column
    pub quantizers:       Vec<Vec<Quantizer>>, // 2 per context: [2i] low, [2i+1] high
    pub ratios:           Vec<Vec<f64>>,       // 1 per context
    pub expected_mse:     f64,                 // Per-symbol distortion under the design PMFs
}
impl CondQuantizerList {
    /// Build codebooks for every column from trained conditional
    /// statistics.
    ///
    /// Column 0 designs a pair against the unconditional PMF. Each
    /// later column derives, for every admissible left context q, the
    /// PMF P(X_c | Q_{c-1} = q) by Bayes' rule over the conditional
    /// statistics and the propagated quantizer-output distribution,
    /// designs a pair against it, then propagates P(Q_c | X_c) forward.
    pub fn generate(
        stats: &mut CondPmfList,
        dist: &Distortion,
        comp: f64,
    ) -> Result<CondQuantizerList, QvError> {
        let columns = stats.columns();
        let a_size = stats.alphabet_size();
        let input_alphabet = Alphabet::new(a_size);

        let mut list = CondQuantizerList {
            columns,
            input_alphabets: Vec::with_capacity(columns),
            quantizers:      Vec::with_capacity(columns),
            ratios:          Vec::with_capacity(columns),
            expected_mse:    0.0,
        };

        // Column 0: one virtual context.
        let (lo, hi, ratio) = optimize_for_entropy(stats.pmf_mut(0, 0), dist, comp)?;
        let mut marginal: Vec<f64> = stats.pmf_mut(0, 0).probs().to_vec();
        list.expected_mse += ratio * lo.mse + (1.0 - ratio) * hi.mse;
        let col_q = vec![lo, hi];
        let mut prev_qout = output_union(&col_q);

        // qpmf[x] = P(Q = q | X = x) over the union alphabet of the
        // current column's outputs.
        let mut qpmf: Vec<Vec<f64>> = (0..a_size).map(|x| {
            let mut probs = vec![0.0; prev_qout.size()];
            probs[prev_qout.index_of(col_q[0].map[x]).unwrap()] += ratio;
            probs[prev_qout.index_of(col_q[1].map[x]).unwrap()] += 1.0 - ratio;
            probs
        }).collect();

        list.input_alphabets.push(Alphabet::from_symbols(&[0]));
        list.quantizers.push(col_q);
        list.ratios.push(vec![ratio]);

        for c in 1..columns {
            let nctx = prev_qout.size();
            let mut col_q: Vec<Quantizer> = Vec::with_capacity(2 * nctx);
            let mut col_r: Vec<f64> = Vec::with_capacity(nctx);
            let mut reach = vec![0.0; nctx]; // P(Q_{c-1} = q)

            for qi in 0..nctx {
                // P(X_c = y | Q_{c-1} = q) =
                //   sum_x P(X_c = y | X_{c-1} = x) P(X_{c-1} = x) P(q | x)
                //   / sum_x P(X_{c-1} = x) P(q | x)
                let mut probs = vec![0.0; a_size];
                let mut denom = 0.0;
                for x in 0..a_size {
                    let w = marginal[x] * qpmf[x][qi];
                    if w <= 0.0 {
                        continue;
                    }
                    denom += w;
                    let cond = stats.pmf_mut(c, x as Symbol).probs();
                    for y in 0..a_size {
                        probs[y] += w * cond[y];
                    }
                }
                reach[qi] = denom;

                let mut ctx_pmf = if denom > 0.0 {
                    for p in probs.iter_mut() {
                        *p /= denom;
                    }
                    Pmf::from_probs(&input_alphabet, probs)
                }
                else {
                    // Unreachable context; design against uniform so
                    // the codebook stays total.
                    Pmf::from_probs(&input_alphabet, vec![1.0 / a_size as f64; a_size])
                };

                let (lo, hi, ratio) = optimize_for_entropy(&mut ctx_pmf, dist, comp)?;
                list.expected_mse += denom * (ratio * lo.mse + (1.0 - ratio) * hi.mse);
                col_q.push(lo);
                col_q.push(hi);
                col_r.push(ratio);
            }

            let qout = output_union(&col_q);

            // Propagate P(Q_c = u | X_c = y) through the chosen pairs,
            // weighted by how likely each context was to be reached.
            let mut next_qpmf = vec![vec![0.0; qout.size()]; a_size];
            for y in 0..a_size {
                for qi in 0..nctx {
                    if reach[qi] <= 0.0 {
                        continue;
                    }
                    let lo = &col_q[2 * qi];
                    let hi = &col_q[2 * qi + 1];
                    next_qpmf[y][qout.index_of(lo.map[y]).unwrap()] += reach[qi] * col_r[qi];
                    next_qpmf[y][qout.index_of(hi.map[y]).unwrap()] += reach[qi] * (1.0 - col_r[qi]);
                }
                let sum: f64 = next_qpmf[y].iter().sum();
                if sum > 0.0 {
                    for p in next_qpmf[y].iter_mut() {
                        *p /= sum;
                    }
                }
                else {
                    for p in next_qpmf[y].iter_mut() {
                        *p = 1.0 / qout.size() as f64;
                    }
                }
            }

            // Next column's marginal by the law of total probability.
            let mut next_marginal = vec![0.0; a_size];
            for x in 0..a_size {
                if marginal[x] <= 0.0 {
                    continue;
                }
                let cond = stats.pmf_mut(c, x as Symbol).probs();
                for y in 0..a_size {
                    next_marginal[y] += marginal[x] * cond[y];
                }
            }

            list.input_alphabets.push(prev_qout);
            list.quantizers.push(col_q);
            list.ratios.push(col_r);
            prev_qout = qout;
            qpmf = next_qpmf;
            marginal = next_marginal;
        }

        list.expected_mse /= columns as f64;
        Ok(list)
    }

    /// Number of admissible contexts at a column.
    pub fn context_count(&self, column: usize) -> usize {
        self.input_alphabets[column].size()
    }

    /// Select the quantizer for a column given the previous column's
    /// quantized output, drawing one word from the shared PRNG to pick
    /// low or high. Returns the storage index (used as the coding
    /// context) and the quantizer.
    pub fn choose(
        &self,
        column: usize,
        prev: Symbol,
        well: &mut Well1024,
    ) -> Result<(usize, &Quantizer), QvError> {
        let ctx = if column == 0 {
            0
        }
        else {
            self.input_alphabets[column].index_of(prev).ok_or_else(|| {
                QvError::CodebookMalformed(
                    format!("symbol {} is not a context at column {}", prev, column)
                )
            })?
        };
        let idx = if well.next_f64() < self.ratios[column][ctx] {
            2 * ctx
        }
        else {
            2 * ctx + 1
        };
        Ok((idx, &self.quantizers[column][idx]))
    }

    /// Fresh adaptive-count contexts for coding against this codebook:
    /// one per (column, stored quantizer), each over that quantizer's
    /// output alphabet.
    pub fn stream_stats(&self) -> Vec<Vec<StreamStats>> {
        self.quantizers.iter().map(|column| {
            column.iter().map(|q| StreamStats::new(q.states())).collect()
        }).collect()
    }

    /// Serialize as the container's codebook payload: the column count
    /// in network order, then per column a record of ratio bytes, a
    /// record of concatenated low maps, and a record of concatenated
    /// high maps, each newline-terminated.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<(), QvError> {
        out.write_all(&(self.columns as u32).to_be_bytes())?;
        out.write_all(b"\n")?;

        for c in 0..self.columns {
            let ratios = self.ratios[c].iter()
                .map(|r| (r * 100.0).round() as u8)
                .collect::<Vec<u8>>();
            out.write_all(&ratios)?;
            out.write_all(b"\n")?;

            for half in 0..2 {
                for ctx in 0..self.context_count(c) {
                    out.write_all(&self.quantizers[c][2 * ctx + half].map)?;
                }
                out.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    /// Parse a codebook payload. Record lengths are derived before
    /// each read (the context alphabet of a column is the union of the
    /// previous column's outputs), so map bytes that collide with the
    /// separator can't desynchronize the parser.
    pub fn read_from<R: Read>(input: &mut R, alphabet_size: usize) -> Result<CondQuantizerList, QvError> {
        let mut word = [0u8; 4];
        input.read_exact(&mut word)
            .map_err(|_| QvError::CodebookMalformed("missing column count".to_string()))?;
        let columns = u32::from_be_bytes(word) as usize;
        expect_newline(input)?;
        if columns == 0 {
            return Err(QvError::CodebookMalformed("zero columns".to_string()));
        }

        let mut list = CondQuantizerList {
            columns,
            input_alphabets: Vec::with_capacity(columns),
            quantizers:      Vec::with_capacity(columns),
            ratios:          Vec::with_capacity(columns),
            expected_mse:    0.0, // Unknown without the design PMFs
        };
        let mut contexts = Alphabet::from_symbols(&[0]);

        for c in 0..columns {
            let nctx = contexts.size();

            let ratio_bytes = read_record(input, nctx, "ratios")?;
            if ratio_bytes.iter().any(|&b| b > 100) {
                return Err(QvError::CodebookMalformed(format!("ratio out of range at column {}", c)));
            }
            let ratios = ratio_bytes.iter().map(|&b| b as f64 / 100.0).collect();

            let low = read_record(input, nctx * alphabet_size, "low maps")?;
            let high = read_record(input, nctx * alphabet_size, "high maps")?;
            if low.iter().chain(high.iter()).any(|&b| b as usize >= alphabet_size) {
                return Err(QvError::CodebookMalformed(format!("map symbol out of range at column {}", c)));
            }

            let mut quantizers = Vec::with_capacity(2 * nctx);
            for ctx in 0..nctx {
                let beg = ctx * alphabet_size;
                let end = beg + alphabet_size;
                quantizers.push(Quantizer::from_map(low[beg..end].to_vec()));
                quantizers.push(Quantizer::from_map(high[beg..end].to_vec()));
            }

            list.input_alphabets.push(contexts);
            contexts = output_union(&quantizers);
            list.quantizers.push(quantizers);
            list.ratios.push(ratios);
        }
        Ok(list)
    }
}

fn read_record<R: Read>(input: &mut R, len: usize, what: &str) -> Result<Vec<u8>, QvError> {
    let mut buf = vec![0u8; len];
    input.read_exact(&mut buf)
        .map_err(|_| QvError::CodebookMalformed(format!("truncated {}", what)))?;
    expect_newline(input)?;
    Ok(buf)
}

fn expect_newline<R: Read>(input: &mut R) -> Result<(), QvError> {
    let mut byte = [0u8; 1];
    input.read_exact(&mut byte)
        .map_err(|_| QvError::CodebookMalformed("truncated record".to_string()))?;
    if byte[0] != b'\n' {
        return Err(QvError::CodebookMalformed("missing record separator".to_string()));
    }
    Ok(())
}
