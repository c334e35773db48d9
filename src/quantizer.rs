use crate::{
    distortion::Distortion,
    error::QvError,
    pmf::{Alphabet, Pmf, Symbol},
};

/// Iteration cap for Lloyd-Max design.
pub const QUANTIZER_MAX_ITER: usize = 100;


/// A many-to-one map from input symbols to a reconstruction alphabet,
/// designed by Lloyd-Max iteration against a PMF and a distortion
/// table. The map partitions the input alphabet into contiguous
/// regions, one per reconstruction point.
#[derive(Clone, Debug, PartialEq)]
pub struct Quantizer {
    pub map:     Vec<Symbol>, // Input index -> output symbol
    pub output:  Alphabet,    // Owned output alphabet
    pub mse:     f64,         // Expected distortion under the design PMF
}
impl Quantizer {
    /// Design a quantizer with the given number of states for the
    /// given PMF. Deterministic in (pmf, dist, states); ties on
    /// reconstruction points break toward the smallest candidate.
    pub fn generate(pmf: &mut Pmf, dist: &Distortion, states: usize) -> Result<Quantizer, QvError> {
        let size = pmf.alphabet.size();
        if states < 1 || states > size {
            return Err(QvError::InvalidStates(states));
        }

        // Initial bounds and reconstruction points: equal-width
        // regions with midpoint reconstructions. bounds[j] is the left
        // endpoint (inclusive) of region j.
        let mut bounds = vec![0usize; states + 1];
        bounds[states] = size;
        for j in 1..states {
            bounds[j] = (j * size) / states;
        }
        let mut recon = vec![0usize; states];
        for j in 0..states {
            recon[j] = (bounds[j] + bounds[j + 1] - 1) / 2;
        }

        // Alternate between adjusting reconstruction points for fixed
        // bounds and adjusting bounds for fixed reconstruction points
        // until a full pass changes nothing.
        let mut changed = true;
        let mut iter = 0;
        while changed && iter < QUANTIZER_MAX_ITER {
            changed = false;
            iter += 1;

            for j in 0..states {
                let mut min_mse = f64::MAX;
                let mut min_r = bounds[j];

                for r in bounds[j]..bounds[j + 1] {
                    let mut mse = 0.0;
                    for i in bounds[j]..bounds[j + 1] {
                        mse += pmf.prob(i) * dist.get(i, r);
                    }
                    if mse < min_mse {
                        min_r = r;
                        min_mse = mse;
                    }
                }

                if min_r != recon[j] {
                    changed = true;
                    recon[j] = min_r;
                }
            }

            // Walk interior symbols left to right; a boundary moves to
            // the first symbol closer to the next reconstruction point.
            // Ties keep the current boundary.
            let mut r = 0;
            let mut j = 1;
            while j + 1 < size && r + 1 < states {
                if dist.get(j, recon[r + 1]) < dist.get(j, recon[r]) {
                    r += 1;
                    bounds[r] = j;
                }
                j += 1;
            }
        }

        // Final mapping from input index to reconstruction symbol, and
        // the expected distortion of that assignment.
        let mut map = vec![0 as Symbol; size];
        let mut mse = 0.0;
        for j in 0..states {
            for i in bounds[j]..bounds[j + 1] {
                map[i] = recon[j] as Symbol;
                mse += pmf.prob(i) * dist.get(i, recon[j]);
            }
        }

        let output = Alphabet::from_symbols(
            &recon.iter().map(|&r| r as Symbol).collect::<Vec<Symbol>>()
        );

        Ok(Quantizer { map, output, mse })
    }

    /// Reconstruct a quantizer from a serialized input -> output map.
    /// The output alphabet is rebuilt by walking the map in order, so
    /// it matches the one the encoder owned. Expected distortion is
    /// unknown on this path.
    pub fn from_map(map: Vec<Symbol>) -> Quantizer {
        let output = Alphabet::from_symbols(&map);
        Quantizer { map, output, mse: 0.0 }
    }

    /// Number of reconstruction states.
    pub fn states(&self) -> usize {
        self.output.size()
    }

    /// State index of an output symbol within the output alphabet.
    pub fn state_of(&self, symbol: Symbol) -> Option<usize> {
        self.output.index_of(symbol)
    }

    /// PMF of the quantizer output when fed symbols from the given
    /// input distribution, expressed over the input alphabet.
    pub fn apply(&self, pmf: &mut Pmf) -> Pmf {
        let size = pmf.alphabet.size();
        let mut probs = vec![0.0; size];
        for i in 0..size {
            probs[self.map[i] as usize] += pmf.prob(i);
        }
        Pmf::from_probs(&pmf.alphabet, probs)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::distortion::DistortionKind;

    fn uniform(size: usize) -> Pmf {
        let alphabet = Alphabet::new(size);
        let mut pmf = Pmf::new(&alphabet);
        for i in 0..size {
            pmf.increment(i);
        }
        pmf
    }

    #[test]
    fn rejects_bad_state_counts() {
        let dist = Distortion::new(4, DistortionKind::Mse);
        let mut pmf = uniform(4);
        assert!(Quantizer::generate(&mut pmf, &dist, 0).is_err());
        assert!(Quantizer::generate(&mut pmf, &dist, 5).is_err());
    }

    #[test]
    fn full_states_is_identity() {
        let dist = Distortion::new(4, DistortionKind::Mse);
        let mut pmf = uniform(4);
        let q = Quantizer::generate(&mut pmf, &dist, 4).unwrap();
        assert_eq!(q.map, vec![0, 1, 2, 3]);
        assert_eq!(q.states(), 4);
        assert_eq!(q.mse, 0.0);
    }

    #[test]
    fn single_state_collapses() {
        let alphabet = Alphabet::new(41);
        let mut pmf = Pmf::new(&alphabet);
        for _ in 0..100 {
            pmf.increment(20);
        }
        let dist = Distortion::new(41, DistortionKind::Mse);
        let q = Quantizer::generate(&mut pmf, &dist, 1).unwrap();
        assert_eq!(q.states(), 1);
        assert_eq!(q.map[20], 20);
        assert_eq!(q.mse, 0.0);
    }

    #[test]
    fn state_counts_match_output_alphabet() {
        let dist = Distortion::new(16, DistortionKind::Mse);
        for states in 1..=16 {
            let mut pmf = uniform(16);
            let q = Quantizer::generate(&mut pmf, &dist, states).unwrap();
            assert_eq!(q.states(), states);
        }
    }

    #[test]
    fn expected_mse_of_halved_uniform() {
        let dist = Distortion::new(4, DistortionKind::Mse);
        let mut pmf = uniform(4);
        let q = Quantizer::generate(&mut pmf, &dist, 2).unwrap();
        // Regions {0,1} and {2,3}; one symbol per region reconstructs
        // exactly, the other at distance 1.
        assert!((q.mse - 0.5).abs() < 1e-12);
    }

    #[test]
    fn applied_pmf_sums_mass() {
        let dist = Distortion::new(4, DistortionKind::Mse);
        let mut pmf = uniform(4);
        let q = Quantizer::generate(&mut pmf, &dist, 2).unwrap();
        let mut out = q.apply(&mut pmf);
        let sum: f64 = out.probs().iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!((out.entropy() - 1.0).abs() < 1e-12);
    }
}
