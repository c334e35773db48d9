use crate::error::QvError;

/// A quality value symbol. Symbols are small integers in [0, A);
/// the Phred+33 offset is applied only at the file boundary.
pub type Symbol = u8;


/// An ordered set of symbols with unique membership. Indices are
/// assigned in insertion order, so `symbols[i] == s` exactly when
/// `index_of(s) == Some(i)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Alphabet {
    pub symbols: Vec<Symbol>,
}
impl Alphabet {
    /// Create a contiguous alphabet 0..size.
    pub fn new(size: usize) -> Alphabet {
        Alphabet {
            symbols: (0..size as u8).collect(),
        }
    }

    /// Create an alphabet from a list of symbols, keeping the first
    /// occurrence of each.
    pub fn from_symbols(symbols: &[Symbol]) -> Alphabet {
        let mut alphabet = Alphabet { symbols: Vec::new() };
        for &sym in symbols.iter() {
            alphabet.push_unique(sym);
        }
        alphabet
    }

    pub fn size(&self) -> usize {
        self.symbols.len()
    }

    /// Index of a symbol, or None if the alphabet doesn't contain it.
    pub fn index_of(&self, symbol: Symbol) -> Option<usize> {
        self.symbols.iter().position(|&s| s == symbol)
    }

    /// Append a symbol unless it is already present.
    pub fn push_unique(&mut self, symbol: Symbol) {
        if self.index_of(symbol).is_none() {
            self.symbols.push(symbol);
        }
    }

    /// Extend with every symbol of another alphabet, keeping
    /// first-seen order.
    pub fn union_with(&mut self, other: &Alphabet) {
        for &sym in other.symbols.iter() {
            self.push_unique(sym);
        }
    }
}


/// A probability mass function over an alphabet, stored as empirical
/// counts with a lazily normalized probability vector. A PMF may also
/// be created directly from probabilities when it is derived rather
/// than observed.
#[derive(Clone, Debug)]
pub struct Pmf {
    pub alphabet:  Alphabet,  // Alphabet this PMF is defined over
    counts:        Vec<u64>,  // Empirical counts per index
    total:         u64,       // Sum of counts
    probs:         Vec<f64>,  // Normalized probabilities (lazy)
    ready:         bool,      // Probabilities reflect counts
}
impl Pmf {
    /// Create an empty PMF over the given alphabet.
    pub fn new(alphabet: &Alphabet) -> Pmf {
        Pmf {
            alphabet:  alphabet.clone(),
            counts:    vec![0; alphabet.size()],
            total:     0,
            probs:     vec![0.0; alphabet.size()],
            ready:     false,
        }
    }

    /// Create a PMF directly from a probability vector. The vector
    /// must have one entry per alphabet symbol.
    pub fn from_probs(alphabet: &Alphabet, probs: Vec<f64>) -> Pmf {
        Pmf {
            alphabet:  alphabet.clone(),
            counts:    vec![0; alphabet.size()],
            total:     0,
            probs,
            ready:     true,
        }
    }

    /// Record one observation of the symbol at the given index.
    pub fn increment(&mut self, index: usize) {
        self.counts[index] += 1;
        self.total += 1;
        self.ready = false;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Recalculate the probability vector from the counts. A PMF with
    /// no observations normalizes to uniform rather than NaN.
    fn normalize(&mut self) {
        if self.total == 0 {
            let p = 1.0 / self.alphabet.size() as f64;
            for prob in self.probs.iter_mut() {
                *prob = p;
            }
        }
        else {
            for (prob, &count) in self.probs.iter_mut().zip(self.counts.iter()) {
                *prob = count as f64 / self.total as f64;
            }
        }
        self.ready = true;
    }

    /// Probability at an index, triggering lazy normalization.
    pub fn prob(&mut self, index: usize) -> f64 {
        if !self.ready {
            self.normalize();
        }
        self.probs[index]
    }

    /// The full probability vector, triggering lazy normalization.
    pub fn probs(&mut self) -> &[f64] {
        if !self.ready {
            self.normalize();
        }
        &self.probs
    }

    /// Entropy of this PMF in bits.
    pub fn entropy(&mut self) -> f64 {
        if !self.ready {
            self.normalize();
        }
        let mut entropy = 0.0;
        for &p in self.probs.iter() {
            if p > 0.0 {
                entropy -= p * p.log2();
            }
        }
        entropy
    }

    /// Kullback-Leibler divergence D(self || other) in bits.
    pub fn kl(&mut self, other: &mut Pmf) -> Result<f64, QvError> {
        if self.alphabet != other.alphabet {
            return Err(QvError::AlphabetMismatch);
        }
        if !self.ready {
            self.normalize();
        }
        if !other.ready {
            other.normalize();
        }
        let mut d = 0.0;
        for (&p, &q) in self.probs.iter().zip(other.probs.iter()) {
            if p > 0.0 && q > 0.0 {
                d += p * (p / q).log2();
            }
        }
        Ok(d)
    }

    /// Combine two PMFs over the same alphabet as wa*a + wb*b. This is
    /// a linear (not convex) combination operating on probabilities,
    /// suitable for the law of total probability when the empirical
    /// counts don't match; callers wanting a valid PMF must supply
    /// weights summing to 1.
    pub fn mix(a: &mut Pmf, b: &mut Pmf, wa: f64, wb: f64) -> Result<Pmf, QvError> {
        if a.alphabet != b.alphabet {
            return Err(QvError::AlphabetMismatch);
        }
        if !a.ready {
            a.normalize();
        }
        if !b.ready {
            b.normalize();
        }
        let probs = a.probs.iter().zip(b.probs.iter())
            .map(|(&pa, &pb)| wa * pa + wb * pb)
            .collect::<Vec<f64>>();
        Ok(Pmf::from_probs(&a.alphabet, probs))
    }

    /// Rescale the probability vector to sum to 1. A zero vector
    /// becomes uniform.
    pub fn renormalize(&mut self) {
        let sum: f64 = self.probs.iter().sum();
        if sum > 0.0 {
            for prob in self.probs.iter_mut() {
                *prob /= sum;
            }
        }
        else {
            let p = 1.0 / self.alphabet.size() as f64;
            for prob in self.probs.iter_mut() {
                *prob = p;
            }
        }
        self.ready = true;
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probabilities_sum_to_one() {
        let alphabet = Alphabet::new(8);
        let mut pmf = Pmf::new(&alphabet);
        for i in 0..8 {
            for _ in 0..(i + 1) {
                pmf.increment(i);
            }
        }
        let sum: f64 = pmf.probs().iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn uniform_entropy() {
        let alphabet = Alphabet::new(4);
        let mut pmf = Pmf::new(&alphabet);
        for i in 0..4 {
            pmf.increment(i);
        }
        assert!((pmf.entropy() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn kl_of_identical_is_zero() {
        let alphabet = Alphabet::new(4);
        let mut p = Pmf::new(&alphabet);
        let mut q = Pmf::new(&alphabet);
        for i in 0..4 {
            p.increment(i);
            q.increment(i);
        }
        assert!(p.kl(&mut q).unwrap().abs() < 1e-12);
    }

    #[test]
    fn mix_rejects_mismatched_alphabets() {
        let mut a = Pmf::new(&Alphabet::new(4));
        let mut b = Pmf::new(&Alphabet::new(5));
        assert!(Pmf::mix(&mut a, &mut b, 0.5, 0.5).is_err());
    }

    #[test]
    fn mix_is_linear() {
        let alphabet = Alphabet::new(2);
        let mut a = Pmf::from_probs(&alphabet, vec![1.0, 0.0]);
        let mut b = Pmf::from_probs(&alphabet, vec![0.0, 1.0]);
        let mut m = Pmf::mix(&mut a, &mut b, 0.25, 0.75).unwrap();
        assert!((m.prob(0) - 0.25).abs() < 1e-12);
        assert!((m.prob(1) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn union_keeps_insertion_order() {
        let mut a = Alphabet::from_symbols(&[3, 7]);
        let b = Alphabet::from_symbols(&[7, 2, 3, 9]);
        a.union_with(&b);
        assert_eq!(a.symbols, vec![3, 7, 2, 9]);
        assert_eq!(a.index_of(9), Some(3));
    }
}
