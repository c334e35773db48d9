pub mod arith;
pub mod bitstream;
pub mod cluster;
pub mod codebook;
pub mod config;
pub mod decode;
pub mod distortion;
pub mod encode;
pub mod error;
pub mod lines;
pub mod pmf;
pub mod quantizer;
pub mod well;
mod buffered_io;
mod progress;

use crate::{
    config::{Config, Mode, RateMode},
    decode::{decode, DecodeSummary},
    distortion::DistortionKind,
    encode::{encode, EncodeSummary},
    error::{ConfigError, QvError},
};


/// qvpack API. Encodes or decodes quality value files using method
/// chaining syntax or an existing Config.
#[derive(Clone, Default)]
pub struct QvPack {
    cfg: Config,
}
impl QvPack {
    /// Create a qvpack encoder or decoder with an existing Config.
    pub fn new(cfg: Config) -> QvPack {
        QvPack {
            cfg
        }
    }

    /// Choose the input file.
    pub fn input(mut self, path: &str) -> Self {
        self.cfg.input = path.into();
        self
    }

    /// Choose the output file.
    pub fn output(mut self, path: &str) -> Self {
        self.cfg.output = path.into();
        self
    }

    /// Target a fraction of the input entropy, in (0, 1].
    pub fn ratio(mut self, ratio: f64) -> Result<Self, ConfigError> {
        if ratio > 0.0 && ratio <= 1.0 {
            self.cfg.ratio = ratio;
            self.cfg.rate_mode = RateMode::Ratio;
        }
        else {
            return Err(ConfigError::InvalidRatio(ratio.to_string()));
        }
        Ok(self)
    }

    /// Choose the number of clusters (1..=255).
    pub fn clusters(mut self, count: usize) -> Result<Self, ConfigError> {
        if count >= 1 && count <= 255 {
            self.cfg.clusters = count;
        }
        else {
            return Err(ConfigError::InvalidClusterCount(count.to_string()));
        }
        Ok(self)
    }

    /// Cap the number of training lines (0 means all).
    pub fn training_cap(mut self, cap: u64) -> Self {
        self.cfg.training_cap = cap;
        self
    }

    /// Choose the distortion metric used for quantizer design and
    /// clustering.
    pub fn distortion(mut self, kind: DistortionKind) -> Self {
        self.cfg.distortion = kind;
        self
    }

    /// Force the WELL seed state instead of drawing it from system
    /// entropy. Two encodes of the same input with the same forced
    /// state produce identical containers.
    pub fn seed(mut self, state: [u32; 32]) -> Self {
        self.cfg.seed = Some(state);
        self
    }

    /// Enable verbose reporting.
    pub fn verbose(mut self) -> Self {
        self.cfg.verbose = true;
        self
    }

    /// Print one line of machine-parseable stats after encoding.
    pub fn stats(mut self) -> Self {
        self.cfg.stats = true;
        self
    }

    /// Encode the input file into a container.
    pub fn encode(mut self) -> Result<EncodeSummary, QvError> {
        self.cfg.mode = Mode::Encode;
        self.cfg.print();
        encode(&self.cfg)
    }

    /// Decode a container back into quality value lines.
    pub fn decode(mut self) -> Result<DecodeSummary, QvError> {
        self.cfg.mode = Mode::Decode;
        self.cfg.print();
        decode(&self.cfg)
    }
}
