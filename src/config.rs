use std::{
    path::PathBuf,
    process::exit,
};

use crate::{
    distortion::DistortionKind,
    error::ConfigError,
};

/// Encode or decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Encode,
    Decode,
}

/// How the rate target is interpreted. Fixed-rate coding is accepted
/// on the command line but falls back to ratio mode until implemented.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateMode {
    Ratio,
    Fixed,
}

/// An enum containing each possible parsing state.
enum Parse {
    None,
    Ratio,
    Rate,
    Clusters,
    Training,
}

/// A list of all user defined configuration settings.
#[derive(Clone, Debug)]
pub struct Config {
    pub mode:          Mode,           // Encode or decode
    pub input:         PathBuf,        // Input file
    pub output:        PathBuf,        // Output file
    pub ratio:         f64,            // Target fraction of input entropy
    pub rate_mode:     RateMode,       // Ratio or fixed-rate target
    pub clusters:      usize,          // Number of k-means cohorts
    pub training_cap:  u64,            // Training line cap (0 = all)
    pub distortion:    DistortionKind, // Distortion metric
    pub verbose:       bool,           // Verbose reporting
    pub stats:         bool,           // One-line parseable stats
    pub seed:          Option<[u32; 32]>, // Forced WELL state (API only)
}
impl Default for Config {
    fn default() -> Config {
        Config {
            mode:          Mode::Encode,
            input:         PathBuf::new(),
            output:        PathBuf::new(),
            ratio:         0.5,
            rate_mode:     RateMode::Ratio,
            clusters:      3,
            training_cap:  1_000_000,
            distortion:    DistortionKind::Mse,
            verbose:       false,
            stats:         false,
            seed:          None,
        }
    }
}
impl Config {
    /// Create a new Config with the specified command line arguments.
    pub fn new(args: &[String]) -> Result<Config, ConfigError> {
        if args.is_empty() {
            print_program_info();
        }

        let mut cfg = Config::default();
        let mut parser = Parse::None;
        let mut file_idx = 0;

        for arg in args.iter() {
            match arg.as_str() {
                "-f" => {
                    parser = Parse::Ratio;
                    continue;
                }
                "-r" => {
                    parser = Parse::Rate;
                    continue;
                }
                "-c" => {
                    parser = Parse::Clusters;
                    continue;
                }
                "-t" => {
                    parser = Parse::Training;
                    continue;
                }
                "-x" => cfg.mode = Mode::Decode,
                "-q" => cfg.mode = Mode::Encode,
                "-v" => cfg.verbose = true,
                "-s" => cfg.stats = true,
                "-h" => print_program_info(),
                opt if opt.starts_with('-') => {
                    return Err(ConfigError::UnknownOption(opt.to_string()));
                }
                _ => {}
            }
            match parser {
                Parse::Ratio => {
                    cfg.ratio = parse_ratio(arg)?;
                    cfg.rate_mode = RateMode::Ratio;
                    cfg.mode = Mode::Encode;
                }
                Parse::Rate => {
                    cfg.ratio = parse_ratio(arg)?;
                    cfg.rate_mode = RateMode::Fixed;
                    cfg.mode = Mode::Encode;
                    println!("--Warning-- fixed rate encoding not yet implemented, falling back to ratio");
                }
                Parse::Clusters => {
                    cfg.clusters = match arg.parse::<usize>() {
                        Ok(count) if count >= 1 && count <= 255 => count,
                        _ => return Err(ConfigError::InvalidClusterCount(arg.to_string())),
                    };
                }
                Parse::Training => {
                    cfg.training_cap = match arg.parse::<u64>() {
                        Ok(cap) => cap,
                        Err(_)  => return Err(ConfigError::InvalidTrainingCap(arg.to_string())),
                    };
                }
                Parse::None => {
                    if arg.starts_with('-') {
                        continue;
                    }
                    match file_idx {
                        0 => cfg.input = PathBuf::from(arg),
                        1 => cfg.output = PathBuf::from(arg),
                        _ => return Err(ConfigError::ExtraFileName(arg.to_string())),
                    }
                    file_idx += 1;
                }
            }
            parser = Parse::None;
        }

        if file_idx != 2 {
            return Err(ConfigError::MissingFileNames);
        }
        Ok(cfg)
    }

    /// Print information about the current Config.
    pub fn print(&self) {
        if self.verbose {
            match self.mode {
                Mode::Decode => {
                    println!("{} will be decoded to {}.",
                        self.input.display(), self.output.display());
                }
                Mode::Encode => {
                    println!("{} will be encoded as {}.",
                        self.input.display(), self.output.display());
                    match self.rate_mode {
                        RateMode::Ratio => {
                            println!("Ratio mode selected, targeting {} compression ratio", self.ratio);
                        }
                        RateMode::Fixed => {
                            println!("Fixed-rate mode selected, targeting {} bits per symbol", self.ratio);
                        }
                    }
                    println!("Compression will use {} clusters", self.clusters);
                }
            }
        }
    }
}

fn parse_ratio(arg: &str) -> Result<f64, ConfigError> {
    match arg.parse::<f64>() {
        Ok(ratio) if ratio > 0.0 && ratio <= 1.0 => Ok(ratio),
        _ => Err(ConfigError::InvalidRatio(arg.to_string())),
    }
}


/// Print usage information.
fn print_program_info() -> ! {
    println!();
    println!("qvpack, lossy quality value compressor");
    println!();
    println!("USAGE: PROG_NAME (options) [input file] [output file]");
    println!();
    println!("OPTIONS:");
    println!("  -q         Store quality values in compressed file (default)");
    println!("  -x         Extract quality values from compressed file");
    println!("  -f ratio   Compress using [ratio] bits per bit of input entropy per symbol");
    println!("  -r rate    Compress using fixed [rate] bits per symbol");
    println!("  -c #       Compress using [#] clusters               (Default - 3)");
    println!("  -t lines   Number of lines to use as training set    (Default - 1000000, 0 for all)");
    println!("  -v         Enable verbose output");
    println!("  -s         Print summary stats");
    println!("  -h         Print this help");
    println!();
    println!("EXAMPLE:");
    println!("  Compress file [reads.qv] at half its empirical entropy:");
    println!();
    println!("      qvpack -f 0.5 reads.qv reads.qvp");
    println!();
    println!("  Decompress the file:");
    println!();
    println!("      qvpack -x reads.qvp reads.out");
    exit(0);
}
