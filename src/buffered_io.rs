use std::{
    fs::File,
    io::{BufReader, BufWriter, ErrorKind},
    path::Path,
};

use crate::error::QvError;


/// Takes a file path and returns an input file wrapped in a BufReader.
pub fn new_input_file(path: &Path) -> Result<BufReader<File>, QvError> {
    match File::open(path) {
        Ok(file) => Ok(BufReader::with_capacity(1 << 16, file)),
        Err(err) => match err.kind() {
            ErrorKind::NotFound => Err(QvError::InputNotFound(path.to_path_buf())),
            _                   => Err(QvError::Io(err)),
        }
    }
}

/// Takes a file path and returns an output file wrapped in a BufWriter.
pub fn new_output_file(path: &Path) -> Result<BufWriter<File>, QvError> {
    let file = File::create(path)?;
    Ok(BufWriter::with_capacity(1 << 16, file))
}

/// Length of a file in bytes.
pub fn file_len(path: &Path) -> Result<u64, QvError> {
    Ok(path.metadata()?.len())
}
