use bytes::Bytes;

#[derive(Debug)]
pub enum CompressionError {
    Io(std::io::Error),
    /// Input is not a valid frame for the selected algorithm.
    InvalidFrame,
}

impl std::error::Error for CompressionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::InvalidFrame => None,
        }
    }
}

impl std::fmt::Display for CompressionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "i/o error: {}", err),
            Self::InvalidFrame => write!(f, "invalid compression frame"),
        }
    }
}

impl From<std::io::Error> for CompressionError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Chunk payload compression helper type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Zstd(i32),
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::Zstd(ref level) => write!(f, "ZSTD({})", level),
            Compression::None => write!(f, "None"),
        }
    }
}

impl Compression {
    /// ZSTD at the default level, what chunk stores use unless told otherwise.
    pub fn zstd_default() -> Self {
        Compression::Zstd(zstd::DEFAULT_COMPRESSION_LEVEL)
    }
    /// Compress a block of data with set compression.
    pub fn compress(self, input: Bytes) -> Result<Bytes, CompressionError> {
        match self {
            Compression::Zstd(level) => {
                let mut result = Vec::with_capacity(input.len());
                zstd::stream::copy_encode(&input[..], &mut result, level)?;
                Ok(Bytes::from(result))
            }
            Compression::None => Ok(input),
        }
    }
    /// Decompress a block of data using the set compression.
    ///
    /// The level carried by `Zstd` is ignored here, any valid frame decodes.
    pub fn decompress(self, input: Bytes, size_hint: usize) -> Result<Bytes, CompressionError> {
        match self {
            Compression::Zstd(_) => {
                let mut output = Vec::with_capacity(size_hint);
                zstd::stream::copy_decode(&input[..], &mut output)
                    .map_err(|_| CompressionError::InvalidFrame)?;
                Ok(Bytes::from(output))
            }
            Compression::None => Ok(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zstd_roundtrip() {
        let input = Bytes::from(vec![0x5eu8; 4096]);
        let compressed = Compression::zstd_default()
            .compress(input.clone())
            .unwrap();
        assert_ne!(compressed, input);
        let output = Compression::Zstd(0)
            .decompress(compressed, input.len())
            .unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn none_is_identity() {
        let input = Bytes::from_static(b"some data");
        assert_eq!(Compression::None.compress(input.clone()).unwrap(), input);
        assert_eq!(Compression::None.decompress(input.clone(), 0).unwrap(), input);
    }

    #[test]
    fn zstd_rejects_garbage() {
        let garbage = Bytes::from_static(b"this is not a zstd frame");
        match Compression::Zstd(0).decompress(garbage, 0) {
            Err(CompressionError::InvalidFrame) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
