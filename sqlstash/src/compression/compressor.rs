use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use tracing::debug;

/// Compression algorithm selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    /// No compression
    None,
    /// LZ4 - Fast compression/decompression (default)
    #[default]
    Lz4,
    /// Zstandard - Better compression ratio
    Zstd,
}

impl CompressionAlgorithm {
    fn tag(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Lz4 => 1,
            Self::Zstd => 2,
        }
    }

    fn from_tag(tag: u8) -> io::Result<Self> {
        match tag {
            0 => Ok(Self::None),
            1 => Ok(Self::Lz4),
            2 => Ok(Self::Zstd),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown compression tag {other}"),
            )),
        }
    }
}

/// Highest accepted compression level
pub const MAX_LEVEL: u32 = 9;

/// Block compressor producing self-describing frames.
///
/// A frame is one algorithm tag byte followed by the compressed body, so frames written
/// under one configuration stay readable after the algorithm changes. Level 0 always
/// stores the body uncompressed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Compressor {
    algorithm: CompressionAlgorithm,
}

impl Compressor {
    pub fn new(algorithm: CompressionAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> CompressionAlgorithm {
        self.algorithm
    }

    /// Compress `data` at `level` (0-9) into a tagged frame
    pub fn compress(&self, data: &[u8], level: u32) -> io::Result<Vec<u8>> {
        let level = level.min(MAX_LEVEL);
        let algo = if level == 0 {
            CompressionAlgorithm::None
        } else {
            self.algorithm
        };

        let body = match algo {
            CompressionAlgorithm::None => data.to_vec(),
            CompressionAlgorithm::Lz4 => Self::compress_lz4(data, level)?,
            CompressionAlgorithm::Zstd => Self::compress_zstd(data, level)?,
        };

        let mut frame = Vec::with_capacity(body.len() + 1);
        frame.push(algo.tag());
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Decompress a frame produced by [`Compressor::compress`]
    pub fn decompress(&self, frame: &[u8]) -> io::Result<Vec<u8>> {
        let (&tag, body) = frame
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "empty frame"))?;

        match CompressionAlgorithm::from_tag(tag)? {
            CompressionAlgorithm::None => Ok(body.to_vec()),
            CompressionAlgorithm::Lz4 => Self::decompress_lz4(body),
            CompressionAlgorithm::Zstd => Self::decompress_zstd(body),
        }
    }

    fn compress_lz4(data: &[u8], level: u32) -> io::Result<Vec<u8>> {
        let mut encoder = lz4::EncoderBuilder::new().level(level).build(Vec::new())?;

        encoder.write_all(data)?;
        let (compressed, result) = encoder.finish();
        result?;

        debug!(
            "LZ4 compressed: {} → {} bytes (ratio: {:.2}x)",
            data.len(),
            compressed.len(),
            compression_ratio(data.len(), compressed.len())
        );

        Ok(compressed)
    }

    fn decompress_lz4(data: &[u8]) -> io::Result<Vec<u8>> {
        let mut decoder = lz4::Decoder::new(data)?;
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        Ok(decompressed)
    }

    fn compress_zstd(data: &[u8], level: u32) -> io::Result<Vec<u8>> {
        let compressed = zstd::encode_all(data, level as i32)?;

        debug!(
            "Zstd compressed: {} → {} bytes (ratio: {:.2}x)",
            data.len(),
            compressed.len(),
            compression_ratio(data.len(), compressed.len())
        );

        Ok(compressed)
    }

    fn decompress_zstd(data: &[u8]) -> io::Result<Vec<u8>> {
        zstd::decode_all(data)
    }
}

/// Calculate compression ratio
pub fn compression_ratio(original: usize, compressed: usize) -> f64 {
    if compressed == 0 {
        return 1.0;
    }
    original as f64 / compressed as f64
}
