pub mod codec;
pub mod compressor;

pub use codec::{BincodeCodec, Codec};
pub use compressor::{CompressionAlgorithm, Compressor, compression_ratio};
