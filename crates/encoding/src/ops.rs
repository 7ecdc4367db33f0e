//! Decoding Operations

use crate::Encoding;
use crate::error::{ErrorKind, Result};
#[cfg(feature = "brotli")]
use brotli::{CompressorWriter as BrotliEncoder, Decompressor as BrotliDecoder};
use bzip2::{Compression as BzCompression, read::BzDecoder, write::BzEncoder};
use exn::ResultExt;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression as FlateCompression;
use std::io::{Read, Write};
use tracing::instrument;
#[cfg(feature = "xz")]
use xz2::{read::XzDecoder, write::XzEncoder};
#[cfg(feature = "zstd")]
use zstd::stream::{read::Decoder as ZstdDecoder, write::Encoder as ZstdEncoder};

// Encoding only exists to build fixtures and re-encode small payloads, so the
// default levels are fine.
#[cfg(feature = "brotli")]
const BROTLI_BUFFER_SIZE: usize = 4096;
#[cfg(feature = "brotli")]
const BROTLI_QUALITY: u32 = 5;
#[cfg(feature = "brotli")]
const BROTLI_LG_WINDOW_SIZE: u32 = 22;
#[cfg(feature = "xz")]
const XZ_LEVEL: u32 = 6;
#[cfg(feature = "zstd")]
const ZSTD_LEVEL: i32 = 3;

impl Encoding {
    /// Encode a byte slice in memory.
    ///
    /// ```
    /// use mirror_encoding::Encoding;
    ///
    /// let encoded = Encoding::Gzip.encode(b"Hello, world!").unwrap();
    /// assert_eq!(&encoded[..2], &[0x1F, 0x8B]);
    /// ```
    pub fn encode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        match self {
            Encoding::Identity => output.extend_from_slice(input),
            #[cfg(feature = "brotli")]
            Encoding::Brotli => {
                let mut encoder =
                    BrotliEncoder::new(&mut output, BROTLI_BUFFER_SIZE, BROTLI_QUALITY, BROTLI_LG_WINDOW_SIZE);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                // Flushed on drop.
                drop(encoder);
            },
            Encoding::Bzip2 => {
                let mut encoder = BzEncoder::new(&mut output, BzCompression::default());
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
            Encoding::Deflate => {
                let mut encoder = ZlibEncoder::new(&mut output, FlateCompression::default());
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
            Encoding::Gzip => {
                let mut encoder = GzEncoder::new(&mut output, FlateCompression::default());
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
            #[cfg(feature = "xz")]
            Encoding::Xz => {
                let mut encoder = XzEncoder::new(&mut output, XZ_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
            #[cfg(feature = "zstd")]
            Encoding::Zstd => {
                let mut encoder = ZstdEncoder::new(&mut output, ZSTD_LEVEL).or_raise(|| ErrorKind::Encoder)?;
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
        }
        Ok(output)
    }

    /// Decode a byte slice in memory.
    pub fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.decode_into(input, &mut output)?;
        Ok(output)
    }

    #[instrument(skip(input, output), fields(coding = %self, input_size = input.len(), output_size))]
    pub fn decode_into(&self, input: &[u8], output: &mut Vec<u8>) -> Result<usize> {
        let size = self.wrap_reader(input)?.read_to_end(output).or_raise(|| ErrorKind::InvalidData)?;
        tracing::Span::current().record("output_size", size);
        Ok(size)
    }

    /// Wrap a reader with the matching decoding layer.
    ///
    /// ```
    /// use std::io::{Cursor, Read};
    /// use mirror_encoding::Encoding;
    ///
    /// let encoded = Encoding::Deflate.encode(b"payload").unwrap();
    /// let mut reader = Encoding::Deflate.wrap_reader(Cursor::new(encoded)).unwrap();
    /// let mut decoded = Vec::new();
    /// reader.read_to_end(&mut decoded).unwrap();
    /// assert_eq!(decoded, b"payload");
    /// ```
    pub fn wrap_reader<'a, R: Read + 'a>(&self, reader: R) -> Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Encoding::Identity => Box::new(reader),
            #[cfg(feature = "brotli")]
            Encoding::Brotli => Box::new(BrotliDecoder::new(reader, BROTLI_BUFFER_SIZE)),
            Encoding::Bzip2 => Box::new(BzDecoder::new(reader)),
            Encoding::Deflate => Box::new(ZlibDecoder::new(reader)),
            Encoding::Gzip => Box::new(GzDecoder::new(reader)),
            #[cfg(feature = "xz")]
            Encoding::Xz => Box::new(XzDecoder::new(reader)),
            #[cfg(feature = "zstd")]
            Encoding::Zstd => Box::new(ZstdDecoder::new(reader).or_raise(|| ErrorKind::Encoder)?),
        })
    }

    /// Wrap a reader with every layer of a `Content-Encoding` list. Codings
    /// are listed in the order they were applied, so they are undone last
    /// to first.
    pub fn wrap_reader_stack<'a, R: Read + 'a>(codings: &[Encoding], reader: R) -> Result<Box<dyn Read + 'a>> {
        let mut reader: Box<dyn Read + 'a> = Box::new(reader);
        for coding in codings.iter().rev() {
            reader = coding.wrap_reader(reader)?;
        }
        Ok(reader)
    }

    /// Decode from a reader into a writer, returning bytes written.
    pub fn decode_stream<'a, R: Read + 'a, W: Write>(&self, reader: R, mut writer: W) -> Result<u64> {
        let mut reader = self.wrap_reader(reader)?;
        std::io::copy(&mut reader, &mut writer).or_raise(|| ErrorKind::InvalidData)
    }
}
