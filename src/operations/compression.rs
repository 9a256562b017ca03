//! Compression operations: gzip, zlib, bzip2 and zstd.
//!
//! Malformed compressed input is recoverable, and so is output larger than
//! [`MAX_EXPANDED_SIZE`]. A failing encoder writing into memory is not.

use super::{read_bounded, MAX_EXPANDED_SIZE};
use crate::core::error::OperationError;
use crate::core::registry::OperationDescriptor;
use crate::core::types::{ArgumentSpec, DataKind, ResolvedArgs, Value};
use std::io::{Read, Write};

const CATEGORY: &str = "Compression";

pub fn operations() -> Vec<OperationDescriptor> {
    let op = |name: &str, f: fn(&Value, &ResolvedArgs) -> Result<Value, OperationError>| {
        OperationDescriptor::new(name, CATEGORY, DataKind::Bytes, DataKind::Bytes, f)
    };
    vec![
        op("Gzip", gzip)
            .describe("Compresses with gzip (RFC 1952).")
            .arg(ArgumentSpec::number_range("Compression level", 6.0, 0.0, 9.0)),
        op("Gunzip", gunzip).describe("Decompresses gzip data."),
        op("Zlib Deflate", zlib_deflate)
            .describe("Compresses with zlib (RFC 1950).")
            .arg(ArgumentSpec::number_range("Compression level", 6.0, 0.0, 9.0)),
        op("Zlib Inflate", zlib_inflate).describe("Decompresses zlib data."),
        op("Bzip2 Compress", bzip2_compress)
            .describe("Compresses with bzip2.")
            .arg(ArgumentSpec::number_range("Block size (100s of kb)", 9.0, 1.0, 9.0)),
        op("Bzip2 Decompress", bzip2_decompress).describe("Decompresses bzip2 data."),
        op("Zstd Compress", zstd_compress)
            .describe("Compresses with Zstandard.")
            .arg(ArgumentSpec::number_range("Compression level", 3.0, 1.0, 22.0)),
        op("Zstd Decompress", zstd_decompress).describe("Decompresses Zstandard data."),
    ]
}

fn encoder_error(e: std::io::Error) -> OperationError {
    OperationError::fatal(format!("compression failed: {}", e))
}

fn read_all(reader: impl Read, format: &str) -> Result<Value, OperationError> {
    read_bounded(reader, MAX_EXPANDED_SIZE, &format!("{} data", format)).map(Value::Bytes)
}

pub fn gzip(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let level = flate2::Compression::new(args.count(0)? as u32);
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), level);
    encoder.write_all(input.as_bytes()?).map_err(encoder_error)?;
    encoder.finish().map(Value::Bytes).map_err(encoder_error)
}

pub fn gunzip(input: &Value, _args: &ResolvedArgs) -> Result<Value, OperationError> {
    read_all(flate2::read::MultiGzDecoder::new(input.as_bytes()?), "gzip")
}

pub fn zlib_deflate(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let level = flate2::Compression::new(args.count(0)? as u32);
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), level);
    encoder.write_all(input.as_bytes()?).map_err(encoder_error)?;
    encoder.finish().map(Value::Bytes).map_err(encoder_error)
}

pub fn zlib_inflate(input: &Value, _args: &ResolvedArgs) -> Result<Value, OperationError> {
    read_all(flate2::read::ZlibDecoder::new(input.as_bytes()?), "zlib")
}

pub fn bzip2_compress(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let level = bzip2::Compression::new(args.count(0)? as u32);
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), level);
    encoder.write_all(input.as_bytes()?).map_err(encoder_error)?;
    encoder.finish().map(Value::Bytes).map_err(encoder_error)
}

pub fn bzip2_decompress(input: &Value, _args: &ResolvedArgs) -> Result<Value, OperationError> {
    read_all(bzip2::read::BzDecoder::new(input.as_bytes()?), "bzip2")
}

pub fn zstd_compress(input: &Value, args: &ResolvedArgs) -> Result<Value, OperationError> {
    let level = args.integer(0)? as i32;
    zstd::encode_all(input.as_bytes()?, level)
        .map(Value::Bytes)
        .map_err(encoder_error)
}

pub fn zstd_decompress(input: &Value, _args: &ResolvedArgs) -> Result<Value, OperationError> {
    let decoder = zstd::stream::read::Decoder::new(input.as_bytes()?)
        .map_err(|e| OperationError::invalid_input(format!("Invalid zstd data: {}", e)))?;
    read_all(decoder, "zstd")
}
