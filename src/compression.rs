//! EXI Compression und Pre-Compression (Spec 9, 9.1, 9.2, 9.3).
//!
//! Dieses Modul implementiert:
//! - Stream-Plan: Aufteilung der Value Channels eines Blocks auf Streams (Spec 9.3)
//! - Block-Ausgabe: Structure + Channels, roh oder DEFLATE-komprimiert
//! - DEFLATE: RFC 1951 Kompression (flate2 crate)
//!
//! # Architektur
//!
//! ```text
//! Events → [Block 1] → [Block 2] → ... → [Block N]
//!            ↓
//!          [Structure Channel] + [Value Channels nach QName]
//!            ↓
//!          [Streams] (kombiniert oder einzeln, je nach Value-Anzahl)
//!            ↓
//!          [DEFLATE] (Compression) oder [direkt] (Pre-Compression)
//! ```
//!
//! Encoder und Decoder kodieren die Values eines Blocks in derselben
//! Channel-Reihenfolge, damit die String Table identisch wächst.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::{Error, Result};

/// Schwelle für kleine Channels und kombinierte Streams (Spec 9.3).
pub const SMALL_CHANNEL_LIMIT: usize = 100;

/// Aufteilung der Channels eines Blocks auf Streams (Spec 9.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPlan {
    /// ≤100 Values: Structure und alle Channels bilden einen Stream.
    pub combined: bool,
    /// Channel-Indizes pro Value-Stream, in Schreibreihenfolge.
    pub groups: Vec<Vec<usize>>,
}

impl StreamPlan {
    /// Channel-Indizes in Kodierreihenfolge.
    pub fn channel_order(&self) -> impl Iterator<Item = usize> + '_ {
        self.groups.iter().flatten().copied()
    }
}

/// Plant die Streams eines Blocks.
///
/// `counts` enthält die Value-Anzahl pro Channel in Reihenfolge des ersten
/// Auftretens.
///
/// - ≤100 Values insgesamt: ein kombinierter Stream, Channels in
///   Reihenfolge des ersten Auftretens
/// - >100 Values: erst alle kleinen Channels (≤100) in einem Stream, dann
///   jeder große Channel in einem eigenen Stream
pub fn plan_streams(counts: &[usize]) -> StreamPlan {
    let total: usize = counts.iter().sum();
    if total <= SMALL_CHANNEL_LIMIT {
        let all: Vec<usize> = (0..counts.len()).collect();
        let groups = if all.is_empty() { Vec::new() } else { vec![all] };
        return StreamPlan { combined: true, groups };
    }
    let (small, large): (Vec<usize>, Vec<usize>) =
        (0..counts.len()).partition(|&i| counts[i] <= SMALL_CHANNEL_LIMIT);
    let mut groups = Vec::with_capacity(1 + large.len());
    if !small.is_empty() {
        groups.push(small);
    }
    groups.extend(large.into_iter().map(|i| vec![i]));
    StreamPlan { combined: false, groups }
}

/// Schreibt einen Block (Spec 9.3).
///
/// `channels[i]` sind die kodierten Values von Channel `i`. Mit
/// `compressor` wird jeder Stream DEFLATE-komprimiert, auch ein leerer,
/// damit der Decoder die Streams ohne Längenangabe abzählen kann.
pub fn write_block(
    out: &mut Vec<u8>,
    structure: &[u8],
    plan: &StreamPlan,
    channels: &[Vec<u8>],
    mut compressor: Option<&mut Compress>,
) -> Result<()> {
    let mut streams: Vec<Vec<u8>> = Vec::with_capacity(plan.groups.len() + 1);
    let mut first = structure.to_vec();
    if plan.combined {
        for &i in plan.groups.iter().flatten() {
            first.extend_from_slice(&channels[i]);
        }
        streams.push(first);
    } else {
        streams.push(first);
        for group in &plan.groups {
            let mut data = Vec::new();
            for &i in group {
                data.extend_from_slice(&channels[i]);
            }
            streams.push(data);
        }
    }

    for stream in streams {
        match compressor.as_deref_mut() {
            Some(c) => out.extend_from_slice(&deflate_compress_reuse(&stream, c)?),
            None => out.extend_from_slice(&stream),
        }
    }
    log::trace!(
        "block written: {} structure bytes, {} channels",
        structure.len(),
        channels.len()
    );
    Ok(())
}

/// Komprimiert Daten mit DEFLATE (RFC 1951).
///
/// Spec 9.3: "each compressed stream in a block is stored using the standard
/// DEFLATE Compressed Data Format defined by RFC 1951"
pub fn deflate_compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut compressor = Compress::new(Compression::default(), false);
    deflate_compress_reuse(data, &mut compressor)
}

/// Komprimiert Daten mit DEFLATE unter Wiederverwendung einer Compress-Instanz.
pub fn deflate_compress_reuse(data: &[u8], compressor: &mut Compress) -> Result<Vec<u8>> {
    compressor.reset();
    let mut output = Vec::with_capacity(data.len() + 64);
    let mut offset = 0;
    loop {
        let mut out_buf = [0u8; 8192];
        let before_in = compressor.total_in() as usize;
        let before_out = compressor.total_out() as usize;

        let flush = if offset >= data.len() { FlushCompress::Finish } else { FlushCompress::None };
        let status = compressor
            .compress(&data[offset..], &mut out_buf, flush)
            .map_err(|e| Error::CompressionError(format!("DEFLATE compress failed: {e}")))?;

        let consumed = (compressor.total_in() as usize).saturating_sub(before_in);
        let produced = (compressor.total_out() as usize).saturating_sub(before_out);
        offset += consumed;
        output.extend_from_slice(&out_buf[..produced]);

        match status {
            Status::StreamEnd => return Ok(output),
            Status::Ok | Status::BufError => {
                if consumed == 0 && produced == 0 && offset >= data.len() {
                    return Err(Error::CompressionError(
                        "DEFLATE compress stalled: all input consumed but no StreamEnd".into(),
                    ));
                }
            }
        }
    }
}

/// Dekomprimiert einen DEFLATE-Stream am Anfang von `data`.
///
/// `reset(false)` = Raw DEFLATE (RFC 1951), kein zlib-Header.
/// Gibt (decompressed_data, bytes_consumed) zurück.
pub fn deflate_decompress_reuse(data: &[u8], decompressor: &mut Decompress) -> Result<(Vec<u8>, usize)> {
    decompressor.reset(false);
    let mut result = Vec::new();
    let mut offset = 0usize;

    loop {
        let mut out_buf = [0u8; 8192];
        let before_in = decompressor.total_in() as usize;
        let before_out = decompressor.total_out() as usize;

        let flush = if offset >= data.len() { FlushDecompress::Finish } else { FlushDecompress::None };
        let status = decompressor
            .decompress(&data[offset..], &mut out_buf, flush)
            .map_err(|e| Error::DecompressionError(format!("DEFLATE decompression failed: {e}")))?;

        let consumed = (decompressor.total_in() as usize).saturating_sub(before_in);
        let produced = (decompressor.total_out() as usize).saturating_sub(before_out);
        offset += consumed;
        result.extend_from_slice(&out_buf[..produced]);

        match status {
            Status::StreamEnd => break,
            Status::Ok | Status::BufError => {
                if consumed == 0 && produced == 0 {
                    return Err(Error::PrematureEndOfStream);
                }
            }
        }
    }

    Ok((result, offset))
}
