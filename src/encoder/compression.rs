//! Encoder Compression / PreCompression (Spec 9).
//!
//! Im Channel-Modus schreibt der Encoder Event Codes und QNames in den
//! Structure Channel, AT/CH Values werden pro Channel gesammelt. Ist ein
//! Block voll (`block_size` Values) oder das Dokument beendet, werden die
//! Values in Plan-Reihenfolge kodiert und der Block ausgegeben (Spec 9.1, 9.3).

use std::sync::Arc;

use flate2::{Compress, Compression};

use crate::bitstream::BitWriter;
use crate::compression::{plan_streams, write_block};
use crate::options::Alignment;
use crate::qname::QName;
use crate::session::Session;
use crate::typed_value::{self, TypedValue};
use crate::{FastIndexMap, Result};

/// Ein zurückgestellter Value.
#[derive(Debug, Clone)]
pub(super) enum Deferred {
    Typed(TypedValue),
    /// String über die String Table, Key ist der Channel-QName.
    Text(Arc<str>),
}

/// Offener Block mit seinen Value Channels.
pub(super) struct Block {
    out: Vec<u8>,
    /// Channels in Reihenfolge des ersten Auftretens.
    channels: FastIndexMap<QName, Vec<Deferred>>,
    count: usize,
    compressor: Option<Compress>,
    blocks: usize,
}

impl Block {
    /// `header` ist der bereits gepaddete Header.
    pub(super) fn new(header: Vec<u8>, alignment: Alignment) -> Self {
        let compressor = match alignment {
            Alignment::Compression => Some(Compress::new(Compression::default(), false)),
            _ => None,
        };
        Self { out: header, channels: FastIndexMap::default(), count: 0, compressor, blocks: 0 }
    }

    pub(super) fn push(&mut self, key: &QName, value: Deferred) {
        self.channels.entry(key.expanded()).or_default().push(value);
        self.count += 1;
    }

    pub(super) fn is_full(&self, block_size: u32) -> bool {
        self.count >= block_size as usize
    }

    /// Kodiert die Channels und hängt den Block an (Spec 9.3).
    pub(super) fn flush(&mut self, structure: &mut BitWriter, session: &mut Session) -> Result<()> {
        let structure = structure.take_bytes();
        let counts: Vec<usize> = self.channels.values().map(Vec::len).collect();
        let plan = plan_streams(&counts);

        let mut encoded = vec![Vec::new(); counts.len()];
        for i in plan.channel_order() {
            let Some((key, values)) = self.channels.get_index(i) else { continue };
            let mut w = BitWriter::new();
            for value in values {
                match value {
                    Deferred::Typed(v) => typed_value::encode(&mut w, v, true),
                    Deferred::Text(s) => session.table.encode_value(&mut w, key, s),
                }
            }
            encoded[i] = w.into_vec();
        }
        write_block(&mut self.out, &structure, &plan, &encoded, self.compressor.as_mut())?;

        self.blocks += 1;
        log::debug!(
            "block {}: {} values in {} channels, {} streams",
            self.blocks,
            self.count,
            counts.len(),
            if plan.combined { 1 } else { plan.groups.len() + 1 }
        );
        self.channels.clear();
        self.count = 0;
        Ok(())
    }

    pub(super) fn into_bytes(self) -> Vec<u8> {
        self.out
    }
}
