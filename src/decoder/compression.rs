//! Decoder Compression / PreCompression (Spec 9).
//!
//! Ein Block wird vollständig decodiert, bevor seine Events ausgegeben
//! werden: zuerst die Structure bis `block_size` Values oder ED, dann die
//! Value Channels in Plan-Reihenfolge. Die Values ersetzen danach die
//! Platzhalter in den Events, erst dann läuft [`Context::finish`].

use std::sync::Arc;

use flate2::Decompress;

use crate::bitstream::BitReader;
use crate::compression::{StreamPlan, deflate_decompress_reuse, plan_streams};
use crate::event::ExiEvent;
use crate::qname::QName;
use crate::{Error, FastIndexMap, Result};

use super::context::Context;

/// Stream-Zustand im Compression-Modus.
#[derive(Debug)]
pub(super) struct Inflater {
    decompressor: Decompress,
    /// Byte-Offset des nächsten Streams im Input.
    offset: usize,
}

impl Inflater {
    pub(super) fn new(offset: usize) -> Self {
        Self { decompressor: Decompress::new(false), offset }
    }

    /// Dekomprimiert den nächsten Stream.
    fn next_stream(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let data = input.get(self.offset..).ok_or(Error::PrematureEndOfStream)?;
        let (bytes, used) = deflate_decompress_reuse(data, &mut self.decompressor)?;
        self.offset += used;
        Ok(bytes)
    }
}

impl Context {
    /// Liest die Structure eines Blocks mit Platzhaltern für alle Values.
    fn read_structure(&mut self, r: &mut BitReader, block_size: usize) -> Result<Vec<ExiEvent>> {
        self.pending.clear();
        self.implied.clear();
        let mut events = Vec::new();
        loop {
            self.position = events.len();
            let event = self.decode_event(r)?;
            let end = event == ExiEvent::EndDocument;
            events.push(event);
            if end || self.pending.len() >= block_size {
                return Ok(events);
            }
        }
    }

    /// Channels in Reihenfolge des ersten Auftretens, je mit Pending-Indizes.
    fn channels(&self) -> FastIndexMap<QName, Vec<usize>> {
        let mut channels: FastIndexMap<QName, Vec<usize>> = FastIndexMap::default();
        for (i, p) in self.pending.iter().enumerate() {
            channels.entry(p.key.clone()).or_default().push(i);
        }
        channels
    }

    fn read_channel(&mut self, r: &mut BitReader, members: &[usize], events: &mut [ExiEvent]) -> Result<()> {
        for &i in members {
            let p = self.pending[i].clone();
            let value = self.value_now(r, &p.key, p.datatype)?;
            patch(&mut events[p.event], value);
        }
        Ok(())
    }

    fn plan(&self) -> (FastIndexMap<QName, Vec<usize>>, StreamPlan) {
        let channels = self.channels();
        let counts: Vec<usize> = channels.values().map(Vec::len).collect();
        let plan = plan_streams(&counts);
        (channels, plan)
    }

    /// PreCompression: alle Streams liegen unkomprimiert hintereinander.
    pub(super) fn read_block(&mut self, r: &mut BitReader, block_size: usize) -> Result<Vec<ExiEvent>> {
        let mut events = self.read_structure(r, block_size)?;
        let (channels, plan) = self.plan();
        for i in plan.channel_order() {
            self.read_channel(r, &channels[i], &mut events)?;
        }
        log::debug!("block: {} events, {} values", events.len(), self.pending.len());
        Ok(self.finish(events))
    }

    /// Compression: jeder Stream ist einzeln DEFLATE-komprimiert (Spec 9.3).
    pub(super) fn inflate_block(
        &mut self,
        input: &[u8],
        inflater: &mut Inflater,
        block_size: usize,
    ) -> Result<Vec<ExiEvent>> {
        let first = inflater.next_stream(input)?;
        let mut r = BitReader::new(&first);
        let mut events = self.read_structure(&mut r, block_size)?;
        let (channels, plan) = self.plan();
        if plan.combined {
            for i in plan.channel_order() {
                self.read_channel(&mut r, &channels[i], &mut events)?;
            }
        } else {
            for group in &plan.groups {
                let stream = inflater.next_stream(input)?;
                let mut r = BitReader::new(&stream);
                for &i in group {
                    self.read_channel(&mut r, &channels[i], &mut events)?;
                }
            }
        }
        log::debug!("compressed block: {} events, {} values", events.len(), self.pending.len());
        Ok(self.finish(events))
    }
}

/// Setzt einen Value in seinen Platzhalter.
fn patch(event: &mut ExiEvent, value: Arc<str>) {
    match event {
        ExiEvent::Attribute(at) => at.value = value,
        ExiEvent::Characters(text) => *text = value,
        _ => {}
    }
}
