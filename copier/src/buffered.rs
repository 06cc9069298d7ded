use std::collections::HashSet;

use anyhow::Result;
use gtfs::adapters::Writer;
use gtfs::{Entity, EntityMap, Record};

enum State {
    Ready,
    Flushing,
    /// Terminal. Holds the error that caused it.
    Failed(String),
}

/// Sends entities of one kind to the destination in batches, recording each written entity's
/// destination key in the `EntityMap` after its batch is flushed.
///
/// Once a write fails, every later buffered add fails immediately. Entities lost to failures are
/// counted until `take_dropped` is called.
pub struct BufferedWriter<'w> {
    inner: &'w mut dyn Writer,
    batch_size: usize,
    filename: Option<&'static str>,
    buffer: Vec<Record>,
    // Natural keys sitting in the buffer, so duplicates can be caught before they're flushed
    pending: HashSet<String>,
    state: State,
    dropped: usize,
}

impl<'w> BufferedWriter<'w> {
    pub fn new(inner: &'w mut dyn Writer, batch_size: usize) -> Self {
        Self {
            inner,
            batch_size: batch_size.max(1),
            filename: None,
            buffer: Vec::new(),
            pending: HashSet::new(),
            state: State::Ready,
            dropped: 0,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, State::Failed(_))
    }

    pub fn is_pending(&self, filename: &str, id: &str) -> bool {
        self.filename == Some(filename) && self.pending.contains(id)
    }

    /// How many buffered entities never reached the destination since the last call
    pub fn take_dropped(&mut self) -> usize {
        std::mem::take(&mut self.dropped)
    }

    /// Buffers an entity, flushing if the batch is full. Returns the file and number of entities
    /// written, if a flush happened.
    ///
    /// Panics if the buffer holds entities of a different kind; flush first.
    pub fn add(
        &mut self,
        ent: Record,
        emap: &mut EntityMap,
    ) -> Result<Option<(&'static str, usize)>> {
        if let State::Failed(err) = &self.state {
            self.dropped += 1;
            bail!("an earlier write failed: {err}");
        }
        let filename = ent.filename();
        match self.filename {
            Some(buffered) if buffered != filename && !self.buffer.is_empty() => {
                panic!("Can't buffer {filename} while {buffered} is still buffered");
            }
            _ => {
                self.filename = Some(filename);
            }
        }
        if !ent.entity_id().is_empty() {
            self.pending.insert(ent.entity_id().to_string());
        }
        self.buffer.push(ent);

        if self.buffer.len() >= self.batch_size {
            return self.flush(emap);
        }
        Ok(None)
    }

    /// Writes everything buffered. Returns the file and number of entities written, or `None` if
    /// nothing was buffered.
    pub fn flush(&mut self, emap: &mut EntityMap) -> Result<Option<(&'static str, usize)>> {
        if let State::Failed(err) = &self.state {
            bail!("an earlier write failed: {err}");
        }
        let filename = match self.filename {
            Some(filename) if !self.buffer.is_empty() => filename,
            _ => return Ok(None),
        };

        self.state = State::Flushing;
        let batch = std::mem::take(&mut self.buffer);
        self.pending.clear();
        match self.write_batch(filename, &batch, emap) {
            Ok(()) => {
                self.state = State::Ready;
                Ok(Some((filename, batch.len())))
            }
            Err(err) => {
                error!("Writing {} entities to {filename} failed: {err}", batch.len());
                self.state = State::Failed(err.to_string());
                self.dropped += batch.len();
                Err(err)
            }
        }
    }

    fn write_batch(
        &mut self,
        filename: &'static str,
        batch: &[Record],
        emap: &mut EntityMap,
    ) -> Result<()> {
        let keys = self.inner.add_entities(batch)?;
        if keys.len() != batch.len() {
            bail!(
                "wrote {} entities to {filename}, but got {} keys back",
                batch.len(),
                keys.len()
            );
        }
        for (ent, key) in batch.iter().zip(keys) {
            if !ent.entity_id().is_empty() {
                emap.set(filename, ent.entity_id(), &key)?;
            }
        }
        Ok(())
    }

    /// Skips the buffer and writes one entity right away. Buffered entities aren't flushed first,
    /// so this should be a different kind than what's buffered.
    pub fn write_now(&mut self, ent: &Record) -> Result<String> {
        self.inner.add_entity(ent)
    }

    pub fn open(&mut self) -> Result<()> {
        self.inner.open()
    }

    /// Flushes anything remaining, then closes the destination. The destination is closed even if
    /// the flush fails.
    pub fn close(&mut self, emap: &mut EntityMap) -> Result<Option<(&'static str, usize)>> {
        let flushed = self.flush(emap);
        self.inner.close()?;
        flushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtfs::adapters::MemoryWriter;
    use gtfs::{files, Stop, StopTime};

    fn stop(id: &str) -> Record {
        Stop {
            stop_id: id.to_string(),
            ..Default::default()
        }
        .into()
    }

    /// Accepts a fixed number of batches, then fails
    struct FlakyWriter {
        inner: MemoryWriter,
        batches_left: usize,
        closed: bool,
    }

    impl Writer for FlakyWriter {
        fn open(&mut self) -> Result<()> {
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.closed = true;
            Ok(())
        }

        fn create(&mut self) -> Result<()> {
            Ok(())
        }

        fn add_entity(&mut self, ent: &Record) -> Result<String> {
            self.inner.add_entity(ent)
        }

        fn add_entities(&mut self, ents: &[Record]) -> Result<Vec<String>> {
            if self.batches_left == 0 {
                bail!("disk full");
            }
            self.batches_left -= 1;
            ents.iter().map(|ent| self.inner.add_entity(ent)).collect()
        }
    }

    #[test]
    fn records_keys_after_flush() {
        let mut out = MemoryWriter::with_key_prefix("x-");
        let mut emap = EntityMap::new();
        let mut writer = BufferedWriter::new(&mut out, 2);

        assert_eq!(writer.add(stop("a"), &mut emap).unwrap(), None);
        assert!(writer.is_pending(files::STOPS, "a"));
        assert_eq!(emap.get(files::STOPS, "a"), None);

        assert_eq!(
            writer.add(stop("b"), &mut emap).unwrap(),
            Some((files::STOPS, 2))
        );
        assert!(!writer.is_pending(files::STOPS, "a"));
        assert_eq!(emap.get(files::STOPS, "a"), Some("x-a"));
        assert_eq!(emap.get(files::STOPS, "b"), Some("x-b"));

        writer.add(stop("c"), &mut emap).unwrap();
        assert_eq!(writer.close(&mut emap).unwrap(), Some((files::STOPS, 1)));
        assert_eq!(writer.flush(&mut emap).unwrap(), None);
        assert_eq!(out.feed.stops.len(), 3);
        assert!(!out.is_open());
    }

    #[test]
    fn failure_is_sticky() {
        let mut out = FlakyWriter {
            inner: MemoryWriter::new(),
            batches_left: 1,
            closed: false,
        };
        let mut emap = EntityMap::new();
        {
            let mut writer = BufferedWriter::new(&mut out, 2);
            writer.add(stop("a"), &mut emap).unwrap();
            writer.add(stop("b"), &mut emap).unwrap();
            writer.add(stop("c"), &mut emap).unwrap();
            assert!(writer.add(stop("d"), &mut emap).is_err());
            assert!(writer.is_failed());
            assert_eq!(writer.take_dropped(), 2);

            // Nothing more gets buffered or written
            assert!(writer.add(stop("e"), &mut emap).is_err());
            assert!(writer.flush(&mut emap).is_err());
            assert!(writer.close(&mut emap).is_err());
            assert_eq!(writer.take_dropped(), 1);
        }
        assert!(out.closed);
        assert_eq!(out.inner.feed.stops.len(), 2);
        assert!(emap.contains(files::STOPS, "b"));
        assert!(!emap.contains(files::STOPS, "c"));
    }

    #[test]
    #[should_panic]
    fn mixing_kinds_panics() {
        let mut out = MemoryWriter::new();
        let mut emap = EntityMap::new();
        let mut writer = BufferedWriter::new(&mut out, 10);
        writer.add(stop("a"), &mut emap).unwrap();
        let _ = writer.add(StopTime::default().into(), &mut emap);
    }

    #[test]
    fn switches_kinds_after_flush() {
        let mut out = MemoryWriter::new();
        let mut emap = EntityMap::new();
        let mut writer = BufferedWriter::new(&mut out, 10);
        writer.add(stop("a"), &mut emap).unwrap();
        writer.flush(&mut emap).unwrap();
        writer.add(StopTime::default().into(), &mut emap).unwrap();
        assert_eq!(
            writer.flush(&mut emap).unwrap(),
            Some((files::STOP_TIMES, 1))
        );
    }
}
