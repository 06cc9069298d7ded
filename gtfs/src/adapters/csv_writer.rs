use std::collections::BTreeMap;
use std::fs::File;
use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use super::Writer;
use crate::{Entity, Record};

/// Writes a GTFS directory, one CSV file per entity kind. Files are only created for kinds that
/// have at least one entity. Destination keys are the source keys.
pub struct CsvWriter {
    dir: PathBuf,
    files: BTreeMap<&'static str, csv::Writer<File>>,
    rows: BTreeMap<&'static str, usize>,
}

impl CsvWriter {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            files: BTreeMap::new(),
            rows: BTreeMap::new(),
        }
    }

    fn file(&mut self, filename: &'static str) -> Result<&mut csv::Writer<File>> {
        if !self.files.contains_key(filename) {
            let path = self.dir.join(filename);
            let writer = csv::Writer::from_path(&path)
                .map_err(|err| anyhow!("{}: {err}", path.display()))?;
            self.files.insert(filename, writer);
        }
        self.files
            .get_mut(filename)
            .ok_or_else(|| anyhow!("no writer for {filename}"))
    }

    fn serialize<T: Serialize>(&mut self, filename: &'static str, row: &T) -> Result<()> {
        self.file(filename)?
            .serialize(row)
            .map_err(|err| anyhow!("{filename}: {err}"))?;
        *self.rows.entry(filename).or_insert(0) += 1;
        Ok(())
    }
}

impl Writer for CsvWriter {
    fn open(&mut self) -> Result<()> {
        if !self.dir.is_dir() {
            bail!("{} doesn't exist; call create first", self.dir.display());
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        for (filename, mut writer) in std::mem::take(&mut self.files) {
            writer.flush().map_err(|err| anyhow!("{filename}: {err}"))?;
        }
        info!("Wrote {} files to {}", self.rows.len(), self.dir.display());
        Ok(())
    }

    fn create(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|err| anyhow!("{}: {err}", self.dir.display()))?;
        Ok(())
    }

    fn add_entity(&mut self, ent: &Record) -> Result<String> {
        let filename = ent.filename();
        match ent {
            Record::Agency(x) => self.serialize(filename, x)?,
            Record::Route(x) => self.serialize(filename, x)?,
            Record::Stop(x) => self.serialize(filename, x)?,
            Record::Trip(x) => self.serialize(filename, x)?,
            Record::StopTime(x) => self.serialize(filename, x)?,
            Record::Calendar(x) => self.serialize(filename, x)?,
            Record::CalendarDate(x) => self.serialize(filename, x)?,
            Record::Shape(x) => {
                for row in x.to_rows() {
                    self.serialize(filename, &row)?;
                }
            }
            Record::Frequency(x) => self.serialize(filename, x)?,
            Record::Transfer(x) => self.serialize(filename, x)?,
            Record::FareAttribute(x) => self.serialize(filename, x)?,
            Record::FareRule(x) => self.serialize(filename, x)?,
            Record::FeedInfo(x) => self.serialize(filename, x)?,
        }
        if ent.entity_id().is_empty() {
            Ok(self.rows.get(filename).copied().unwrap_or(0).to_string())
        } else {
            Ok(ent.entity_id().to_string())
        }
    }
}
