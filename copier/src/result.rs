use std::collections::BTreeMap;

use gtfs::{EntityError, ErrorClass, ErrorKind};

/// Why an entity read from the source wasn't written
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SkipReason {
    /// The marker didn't select it
    Unmarked,
    /// A filter rejected it
    Filtered,
    EntityErrors,
    ReferenceErrors,
    Duplicate,
    WriteFailed,
}

/// Counts for one file
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FileCounts {
    pub written: usize,
    /// Written, but made up rather than copied from the source
    pub generated: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
}

impl FileCounts {
    pub fn skipped(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }
}

/// All problems of one kind in one file. Only the first few are kept.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorGroup {
    pub filename: String,
    pub kind: ErrorKind,
    pub count: usize,
    pub examples: Vec<EntityError>,
}

impl ErrorGroup {
    /// How many problems were counted but not kept
    pub fn overflow(&self) -> usize {
        self.count - self.examples.len()
    }
}

/// Everything that happened during one copy.
#[derive(Clone)]
pub struct CopyResult {
    pub files: BTreeMap<String, FileCounts>,
    pub errors: BTreeMap<(String, ErrorKind), ErrorGroup>,
    pub warnings: BTreeMap<(String, ErrorKind), ErrorGroup>,
    pub interpolated_stop_times: usize,
    error_limit: usize,
}

impl CopyResult {
    pub fn new(error_limit: usize) -> Self {
        Self {
            files: BTreeMap::new(),
            errors: BTreeMap::new(),
            warnings: BTreeMap::new(),
            interpolated_stop_times: 0,
            error_limit,
        }
    }

    fn file(&mut self, filename: &str) -> &mut FileCounts {
        self.files.entry(filename.to_string()).or_default()
    }

    pub fn add_written(&mut self, filename: &str, count: usize) {
        self.file(filename).written += count;
    }

    pub fn add_generated(&mut self, filename: &str) {
        self.file(filename).generated += 1;
    }

    pub fn add_skipped(&mut self, filename: &str, reason: SkipReason) {
        *self.file(filename).skipped.entry(reason).or_insert(0) += 1;
    }

    pub fn written(&self, filename: &str) -> usize {
        self.files.get(filename).map(|f| f.written).unwrap_or(0)
    }

    pub fn skipped(&self, filename: &str, reason: SkipReason) -> usize {
        self.files
            .get(filename)
            .map(|f| f.skipped(reason))
            .unwrap_or(0)
    }

    pub fn add_error(&mut self, err: EntityError) {
        add_to(&mut self.errors, err, self.error_limit);
    }

    pub fn add_warning(&mut self, err: EntityError) {
        add_to(&mut self.warnings, err, self.error_limit);
    }

    pub fn error_count(&self, filename: &str, kind: ErrorKind) -> usize {
        self.errors
            .get(&(filename.to_string(), kind))
            .map(|g| g.count)
            .unwrap_or(0)
    }

    pub fn warning_count(&self, filename: &str, kind: ErrorKind) -> usize {
        self.warnings
            .get(&(filename.to_string(), kind))
            .map(|g| g.count)
            .unwrap_or(0)
    }

    pub fn errors_of_class(&self, class: ErrorClass) -> usize {
        self.errors
            .values()
            .filter(|g| g.kind.class() == class)
            .map(|g| g.count)
            .sum()
    }

    /// True if any write failed, meaning the destination may be incomplete
    pub fn write_failed(&self) -> bool {
        self.errors_of_class(ErrorClass::Write) > 0
    }

    pub fn log_summary(&self) {
        for (filename, counts) in &self.files {
            let skipped: usize = counts.skipped.values().sum();
            info!(
                "{filename}: wrote {} ({} generated), skipped {skipped}",
                counts.written, counts.generated
            );
        }
        if self.interpolated_stop_times > 0 {
            info!("Interpolated {} stop times", self.interpolated_stop_times);
        }
        for group in self.errors.values() {
            warn!(
                "{} errors in {}: {} ({} more not kept)",
                group.count,
                group.filename,
                group.kind,
                group.overflow()
            );
        }
        for group in self.warnings.values() {
            info!(
                "{} warnings in {}: {}",
                group.count, group.filename, group.kind
            );
        }
    }
}

fn add_to(groups: &mut BTreeMap<(String, ErrorKind), ErrorGroup>, err: EntityError, limit: usize) {
    let group = groups
        .entry((err.filename.clone(), err.kind))
        .or_insert_with(|| ErrorGroup {
            filename: err.filename.clone(),
            kind: err.kind,
            count: 0,
            examples: Vec::new(),
        });
    group.count += 1;
    if group.examples.len() < limit {
        group.examples.push(err);
    }
}
