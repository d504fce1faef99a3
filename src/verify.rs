//! Request-level orchestration: fetch a template's style set, extract the
//! candidate document, compare, and hand the report to a sink.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;

use crate::cancel::CancelToken;
use crate::compare::{self, CompareOptions, MismatchRecord, Summary};
use crate::docx::{self, ExtractOptions};
use crate::error::Error;
use crate::model::StyleSet;

/// Source of persisted template style sets. Implementations only read.
pub trait TemplateCatalog: Send + Sync {
    fn styles_for_template(&self, template_id: &str) -> Result<Arc<StyleSet>, Error>;
}

/// Receives each completed report. Failures are logged by the verifier and
/// never fail the request.
pub trait ResultSink: Send + Sync {
    fn persist(&self, mismatches: &[MismatchRecord], metadata: &ReportMetadata)
    -> Result<(), Error>;
}

#[derive(Default)]
pub struct MemoryTemplateCatalog {
    sets: HashMap<String, Arc<StyleSet>>,
}

impl MemoryTemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, template_id: impl Into<String>, styles: StyleSet) {
        self.sets.insert(template_id.into(), Arc::new(styles));
    }
}

impl TemplateCatalog for MemoryTemplateCatalog {
    fn styles_for_template(&self, template_id: &str) -> Result<Arc<StyleSet>, Error> {
        self.sets.get(template_id).cloned().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("unknown template '{template_id}'"),
            ))
        })
    }
}

/// Templates stored as `<dir>/<template_id>.json`.
pub struct JsonFileCatalog {
    dir: PathBuf,
}

impl JsonFileCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, template_id: &str) -> PathBuf {
        self.dir.join(format!("{template_id}.json"))
    }

    pub fn save(&self, template_id: &str, styles: &StyleSet) -> Result<PathBuf, Error> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(template_id);
        std::fs::write(&path, styles.to_json()?)?;
        Ok(path)
    }
}

impl TemplateCatalog for JsonFileCatalog {
    fn styles_for_template(&self, template_id: &str) -> Result<Arc<StyleSet>, Error> {
        let path = self.path_for(template_id);
        let json = std::fs::read_to_string(&path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", e, path.display()),
            ))
        })?;
        Ok(Arc::new(StyleSet::from_json(&json)?))
    }
}

/// Keeps every persisted report in memory.
#[derive(Default)]
pub struct MemorySink {
    reports: Mutex<Vec<(ReportMetadata, Vec<MismatchRecord>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<(ReportMetadata, Vec<MismatchRecord>)> {
        match self.reports.lock() {
            Ok(reports) => reports.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ResultSink for MemorySink {
    fn persist(
        &self,
        mismatches: &[MismatchRecord],
        metadata: &ReportMetadata,
    ) -> Result<(), Error> {
        let mut reports = self
            .reports
            .lock()
            .map_err(|_| Error::Sink("memory sink lock poisoned".into()))?;
        reports.push((metadata.clone(), mismatches.to_vec()));
        Ok(())
    }
}

/// Sink that drops everything.
pub struct NullSink;

impl ResultSink for NullSink {
    fn persist(&self, _: &[MismatchRecord], _: &ReportMetadata) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub enum DocumentSource {
    Path(PathBuf),
    Bytes { name: String, data: Vec<u8> },
}

impl DocumentSource {
    fn document_id(&self) -> String {
        match self {
            DocumentSource::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            DocumentSource::Bytes { name, .. } => name.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct VerificationRequest {
    pub template_id: String,
    pub document: DocumentSource,
}

impl VerificationRequest {
    pub fn from_path(template_id: impl Into<String>, path: &Path) -> Self {
        Self {
            template_id: template_id.into(),
            document: DocumentSource::Path(path.to_path_buf()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportMetadata {
    pub template_id: String,
    pub document_id: String,
    pub strict: bool,
    pub template_records: usize,
    pub document_records: usize,
    pub elapsed_ms: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub summary: Summary,
    pub mismatches: Vec<MismatchRecord>,
}

impl Report {
    pub fn new(metadata: ReportMetadata, mismatches: Vec<MismatchRecord>) -> Self {
        Self {
            summary: compare::summarize(&mismatches),
            metadata,
            mismatches,
        }
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs verification requests against one catalog and one sink.
pub struct Verifier<C, S> {
    catalog: C,
    sink: S,
    options: CompareOptions,
    timeout: Option<Duration>,
    cancel: CancelToken,
}

impl<C: TemplateCatalog, S: ResultSink> Verifier<C, S> {
    pub fn new(catalog: C, sink: S) -> Self {
        Self {
            catalog,
            sink,
            options: CompareOptions::default(),
            timeout: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_options(mut self, options: CompareOptions) -> Self {
        self.options = options;
        self
    }

    /// Per-request processing limit, covering extraction and comparison.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Cancelling this token aborts every running and queued request.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn verify(&self, request: &VerificationRequest) -> Result<Report, Error> {
        let t0 = Instant::now();
        let cancel = match self.timeout {
            Some(limit) => self.cancel.limited(limit),
            None => self.cancel.clone(),
        };

        let template = self.catalog.styles_for_template(&request.template_id)?;
        let extract_options = ExtractOptions {
            document_id: request.document.document_id(),
            include_style_definitions: true,
            cancel: cancel.clone(),
        };
        let document = match &request.document {
            DocumentSource::Path(path) => docx::extract_file(path, &extract_options)?,
            DocumentSource::Bytes { data, .. } => docx::extract_bytes(data, &extract_options)?,
        };

        let options = CompareOptions {
            cancel,
            ..self.options.clone()
        };
        let mismatches = compare::compare(&template, &document, &options)?;

        let metadata = ReportMetadata {
            template_id: request.template_id.clone(),
            document_id: document.document_id.clone(),
            strict: options.strict,
            template_records: template.records.len(),
            document_records: document.records.len(),
            elapsed_ms: t0.elapsed().as_secs_f64() * 1000.0,
        };
        if let Err(e) = self.sink.persist(&mismatches, &metadata) {
            log::warn!(
                "Could not persist report for {} against {}: {e}",
                metadata.document_id,
                metadata.template_id
            );
        }
        Ok(Report::new(metadata, mismatches))
    }

    /// Verifies independent requests in parallel. Results keep request order.
    pub fn verify_batch(&self, requests: &[VerificationRequest]) -> Vec<Result<Report, Error>> {
        let t0 = Instant::now();
        let results: Vec<_> = requests.par_iter().map(|r| self.verify(r)).collect();
        let failed = results.iter().filter(|r| r.is_err()).count();
        log::info!(
            "Verified {} documents ({} failed) in {:.1}ms",
            requests.len(),
            failed,
            t0.elapsed().as_secs_f64() * 1000.0
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    impl ResultSink for FailingSink {
        fn persist(&self, _: &[MismatchRecord], _: &ReportMetadata) -> Result<(), Error> {
            Err(Error::Sink("unavailable".into()))
        }
    }

    #[test]
    fn unknown_template_is_an_error() {
        let verifier = Verifier::new(MemoryTemplateCatalog::new(), NullSink);
        let request = VerificationRequest {
            template_id: "nope".into(),
            document: DocumentSource::Bytes {
                name: "doc".into(),
                data: Vec::new(),
            },
        };
        assert!(matches!(verifier.verify(&request), Err(Error::Io(_))));
    }

    #[test]
    fn garbage_bytes_fail_extraction() {
        let mut catalog = MemoryTemplateCatalog::new();
        catalog.insert("t", StyleSet::default());
        let verifier = Verifier::new(catalog, FailingSink);
        let request = VerificationRequest {
            template_id: "t".into(),
            document: DocumentSource::Bytes {
                name: "doc".into(),
                data: b"not a zip".to_vec(),
            },
        };
        assert!(matches!(verifier.verify(&request), Err(Error::InvalidDocx(_))));
    }
}
