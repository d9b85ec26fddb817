//! Sequential migration of several course archives.
//!
//! Each course is reconciled to a temporary file in the output directory
//! and moved to its final name only when the pass succeeds. A failed
//! course is recorded and the batch moves on, unless the failure means
//! every later course would fail too (rejected credentials).

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use val_client::{ClientError, StudioApi};

use crate::archive::{ArchiveError, OutputStream, TarSink, TarSource};
use crate::error::{MigrateError, Stage};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::report::render_summary;

/// Sends a rewritten archive to the course-import endpoint.
#[async_trait]
pub trait CourseUploader: Send + Sync {
    async fn import_course(&self, course_id: &str, archive: &Path) -> Result<(), ClientError>;
}

#[async_trait]
impl CourseUploader for StudioApi {
    async fn import_course(&self, course_id: &str, archive: &Path) -> Result<(), ClientError> {
        StudioApi::import_course(self, course_id, archive).await
    }
}

/// Why a course did not finish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseFailure {
    pub stage: Stage,
    pub message: String,
}

/// Result of one course in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseResult {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub report: Option<ReconcileReport>,
    pub uploaded: bool,
    pub failure: Option<CourseFailure>,
}

impl CourseResult {
    fn new(input: &Path) -> Self {
        Self {
            input: input.to_path_buf(),
            output: None,
            report: None,
            uploaded: false,
            failure: None,
        }
    }

    pub fn course_id(&self) -> Option<&str> {
        self.report.as_ref().and_then(|r| r.course_id.as_deref())
    }
}

/// Results of a whole batch, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub courses: Vec<CourseResult>,
    /// Set when a fatal error stopped the batch early.
    pub aborted: bool,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.courses.iter().filter(|c| c.failure.is_none()).count()
    }

    pub fn failed(&self) -> usize {
        self.courses.len() - self.succeeded()
    }

    pub fn unmatched(&self) -> usize {
        self.courses
            .iter()
            .filter_map(|c| c.report.as_ref())
            .map(|r| r.not_found.len())
            .sum()
    }
}

/// Settings for one batch run.
pub struct BatchOptions<'a> {
    pub output_dir: &'a Path,
    /// Use this course id instead of reading it from each archive.
    pub course_id: Option<&'a str>,
    /// Upload each rewritten archive after its report is printed.
    pub uploader: Option<&'a dyn CourseUploader>,
}

/// Reconcile `input` into `output_dir`, keeping its file name and
/// compression. No output file exists unless the pass succeeds.
pub async fn reconcile_file(
    reconciler: &Reconciler<'_>,
    input: &Path,
    output_dir: &Path,
    course_id: Option<&str>,
) -> Result<(ReconcileReport, PathBuf), MigrateError> {
    let file_name = input
        .file_name()
        .ok_or_else(|| MigrateError::Config(format!("{} is not a file", input.display())))?;
    let output_path = output_dir.join(file_name);
    if same_file(input, &output_path) {
        return Err(MigrateError::Config(format!(
            "output {} would overwrite its input",
            output_path.display()
        )));
    }

    let (mut source, compression) = TarSource::open(input)?;
    let temp = NamedTempFile::new_in(output_dir).map_err(ArchiveError::Write)?;

    let mut sink = TarSink::new(OutputStream::new(BufWriter::new(temp.as_file()), compression));
    let report = reconciler
        .reconcile(&mut source, &mut sink, course_id)
        .await?;
    sink.finish()?
        .finish()
        .map_err(ArchiveError::Write)?
        .into_inner()
        .map_err(|e| ArchiveError::Write(e.into_error()))?;

    temp.as_file().sync_all().map_err(ArchiveError::Write)?;
    temp.persist(&output_path)
        .map_err(|e| ArchiveError::Write(e.error))?;
    Ok((report, output_path))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Migrate every input in order, writing each course's summary to `out`
/// before that course is uploaded.
pub async fn run_batch(
    reconciler: &Reconciler<'_>,
    inputs: &[PathBuf],
    options: &BatchOptions<'_>,
    out: &mut dyn Write,
) -> BatchSummary {
    let mut summary = BatchSummary::default();

    for input in inputs {
        let mut result = CourseResult::new(input);
        let outcome = run_course(reconciler, input, options, out, &mut result).await;

        if let Err((stage, error)) = outcome {
            tracing::error!(
                course_id = result.course_id().unwrap_or(""),
                input = %input.display(),
                stage = %stage,
                error = %error,
                "Course migration failed",
            );
            let fatal = error.is_fatal();
            result.failure = Some(CourseFailure {
                stage,
                message: error.to_string(),
            });
            summary.courses.push(result);
            if fatal {
                tracing::error!("Stopping batch: credentials were rejected");
                summary.aborted = true;
                break;
            }
            continue;
        }
        summary.courses.push(result);
    }

    summary
}

async fn run_course(
    reconciler: &Reconciler<'_>,
    input: &Path,
    options: &BatchOptions<'_>,
    out: &mut dyn Write,
    result: &mut CourseResult,
) -> Result<(), (Stage, MigrateError)> {
    let (report, output) = reconcile_file(reconciler, input, options.output_dir, options.course_id)
        .await
        .map_err(|e| (Stage::of_reconcile_error(&e), e))?;

    let printed = writeln!(out, "{}", render_summary(input, &report));
    result.report = Some(report);
    result.output = Some(output.clone());
    printed.map_err(|e| (Stage::Write, ArchiveError::Write(e).into()))?;

    let Some(uploader) = options.uploader else {
        return Ok(());
    };
    let course_id = result.course_id().map(str::to_string).ok_or_else(|| {
        (
            Stage::Upload,
            MigrateError::Config("course id unknown; pass --course-id".to_string()),
        )
    })?;
    uploader
        .import_course(&course_id, &output)
        .await
        .map_err(|e| (Stage::Upload, e.into()))?;
    result.uploaded = true;
    tracing::info!(course_id = %course_id, output = %output.display(), "Uploaded course");
    Ok(())
}
