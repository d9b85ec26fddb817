//! Rewrite the video descriptors of a course archive with registry ids.
//!
//! The archive is copied entry by entry, in order. Video descriptors that
//! match a registry video get their `edx_video_id` rewritten; everything
//! else, unmatched descriptors included, is copied byte for byte.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use serde::{Deserialize, Serialize};
use val_client::CandidateSource;
use val_core::candidate::RegistryVideo;
use val_core::descriptor::{
    is_course_descriptor, is_video_entry, parse_course_descriptor, parse_video_descriptor,
    rewrite_video_id, LegacyVideoDescriptor,
};
use val_core::matcher::{Matcher, MatcherConfig, NoMatchFound};

use crate::archive::{ArchiveEntry, ArchiveError, EntryIter, EntryMeta, EntrySink, EntrySource};
use crate::error::MigrateError;

/// Largest course or video descriptor read into memory.
pub const MAX_DESCRIPTOR_BYTES: u64 = 4 * 1024 * 1024;

/// An unmatched descriptor, with the fields an operator needs to fix it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorSummary {
    /// Archive path of the descriptor entry.
    pub path: String,
    pub display_name: Option<String>,
    /// The legacy `source` attribute.
    pub legacy_label: Option<String>,
    pub youtube_id: Option<String>,
    /// Best candidate id the matcher tried.
    pub candidate: String,
}

impl DescriptorSummary {
    fn new(path: &str, descriptor: &LegacyVideoDescriptor, miss: NoMatchFound) -> Self {
        Self {
            path: path.to_string(),
            display_name: descriptor.display_name.clone(),
            legacy_label: descriptor.legacy_label().map(str::to_string),
            youtube_id: descriptor.youtube().map(str::to_string),
            candidate: miss.candidate,
        }
    }
}

/// Outcome of one archive pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub course_id: Option<String>,
    /// Entries copied to the output, of every kind.
    pub entries: usize,
    /// Video descriptors seen.
    pub video_entries: usize,
    /// Video descriptors matched and rewritten.
    pub processed: usize,
    /// Matches per winning strategy.
    pub matched_by: BTreeMap<String, usize>,
    /// Registry candidates the course was matched against.
    pub candidates: usize,
    pub not_found: Vec<DescriptorSummary>,
    /// Video entries that were not parseable XML; copied unchanged.
    pub unreadable: Vec<String>,
}

impl ReconcileReport {
    pub fn is_complete(&self) -> bool {
        self.not_found.is_empty() && self.unreadable.is_empty()
    }
}

/// Course id and frozen candidate snapshot, fixed once known.
struct CourseContext {
    course_id: String,
    candidates: Vec<RegistryVideo>,
}

/// Drives the matcher over every video descriptor of an archive.
pub struct Reconciler<'a> {
    source: &'a dyn CandidateSource,
    config: &'a MatcherConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(source: &'a dyn CandidateSource, config: &'a MatcherConfig) -> Self {
        Self { source, config }
    }

    /// Copy `input` to `output`, rewriting matched video descriptors.
    ///
    /// `course_id` skips deriving the id from the archive's course
    /// descriptor. Otherwise the course descriptor must come before the
    /// first video descriptor.
    pub async fn reconcile(
        &self,
        input: &mut dyn EntrySource,
        output: &mut dyn EntrySink,
        course_id: Option<&str>,
    ) -> Result<ReconcileReport, MigrateError> {
        let mut report = ReconcileReport::default();
        let mut entries = input.entries()?;
        let context = match course_id {
            Some(course_id) => self.load_course(course_id, &mut report).await?,
            None => match self.copy_until_course(&mut entries, output, &mut report).await? {
                Some(context) => context,
                None => return Ok(finished(report)),
            },
        };
        let matcher = Matcher::new(&context.candidates, self.config);

        for item in entries {
            let ArchiveEntry { mut meta, mut reader } = item?;
            report.entries += 1;

            if !is_video_entry(&meta.path) {
                output.write_entry(&meta, &mut reader)?;
                continue;
            }

            report.video_entries += 1;
            let content = read_content(&mut reader, &meta)?;
            let content = self.reconcile_descriptor(
                &matcher,
                &context.course_id,
                &meta.path,
                content,
                &mut report,
            );
            meta.size = content.len() as u64;
            output.write_entry(&meta, &mut Cursor::new(content))?;
        }

        Ok(finished(report))
    }

    /// Copy entries up to and including the course descriptor, then load
    /// that course's candidates. `None` if the archive ends first.
    async fn copy_until_course(
        &self,
        entries: &mut EntryIter<'_>,
        output: &mut dyn EntrySink,
        report: &mut ReconcileReport,
    ) -> Result<Option<CourseContext>, MigrateError> {
        for item in entries.by_ref() {
            let ArchiveEntry { meta, mut reader } = item?;
            report.entries += 1;

            if is_course_descriptor(&meta.path) {
                let content = read_content(&mut reader, &meta)?;
                let course = parse_course_descriptor(&content)
                    .map_err(|e| ArchiveError::malformed(format!("{}: {e}", meta.path)))?;
                let context = self.load_course(&course.course_id(), report).await?;
                output.write_entry(&meta, &mut Cursor::new(content))?;
                return Ok(Some(context));
            }
            if is_video_entry(&meta.path) {
                return Err(ArchiveError::malformed(format!(
                    "video descriptor {} precedes the course descriptor",
                    meta.path
                ))
                .into());
            }
            output.write_entry(&meta, &mut reader)?;
        }
        Ok(None)
    }

    async fn load_course(
        &self,
        course_id: &str,
        report: &mut ReconcileReport,
    ) -> Result<CourseContext, MigrateError> {
        let candidates = self.source.videos_for_course(course_id).await?;
        tracing::info!(course_id, candidates = candidates.len(), "Loaded course candidates");
        report.course_id = Some(course_id.to_string());
        report.candidates = candidates.len();
        Ok(CourseContext {
            course_id: course_id.to_string(),
            candidates,
        })
    }

    /// The bytes to write for one video descriptor.
    fn reconcile_descriptor(
        &self,
        matcher: &Matcher<'_>,
        course_id: &str,
        path: &str,
        content: Vec<u8>,
        report: &mut ReconcileReport,
    ) -> Vec<u8> {
        let descriptor = match parse_video_descriptor(&content) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                tracing::warn!(path, error = %e, "Unparseable video descriptor, copying unchanged");
                report.unreadable.push(path.to_string());
                return content;
            }
        };

        match matcher.resolve(&descriptor, course_id) {
            Ok((edx_video_id, outcome)) => match rewrite_video_id(&content, &edx_video_id) {
                Ok(rewritten) => {
                    report.processed += 1;
                    *report
                        .matched_by
                        .entry(outcome.strategy.as_str().to_string())
                        .or_default() += 1;
                    rewritten
                }
                Err(e) => {
                    tracing::warn!(path, error = %e, "Cannot rewrite video descriptor, copying unchanged");
                    report.unreadable.push(path.to_string());
                    content
                }
            },
            Err(miss) => {
                tracing::warn!(
                    path,
                    candidate = %miss.candidate,
                    display_name = descriptor.display_name.as_deref().unwrap_or(""),
                    "No registry video for descriptor",
                );
                report
                    .not_found
                    .push(DescriptorSummary::new(path, &descriptor, miss));
                content
            }
        }
    }
}

fn finished(report: ReconcileReport) -> ReconcileReport {
    tracing::info!(
        course_id = report.course_id.as_deref().unwrap_or(""),
        entries = report.entries,
        processed = report.processed,
        not_found = report.not_found.len(),
        "Reconciled course archive",
    );
    report
}

/// Read a whole descriptor into memory, checking it has the recorded size.
/// The recorded size comes from the archive header and is not trusted for
/// allocation.
fn read_content(reader: &mut dyn Read, meta: &EntryMeta) -> Result<Vec<u8>, ArchiveError> {
    if meta.size > MAX_DESCRIPTOR_BYTES {
        return Err(ArchiveError::malformed(format!(
            "{} claims {} bytes, more than the {MAX_DESCRIPTOR_BYTES} byte descriptor limit",
            meta.path, meta.size
        )));
    }
    let mut content = Vec::new();
    reader
        .take(MAX_DESCRIPTOR_BYTES + 1)
        .read_to_end(&mut content)
        .map_err(ArchiveError::Read)?;
    if content.len() as u64 != meta.size {
        return Err(ArchiveError::malformed(format!(
            "{} is truncated ({} of {} bytes)",
            meta.path,
            content.len(),
            meta.size
        )));
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use assert_matches::assert_matches;
    use val_core::candidate::EncodedUrl;
    use val_store::MemoryStore;

    use super::*;
    use crate::archive::{TarSink, TarSource};

    fn tar_of(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut sink = TarSink::new(Vec::new());
        for (path, content) in entries {
            sink.write_entry(
                &EntryMeta::file(path, content.len() as u64),
                &mut Cursor::new(content.as_bytes()),
            )
            .unwrap();
        }
        sink.finish().unwrap()
    }

    fn read_tar(bytes: Vec<u8>) -> Vec<(String, String)> {
        let mut source = TarSource::new(Cursor::new(bytes));
        let mut out = Vec::new();
        for entry in source.entries().unwrap() {
            let mut entry = entry.unwrap();
            let mut content = String::new();
            entry.reader.read_to_string(&mut content).unwrap();
            out.push((entry.meta.path, content));
        }
        out
    }

    /// A candidate source that always answers with the same list.
    struct Fixed(Vec<RegistryVideo>);

    #[async_trait::async_trait]
    impl CandidateSource for Fixed {
        async fn videos_for_course(
            &self,
            _course_id: &str,
        ) -> Result<Vec<RegistryVideo>, val_client::ClientError> {
            Ok(self.0.clone())
        }
    }

    fn youtube_video(id: &str, youtube: &str) -> RegistryVideo {
        RegistryVideo {
            edx_video_id: id.to_string(),
            client_video_id: format!("{id}.mp4"),
            encoded_videos: vec![EncodedUrl {
                profile: "youtube".to_string(),
                url: youtube.to_string(),
                file_size: 0,
                bitrate: 0,
            }],
        }
    }

    async fn run(
        source: &dyn CandidateSource,
        input: Vec<u8>,
        course_id: Option<&str>,
    ) -> (Result<ReconcileReport, MigrateError>, Vec<u8>) {
        let config = MatcherConfig::default();
        let reconciler = Reconciler::new(source, &config);
        let mut input = TarSource::new(Cursor::new(input));
        let mut output = TarSink::new(Vec::new());
        let result = reconciler.reconcile(&mut input, &mut output, course_id).await;
        (result, output.finish().unwrap())
    }

    const COURSE: &str = r#"<course org="MITx" course="6.002x" url_name="2012_Fall"/>"#;

    #[tokio::test]
    async fn rewrites_matched_descriptor() {
        let source = Fixed(vec![youtube_video("vid-1", "abc123")]);
        let input = tar_of(&[
            ("course/course.xml", COURSE),
            ("course/video/intro.xml", r#"<video youtube_id_1_0="abc123"/>"#),
        ]);

        let (report, output) = run(&source, input, None).await;
        let report = report.unwrap();
        assert_eq!(report.course_id.as_deref(), Some("MITx/6.002x/2012_Fall"));
        assert_eq!(report.processed, 1);
        assert_eq!(report.matched_by.get("platform_override"), Some(&1));

        let entries = read_tar(output);
        assert_eq!(entries[0].1, COURSE);
        assert!(entries[1].1.contains(r#"edx_video_id="vid-1""#));
    }

    #[tokio::test]
    async fn unmatched_descriptor_is_copied_and_reported() {
        let source = Fixed(Vec::new());
        let video = r#"<video display_name="Lecture" source="http://cdn/x/foo_bar.mp4"/>"#;
        let input = tar_of(&[("course/course.xml", COURSE), ("course/video/a.xml", video)]);

        let (report, output) = run(&source, input, None).await;
        let report = report.unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.not_found.len(), 1);
        assert_eq!(report.not_found[0].candidate, "foo");
        assert_eq!(report.not_found[0].display_name.as_deref(), Some("Lecture"));
        assert_eq!(
            report.not_found[0].legacy_label.as_deref(),
            Some("http://cdn/x/foo_bar.mp4")
        );
        assert_eq!(read_tar(output)[1].1, video);
    }

    #[tokio::test]
    async fn given_course_id_skips_derivation() {
        let store = MemoryStore::new();
        let input = tar_of(&[("course/video/a.xml", r#"<video youtube_id_1_0="x"/>"#)]);
        let (report, _) = run(&store, input, Some("Org/C/1")).await;
        let report = report.unwrap();
        assert_eq!(report.course_id.as_deref(), Some("Org/C/1"));
        assert_eq!(report.not_found.len(), 1);
    }

    #[tokio::test]
    async fn video_before_course_descriptor_is_fatal() {
        let source = Fixed(Vec::new());
        let input = tar_of(&[
            ("course/video/a.xml", "<video/>"),
            ("course/course.xml", COURSE),
        ]);
        let (result, _) = run(&source, input, None).await;
        assert_matches!(result, Err(MigrateError::Archive(ArchiveError::Read(_))));
    }

    #[tokio::test]
    async fn oversized_descriptor_header_is_a_read_error() {
        let source = Fixed(Vec::new());
        let mut input = tar_of(&[("course/course.xml", COURSE)]);
        input.truncate(input.len() - 1024);
        let mut header = tar::Header::new_gnu();
        header.set_path("course/video/a.xml").unwrap();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_mode(0o644);
        header.set_size(1 << 60);
        header.set_cksum();
        input.extend_from_slice(header.as_bytes());
        input.extend_from_slice(&[b' '; 512]);

        let (result, _) = run(&source, input, None).await;
        assert_matches!(result, Err(MigrateError::Archive(ArchiveError::Read(_))));
    }

    #[tokio::test]
    async fn one_snapshot_serves_every_descriptor() {
        let source = Fixed(vec![youtube_video("vid-1", "abc"), youtube_video("vid-2", "def")]);
        let input = tar_of(&[
            ("course/course.xml", COURSE),
            ("course/video/a.xml", r#"<video youtube_id_1_0="abc"/>"#),
            ("course/video/b.xml", r#"<video youtube_id_1_0="def"/>"#),
            ("course/video/c.xml", r#"<video youtube_id_1_0="ghi"/>"#),
        ]);
        let (report, output) = run(&source, input, None).await;
        let report = report.unwrap();
        assert_eq!(report.candidates, 2);
        assert_eq!(report.processed, 2);
        assert_eq!(report.not_found.len(), 1);
        let entries = read_tar(output);
        assert!(entries[1].1.contains(r#"edx_video_id="vid-1""#));
        assert!(entries[2].1.contains(r#"edx_video_id="vid-2""#));
    }

    #[tokio::test]
    async fn archive_without_course_descriptor_is_copied() {
        let source = Fixed(Vec::new());
        let input = tar_of(&[("course/about.html", "<p/>")]);
        let (report, output) = run(&source, input, None).await;
        let report = report.unwrap();
        assert_eq!(report.course_id, None);
        assert_eq!(report.entries, 1);
        assert_eq!(read_tar(output)[0].1, "<p/>");
    }

    #[tokio::test]
    async fn broken_descriptor_is_copied_and_listed() {
        let source = Fixed(Vec::new());
        let input = tar_of(&[
            ("course/course.xml", COURSE),
            ("course/video/bad.xml", "<video><source></video>"),
        ]);
        let (report, output) = run(&source, input, None).await;
        let report = report.unwrap();
        assert_eq!(report.unreadable, vec!["course/video/bad.xml"]);
        assert!(!report.is_complete());
        assert_eq!(read_tar(output)[1].1, "<video><source></video>");
    }
}
