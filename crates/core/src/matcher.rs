//! Resolve a legacy video descriptor to its registry identifier.
//!
//! Matching is strict priority over an ordered list of strategies; the
//! first strategy that names a video in the candidate set wins. There is
//! no scoring.
//!
//! | Strategy           | Looks at                          | Compares against          |
//! |--------------------|-----------------------------------|---------------------------|
//! | `ExplicitSource`   | first nested `<source src>`        | `edx_video_id`            |
//! | `LegacyLabel`      | `source` attribute                 | `edx_video_id`            |
//! | `PlatformOverride` | `youtube_id_1_0`, `edx_video_id`   | youtube encoding, `client_video_id` |
//! | `FilenameStem`     | label file stem                    | `client_video_id`         |
//! | `HyphenatedStem`   | label file stem, `_` -> `-`        | `client_video_id`         |
//!
//! Courses whose id starts with one of the configured override prefixes run
//! `PlatformOverride` first.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::candidate::RegistryVideo;
use crate::descriptor::LegacyVideoDescriptor;
use crate::ident::{extract_id, filename_stem, hyphenated};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A single matching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    ExplicitSource,
    LegacyLabel,
    PlatformOverride,
    FilenameStem,
    HyphenatedStem,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExplicitSource => "explicit_source",
            Self::LegacyLabel => "legacy_label",
            Self::PlatformOverride => "platform_override",
            Self::FilenameStem => "filename_stem",
            Self::HyphenatedStem => "hyphenated_stem",
        }
    }

    /// Whether a hit from this strategy counts as "found by url".
    pub fn is_url_pass(&self) -> bool {
        matches!(self, Self::ExplicitSource | Self::LegacyLabel)
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default evaluation order.
pub const DEFAULT_ORDER: &[Strategy] = &[
    Strategy::ExplicitSource,
    Strategy::LegacyLabel,
    Strategy::PlatformOverride,
    Strategy::FilenameStem,
    Strategy::HyphenatedStem,
];

/// Order used for courses on the override prefix list.
pub const OVERRIDE_ORDER: &[Strategy] = &[
    Strategy::PlatformOverride,
    Strategy::ExplicitSource,
    Strategy::LegacyLabel,
    Strategy::FilenameStem,
    Strategy::HyphenatedStem,
];

/// How a successful match was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub strategy: Strategy,
    pub found_by_url: bool,
    /// Strategies evaluated, in order, including the winning one.
    pub attempted: Vec<Strategy>,
}

/// No strategy produced a registry video.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("No registry video matches candidate '{candidate}'")]
pub struct NoMatchFound {
    /// Best attempted candidate id, for diagnostics.
    pub candidate: String,
    pub attempted: Vec<Strategy>,
}

/// Matcher settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Course id prefixes that always run the platform override pass first.
    pub override_prefixes: Vec<String>,
}

impl MatcherConfig {
    pub fn forces_override(&self, course_id: &str) -> bool {
        self.override_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && course_id.starts_with(prefix.as_str()))
    }

    /// Strategy order for a course.
    pub fn order_for(&self, course_id: &str) -> &'static [Strategy] {
        if self.forces_override(course_id) {
            OVERRIDE_ORDER
        } else {
            DEFAULT_ORDER
        }
    }
}

// ---------------------------------------------------------------------------
// Matcher
// ---------------------------------------------------------------------------

/// A frozen candidate snapshot for one course.
pub struct Matcher<'a> {
    candidates: &'a [RegistryVideo],
    by_id: HashMap<&'a str, &'a RegistryVideo>,
    config: &'a MatcherConfig,
}

impl<'a> Matcher<'a> {
    pub fn new(candidates: &'a [RegistryVideo], config: &'a MatcherConfig) -> Self {
        let by_id = candidates
            .iter()
            .map(|c| (c.edx_video_id.as_str(), c))
            .collect();
        Self {
            candidates,
            by_id,
            config,
        }
    }

    pub fn candidates(&self) -> &'a [RegistryVideo] {
        self.candidates
    }

    /// Resolve `descriptor` to a registry id.
    pub fn resolve(
        &self,
        descriptor: &LegacyVideoDescriptor,
        course_id: &str,
    ) -> Result<(String, MatchOutcome), NoMatchFound> {
        let mut attempted = Vec::new();

        for &strategy in self.config.order_for(course_id) {
            attempted.push(strategy);
            if let Some(video) = self.run(strategy, descriptor) {
                let edx_video_id = video.edx_video_id.clone();
                check_consistency(descriptor, video, course_id);
                tracing::info!(
                    course_id,
                    edx_video_id = %edx_video_id,
                    strategy = %strategy,
                    "Matched video descriptor",
                );
                return Ok((
                    edx_video_id,
                    MatchOutcome {
                        strategy,
                        found_by_url: strategy.is_url_pass(),
                        attempted,
                    },
                ));
            }
        }

        Err(NoMatchFound {
            candidate: best_candidate(descriptor),
            attempted,
        })
    }

    fn run(&self, strategy: Strategy, d: &LegacyVideoDescriptor) -> Option<&'a RegistryVideo> {
        match strategy {
            Strategy::ExplicitSource => d
                .sources
                .first()
                .and_then(|url| self.by_edx_id(&extract_id(url))),
            Strategy::LegacyLabel => d
                .legacy_label()
                .and_then(|label| self.by_edx_id(&extract_id(label))),
            Strategy::PlatformOverride => self.platform_lookup(d.youtube(), d.existing_id()),
            Strategy::FilenameStem => {
                let stem = d.filename_label().map(filename_stem)?;
                self.platform_lookup(None, Some(&stem))
            }
            Strategy::HyphenatedStem => {
                let stem = d.filename_label().map(filename_stem)?;
                let dashed = hyphenated(&stem);
                if dashed == stem {
                    return None;
                }
                self.platform_lookup(None, Some(&dashed))
            }
        }
    }

    fn by_edx_id(&self, id: &str) -> Option<&'a RegistryVideo> {
        if id.is_empty() {
            return None;
        }
        self.by_id.get(id).copied()
    }

    /// Scan candidates in order; per candidate the youtube encoding is
    /// checked before the client label.
    fn platform_lookup(
        &self,
        youtube_id: Option<&str>,
        client_id: Option<&str>,
    ) -> Option<&'a RegistryVideo> {
        let client_id = client_id.filter(|c| !c.is_empty());
        if youtube_id.is_none() && client_id.is_none() {
            return None;
        }
        self.candidates.iter().find(|candidate| {
            youtube_id.is_some_and(|yt| candidate.has_youtube_id(yt))
                || client_id.is_some_and(|cid| candidate.client_video_id == cid)
        })
    }
}

/// Resolve a descriptor against a candidate list in one call.
pub fn match_video(
    descriptor: &LegacyVideoDescriptor,
    candidates: &[RegistryVideo],
    course_id: &str,
    config: &MatcherConfig,
) -> Result<(String, MatchOutcome), NoMatchFound> {
    Matcher::new(candidates, config).resolve(descriptor, course_id)
}

/// The most specific candidate string we tried, for operator triage.
fn best_candidate(d: &LegacyVideoDescriptor) -> String {
    d.sources
        .first()
        .map(|url| extract_id(url))
        .filter(|id| !id.is_empty())
        .or_else(|| d.legacy_label().map(extract_id).filter(|id| !id.is_empty()))
        .or_else(|| d.filename_label().map(filename_stem))
        .or_else(|| d.existing_id().map(str::to_string))
        .or_else(|| d.youtube().map(str::to_string))
        .unwrap_or_default()
}

/// Log disagreements between the descriptor and the matched record.
/// The registry value always wins; nothing is changed here.
fn check_consistency(d: &LegacyVideoDescriptor, video: &RegistryVideo, course_id: &str) {
    match d.existing_id() {
        None => tracing::debug!(
            course_id,
            edx_video_id = %video.edx_video_id,
            "Descriptor had no edx_video_id",
        ),
        Some(existing) if existing != video.edx_video_id => tracing::warn!(
            course_id,
            descriptor_id = existing,
            edx_video_id = %video.edx_video_id,
            "Descriptor edx_video_id differs from registry match",
        ),
        Some(_) => {}
    }

    if let Some(youtube_id) = d.youtube() {
        let stored = video.youtube_url().map(str::trim);
        if stored != Some(youtube_id) {
            tracing::warn!(
                course_id,
                edx_video_id = %video.edx_video_id,
                descriptor_youtube_id = youtube_id,
                registry_youtube_id = stored.unwrap_or(""),
                "Descriptor youtube id differs from registry encoding",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::candidate::EncodedUrl;

    fn candidate(edx_id: &str, client_id: &str, youtube: Option<&str>) -> RegistryVideo {
        RegistryVideo {
            edx_video_id: edx_id.to_string(),
            client_video_id: client_id.to_string(),
            encoded_videos: youtube
                .map(|yt| {
                    vec![EncodedUrl {
                        profile: "youtube".to_string(),
                        url: yt.to_string(),
                        file_size: 0,
                        bitrate: 0,
                    }]
                })
                .unwrap_or_default(),
        }
    }

    fn descriptor() -> LegacyVideoDescriptor {
        LegacyVideoDescriptor::default()
    }

    const COURSE: &str = "TestX/T101/2024";

    #[test]
    fn explicit_source_short_circuits() {
        let candidates = vec![
            candidate("other", "foo", None),
            candidate("foo", "foo.mp4", None),
        ];
        let d = LegacyVideoDescriptor {
            sources: vec!["http://cdn/x/foo_720.mp4".to_string()],
            edx_video_id: Some("foo".to_string()),
            ..descriptor()
        };
        let (id, outcome) = match_video(&d, &candidates, COURSE, &MatcherConfig::default()).unwrap();
        assert_eq!(id, "foo");
        assert_eq!(outcome.strategy, Strategy::ExplicitSource);
        assert!(outcome.found_by_url);
        assert_eq!(outcome.attempted, vec![Strategy::ExplicitSource]);
    }

    #[test]
    fn only_first_explicit_source_is_used() {
        let candidates = vec![candidate("bar", "", None)];
        let d = LegacyVideoDescriptor {
            sources: vec![
                "http://cdn/foo_1.mp4".to_string(),
                "http://cdn/bar_1.mp4".to_string(),
            ],
            ..descriptor()
        };
        let err = match_video(&d, &candidates, COURSE, &MatcherConfig::default()).unwrap_err();
        assert_eq!(err.candidate, "foo");
    }

    #[test]
    fn legacy_label_used_when_sources_miss() {
        let candidates = vec![candidate("lbl", "", None)];
        let d = LegacyVideoDescriptor {
            sources: vec!["http://cdn/nothing.mp4".to_string()],
            source: Some("http://cdn/lbl_hd.mp4".to_string()),
            ..descriptor()
        };
        let (id, outcome) = match_video(&d, &candidates, COURSE, &MatcherConfig::default()).unwrap();
        assert_eq!(id, "lbl");
        assert_eq!(outcome.strategy, Strategy::LegacyLabel);
        assert!(outcome.found_by_url);
    }

    #[test]
    fn youtube_id_matches_youtube_encoding() {
        let candidates = vec![candidate("yt-video", "clip.mp4", Some("abc123"))];
        let d = LegacyVideoDescriptor {
            youtube_id: Some("abc123".to_string()),
            ..descriptor()
        };
        let (id, outcome) = match_video(&d, &candidates, COURSE, &MatcherConfig::default()).unwrap();
        assert_eq!(id, "yt-video");
        assert_eq!(outcome.strategy, Strategy::PlatformOverride);
        assert!(!outcome.found_by_url);
    }

    #[test]
    fn youtube_match_ignores_whitespace_in_stored_url() {
        let candidates = vec![candidate("yt-video", "", Some(" abc123 \t"))];
        let d = LegacyVideoDescriptor {
            youtube_id: Some("abc123".to_string()),
            ..descriptor()
        };
        assert_matches!(
            match_video(&d, &candidates, COURSE, &MatcherConfig::default()),
            Ok((id, _)) if id == "yt-video"
        );
    }

    #[test]
    fn platform_pass_checks_youtube_before_client_label_per_candidate() {
        let candidates = vec![
            candidate("by-client", "legacy-id", None),
            candidate("by-youtube", "", Some("abc123")),
        ];
        let d = LegacyVideoDescriptor {
            edx_video_id: Some("legacy-id".to_string()),
            youtube_id: Some("abc123".to_string()),
            ..descriptor()
        };
        // Candidates are scanned in order, so the first candidate's client
        // label wins before the second candidate's youtube encoding is seen.
        let (id, _) = match_video(&d, &candidates, COURSE, &MatcherConfig::default()).unwrap();
        assert_eq!(id, "by-client");
    }

    #[test]
    fn existing_id_matches_client_label() {
        let candidates = vec![candidate("registry-id", "old-client-id", None)];
        let d = LegacyVideoDescriptor {
            edx_video_id: Some("old-client-id".to_string()),
            ..descriptor()
        };
        let (id, _) = match_video(&d, &candidates, COURSE, &MatcherConfig::default()).unwrap();
        assert_eq!(id, "registry-id");
    }

    #[test]
    fn filename_stem_retry() {
        let candidates = vec![candidate("v-1", "lecture_01", None)];
        let d = LegacyVideoDescriptor {
            source: Some("http://cdn/x/lecture_01.mp4".to_string()),
            ..descriptor()
        };
        let (id, outcome) = match_video(&d, &candidates, COURSE, &MatcherConfig::default()).unwrap();
        assert_eq!(id, "v-1");
        assert_eq!(outcome.strategy, Strategy::FilenameStem);
        assert_eq!(
            outcome.attempted,
            vec![
                Strategy::ExplicitSource,
                Strategy::LegacyLabel,
                Strategy::PlatformOverride,
                Strategy::FilenameStem
            ]
        );
    }

    #[test]
    fn hyphenated_stem_retry() {
        let candidates = vec![candidate("v-2", "lecture-01", None)];
        let d = LegacyVideoDescriptor {
            source: Some("http://cdn/x/lecture_01.mp4".to_string()),
            ..descriptor()
        };
        let (id, outcome) = match_video(&d, &candidates, COURSE, &MatcherConfig::default()).unwrap();
        assert_eq!(id, "v-2");
        assert_eq!(outcome.strategy, Strategy::HyphenatedStem);
    }

    #[test]
    fn filename_stem_does_not_check_youtube() {
        let candidates = vec![candidate("v-3", "", Some("lecture_01"))];
        let d = LegacyVideoDescriptor {
            source: Some("http://cdn/x/lecture_01.mp4".to_string()),
            ..descriptor()
        };
        assert!(match_video(&d, &candidates, COURSE, &MatcherConfig::default()).is_err());
    }

    #[test]
    fn unmatched_source_reports_extracted_candidate() {
        let candidates = vec![candidate("bar", "bar.mp4", None)];
        let d = LegacyVideoDescriptor {
            source: Some("http://cdn/x/foo_bar.mp4".to_string()),
            ..descriptor()
        };
        let err = match_video(&d, &candidates, COURSE, &MatcherConfig::default()).unwrap_err();
        assert_eq!(err.candidate, "foo");
        assert_eq!(err.attempted, DEFAULT_ORDER.to_vec());
    }

    #[test]
    fn empty_descriptor_against_empty_candidates() {
        let err = match_video(&descriptor(), &[], COURSE, &MatcherConfig::default()).unwrap_err();
        assert_eq!(err.candidate, "");
    }

    #[test]
    fn override_prefix_runs_platform_pass_first() {
        let candidates = vec![
            candidate("foo", "", None),
            candidate("yt-video", "", Some("abc123")),
        ];
        let d = LegacyVideoDescriptor {
            sources: vec!["http://cdn/foo_1.mp4".to_string()],
            youtube_id: Some("abc123".to_string()),
            ..descriptor()
        };
        let config = MatcherConfig {
            override_prefixes: vec!["HarvardX/".to_string()],
        };

        let (id, outcome) = match_video(&d, &candidates, "HarvardX/PH207x/2012", &config).unwrap();
        assert_eq!(id, "yt-video");
        assert_eq!(outcome.strategy, Strategy::PlatformOverride);

        let (id, _) = match_video(&d, &candidates, COURSE, &config).unwrap();
        assert_eq!(id, "foo");
    }

    #[test]
    fn override_prefix_falls_back_to_url_passes() {
        let candidates = vec![candidate("foo", "", None)];
        let d = LegacyVideoDescriptor {
            sources: vec!["http://cdn/foo_1.mp4".to_string()],
            ..descriptor()
        };
        let config = MatcherConfig {
            override_prefixes: vec!["HarvardX/".to_string()],
        };
        let (id, outcome) = match_video(&d, &candidates, "HarvardX/PH207x/2012", &config).unwrap();
        assert_eq!(id, "foo");
        assert_eq!(
            outcome.attempted,
            vec![Strategy::PlatformOverride, Strategy::ExplicitSource]
        );
    }

    #[test]
    fn empty_prefix_never_forces() {
        let config = MatcherConfig {
            override_prefixes: vec![String::new()],
        };
        assert!(!config.forces_override("anything"));
    }

    #[test]
    fn mismatched_existing_id_does_not_change_outcome() {
        let candidates = vec![candidate("foo", "", Some("zzz"))];
        let d = LegacyVideoDescriptor {
            sources: vec!["http://cdn/foo_1.mp4".to_string()],
            edx_video_id: Some("stale".to_string()),
            youtube_id: Some("abc123".to_string()),
            ..descriptor()
        };
        let (id, _) = match_video(&d, &candidates, COURSE, &MatcherConfig::default()).unwrap();
        assert_eq!(id, "foo");
    }
}
