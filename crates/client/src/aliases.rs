//! Compatibility lookup for courses whose id changed after videos were
//! registered under the old one.

use std::collections::HashMap;

use async_trait::async_trait;
use val_core::candidate::RegistryVideo;

use crate::error::ClientError;
use crate::source::CandidateSource;

/// Historical renames as `(old id, canonical id)`.
pub const KNOWN_RENAMES: &[(&str, &str)] = &[("MITx/6.002x_4x/3T2014", "MITx/6.002_4x/3T2014")];

/// A [`CandidateSource`] that retries an empty lookup under the course's
/// canonical id when the course is a known rename.
pub struct CourseAliases<S> {
    inner: S,
    aliases: HashMap<String, String>,
}

impl<S> CourseAliases<S> {
    /// Wrap `inner` with the built-in rename table.
    pub fn new(inner: S) -> Self {
        Self::with_aliases(
            inner,
            KNOWN_RENAMES
                .iter()
                .map(|(old, new)| (old.to_string(), new.to_string())),
        )
    }

    /// Wrap `inner` with a custom rename table.
    pub fn with_aliases(inner: S, aliases: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            inner,
            aliases: aliases.into_iter().collect(),
        }
    }

    /// The canonical id for a renamed course.
    pub fn canonical(&self, course_id: &str) -> Option<&str> {
        self.aliases.get(course_id).map(String::as_str)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: CandidateSource> CandidateSource for CourseAliases<S> {
    async fn videos_for_course(&self, course_id: &str) -> Result<Vec<RegistryVideo>, ClientError> {
        let videos = self.inner.videos_for_course(course_id).await?;
        if !videos.is_empty() {
            return Ok(videos);
        }
        match self.canonical(course_id) {
            Some(renamed) => {
                tracing::info!(course_id, renamed, "No videos under course id, retrying renamed course");
                self.inner.videos_for_course(renamed).await
            }
            None => Ok(videos),
        }
    }
}

/// Parse `old=new` pairs separated by commas, ignoring blank items.
pub fn parse_alias_pairs(raw: &str) -> Result<Vec<(String, String)>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| match item.split_once('=') {
            Some((old, new)) if !old.trim().is_empty() && !new.trim().is_empty() => {
                Ok((old.trim().to_string(), new.trim().to_string()))
            }
            _ => Err(format!("invalid course alias '{item}', expected old=new")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Serves fixed listings and records which course ids were asked for.
    struct Scripted {
        listings: HashMap<String, Vec<RegistryVideo>>,
        asked: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(listings: &[(&str, &[&str])]) -> Self {
            Self {
                listings: listings
                    .iter()
                    .map(|(course, ids)| {
                        let videos = ids
                            .iter()
                            .map(|id| RegistryVideo {
                                edx_video_id: id.to_string(),
                                client_video_id: String::new(),
                                encoded_videos: Vec::new(),
                            })
                            .collect();
                        (course.to_string(), videos)
                    })
                    .collect(),
                asked: Mutex::new(Vec::new()),
            }
        }

        fn asked(&self) -> Vec<String> {
            self.asked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CandidateSource for Scripted {
        async fn videos_for_course(
            &self,
            course_id: &str,
        ) -> Result<Vec<RegistryVideo>, ClientError> {
            self.asked.lock().unwrap().push(course_id.to_string());
            Ok(self.listings.get(course_id).cloned().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn renamed_course_retries_canonical_id() {
        let source = CourseAliases::new(Scripted::new(&[("MITx/6.002_4x/3T2014", &["v1"])]));
        let videos = source.videos_for_course("MITx/6.002x_4x/3T2014").await.unwrap();
        assert_eq!(videos[0].edx_video_id, "v1");
        assert_eq!(
            source.inner().asked(),
            vec!["MITx/6.002x_4x/3T2014", "MITx/6.002_4x/3T2014"]
        );
    }

    #[tokio::test]
    async fn non_empty_primary_lookup_is_not_retried() {
        let source = CourseAliases::new(Scripted::new(&[
            ("MITx/6.002x_4x/3T2014", &["old"]),
            ("MITx/6.002_4x/3T2014", &["new"]),
        ]));
        let videos = source.videos_for_course("MITx/6.002x_4x/3T2014").await.unwrap();
        assert_eq!(videos[0].edx_video_id, "old");
        assert_eq!(source.inner().asked().len(), 1);
    }

    #[tokio::test]
    async fn unknown_course_returns_empty() {
        let source = CourseAliases::new(Scripted::new(&[]));
        assert!(source.videos_for_course("Org/None/1").await.unwrap().is_empty());
        assert_eq!(source.inner().asked(), vec!["Org/None/1"]);
    }

    #[tokio::test]
    async fn custom_table_replaces_builtin() {
        let source = CourseAliases::with_aliases(
            Scripted::new(&[("Org/New/1", &["v9"])]),
            vec![("Org/Old/1".to_string(), "Org/New/1".to_string())],
        );
        assert_eq!(source.canonical("MITx/6.002x_4x/3T2014"), None);
        let videos = source.videos_for_course("Org/Old/1").await.unwrap();
        assert_eq!(videos[0].edx_video_id, "v9");
    }

    #[test]
    fn parses_alias_pairs() {
        assert_eq!(
            parse_alias_pairs(" a/b/c = a/b/d ,, x=y ").unwrap(),
            vec![
                ("a/b/c".to_string(), "a/b/d".to_string()),
                ("x".to_string(), "y".to_string())
            ]
        );
        assert!(parse_alias_pairs("").unwrap().is_empty());
        assert!(parse_alias_pairs("missing-separator").is_err());
        assert!(parse_alias_pairs("=y").is_err());
    }
}
