//! In-process [`VideoStore`] backed by ordered maps behind one mutex.
//!
//! Every public operation takes the lock once, so each call (and each
//! [`WriteBatch`]) is atomic with respect to other callers.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use val_core::candidate::{EncodedUrl, RegistryVideo};
use val_core::error::CoreError;
use val_core::ident::validate_course_id;
use val_core::types::VideoStatus;
use validator::Validate;

use crate::models::course_video::CourseVideo;
use crate::models::encoded_video::EncodedVideo;
use crate::models::profile::Profile;
use crate::models::transcript::Transcript;
use crate::models::video::{CreateVideo, Video};
use crate::store::{BatchResult, VideoDetail, VideoStore, WriteBatch};

type PairKey = (String, String);

#[derive(Debug, Default)]
struct Tables {
    videos: BTreeMap<String, Video>,
    profiles: BTreeMap<String, Profile>,
    /// Keyed by `(edx_video_id, profile)`.
    encodings: BTreeMap<PairKey, EncodedVideo>,
    /// Keyed by `(course_id, edx_video_id)`.
    courses: BTreeMap<PairKey, CourseVideo>,
    /// Keyed by `(edx_video_id, language_code)`.
    transcripts: BTreeMap<PairKey, Transcript>,
}

impl Tables {
    fn listing(&self, video: &Video) -> RegistryVideo {
        let encoded_videos = self
            .encodings
            .range(range_for(&video.edx_video_id))
            .map(|(_, e)| EncodedUrl {
                profile: e.profile.clone(),
                url: e.url.clone(),
                file_size: e.file_size,
                bitrate: e.bitrate,
            })
            .collect();
        RegistryVideo {
            edx_video_id: video.edx_video_id.clone(),
            client_video_id: video.client_video_id.clone(),
            encoded_videos,
        }
    }

    fn insert_video(&mut self, input: &CreateVideo) -> Video {
        let video = Video {
            edx_video_id: input.edx_video_id.clone(),
            client_video_id: input.client_video_id.clone(),
            duration: input.duration,
            status: input.status,
            created_at: Utc::now(),
        };
        self.videos.insert(video.edx_video_id.clone(), video.clone());
        video
    }

    fn link(&mut self, edx_video_id: &str, course_id: &str) -> (CourseVideo, bool) {
        let key = (course_id.to_string(), edx_video_id.to_string());
        if let Some(existing) = self.courses.get(&key) {
            return (existing.clone(), false);
        }
        let link = CourseVideo {
            edx_video_id: edx_video_id.to_string(),
            course_id: course_id.to_string(),
            is_hidden: false,
            image: None,
            created_at: Utc::now(),
        };
        self.courses.insert(key, link.clone());
        (link, true)
    }
}

/// All `(owner, *)` keys for one owner.
fn range_for(owner: &str) -> std::ops::RangeInclusive<PairKey> {
    (owner.to_string(), String::new())..=(owner.to_string(), char::MAX.to_string())
}

/// A [`VideoStore`] held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored encodings, across all videos.
    pub fn encoding_count(&self) -> usize {
        self.lock().encodings.len()
    }

    /// Number of stored course links, hidden ones included.
    pub fn course_link_count(&self) -> usize {
        self.lock().courses.len()
    }
}

impl VideoStore for MemoryStore {
    fn get_video(&self, edx_video_id: &str) -> Result<Option<Video>, CoreError> {
        Ok(self.lock().videos.get(edx_video_id).cloned())
    }

    fn video_detail(&self, edx_video_id: &str) -> Result<Option<VideoDetail>, CoreError> {
        let tables = self.lock();
        let Some(video) = tables.videos.get(edx_video_id) else {
            return Ok(None);
        };
        let encodings = tables
            .encodings
            .range(range_for(edx_video_id))
            .map(|(_, e)| e.clone())
            .collect();
        let courses = tables
            .courses
            .values()
            .filter(|c| c.edx_video_id == edx_video_id)
            .cloned()
            .collect();
        let transcripts = tables
            .transcripts
            .range(range_for(edx_video_id))
            .map(|(_, t)| t.clone())
            .collect();
        Ok(Some(VideoDetail {
            video: video.clone(),
            encodings,
            courses,
            transcripts,
        }))
    }

    fn create_video(&self, input: &CreateVideo) -> Result<Video, CoreError> {
        input
            .validate()
            .map_err(|e| CoreError::CannotCreate(e.to_string()))?;
        let mut tables = self.lock();
        if tables.videos.contains_key(&input.edx_video_id) {
            return Err(CoreError::CannotCreate(format!(
                "video {} already exists",
                input.edx_video_id
            )));
        }
        Ok(tables.insert_video(input))
    }

    fn update_video_status(
        &self,
        edx_video_id: &str,
        status: VideoStatus,
    ) -> Result<Video, CoreError> {
        let mut tables = self.lock();
        let video = tables
            .videos
            .get_mut(edx_video_id)
            .ok_or_else(|| CoreError::video_not_found(edx_video_id))?;
        video.status = status;
        Ok(video.clone())
    }

    fn get_profile(&self, name: &str) -> Result<Option<Profile>, CoreError> {
        Ok(self.lock().profiles.get(name).cloned())
    }

    fn get_or_create_profile(&self, name: &str) -> Result<(Profile, bool), CoreError> {
        if name.trim().is_empty() {
            return Err(CoreError::CannotCreate("profile name cannot be empty".to_string()));
        }
        let mut tables = self.lock();
        if let Some(existing) = tables.profiles.get(name) {
            return Ok((existing.clone(), false));
        }
        let profile = Profile::with_default_geometry(name);
        tables.profiles.insert(name.to_string(), profile.clone());
        Ok((profile, true))
    }

    fn list_profiles(&self) -> Result<Vec<Profile>, CoreError> {
        Ok(self.lock().profiles.values().cloned().collect())
    }

    fn get_encoding(
        &self,
        edx_video_id: &str,
        profile: &str,
    ) -> Result<Option<EncodedVideo>, CoreError> {
        let key = (edx_video_id.to_string(), profile.to_string());
        Ok(self.lock().encodings.get(&key).cloned())
    }

    fn get_transcript(
        &self,
        edx_video_id: &str,
        language_code: &str,
    ) -> Result<Option<Transcript>, CoreError> {
        let key = (edx_video_id.to_string(), language_code.to_string());
        Ok(self.lock().transcripts.get(&key).cloned())
    }

    fn videos_for_course(&self, course_id: &str) -> Result<Vec<RegistryVideo>, CoreError> {
        let tables = self.lock();
        Ok(tables
            .courses
            .range(range_for(course_id))
            .filter(|(_, link)| !link.is_hidden)
            .filter_map(|(_, link)| tables.videos.get(&link.edx_video_id))
            .map(|video| tables.listing(video))
            .collect())
    }

    fn all_videos(&self) -> Result<Vec<RegistryVideo>, CoreError> {
        let tables = self.lock();
        Ok(tables.videos.values().map(|v| tables.listing(v)).collect())
    }

    fn get_or_create_course_video(
        &self,
        edx_video_id: &str,
        course_id: &str,
    ) -> Result<(CourseVideo, bool), CoreError> {
        validate_course_id(course_id).map_err(CoreError::CannotCreate)?;
        let mut tables = self.lock();
        if !tables.videos.contains_key(edx_video_id) {
            return Err(CoreError::video_not_found(edx_video_id));
        }
        Ok(tables.link(edx_video_id, course_id))
    }

    fn hide_video_for_course(
        &self,
        edx_video_id: &str,
        course_id: &str,
    ) -> Result<bool, CoreError> {
        let key = (course_id.to_string(), edx_video_id.to_string());
        let mut tables = self.lock();
        match tables.courses.get_mut(&key) {
            Some(link) if !link.is_hidden => {
                link.is_hidden = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn update_video_image(
        &self,
        edx_video_id: &str,
        course_id: &str,
        image: &str,
    ) -> Result<CourseVideo, CoreError> {
        if image.trim().is_empty() {
            return Err(CoreError::CannotUpdate("image name cannot be empty".to_string()));
        }
        let key = (course_id.to_string(), edx_video_id.to_string());
        let mut tables = self.lock();
        let link = tables
            .courses
            .get_mut(&key)
            .ok_or_else(|| CoreError::NotFound {
                entity: "course video",
                id: format!("{course_id}/{edx_video_id}"),
            })?;
        link.image = Some(image.to_string());
        Ok(link.clone())
    }

    fn apply(&self, batch: &WriteBatch) -> Result<BatchResult, CoreError> {
        let mut tables = self.lock();

        // Validate everything before the first write.
        if let Some(video) = &batch.video {
            video
                .validate()
                .map_err(|e| CoreError::CannotCreate(e.to_string()))?;
        }
        let video_known = |id: &str, tables: &Tables| {
            tables.videos.contains_key(id)
                || batch.video.as_ref().is_some_and(|v| v.edx_video_id == id)
        };
        for encoding in &batch.encodings {
            if !video_known(&encoding.edx_video_id, &*tables) {
                return Err(CoreError::video_not_found(&encoding.edx_video_id));
            }
            let profile_known = tables.profiles.contains_key(&encoding.profile)
                || batch.profiles.iter().any(|p| p.name == encoding.profile);
            if !profile_known {
                return Err(CoreError::NotFound {
                    entity: "profile",
                    id: encoding.profile.clone(),
                });
            }
        }
        for transcript in &batch.transcripts {
            if !video_known(&transcript.edx_video_id, &*tables) {
                return Err(CoreError::video_not_found(&transcript.edx_video_id));
            }
        }
        for (edx_video_id, course_id) in &batch.course_links {
            validate_course_id(course_id).map_err(CoreError::CannotCreate)?;
            if !video_known(edx_video_id, &*tables) {
                return Err(CoreError::video_not_found(edx_video_id));
            }
        }

        let mut result = BatchResult::default();

        if let Some(video) = &batch.video {
            if !tables.videos.contains_key(&video.edx_video_id) {
                tables.insert_video(video);
                result.video_created = true;
            }
        }
        for profile in &batch.profiles {
            if !tables.profiles.contains_key(&profile.name) {
                tables.profiles.insert(profile.name.clone(), profile.clone());
                result.profiles_created.push(profile.name.clone());
            }
        }
        for encoding in &batch.encodings {
            let key = (encoding.edx_video_id.clone(), encoding.profile.clone());
            if tables.encodings.contains_key(&key) {
                continue;
            }
            tables.encodings.insert(
                key,
                EncodedVideo {
                    edx_video_id: encoding.edx_video_id.clone(),
                    profile: encoding.profile.clone(),
                    url: encoding.url.clone(),
                    file_size: encoding.file_size,
                    bitrate: encoding.bitrate,
                    created_at: Utc::now(),
                },
            );
            result.encodings_created += 1;
        }
        for transcript in &batch.transcripts {
            let key = (
                transcript.edx_video_id.clone(),
                transcript.language_code.clone(),
            );
            if tables.transcripts.contains_key(&key) {
                continue;
            }
            tables.transcripts.insert(
                key,
                Transcript {
                    edx_video_id: transcript.edx_video_id.clone(),
                    language_code: transcript.language_code.clone(),
                    provider: transcript.provider.clone(),
                    file_format: transcript.file_format.clone(),
                    file_name: transcript.file_name.clone(),
                    created_at: Utc::now(),
                },
            );
            result.transcripts_created += 1;
        }
        for (edx_video_id, course_id) in &batch.course_links {
            if tables.link(edx_video_id, course_id).1 {
                result.course_links_created += 1;
            }
        }

        Ok(result)
    }
}
