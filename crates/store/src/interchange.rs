//! Export registry videos to interchange documents and merge documents
//! back into the registry.
//!
//! Import never overwrites: an existing video keeps its scalar fields, an
//! existing (video, profile) encoding or (video, language) transcript is
//! skipped, and only the gaps are filled. The course link is always
//! ensured. Everything an import writes goes through a single
//! [`WriteBatch`], so a failed import leaves no trace.

use std::collections::HashSet;

use val_core::error::CoreError;
use val_core::ident::{validate_course_id, validate_video_id};
use val_core::interchange::{self, EncodingEntry, TranscriptEntry, VideoDocument};

use crate::models::encoded_video::CreateEncodedVideo;
use crate::models::profile::Profile;
use crate::models::transcript::CreateTranscript;
use crate::models::video::CreateVideo;
use crate::store::{BatchResult, VideoStore, WriteBatch};

/// Build the interchange document for a registered video.
pub fn export_document(
    store: &dyn VideoStore,
    edx_video_id: &str,
) -> Result<VideoDocument, CoreError> {
    let detail = store
        .video_detail(edx_video_id)?
        .ok_or_else(|| CoreError::video_not_found(edx_video_id))?;

    Ok(VideoDocument {
        client_video_id: detail.video.client_video_id,
        duration: detail.video.duration,
        status: detail.video.status.as_str().to_string(),
        encodings: detail
            .encodings
            .into_iter()
            .map(|e| EncodingEntry {
                profile: e.profile,
                url: e.url,
                file_size: e.file_size,
                bitrate: e.bitrate,
            })
            .collect(),
        transcripts: detail
            .transcripts
            .into_iter()
            .map(|t| TranscriptEntry {
                language_code: t.language_code,
                provider: t.provider,
                file_format: t.file_format,
                file_name: t.file_name,
            })
            .collect(),
    })
}

/// Export a registered video as an XML document string.
pub fn export_xml(store: &dyn VideoStore, edx_video_id: &str) -> Result<String, CoreError> {
    interchange::to_xml(&export_document(store, edx_video_id)?)
}

/// Import an XML document for `edx_video_id` into `course_id`.
pub fn import_xml(
    store: &dyn VideoStore,
    xml: &str,
    edx_video_id: &str,
    course_id: &str,
) -> Result<BatchResult, CoreError> {
    let doc = interchange::from_xml(xml)?;
    import_document(store, &doc, edx_video_id, course_id)
}

/// Merge a parsed document into the registry.
pub fn import_document(
    store: &dyn VideoStore,
    doc: &VideoDocument,
    edx_video_id: &str,
    course_id: &str,
) -> Result<BatchResult, CoreError> {
    let batch = plan_import(store, doc, edx_video_id, course_id)?;
    let result = store.apply(&batch)?;

    for profile in &result.profiles_created {
        tracing::info!(profile = %profile, edx_video_id, "Created profile during import");
    }
    tracing::info!(
        edx_video_id,
        course_id,
        video_created = result.video_created,
        encodings_created = result.encodings_created,
        encodings_skipped = doc.encodings.len() - result.encodings_created,
        transcripts_created = result.transcripts_created,
        "Imported video document",
    );
    Ok(result)
}

/// Work out which rows an import needs, without writing anything.
pub fn plan_import(
    store: &dyn VideoStore,
    doc: &VideoDocument,
    edx_video_id: &str,
    course_id: &str,
) -> Result<WriteBatch, CoreError> {
    validate_video_id(edx_video_id).map_err(CoreError::CannotCreate)?;
    validate_course_id(course_id).map_err(CoreError::CannotCreate)?;
    let fields = doc.validated_fields()?;

    let mut batch = WriteBatch::default();

    match store.get_video(edx_video_id)? {
        Some(_) => tracing::debug!(edx_video_id, "Video exists, keeping registry fields"),
        None => {
            batch.video = Some(CreateVideo {
                edx_video_id: edx_video_id.to_string(),
                client_video_id: fields.client_video_id,
                duration: fields.duration,
                status: fields.status,
            });
        }
    }

    let mut seen_profiles = HashSet::new();
    for entry in &doc.encodings {
        if !seen_profiles.insert(entry.profile.as_str()) {
            tracing::warn!(
                edx_video_id,
                profile = %entry.profile,
                "Duplicate profile in document, keeping the first entry",
            );
            continue;
        }
        if store.get_profile(&entry.profile)?.is_none() {
            batch.profiles.push(Profile::with_default_geometry(&entry.profile));
        }
        if store.get_encoding(edx_video_id, &entry.profile)?.is_some() {
            tracing::debug!(
                edx_video_id,
                profile = %entry.profile,
                "Encoding exists, skipping",
            );
            continue;
        }
        batch.encodings.push(CreateEncodedVideo {
            edx_video_id: edx_video_id.to_string(),
            profile: entry.profile.clone(),
            url: entry.url.clone(),
            file_size: entry.file_size,
            bitrate: entry.bitrate,
        });
    }

    let mut seen_languages = HashSet::new();
    for entry in &doc.transcripts {
        if !seen_languages.insert(entry.language_code.as_str()) {
            continue;
        }
        if store
            .get_transcript(edx_video_id, &entry.language_code)?
            .is_some()
        {
            continue;
        }
        batch.transcripts.push(CreateTranscript {
            edx_video_id: edx_video_id.to_string(),
            language_code: entry.language_code.clone(),
            provider: entry.provider.clone(),
            file_format: entry.file_format.clone(),
            file_name: entry.file_name.clone(),
        });
    }

    batch
        .course_links
        .push((edx_video_id.to_string(), course_id.to_string()));

    Ok(batch)
}
