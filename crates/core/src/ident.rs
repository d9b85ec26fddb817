//! Video identifier conventions.
//!
//! Legacy course content refers to registry videos by URL or filename.
//! Upload tooling named files `<edx_video_id>_<suffix>.<ext>`, so the
//! identifier can usually be recovered from the path alone. Everything in
//! here is best-effort string surgery: no lookups, no failures.

use std::sync::OnceLock;

use regex::Regex;

/// Maximum length of a registry video identifier.
pub const MAX_VIDEO_ID_LENGTH: usize = 100;

/// Maximum length of a course identifier.
pub const MAX_COURSE_ID_LENGTH: usize = 255;

fn video_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex"))
}

/// Derive a candidate video identifier from a URL or file path.
///
/// Takes the last path segment, strips the extension, and keeps
/// everything before the first underscore.
///
/// ```
/// use val_core::ident::extract_id;
///
/// assert_eq!(extract_id("http://cdn/x/foo_bar.mp4"), "foo");
/// assert_eq!(extract_id("intro.mp4"), "intro");
/// ```
pub fn extract_id(path_or_url: &str) -> String {
    let stem = filename_stem(path_or_url);
    match stem.split_once('_') {
        Some((head, _)) => head.to_string(),
        None => stem,
    }
}

/// The last path segment of `path_or_url` with its extension removed.
///
/// Underscores are kept, unlike [`extract_id`].
pub fn filename_stem(path_or_url: &str) -> String {
    let file_name = match path_or_url.rfind('/') {
        Some(pos) => &path_or_url[pos + 1..],
        None => path_or_url,
    };
    match file_name.rfind('.') {
        Some(pos) if pos > 0 => file_name[..pos].to_string(),
        _ => file_name.to_string(),
    }
}

/// Replace underscores with hyphens; older uploads used either separator.
pub fn hyphenated(stem: &str) -> String {
    stem.replace('_', "-")
}

/// Validate a registry video identifier.
pub fn validate_video_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("Video id cannot be empty".to_string());
    }
    if id.len() > MAX_VIDEO_ID_LENGTH {
        return Err(format!(
            "Video id exceeds maximum length of {MAX_VIDEO_ID_LENGTH} characters"
        ));
    }
    if !video_id_pattern().is_match(id) {
        return Err(format!(
            "Video id '{id}' may only contain letters, digits, '-' and '_'"
        ));
    }
    Ok(())
}

/// Validate a course identifier.
pub fn validate_course_id(course_id: &str) -> Result<(), String> {
    if course_id.trim().is_empty() {
        return Err("Course id cannot be empty".to_string());
    }
    if course_id.len() > MAX_COURSE_ID_LENGTH {
        return Err(format!(
            "Course id exceeds maximum length of {MAX_COURSE_ID_LENGTH} characters"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- extract_id --

    #[test]
    fn extract_from_url() {
        assert_eq!(extract_id("http://cdn/x/foo_bar.mp4"), "foo");
        assert_eq!(
            extract_id("https://s3.amazonaws.com/bucket/a1b2-c3d4_720p.mp4"),
            "a1b2-c3d4"
        );
    }

    #[test]
    fn extract_without_underscore_keeps_stem() {
        assert_eq!(extract_id("/videos/intro.mp4"), "intro");
    }

    #[test]
    fn extract_splits_on_first_underscore_only() {
        assert_eq!(extract_id("a_b_c.webm"), "a");
    }

    #[test]
    fn extract_tolerates_malformed_input() {
        assert_eq!(extract_id(""), "");
        assert_eq!(extract_id("/"), "");
        assert_eq!(extract_id("http://cdn/x/"), "");
        assert_eq!(extract_id("_leading.mp4"), "");
        assert_eq!(extract_id(".hidden"), ".hidden");
    }

    #[test]
    fn extract_strips_only_last_extension() {
        assert_eq!(extract_id("clip.v2.mp4"), "clip.v2");
    }

    // -- filename_stem / hyphenated --

    #[test]
    fn stem_keeps_underscores() {
        assert_eq!(filename_stem("http://cdn/x/foo_bar.mp4"), "foo_bar");
        assert_eq!(filename_stem("noext"), "noext");
    }

    #[test]
    fn hyphenated_replaces_all_underscores() {
        assert_eq!(hyphenated("foo_bar_baz"), "foo-bar-baz");
        assert_eq!(hyphenated("plain"), "plain");
    }

    // -- validation --

    #[test]
    fn valid_video_ids() {
        assert!(validate_video_id("abc-123_DEF").is_ok());
        assert!(validate_video_id(&"a".repeat(MAX_VIDEO_ID_LENGTH)).is_ok());
    }

    #[test]
    fn invalid_video_ids() {
        assert!(validate_video_id("").is_err());
        assert!(validate_video_id("a/b").is_err());
        assert!(validate_video_id("a b").is_err());
        assert!(validate_video_id(&"a".repeat(MAX_VIDEO_ID_LENGTH + 1)).is_err());
    }

    #[test]
    fn course_id_limits() {
        assert!(validate_course_id("MITx/6.002x/2014").is_ok());
        assert!(validate_course_id("  ").is_err());
        assert!(validate_course_id(&"c".repeat(MAX_COURSE_ID_LENGTH + 1)).is_err());
    }
}
