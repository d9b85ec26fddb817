//! Legacy per-video XML descriptors and the course descriptor found in
//! course export archives.
//!
//! A video descriptor looks like:
//!
//! ```xml
//! <video display_name="Intro" youtube_id_1_0="abc123" edx_video_id=""
//!        source="http://cdn/x/intro_720.mp4">
//!   <source src="http://cdn/x/intro_720.mp4"/>
//! </video>
//! ```
//!
//! Parsing is lenient: unknown attributes and children are ignored, and
//! [`rewrite_video_id`] passes every event it does not touch straight
//! through so the rest of the document survives unchanged.

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const ATTR_EDX_VIDEO_ID: &str = "edx_video_id";
pub const ATTR_SOURCE: &str = "source";
pub const ATTR_YOUTUBE_ID: &str = "youtube_id_1_0";
pub const ATTR_DISPLAY_NAME: &str = "display_name";

/// Path segment marking a video descriptor entry inside a course archive.
pub const VIDEO_ENTRY_SEGMENT: &str = "/video/";

/// File name of the course descriptor at the archive root.
pub const COURSE_DESCRIPTOR_FILE: &str = "course.xml";

/// A video descriptor parsed from a course archive entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyVideoDescriptor {
    /// Pre-existing registry identifier, if the course already had one.
    pub edx_video_id: Option<String>,
    /// `src` of every nested `<source>` element, in document order.
    pub sources: Vec<String>,
    /// The legacy `source` attribute.
    pub source: Option<String>,
    /// Platform external id (`youtube_id_1_0`).
    pub youtube_id: Option<String>,
    pub display_name: Option<String>,
}

impl LegacyVideoDescriptor {
    /// Non-empty legacy label, i.e. the `source` attribute.
    pub fn legacy_label(&self) -> Option<&str> {
        non_empty(self.source.as_deref())
    }

    /// Label used for filename-derived matching: the legacy label, falling
    /// back to the first explicit source.
    pub fn filename_label(&self) -> Option<&str> {
        self.legacy_label()
            .or_else(|| self.sources.iter().map(String::as_str).find(|s| !s.trim().is_empty()))
    }

    pub fn existing_id(&self) -> Option<&str> {
        non_empty(self.edx_video_id.as_deref())
    }

    pub fn youtube(&self) -> Option<&str> {
        non_empty(self.youtube_id.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Returns `true` if an archive entry path names a video descriptor.
pub fn is_video_entry(path: &str) -> bool {
    path.contains(VIDEO_ENTRY_SEGMENT) && path.ends_with(".xml")
}

/// Returns `true` if an archive entry path is the root course descriptor
/// (`<root>/course.xml`).
pub fn is_course_descriptor(path: &str) -> bool {
    let trimmed = path.trim_start_matches("./");
    let mut parts = trimmed.split('/').filter(|p| !p.is_empty());
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(_), Some(COURSE_DESCRIPTOR_FILE), None)
    )
}

/// Parse a video descriptor document.
pub fn parse_video_descriptor(xml: &[u8]) -> Result<LegacyVideoDescriptor, CoreError> {
    let mut reader = Reader::from_reader(xml);
    let mut descriptor = LegacyVideoDescriptor::default();
    let mut depth = 0usize;
    let mut seen_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                read_descriptor_element(&e, depth, &mut descriptor, &mut seen_root)?;
                depth += 1;
            }
            Event::Empty(e) => {
                read_descriptor_element(&e, depth, &mut descriptor, &mut seen_root)?;
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(CoreError::Xml("video descriptor has no root element".to_string()));
    }
    Ok(descriptor)
}

fn read_descriptor_element(
    e: &BytesStart<'_>,
    depth: usize,
    descriptor: &mut LegacyVideoDescriptor,
    seen_root: &mut bool,
) -> Result<(), CoreError> {
    if depth == 0 {
        *seen_root = true;
        for attr in e.attributes() {
            let attr = attr?;
            let value = attr.unescape_value()?.into_owned();
            match attr.key.as_ref() {
                b"edx_video_id" => descriptor.edx_video_id = Some(value),
                b"source" => descriptor.source = Some(value),
                b"youtube_id_1_0" => descriptor.youtube_id = Some(value),
                b"display_name" => descriptor.display_name = Some(value),
                _ => {}
            }
        }
    } else if depth == 1 && e.name().as_ref() == b"source" {
        if let Some(src) = attribute(e, b"src")? {
            descriptor.sources.push(src);
        }
    }
    Ok(())
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, CoreError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Rewrite a video descriptor so its root element carries
/// `edx_video_id="<edx_video_id>"`.
///
/// The attribute is replaced in place when present and appended otherwise.
/// All other content is written back as read.
pub fn rewrite_video_id(xml: &[u8], edx_video_id: &str) -> Result<Vec<u8>, CoreError> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + edx_video_id.len() + 16));
    let mut depth = 0usize;

    loop {
        let event = reader.read_event()?;
        let event = match event {
            Event::Start(e) if depth == 0 => {
                depth += 1;
                Event::Start(with_video_id(&e, edx_video_id)?)
            }
            Event::Empty(e) if depth == 0 => Event::Empty(with_video_id(&e, edx_video_id)?),
            Event::Start(e) => {
                depth += 1;
                Event::Start(e)
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                Event::End(e)
            }
            Event::Eof => break,
            other => other,
        };
        writer
            .write_event(event)
            .map_err(|e| CoreError::Xml(e.to_string()))?;
    }

    Ok(writer.into_inner())
}

fn with_video_id(e: &BytesStart<'_>, edx_video_id: &str) -> Result<BytesStart<'static>, CoreError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut rewritten = BytesStart::new(name);
    let mut replaced = false;

    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == ATTR_EDX_VIDEO_ID.as_bytes() {
            rewritten.push_attribute((ATTR_EDX_VIDEO_ID, edx_video_id));
            replaced = true;
        } else if attr.value.contains(&b'"') {
            // Written back double-quoted, so re-escape from the decoded value.
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?;
            rewritten.push_attribute((key.as_str(), &*value));
        } else {
            rewritten.push_attribute(attr);
        }
    }
    if !replaced {
        rewritten.push_attribute((ATTR_EDX_VIDEO_ID, edx_video_id));
    }
    Ok(rewritten)
}

/// Course identity from the archive's root `course.xml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseDescriptor {
    pub org: String,
    pub course: String,
    pub url_name: String,
}

impl CourseDescriptor {
    /// The slash-joined course id, e.g. `MITx/6.002x/2014`.
    pub fn course_id(&self) -> String {
        format!("{}/{}/{}", self.org, self.course, self.url_name)
    }
}

/// Parse the root `course.xml` document.
pub fn parse_course_descriptor(xml: &[u8]) -> Result<CourseDescriptor, CoreError> {
    let mut reader = Reader::from_reader(xml);

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                let org = attribute(&e, b"org")?;
                let course = attribute(&e, b"course")?;
                let url_name = attribute(&e, b"url_name")?;
                return match (org, course, url_name) {
                    (Some(org), Some(course), Some(url_name)) => Ok(CourseDescriptor {
                        org,
                        course,
                        url_name,
                    }),
                    _ => Err(CoreError::Xml(
                        "course descriptor must carry org, course and url_name".to_string(),
                    )),
                };
            }
            Event::Eof => {
                return Err(CoreError::Xml("course descriptor has no root element".to_string()))
            }
            _ => {}
        }
    }
}
