//! The video interchange document used by course export and import.
//!
//! ```xml
//! <video_asset client_video_id="intro.mp4" duration="111.0" status="file_complete">
//!   <encoded_videos>
//!     <encoded_video profile="mobile" url="http://cdn/intro_m.mp4" file_size="1024" bitrate="300"/>
//!   </encoded_videos>
//!   <transcripts>
//!     <transcript language_code="en" provider="Custom" file_format="srt" file_name="intro-en.srt"/>
//!   </transcripts>
//! </video_asset>
//! ```
//!
//! Course associations are never written to the document.

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::types::VideoStatus;

pub const ROOT_ELEMENT: &str = "video_asset";
pub const ENCODINGS_ELEMENT: &str = "encoded_videos";
pub const ENCODING_ELEMENT: &str = "encoded_video";
pub const TRANSCRIPTS_ELEMENT: &str = "transcripts";
pub const TRANSCRIPT_ELEMENT: &str = "transcript";

/// Maximum length of a client-supplied video label.
pub const MAX_CLIENT_VIDEO_ID_LENGTH: u64 = 255;

/// One encoding row of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingEntry {
    pub profile: String,
    pub url: String,
    pub file_size: u64,
    pub bitrate: u32,
}

/// One transcript row of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub language_code: String,
    pub provider: String,
    pub file_format: String,
    pub file_name: String,
}

/// A parsed or to-be-written interchange document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDocument {
    pub client_video_id: String,
    pub duration: f64,
    /// Raw status string; checked by [`VideoDocument::validated_fields`].
    pub status: String,
    pub encodings: Vec<EncodingEntry>,
    pub transcripts: Vec<TranscriptEntry>,
}

/// Scalar video fields that passed validation.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct VideoFields {
    #[validate(length(max = 255))]
    pub client_video_id: String,
    #[validate(range(min = 0.0))]
    pub duration: f64,
    pub status: VideoStatus,
}

impl VideoDocument {
    /// Validate the document's scalar fields.
    ///
    /// Failures are reported as [`CoreError::CannotCreate`] since the only
    /// consumer creates a record from them.
    pub fn validated_fields(&self) -> Result<VideoFields, CoreError> {
        let status = VideoStatus::from_str(&self.status).ok_or_else(|| {
            CoreError::CannotCreate(format!(
                "Invalid status '{}'. Must be one of: {}",
                self.status,
                VideoStatus::ALL.join(", ")
            ))
        })?;
        if !self.duration.is_finite() {
            return Err(CoreError::CannotCreate("duration must be a finite number".to_string()));
        }
        let fields = VideoFields {
            client_video_id: self.client_video_id.clone(),
            duration: self.duration,
            status,
        };
        fields
            .validate()
            .map_err(|e| CoreError::CannotCreate(e.to_string()))?;
        Ok(fields)
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Serialize a document.
pub fn to_xml(doc: &VideoDocument) -> Result<String, CoreError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    let mut root = BytesStart::new(ROOT_ELEMENT);
    root.push_attribute(("client_video_id", doc.client_video_id.as_str()));
    root.push_attribute(("duration", doc.duration.to_string().as_str()));
    root.push_attribute(("status", doc.status.as_str()));
    write(&mut writer, Event::Start(root))?;

    write(&mut writer, Event::Start(BytesStart::new(ENCODINGS_ELEMENT)))?;
    for encoding in &doc.encodings {
        let mut el = BytesStart::new(ENCODING_ELEMENT);
        el.push_attribute(("profile", encoding.profile.as_str()));
        el.push_attribute(("url", encoding.url.as_str()));
        el.push_attribute(("file_size", encoding.file_size.to_string().as_str()));
        el.push_attribute(("bitrate", encoding.bitrate.to_string().as_str()));
        write(&mut writer, Event::Empty(el))?;
    }
    write(&mut writer, Event::End(BytesEnd::new(ENCODINGS_ELEMENT)))?;

    if !doc.transcripts.is_empty() {
        write(&mut writer, Event::Start(BytesStart::new(TRANSCRIPTS_ELEMENT)))?;
        for transcript in &doc.transcripts {
            let mut el = BytesStart::new(TRANSCRIPT_ELEMENT);
            el.push_attribute(("language_code", transcript.language_code.as_str()));
            el.push_attribute(("provider", transcript.provider.as_str()));
            el.push_attribute(("file_format", transcript.file_format.as_str()));
            el.push_attribute(("file_name", transcript.file_name.as_str()));
            write(&mut writer, Event::Empty(el))?;
        }
        write(&mut writer, Event::End(BytesEnd::new(TRANSCRIPTS_ELEMENT)))?;
    }

    write(&mut writer, Event::End(BytesEnd::new(ROOT_ELEMENT)))?;

    String::from_utf8(writer.into_inner()).map_err(|e| CoreError::Xml(e.to_string()))
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), CoreError> {
    writer
        .write_event(event)
        .map_err(|e| CoreError::Xml(e.to_string()))
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Parse a document. Unknown elements and attributes are ignored.
pub fn from_xml(xml: &str) -> Result<VideoDocument, CoreError> {
    let mut reader = Reader::from_str(xml);
    let mut doc: Option<VideoDocument> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match doc.as_mut() {
                None => {
                    if e.name().as_ref() != ROOT_ELEMENT.as_bytes() {
                        return Err(CoreError::Xml(format!(
                            "expected <{ROOT_ELEMENT}> root element"
                        )));
                    }
                    doc = Some(read_root(&e)?);
                }
                Some(doc) => match e.name().as_ref() {
                    b"encoded_video" => doc.encodings.push(read_encoding(&e)?),
                    b"transcript" => doc.transcripts.push(read_transcript(&e)?),
                    _ => {}
                },
            },
            Event::Eof => break,
            _ => {}
        }
    }

    doc.ok_or_else(|| CoreError::Xml(format!("missing <{ROOT_ELEMENT}> element")))
}

fn attrs(e: &BytesStart<'_>) -> Result<Vec<(String, String)>, CoreError> {
    e.attributes()
        .map(|attr| -> Result<(String, String), CoreError> {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            Ok((key, value))
        })
        .collect()
}

fn take(attrs: &[(String, String)], key: &str) -> Option<String> {
    attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
}

fn number<T: std::str::FromStr>(raw: Option<String>, field: &str) -> Result<T, CoreError> {
    let raw = raw.unwrap_or_else(|| "0".to_string());
    raw.trim()
        .parse()
        .map_err(|_| CoreError::Xml(format!("{field} is not a number: '{raw}'")))
}

fn read_root(e: &BytesStart<'_>) -> Result<VideoDocument, CoreError> {
    let a = attrs(e)?;
    Ok(VideoDocument {
        client_video_id: take(&a, "client_video_id").unwrap_or_default(),
        duration: number(take(&a, "duration"), "duration")?,
        status: take(&a, "status").unwrap_or_else(|| VideoStatus::Imported.as_str().to_string()),
        encodings: Vec::new(),
        transcripts: Vec::new(),
    })
}

fn read_encoding(e: &BytesStart<'_>) -> Result<EncodingEntry, CoreError> {
    let a = attrs(e)?;
    let profile = take(&a, "profile")
        .filter(|p| !p.is_empty())
        .ok_or_else(|| CoreError::Xml("encoded_video is missing a profile".to_string()))?;
    Ok(EncodingEntry {
        profile,
        url: take(&a, "url").unwrap_or_default(),
        file_size: number(take(&a, "file_size"), "file_size")?,
        bitrate: number(take(&a, "bitrate"), "bitrate")?,
    })
}

fn read_transcript(e: &BytesStart<'_>) -> Result<TranscriptEntry, CoreError> {
    let a = attrs(e)?;
    let language_code = take(&a, "language_code")
        .filter(|l| !l.is_empty())
        .ok_or_else(|| CoreError::Xml("transcript is missing a language_code".to_string()))?;
    Ok(TranscriptEntry {
        language_code,
        provider: take(&a, "provider").unwrap_or_else(|| "Custom".to_string()),
        file_format: take(&a, "file_format").unwrap_or_else(|| "srt".to_string()),
        file_name: take(&a, "file_name").unwrap_or_default(),
    })
}
