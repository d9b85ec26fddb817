/// Domain errors shared by the registry crates.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Cannot create: {0}")]
    CannotCreate(String),

    #[error("Cannot update: {0}")]
    CannotUpdate(String),

    #[error("Malformed XML: {0}")]
    Xml(String),
}

impl CoreError {
    /// Shorthand for a missing video record.
    pub fn video_not_found(edx_video_id: &str) -> Self {
        Self::NotFound {
            entity: "video",
            id: edx_video_id.to_string(),
        }
    }
}

impl From<quick_xml::Error> for CoreError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for CoreError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(err.to_string())
    }
}
