pub type MemeplateResult<T> = Result<T, MemeplateError>;

#[derive(thiserror::Error, Debug)]
pub enum MemeplateError {
    #[error("malformed slug: {0}")]
    MalformedSlug(String),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("render error: {0}")]
    Render(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MemeplateError {
    pub fn malformed_slug(msg: impl Into<String>) -> Self {
        Self::MalformedSlug(msg.into())
    }

    pub fn template_not_found(id: impl Into<String>) -> Self {
        Self::TemplateNotFound(id.into())
    }

    pub fn unsupported_format(name: impl Into<String>) -> Self {
        Self::UnsupportedFormat(name.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }
}
