use std::borrow::Cow;

/// Failures of the image and video collaborators.
#[filekit_derive::filekit_error]
pub enum CodecError {
    #[error("Image processing failed{}: {source}", format_context(.context))]
    Image { source: image::ImageError, context: Option<Cow<'static, str>> },

    #[error("Unsupported media format{}: {message}", format_context(.context))]
    UnsupportedFormat { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The probe reported something that is not a usable, finite, non-negative length.
    #[error("Invalid media duration{}: {message}", format_context(.context))]
    InvalidDuration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// An external tool ran but reported failure.
    #[error("Media tool failed{}: {message}", format_context(.context))]
    Tool { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Media tool I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },
}
