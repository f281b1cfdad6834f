//! Error types shared by the rendering pipeline and the artifact store.

use std::io;

/// Failure to turn uploaded bytes into a raster.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("image data is empty")]
    Empty,

    #[error("image has zero width or height")]
    ZeroSized,

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Which upload an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upload {
    Photo,
    Design,
}

impl std::fmt::Display for Upload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Upload::Photo => f.write_str("base photo"),
            Upload::Design => f.write_str("design"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to decode {upload}: {source}")]
    Decode {
        upload: Upload,
        #[source]
        source: DecodeError,
    },

    /// No projective transform exists between the design corners and the quadrilateral.
    #[error("degenerate quadrilateral: {0}")]
    DegenerateQuad(&'static str),

    #[error("failed to encode PNG: {0}")]
    Encode(#[from] png::EncodingError),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("artifact i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("invalid artifact reference: {0:?}")]
    InvalidReference(String),

    #[error("artifact not found: {0}")]
    NotFound(String),
}
