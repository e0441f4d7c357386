//! Crate-level error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::BackendError;
use crate::batch::UsageError;

/// Asset loading failures, raised at construction time before any rendering.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse SVG {path}")]
    SvgFile {
        path: PathBuf,
        #[source]
        source: resvg::usvg::Error,
    },

    #[error("failed to parse SVG data")]
    Svg(#[from] resvg::usvg::Error),

    #[error("failed to read shader bundle {path}")]
    ShaderBundle {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("shader bundle has no entry point `{entry_point}` for technique {technique}")]
    MissingTechnique {
        technique: String,
        entry_point: String,
    },

    #[error("dpi must be finite and positive, got {0}")]
    InvalidDpi(f32),

    #[error("unknown unit `{0}` (expected px, pt, pc, mm, cm or in)")]
    InvalidUnits(String),
}

/// Any failure surfaced by the public API.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Usage(#[from] UsageError),
}

pub type Result<T> = std::result::Result<T, Error>;
