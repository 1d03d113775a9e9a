//! Unified error types for the image viewer application.

use std::fmt;

/// Application-specific errors.
///
/// Every message has the shape `"<category>: <detail>"`; the status line
/// only shows the detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Error loading or decoding an image file
    ImageLoad(String),
    /// Error encoding or writing an image file
    ImageSave(String),
    /// The file extension is not handled by any codec
    UnsupportedFormat(String),
    /// Error scanning directory for image files
    DirectoryScan(String),
    /// Error setting up the file system watcher
    Watch(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ImageLoad(msg) => write!(f, "Image load error: {}", msg),
            AppError::ImageSave(msg) => write!(f, "Image save error: {}", msg),
            AppError::UnsupportedFormat(ext) => write!(f, "Unsupported format: {}", ext),
            AppError::DirectoryScan(msg) => write!(f, "Directory scan error: {}", msg),
            AppError::Watch(msg) => write!(f, "File watch error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::ImageLoad(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::DirectoryScan(err.to_string())
    }
}

impl From<notify::Error> for AppError {
    fn from(err: notify::Error) -> Self {
        AppError::Watch(err.to_string())
    }
}

/// Type alias for Results in this application.
pub type Result<T> = std::result::Result<T, AppError>;
