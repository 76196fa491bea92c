use std::path::Path;

use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum FileFormatError {
    #[error("Failed to get file extension")]
    MissingFileExtension,
    #[error("Unsupported file extension for file: {0}")]
    UnsupportedFileExtension(String),
    #[error("YAML deserialization failed")]
    Yaml(#[from] serde_yml::Error),
    #[error("JSON deserialization failed")]
    Json(#[from] serde_json::Error),
}

pub type FileFormatResult<T> = Result<T, FileFormatError>;

pub fn get_file_extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|os_str| os_str.to_str())
}

/// Serialization formats accepted for configuration files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> FileFormatResult<Self> {
        let ext = get_file_extension(path).ok_or(FileFormatError::MissingFileExtension)?;

        if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") {
            Ok(Self::Yaml)
        } else if ext.eq_ignore_ascii_case("json") {
            Ok(Self::Json)
        } else {
            Err(FileFormatError::UnsupportedFileExtension(
                path.display().to_string(),
            ))
        }
    }

    pub fn deserialize<T: DeserializeOwned>(self, text: &str) -> FileFormatResult<T> {
        match self {
            Self::Yaml => Ok(serde_yml::from_str(text)?),
            Self::Json => Ok(serde_json::from_str(text)?),
        }
    }
}
