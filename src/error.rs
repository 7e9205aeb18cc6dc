use std::io;

/// All error types for the atlas-baker pipeline.
#[derive(thiserror::Error, Debug)]
pub enum AtlasBakerError {
    #[error("Input error: {0}")]
    Input(String),
    #[error("Shader graph error: {0}")]
    Shader(String),
    #[error("Atlas build error: {0}")]
    AtlasBuild(String),
    #[error("Output error: {0}")]
    Output(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AtlasBakerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_strings() {
        let e = AtlasBakerError::Input("bad file".into());
        assert_eq!(e.to_string(), "Input error: bad file");

        let e = AtlasBakerError::Shader("no such socket".into());
        assert_eq!(e.to_string(), "Shader graph error: no such socket");

        let e = AtlasBakerError::AtlasBuild("missing pixels".into());
        assert_eq!(e.to_string(), "Atlas build error: missing pixels");

        let e = AtlasBakerError::Output("disk full".into());
        assert_eq!(e.to_string(), "Output error: disk full");
    }

    #[test]
    fn from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file missing");
        let e: AtlasBakerError = io_err.into();
        assert!(matches!(e, AtlasBakerError::Io(_)));
        assert!(e.to_string().contains("file missing"));
    }
}
