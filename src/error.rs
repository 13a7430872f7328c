use thiserror::Error;

/// Root error type. All stage-level failures funnel through one of these
/// variants so callers (and the CLI) can catch broadly while still reporting
/// the failing stage by name.
#[derive(Error, Debug)]
pub enum VideoGenError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("content fetch failed: {0}")]
    ContentFetch(String),

    #[error("script generation failed: {0}")]
    ScriptGeneration(String),

    #[error("audio generation failed: {0}")]
    AudioGeneration(String),

    #[error("slide generation failed: {0}")]
    SlideGeneration(String),

    #[error("rendering failed: {0}")]
    Rendering(String),

    #[error("MCP error: {0}")]
    Mcp(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, VideoGenError>;

impl VideoGenError {
    /// Wrap an error with the name of the stage and the input it was
    /// processing, for the user-visible "stage + input" failure line
    /// required by the error-handling design.
    pub fn in_stage(self, stage: &str, input: &str) -> Self {
        let wrap = |m: String| format!("[{stage}] input={input}: {m}");
        match self {
            VideoGenError::Configuration(m) => VideoGenError::Configuration(wrap(m)),
            VideoGenError::ContentFetch(m) => VideoGenError::ContentFetch(wrap(m)),
            VideoGenError::ScriptGeneration(m) => VideoGenError::ScriptGeneration(wrap(m)),
            VideoGenError::AudioGeneration(m) => VideoGenError::AudioGeneration(wrap(m)),
            VideoGenError::SlideGeneration(m) => VideoGenError::SlideGeneration(wrap(m)),
            VideoGenError::Rendering(m) => VideoGenError::Rendering(wrap(m)),
            VideoGenError::Mcp(m) => VideoGenError::Mcp(wrap(m)),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_stage_prefixes_message() {
        let err = VideoGenError::SlideGeneration("download timeout".to_string())
            .in_stage("S4", "script.yaml");
        assert!(err.to_string().contains("[S4]"));
        assert!(err.to_string().contains("script.yaml"));
        assert!(err.to_string().contains("download timeout"));
    }
}
