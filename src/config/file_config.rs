use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub storage_dir: Option<String>,
    pub work_dir: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub max_upload_mb: Option<usize>,
    pub public_base_url: Option<String>,
    pub display_root: Option<String>,

    // Feature configs
    pub conversion: Option<ConversionConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ConversionConfig {
    /// Candidate ffmpeg locations, probed in order.
    pub ffmpeg_paths: Option<Vec<String>>,
    pub timeout_sec: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
storage_dir = "/data/recordings"
port = 8080
logging_level = "headers"
public_base_url = "https://voice.example.com/static"

[conversion]
ffmpeg_paths = ["/usr/bin/ffmpeg", "/usr/local/bin/ffmpeg"]
timeout_sec = 12
"#
        )
        .unwrap();

        let config = FileConfig::load(file.path()).unwrap();

        assert_eq!(config.storage_dir.as_deref(), Some("/data/recordings"));
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.logging_level.as_deref(), Some("headers"));
        assert!(config.metrics_port.is_none());
        let conversion = config.conversion.unwrap();
        assert_eq!(
            conversion.ffmpeg_paths.unwrap(),
            vec!["/usr/bin/ffmpeg", "/usr/local/bin/ffmpeg"]
        );
        assert_eq!(conversion.timeout_sec, Some(12));
    }

    #[test]
    fn test_load_empty_config() {
        let file = NamedTempFile::new().unwrap();
        let config = FileConfig::load(file.path()).unwrap();
        assert!(config.storage_dir.is_none());
        assert!(config.conversion.is_none());
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();

        let err = FileConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = FileConfig::load(Path::new("/nonexistent/voice-ingest.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
