use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_MAP_SIZE: u32 = 1000;
pub const MIN_MAP_SIZE: u32 = 32;
pub const MAX_MAP_SIZE: u32 = 4096;

/// Parameters used to procedurally generate a world.
/// Stored with the world so a seed can be replayed.
///
/// Peers sharing a seed only reproduce the same map when they also agree on
/// `width` and `height`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_map_size")]
    pub width: u32,
    #[serde(default = "default_map_size")]
    pub height: u32,
}

fn default_map_size() -> u32 {
    DEFAULT_MAP_SIZE
}

impl Default for GenerationParams {
    fn default() -> Self {
        GenerationParams {
            seed: 0,
            width: DEFAULT_MAP_SIZE,
            height: DEFAULT_MAP_SIZE,
        }
    }
}

impl GenerationParams {
    pub fn with_seed(seed: u64) -> Self {
        GenerationParams {
            seed,
            ..Default::default()
        }
    }

    /// Load generation parameters from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        let params: Self = toml::from_str(&content)
            .map_err(|e| format!("Invalid TOML in {}: {}", path.display(), e))?;
        params.validate()?;
        Ok(params)
    }

    /// Validate map dimensions.
    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();
        let range = MIN_MAP_SIZE..=MAX_MAP_SIZE;
        if !range.contains(&self.width) {
            errors.push(format!(
                "width must be {}-{}, got {}. Example: width = {}",
                MIN_MAP_SIZE, MAX_MAP_SIZE, self.width, DEFAULT_MAP_SIZE
            ));
        }
        if !range.contains(&self.height) {
            errors.push(format!(
                "height must be {}-{}, got {}. Example: height = {}",
                MIN_MAP_SIZE, MAX_MAP_SIZE, self.height, DEFAULT_MAP_SIZE
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_params_are_valid() {
        let params = GenerationParams::default();
        assert_eq!(params.width, 1000);
        assert_eq!(params.height, 1000);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn tiny_map_rejected() {
        let params = GenerationParams {
            seed: 42,
            width: 8,
            height: 1000,
        };
        let err = params.validate().unwrap_err();
        assert!(err.contains("width"), "Error should mention width: {}", err);
        assert!(!err.contains("height"));
    }

    #[test]
    fn both_dimensions_reported_together() {
        let params = GenerationParams {
            seed: 1,
            width: 5000,
            height: 0,
        };
        let err = params.validate().unwrap_err();
        assert!(err.contains("width"));
        assert!(err.contains("height"));
    }

    #[test]
    fn from_toml_string_applies_defaults() {
        let params: GenerationParams = toml::from_str("seed = 42").unwrap();
        assert_eq!(params.seed, 42);
        assert_eq!(params.width, DEFAULT_MAP_SIZE);
        assert_eq!(params.height, DEFAULT_MAP_SIZE);
    }

    #[test]
    fn from_file_valid() {
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        write!(tmpfile, "seed = 7\nwidth = 256\nheight = 128\n").unwrap();

        let params = GenerationParams::from_file(tmpfile.path()).unwrap();
        assert_eq!(params.seed, 7);
        assert_eq!(params.width, 256);
        assert_eq!(params.height, 128);
    }

    #[test]
    fn from_file_missing() {
        let err = GenerationParams::from_file(Path::new("/nonexistent/file.toml")).unwrap_err();
        assert!(err.contains("Cannot read"), "Error: {}", err);
    }

    #[test]
    fn from_file_invalid_toml() {
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        write!(tmpfile, "this is not valid toml {{{{").unwrap();

        let err = GenerationParams::from_file(tmpfile.path()).unwrap_err();
        assert!(err.contains("Invalid TOML"), "Error: {}", err);
    }

    #[test]
    fn from_file_out_of_range() {
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        write!(tmpfile, "seed = 1\nwidth = 10\n").unwrap();

        let err = GenerationParams::from_file(tmpfile.path()).unwrap_err();
        assert!(err.contains("width"), "Error: {}", err);
    }
}
