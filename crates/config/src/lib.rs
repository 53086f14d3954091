//! Xfer Configuration Management
//!
//! Loads decoder settings from `xferoptions.txt` and the object-type table from
//! `objecttypes.txt`. Both files are optional; anything missing falls back to
//! the defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use xfer_core::TypeTag;

/// Options file name inside a config directory
pub const OPTIONS_FILE: &str = "xferoptions.txt";
/// Default object-type table file name
pub const OBJECT_TYPES_FILE: &str = "objecttypes.txt";
/// Default nested entity depth limit
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Errors raised while loading configuration
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// One row of the object-type table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectTypeEntry {
    /// Numeric object type ID, as written in newer snapshots
    pub id: u16,
    /// Object type name, as written in older snapshots
    pub name: String,
    /// Type tag of the decoder for this object type
    pub tag: TypeTag,
}

/// Effective decoder configuration
#[derive(Debug, Clone)]
pub struct XferConfig {
    // ========== From xferoptions.txt ==========
    /// XOR key applied to captures (from "xorkey" option, absent = unmasked)
    pub xor_key: Option<u8>,
    /// Nested entity depth limit (from "maxdepth" option, default: 64)
    pub max_depth: usize,
    /// Log filter used when RUST_LOG is unset (from "loglevel" option)
    pub log_level: String,
    /// Object-type table path (from "objecttypes" option)
    pub object_types_file: PathBuf,

    // ========== From objecttypes.txt ==========
    pub object_types: Vec<ObjectTypeEntry>,
}

impl Default for XferConfig {
    fn default() -> Self {
        Self {
            xor_key: None,
            max_depth: DEFAULT_MAX_DEPTH,
            log_level: "info".into(),
            object_types_file: PathBuf::from(OBJECT_TYPES_FILE),
            object_types: Vec::new(),
        }
    }
}

impl XferConfig {
    /// Load `xferoptions.txt` and the object-type table from `dir`
    ///
    /// A relative `objecttypes` path is resolved against `dir`.
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();

        let mut config = match read_optional(&dir.join(OPTIONS_FILE))? {
            Some(content) => Self::parse(&content),
            None => {
                tracing::debug!("No {} in {}, using defaults", OPTIONS_FILE, dir.display());
                Self::default()
            }
        };

        if config.object_types_file.is_relative() {
            config.object_types_file = dir.join(&config.object_types_file);
        }

        if let Some(content) = read_optional(&config.object_types_file)? {
            config.object_types = parse_object_types(&content)?;
        }

        Ok(config)
    }

    /// Parse xferoptions.txt content
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                config.parse_option(key.trim(), value.trim());
            }
        }

        config
    }

    fn parse_option(&mut self, key: &str, value: &str) {
        match key {
            "xorkey" => match parse_byte(value) {
                Some(0) => self.xor_key = None,
                Some(key) => self.xor_key = Some(key),
                None => tracing::warn!("Ignoring invalid xorkey: {}", value),
            },
            "maxdepth" => {
                self.max_depth = value.parse().unwrap_or_else(|_| {
                    tracing::warn!("Ignoring invalid maxdepth: {}", value);
                    DEFAULT_MAX_DEPTH
                });
            }
            "loglevel" => self.log_level = value.into(),
            "objecttypes" => self.object_types_file = PathBuf::from(value),
            _ => {
                tracing::debug!("Unknown config option: {} = {}", key, value);
            }
        }
    }

    /// Look up an object-type row by name
    pub fn object_type(&self, name: &str) -> Option<&ObjectTypeEntry> {
        self.object_types.iter().find(|entry| entry.name == name)
    }

    /// Log the effective configuration
    pub fn display(&self) {
        tracing::info!("Xfer Configuration:");
        tracing::info!("  [{}]", OPTIONS_FILE);
        match self.xor_key {
            Some(key) => tracing::info!("    XOR key: 0x{:02x}", key),
            None => tracing::info!("    XOR key: (none)"),
        }
        tracing::info!("    Max depth: {}", self.max_depth);
        tracing::info!("    Log level: {}", self.log_level);
        tracing::info!("  [{}]", self.object_types_file.display());
        tracing::info!("    Object types: {}", self.object_types.len());
    }
}

/// Parse the object-type table
///
/// Each non-comment line is `<type id> <object type name> <type tag>`.
pub fn parse_object_types(content: &str) -> Result<Vec<ObjectTypeEntry>, ConfigError> {
    let mut entries = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parse_error = |message: String| ConfigError::Parse {
            line: index + 1,
            message,
        };

        let fields: Vec<&str> = line.split_whitespace().collect();
        let [id, name, tag] = fields[..] else {
            return Err(parse_error(format!(
                "expected `<id> <name> <tag>`, found {} fields",
                fields.len()
            )));
        };

        let id = id
            .parse::<u16>()
            .map_err(|_| parse_error(format!("invalid object type id `{}`", id)))?;

        entries.push(ObjectTypeEntry {
            id,
            name: name.into(),
            tag: TypeTag::from(tag),
        });
    }

    Ok(entries)
}

fn read_optional(path: &Path) -> Result<Option<String>, ConfigError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Decimal or `0x` hex byte
fn parse_byte(value: &str) -> Option<u8> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = XferConfig::default();
        assert_eq!(config.xor_key, None);
        assert_eq!(config.max_depth, 64);
        assert_eq!(config.log_level, "info");
        assert!(config.object_types.is_empty());
    }

    #[test]
    fn test_parse_simple_config() {
        let config_text = r#"
# capture settings
xorkey = 0x5A
maxdepth = 16
loglevel = debug
unknown = whatever
"#;
        let config = XferConfig::parse(config_text);
        assert_eq!(config.xor_key, Some(0x5A));
        assert_eq!(config.max_depth, 16);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = XferConfig::parse("xorkey = 300\nmaxdepth = lots\n");
        assert_eq!(config.xor_key, None);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);

        assert_eq!(XferConfig::parse("xorkey = 42").xor_key, Some(42));
        assert_eq!(XferConfig::parse("xorkey = 0").xor_key, None);
    }

    #[test]
    fn test_parse_object_types() {
        let table = "# id name tag\n7 chainmail ArmorXfer\n\n12  longsword\tWeaponXfer\n";
        let entries = parse_object_types(table).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 7);
        assert_eq!(entries[0].name, "chainmail");
        assert_eq!(entries[0].tag.as_str(), "ArmorXfer");
        assert_eq!(entries[1].id, 12);
        assert_eq!(entries[1].tag.as_str(), "WeaponXfer");
    }

    #[test]
    fn test_object_types_errors_carry_line() {
        let err = parse_object_types("1 a DefaultXfer\nbroken line\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { line: 2, .. }));

        let err = parse_object_types("\n\n70000 a DefaultXfer\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { line: 3, .. }));
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(OPTIONS_FILE),
            "xorkey = 17\nobjecttypes = types.txt\n",
        )
        .unwrap();
        fs::write(dir.path().join("types.txt"), "3 buckler ArmorXfer\n").unwrap();

        let config = XferConfig::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.xor_key, Some(17));
        assert_eq!(config.object_types_file, dir.path().join("types.txt"));
        assert_eq!(config.object_type("buckler").map(|e| e.id), Some(3));
        assert!(config.object_type("sword").is_none());
    }

    #[test]
    fn test_load_from_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = XferConfig::load_from_dir(dir.path()).unwrap();

        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(config.object_types.is_empty());
    }

    #[test]
    fn test_load_propagates_table_errors() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(OBJECT_TYPES_FILE), "x y\n").unwrap();

        let err = XferConfig::load_from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { line: 1, .. }));
    }
}
