//! Configuration management infrastructure.
//!
//! The signer reads one key/value file naming the TLS identity, the service
//! endpoint and the customer keys. Two syntaxes map onto the same model:
//! TOML and the legacy `KEY=VALUE` properties format.

use crate::domain::types::ServiceUrl;
use crate::infra::error::{SigningError, SigningResult};
use crate::HashAlgorithm;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 90;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 300;

/// Properties file looked up in the working directory when no path is given.
pub const LOCAL_PROPERTIES_FILE: &str = "signpdf.properties";

/// Connection and identity settings for the signing service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningConfiguration {
    /// Client certificate (PEM) presented to the service
    #[serde(rename = "CERT_FILE")]
    pub cert_file: PathBuf,

    /// Private key (PEM, PKCS#8 or traditional) of the client certificate
    #[serde(rename = "CERT_KEY")]
    pub cert_key: PathBuf,

    /// Pinned issuer of the server certificate
    #[serde(rename = "SSL_CA", default, skip_serializing_if = "Option::is_none")]
    pub ssl_ca: Option<PathBuf>,

    /// Signing endpoint
    #[serde(rename = "URL")]
    pub url: String,

    #[serde(rename = "CUSTOMER")]
    pub customer: String,

    /// Key used for signatures with the static certificate
    #[serde(rename = "KEY_STATIC", default)]
    pub key_static: String,

    /// Key used for on-demand certificates
    #[serde(rename = "KEY_ONDEMAND", default)]
    pub key_on_demand: String,

    /// Connect timeout in seconds
    #[serde(
        rename = "TIMEOUT_CON",
        default = "default_connect_timeout",
        deserialize_with = "lenient_connect_timeout"
    )]
    pub timeout_connect: u64,

    /// Response read timeout in seconds
    #[serde(
        rename = "TIMEOUT_READ",
        default = "default_read_timeout",
        deserialize_with = "lenient_read_timeout"
    )]
    pub timeout_read: u64,

    #[serde(rename = "DIGEST_METHOD", default = "default_digest_method")]
    pub digest_method: String,
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_read_timeout() -> u64 {
    DEFAULT_READ_TIMEOUT_SECS
}

fn default_digest_method() -> String {
    HashAlgorithm::default().as_str().to_string()
}

/// Seconds given as a number or as text; anything unparseable falls back
/// to the default.
fn lenient_seconds<'de, D: Deserializer<'de>>(deserializer: D, default: u64) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    let seconds = match Raw::deserialize(deserializer)? {
        Raw::Number(n) => u64::try_from(n).ok(),
        Raw::Text(s) => s.trim().parse::<u64>().ok(),
    };
    Ok(seconds.filter(|s| *s > 0).unwrap_or_else(|| {
        log::warn!("Invalid timeout value, using {default} seconds");
        default
    }))
}

fn lenient_connect_timeout<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    lenient_seconds(deserializer, DEFAULT_CONNECT_TIMEOUT_SECS)
}

fn lenient_read_timeout<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    lenient_seconds(deserializer, DEFAULT_READ_TIMEOUT_SECS)
}

impl SigningConfiguration {
    /// Template written by `config init`.
    #[must_use]
    pub fn template() -> Self {
        Self {
            cert_file: PathBuf::from("mycert.crt"),
            cert_key: PathBuf::from("mycert.key"),
            ssl_ca: Some(PathBuf::from("ais-ca-ssl.crt")),
            url: "https://ais.swisscom.com/AIS-Server/ws".to_string(),
            customer: "IAM-Test".to_string(),
            key_static: "kp1-iam-signer".to_string(),
            key_on_demand: "kp2-iam-signer".to_string(),
            timeout_connect: DEFAULT_CONNECT_TIMEOUT_SECS,
            timeout_read: DEFAULT_READ_TIMEOUT_SECS,
            digest_method: default_digest_method(),
        }
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_connect)
    }

    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_read)
    }

    /// Parsed `DIGEST_METHOD`.
    pub fn digest_algorithm(&self) -> SigningResult<HashAlgorithm> {
        self.digest_method.parse::<HashAlgorithm>().map_err(|_| {
            SigningError::ConfigurationError(format!(
                "Invalid digest method: {}",
                self.digest_method
            ))
        })
    }

    pub fn service_url(&self) -> SigningResult<ServiceUrl> {
        ServiceUrl::new(&self.url)
    }
}

/// On-disk syntax of a configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Properties,
}

impl ConfigFormat {
    /// `.properties` files use the legacy syntax, everything else is TOML.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("properties"))
        {
            ConfigFormat::Properties
        } else {
            ConfigFormat::Toml
        }
    }
}

/// Join physical lines ending in an odd number of backslashes with the
/// next one, dropping its leading whitespace. Yields (first line number, text).
fn logical_lines(content: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut current: Option<(usize, String)> = None;
    for (number, raw) in content.lines().enumerate() {
        let line = match &current {
            Some(_) => raw.trim_start(),
            None => {
                let trimmed = raw.trim_start();
                if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                    continue;
                }
                trimmed
            }
        };
        let trailing = line.len() - line.trim_end_matches('\\').len();
        let (text, continues) = if trailing % 2 == 1 {
            (&line[..line.len() - 1], true)
        } else {
            (line, false)
        };
        let entry = current.get_or_insert_with(|| (number + 1, String::new()));
        entry.1.push_str(text);
        if !continues {
            out.extend(current.take());
        }
    }
    out.extend(current);
    out
}

/// Resolve `\t`, `\n`, `\r`, `\f`, `\uXXXX` and `\<char>` escapes.
fn unescape(text: &str, line: usize) -> SigningResult<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{000C}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .and_then(char::from_u32)
                    .ok_or_else(|| {
                        SigningError::ConfigurationError(format!(
                            "Line {line}: malformed \\u escape"
                        ))
                    })?;
                out.push(decoded);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}

/// Split a logical line at the first unescaped `=`, `:` or whitespace.
fn split_entry(line: &str) -> Option<(&str, &str)> {
    let mut escaped = false;
    for (index, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => return Some((&line[..index], line[index + 1..].trim_start())),
            c if c.is_whitespace() => {
                let rest = line[index..].trim_start();
                let rest = rest
                    .strip_prefix(['=', ':'])
                    .map_or(rest, str::trim_start);
                return Some((&line[..index], rest));
            }
            _ => {}
        }
    }
    None
}

/// Parse a Java-style properties file into a TOML table of strings.
///
/// Comment lines start with `#` or `!`. Keys end at `=`, `:` or whitespace.
/// Backslash escapes and line continuations are resolved. A key without
/// any separator is rejected. Later keys override earlier ones.
pub fn parse_properties(content: &str) -> SigningResult<toml::Table> {
    let mut table = toml::Table::new();
    for (number, line) in logical_lines(content) {
        let Some((key, value)) = split_entry(&line) else {
            return Err(SigningError::ConfigurationError(format!(
                "Line {number}: expected KEY=VALUE"
            )));
        };
        let key = unescape(key, number)?;
        if key.is_empty() {
            return Err(SigningError::ConfigurationError(format!(
                "Line {number}: empty key"
            )));
        }
        let value = unescape(value.trim_end(), number)?;
        table.insert(key, toml::Value::String(value));
    }
    Ok(table)
}

/// Configuration manager for handling config files
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new configuration manager with default path
    pub fn new() -> SigningResult<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Create a configuration manager with custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Explicit path if given, else `./signpdf.properties` when present,
    /// else the per-user default.
    pub fn discover(explicit: Option<&Path>) -> SigningResult<Self> {
        if let Some(path) = explicit {
            return Ok(Self::with_path(path));
        }
        let local = PathBuf::from(LOCAL_PROPERTIES_FILE);
        if local.is_file() {
            return Ok(Self::with_path(local));
        }
        Self::new()
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> SigningResult<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Ok(config_dir.join("remote-pdf-signer").join("config.toml"))
        } else {
            Ok(PathBuf::from("remote-pdf-signer-config.toml"))
        }
    }

    /// Load configuration from file
    pub fn load(&self) -> SigningResult<SigningConfiguration> {
        log::info!("Loading configuration from: {}", self.config_path.display());

        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to read config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        let config = Self::parse(&content, ConfigFormat::from_path(&self.config_path))?;
        self.validate_config(&config)?;
        Ok(config)
    }

    /// Parse configuration text in the given syntax without validating it.
    pub fn parse(content: &str, format: ConfigFormat) -> SigningResult<SigningConfiguration> {
        match format {
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| {
                SigningError::ConfigurationError(format!("Failed to parse config file: {e}"))
            }),
            ConfigFormat::Properties => toml::Value::Table(parse_properties(content)?)
                .try_into()
                .map_err(|e| {
                    SigningError::ConfigurationError(format!(
                        "Failed to parse properties file: {e}"
                    ))
                }),
        }
    }

    /// Save configuration to file
    pub fn save(&self, config: &SigningConfiguration) -> SigningResult<()> {
        log::info!("Saving configuration to: {}", self.config_path.display());

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SigningError::ConfigurationError(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = match ConfigFormat::from_path(&self.config_path) {
            ConfigFormat::Toml => toml::to_string_pretty(config).map_err(|e| {
                SigningError::ConfigurationError(format!("Failed to serialize config: {e}"))
            })?,
            ConfigFormat::Properties => to_properties(config)?,
        };

        fs::write(&self.config_path, content).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to write config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        log::info!("Configuration saved successfully");
        Ok(())
    }

    /// Write the template unless a file already exists.
    pub fn init(&self) -> SigningResult<SigningConfiguration> {
        if self.config_path.exists() {
            return Err(SigningError::ConfigurationError(format!(
                "Configuration file already exists: {}",
                self.config_path.display()
            )));
        }
        let template = SigningConfiguration::template();
        self.save(&template)?;
        Ok(template)
    }

    /// Validate configuration values
    fn validate_config(&self, config: &SigningConfiguration) -> SigningResult<()> {
        let required = [
            ("CERT_FILE", config.cert_file.as_os_str().is_empty()),
            ("CERT_KEY", config.cert_key.as_os_str().is_empty()),
            ("CUSTOMER", config.customer.trim().is_empty()),
        ];
        for (key, missing) in required {
            if missing {
                return Err(SigningError::ConfigurationError(format!(
                    "{key} must not be empty"
                )));
            }
        }

        config.service_url()?;
        config.digest_algorithm()?;
        Ok(())
    }

    /// Get the configuration file path
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

fn to_properties(config: &SigningConfiguration) -> SigningResult<String> {
    let value = toml::Value::try_from(config).map_err(|e| {
        SigningError::ConfigurationError(format!("Failed to serialize config: {e}"))
    })?;
    let mut out = String::new();
    if let toml::Value::Table(table) = value {
        for (key, value) in table {
            let text = match value {
                toml::Value::String(s) => s,
                other => other.to_string(),
            };
            out.push_str(&format!("{key}={text}\n"));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PROPERTIES: &str = "\
# Client identity
CERT_FILE=/etc/ais/mycert.crt
CERT_KEY=/etc/ais/mycert.key
SSL_CA=/etc/ais/ais-ca-ssl.crt
URL=https://ais.swisscom.com/AIS-Server/ws
! legacy comment
CUSTOMER=IAM-Test
KEY_STATIC=kp1-iam-signer
KEY_ONDEMAND=kp2-iam-signer
TIMEOUT_CON=abc
DIGEST_METHOD=SHA512
";

    #[test]
    fn test_properties_configuration() {
        let config = ConfigManager::parse(PROPERTIES, ConfigFormat::Properties).unwrap();
        assert_eq!(config.cert_file, PathBuf::from("/etc/ais/mycert.crt"));
        assert_eq!(config.ssl_ca, Some(PathBuf::from("/etc/ais/ais-ca-ssl.crt")));
        assert_eq!(config.customer, "IAM-Test");
        assert_eq!(config.key_on_demand, "kp2-iam-signer");
        // Unparseable and missing timeouts fall back to their defaults.
        assert_eq!(config.timeout_connect, 90);
        assert_eq!(config.timeout_read, 300);
        assert_eq!(config.digest_algorithm().unwrap(), HashAlgorithm::Sha512);
    }

    #[test]
    fn test_toml_configuration_with_numeric_timeouts() {
        let content = r#"
CERT_FILE = "c.crt"
CERT_KEY = "c.key"
URL = "https://signer.example.com/ws"
CUSTOMER = "ACME"
TIMEOUT_CON = 15
TIMEOUT_READ = "60"
"#;
        let config = ConfigManager::parse(content, ConfigFormat::Toml).unwrap();
        assert_eq!(config.connect_timeout(), Duration::from_secs(15));
        assert_eq!(config.read_timeout(), Duration::from_secs(60));
        assert_eq!(config.digest_method, "SHA256");
        assert!(config.ssl_ca.is_none());
        assert!(config.key_static.is_empty());
    }

    #[test]
    fn test_missing_required_key_fails() {
        let result = ConfigManager::parse("CERT_FILE=a\n", ConfigFormat::Properties);
        assert!(matches!(result, Err(SigningError::ConfigurationError(_))));
    }

    #[test]
    fn test_malformed_properties_line() {
        assert!(parse_properties("CERT_FILE\n").is_err());
        let table = parse_properties("A = 1\nA=2\n\n").unwrap();
        assert_eq!(table.get("A").and_then(toml::Value::as_str), Some("2"));
    }

    #[test]
    fn test_properties_escapes_and_continuations() {
        let content = "DN=cn\\=Hans Muster,\\\n    o\\=ACME,c\\=CH\n\
                       MSG  Sign \\u00e9 \\:\\#1\n\
                       PATH:C\\:\\\\keys\\\\a.key\n\
                       TRAIL=x\\\\\n\
                       # DN=ignored\n";
        let table = parse_properties(content).unwrap();
        let get = |key: &str| table.get(key).and_then(toml::Value::as_str).unwrap().to_string();
        assert_eq!(get("DN"), "cn=Hans Muster,o=ACME,c=CH");
        assert_eq!(get("MSG"), "Sign \u{e9} :#1");
        assert_eq!(get("PATH"), "C:\\keys\\a.key");
        assert_eq!(get("TRAIL"), "x\\");
        assert!(parse_properties("A=\\u12\n").is_err());
    }

    #[test]
    fn test_validation_rejects_plain_http() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("signpdf.properties");
        fs::write(&path, PROPERTIES.replace("https://", "http://")).unwrap();
        let err = ConfigManager::with_path(&path).load().unwrap_err();
        assert!(matches!(err, SigningError::ConfigurationError(_)));
    }

    #[test]
    fn test_init_then_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["config.toml", "signpdf.properties"] {
            let manager = ConfigManager::with_path(temp_dir.path().join(name));
            let written = manager.init().unwrap();
            assert_eq!(manager.load().unwrap(), written);
            assert!(manager.init().is_err());
        }
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("x/signpdf.PROPERTIES")),
            ConfigFormat::Properties
        );
        assert_eq!(ConfigFormat::from_path(Path::new("config.toml")), ConfigFormat::Toml);
    }
}
