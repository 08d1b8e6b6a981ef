use serde::Deserialize;
use std::env;
use std::path::PathBuf;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.trim().parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

/// Split a comma-separated env value, trimming entries and dropping blanks.
fn parse_env_list(var: &str) -> Vec<String> {
    env::var(var)
        .map(|val| split_list(&val))
        .unwrap_or_default()
}

pub(crate) fn split_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Default upper bound for a decoded image: 10 MiB.
pub const DEFAULT_MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub limits: LimitsConfig,
    pub fetch: FetchConfig,
    pub ocr: OcrConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `*` or a comma-separated list of origins.
    pub allowed_origins: String,
    /// Root directory for the `img_path` request variant. Disabled when unset.
    pub image_root: Option<PathBuf>,
}

/// Shared secrets accepted by `/ocr`. Empty means the endpoint is open.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    pub secret_keys: Vec<String>,
}

impl AuthConfig {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            secret_keys: keys
                .into_iter()
                .map(Into::into)
                .filter(|k: &String| !k.is_empty())
                .collect(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.secret_keys.is_empty()
    }

    pub fn accepts(&self, candidate: &str) -> bool {
        self.secret_keys.iter().any(|k| k == candidate)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    pub max_image_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
        }
    }
}

impl LimitsConfig {
    /// Largest request body worth reading: a base64 image at the size limit
    /// plus room for the JSON envelope around it.
    pub fn max_body_size(&self) -> usize {
        self.max_image_size.div_ceil(3) * 4 + 64 * 1024
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: format!("ocrgate/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    /// Backend selection, e.g. `local/tesseract` or `remote/paddleocr`.
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Language codes to build engines for at startup.
    pub languages: Vec<String>,
    pub default_language: String,
    pub timeout_secs: u64,
    pub tessdata_path: Option<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            model: "local/tesseract".to_string(),
            api_key: None,
            base_url: None,
            languages: vec!["ch".to_string(), "en".to_string()],
            default_language: "ch".to_string(),
            timeout_secs: 60,
            tessdata_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        let ocr_defaults = OcrConfig::default();
        let languages = parse_env_list("OCR_LANGUAGES");

        Self {
            server: ServerConfig {
                host: env::var("OCRGATE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("OCRGATE_PORT", 25098),
                allowed_origins: env::var("ALLOWED_ORIGINS")
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(|| "*".to_string()),
                image_root: env::var("IMAGE_ROOT")
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .map(PathBuf::from),
            },
            auth: AuthConfig::new(parse_env_list("SECRET_KEY")),
            limits: LimitsConfig {
                max_image_size: parse_env_or("MAX_IMAGE_SIZE", DEFAULT_MAX_IMAGE_SIZE),
            },
            fetch: FetchConfig {
                timeout_secs: parse_env_or("FETCH_TIMEOUT", 10),
                ..FetchConfig::default()
            },
            ocr: OcrConfig {
                model: env::var("OCR_MODEL").unwrap_or(ocr_defaults.model),
                api_key: env::var("OCR_API_KEY").ok(),
                base_url: env::var("OCR_BASE_URL").ok(),
                languages: if languages.is_empty() {
                    ocr_defaults.languages
                } else {
                    languages
                },
                default_language: env::var("OCR_DEFAULT_LANGUAGE")
                    .unwrap_or(ocr_defaults.default_language),
                timeout_secs: parse_env_or("OCR_TIMEOUT", ocr_defaults.timeout_secs),
                tessdata_path: env::var("TESSDATA_PATH").ok(),
            },
            logging: LoggingConfig {
                format: parse_env_or("LOG_FORMAT", LogFormat::Pretty),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}

/// Known OCR backends selectable through `OCR_MODEL`.
const KNOWN_BACKENDS: &[&str] = &["local", "remote"];

/// Parse an OCR model name into (backend, model) tuple.
pub fn parse_backend_model(model: &str) -> (&str, &str) {
    if let Some((prefix, rest)) = model.split_once('/') {
        let prefix_lower = prefix.to_lowercase();
        if KNOWN_BACKENDS.contains(&prefix_lower.as_str()) {
            return (prefix, rest);
        }
    }
    ("local", model)
}
