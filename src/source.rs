//! Getting an API description into memory: HTTP, files, stdin; JSON or YAML.
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(4 * 60);

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: reqwest::StatusCode },
    #[error("failed to read {origin}")]
    Read {
        origin: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid input pattern `{pattern}`")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("unreadable glob match")]
    Glob(#[from] glob::GlobError),
    #[error("glob pattern matched no files: {0}")]
    NoMatch(String),
    #[error("{origin} is not valid JSON")]
    Json {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{origin} is not valid YAML")]
    Yaml {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    Json,
    Yaml,
}

impl SpecFormat {
    /// From a `Content-Type` header value; parameters (`; charset=...`) are ignored.
    pub fn from_media_type(content_type: &str) -> Option<Self> {
        let media = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match media.as_str() {
            "application/json" | "text/json" => Some(Self::Json),
            "application/yaml" | "application/x-yaml" | "text/yaml" | "text/x-yaml" => {
                Some(Self::Yaml)
            }
            m if m.ends_with("+json") => Some(Self::Json),
            m if m.ends_with("+yaml") => Some(Self::Yaml),
            _ => None,
        }
    }

    /// From a URL or file name suffix.
    pub fn from_suffix(location: &str) -> Option<Self> {
        let location = location.split(['?', '#']).next().unwrap_or(location).to_ascii_lowercase();
        if location.ends_with(".json") {
            Some(Self::Json)
        } else if location.ends_with(".yaml") || location.ends_with(".yml") {
            Some(Self::Yaml)
        } else {
            None
        }
    }

    /// Last resort: JSON documents open with `{` or `[`.
    pub fn sniff(bytes: &[u8]) -> Self {
        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') | Some(b'[') => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Raw bytes plus whatever we learned about their format on the way in.
#[derive(Debug, Clone)]
pub struct RawSpec {
    pub origin: String,
    pub bytes: Vec<u8>,
    pub format: Option<SpecFormat>,
}

impl RawSpec {
    pub fn format(&self) -> SpecFormat {
        self.format.unwrap_or_else(|| SpecFormat::sniff(&self.bytes))
    }
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub insecure: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self { timeout: DEFAULT_FETCH_TIMEOUT, insecure: false }
    }
}

/// Declared format of a download: the media type wins, then the location's suffix.
pub fn detect(content_type: Option<&str>, location: &str) -> Option<SpecFormat> {
    content_type
        .and_then(SpecFormat::from_media_type)
        .or_else(|| SpecFormat::from_suffix(location))
}

pub fn fetch(url: &str, settings: &FetchSettings) -> Result<RawSpec, SourceError> {
    tracing::info!(%url, timeout_secs = settings.timeout.as_secs(), "fetching API description");
    if settings.insecure {
        tracing::warn!("TLS certificate verification disabled");
    }
    let client = reqwest::blocking::Client::builder()
        .timeout(settings.timeout)
        .danger_accept_invalid_certs(settings.insecure)
        .build()
        .map_err(SourceError::Client)?;

    let request_error =
        |source: reqwest::Error| SourceError::Request { url: url.to_string(), source };
    let response = client.get(url).send().map_err(request_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status { url: url.to_string(), status });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    tracing::debug!(
        content_type = content_type.as_deref().unwrap_or("<none>"),
        "response received"
    );

    let bytes = response.bytes().map_err(request_error)?.to_vec();
    let format = detect(content_type.as_deref(), url);

    Ok(RawSpec { origin: url.to_string(), bytes, format })
}

pub fn read_file(path: &Path) -> Result<RawSpec, SourceError> {
    let origin = path.display().to_string();
    tracing::info!(file = %origin, "reading API description");
    let bytes = std::fs::read(path)
        .map_err(|source| SourceError::Read { origin: origin.clone(), source })?;
    let format = detect(None, &origin);
    Ok(RawSpec { origin, bytes, format })
}

pub fn read_stdin() -> Result<RawSpec, SourceError> {
    tracing::info!("reading API description from stdin");
    let mut bytes = Vec::new();
    std::io::stdin()
        .lock()
        .read_to_end(&mut bytes)
        .map_err(|source| SourceError::Read { origin: "stdin".into(), source })?;
    Ok(RawSpec { origin: "stdin".into(), bytes, format: None })
}

pub fn parse(raw: &RawSpec) -> Result<Value, SourceError> {
    let format = raw.format();
    tracing::debug!(
        origin = %raw.origin,
        ?format,
        size = %human_size(raw.bytes.len()),
        "parsing API description"
    );
    match format {
        SpecFormat::Json => serde_json::from_slice(&raw.bytes)
            .map_err(|source| SourceError::Json { origin: raw.origin.clone(), source }),
        SpecFormat::Yaml => serde_yaml::from_slice(&raw.bytes)
            .map_err(|source| SourceError::Yaml { origin: raw.origin.clone(), source }),
    }
}

pub fn human_size(size: usize) -> String {
    if size < 1024 {
        format!("{size} B")
    } else if size < 1024 * 1024 {
        format!("{} KB", size / 1024)
    } else {
        format!("{} MB", size / (1024 * 1024))
    }
}

/// Expand literal paths and glob patterns, keeping argument order.
pub fn expand_inputs<I>(patterns: I) -> Result<Vec<PathBuf>, SourceError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let entries = glob::glob(pattern)
                .map_err(|source| SourceError::Pattern { pattern: pattern.to_string(), source })?;
            let before = out.len();
            for entry in entries {
                out.push(entry?);
            }
            if out.len() == before {
                return Err(SourceError::NoMatch(pattern.to_string()));
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
