use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to render JSON")]
    Json(#[from] serde_json::Error),
    #[error("failed to render YAML")]
    Yaml(#[from] serde_yaml::Error),
}

pub fn render(value: &Value, format: OutputFormat) -> Result<String, RenderError> {
    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    Ok(text)
}
