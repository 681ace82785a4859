use clap::Parser;
use imagegen_core::task::{GenerationParams, OPTION_IMAGE};

/// Submit image-generation jobs and follow them until they finish.
#[derive(Parser, Debug)]
#[command(name = "imagegen", version)]
pub struct Cli {
    /// Remote model identifier.
    #[arg(short, long, env = "IMAGEGEN_MODEL")]
    pub model: String,

    /// Prompts to submit; each one becomes a separate job.
    pub prompts: Vec<String>,

    /// Model-specific option as `key=value`. Values that parse as JSON are
    /// sent as JSON, anything else as a string.
    #[arg(short = 'o', long = "option", value_parser = parse_option)]
    pub options: Vec<(String, serde_json::Value)>,

    /// Reference image URL, for models that take one instead of a prompt.
    #[arg(long)]
    pub image: Option<String>,

    /// Display name shown for the model.
    #[arg(long)]
    pub label: Option<String>,

    /// Submit prompts as written, without translation.
    #[arg(long)]
    pub no_translate: bool,

    /// Print events and results as JSON lines.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// One parameter set per prompt, or a single prompt-less one.
    pub fn requests(&self) -> Vec<GenerationParams> {
        let base = self
            .options
            .iter()
            .fold(GenerationParams::new(&self.model), |params, (key, value)| {
                params.with_option(key.clone(), value.clone())
            });
        let base = match &self.image {
            Some(url) => base.with_option(OPTION_IMAGE, serde_json::Value::String(url.clone())),
            None => base,
        };

        if self.prompts.is_empty() {
            return vec![base];
        }
        self.prompts
            .iter()
            .map(|prompt| base.clone().with_prompt(prompt.clone()))
            .collect()
    }
}

fn parse_option(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("option key must not be empty in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
