use anyhow::Context;
use dotenv::dotenv;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct Config {
    pub extraction_url: String,
    pub classifier_url: String,
    #[serde(default)]
    pub extraction_api_key: Option<String>,
    #[serde(default)]
    pub classifier_api_key: Option<String>,

    pub input_path: String,
    pub categories_path: String,
    #[serde(default)]
    pub rules_path: Option<String>,
    #[serde(default = "default_resume_path")]
    pub resume_path: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_secs")]
    pub retry_base_delay_secs: u64,
    #[serde(default = "default_classifier_batch_size")]
    pub classifier_batch_size: usize,
}

impl Config {
    pub fn new() -> Result<Self, anyhow::Error> {
        dotenv().ok();

        let envs = envy::from_env::<Self>().context("invalid environment variables")?;

        return Ok(envs);
    }
}

fn default_resume_path() -> String {
    "resume.json".to_owned()
}

fn default_batch_size() -> usize {
    10
}

fn default_concurrency() -> usize {
    20
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_secs() -> u64 {
    2
}

fn default_classifier_batch_size() -> usize {
    40
}
