use crate::labeler::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use std::fs;

/// The size of the Messier catalogue.
pub const DEFAULT_NUM_ITEMS: u32 = 110;
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelerConfig {
    #[serde(rename = "dataFile")]
    pub data_file: Option<String>,
    #[serde(rename = "storeFile")]
    pub store_file: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    #[serde(rename = "launchDate")]
    pub launch_date: Option<String>,
    #[serde(rename = "numItems")]
    pub num_items: Option<u32>,
    #[serde(rename = "topK")]
    pub top_k: Option<usize>,
    #[serde(rename = "outputFile")]
    pub output_file: Option<String>,
}

/// Reads the configuration file. Relative paths are resolved against the
/// directory of the file.
pub fn read_config(path: &str) -> LabelerResult<LabelerConfig> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let mut config: LabelerConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    let root = Path::new(path).parent().unwrap_or_else(|| Path::new("."));
    config.data_file = config.data_file.map(|p| resolve_path(root, &p));
    config.store_file = config.store_file.map(|p| resolve_path(root, &p));
    config.output_file = config.output_file.map(|p| resolve_path(root, &p));
    info!("config: {:?}", config);
    Ok(config)
}

pub fn read_reference(path: &str) -> LabelerResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    debug!("read_reference: {:?}", js);
    Ok(js)
}
