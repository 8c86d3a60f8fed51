use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::resource::Resource;

/// An episode as listed by `episodes.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Episode {
  pub id: String,
  pub title: String,
}

impl Episode {
  /// Parse one element of the episode list. Both fields must be strings.
  pub fn from_json(value: &Value) -> Option<Self> {
    Some(Self {
      id: value.get("id")?.as_str()?.to_string(),
      title: value.get("title")?.as_str()?.to_string(),
    })
  }

  /// All episodes served under `base_url`.
  pub fn all(base_url: &str) -> Result<Resource<Vec<Episode>>> {
    let base = Url::parse(base_url).map_err(|e| eyre!("Invalid base URL {}: {}", base_url, e))?;
    let url = base
      .join("episodes.json")
      .map_err(|e| eyre!("Failed to build episodes URL: {}", e))?;

    Ok(Resource::json_elements(url, Episode::from_json))
  }
}
