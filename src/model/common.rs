use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

pub type Id = String;

/// Input variables for a single query execution, keyed by the slugs declared
/// in the query's input schema. BTreeMap keeps iteration (and therefore cache
/// key generation) deterministic.
pub type InputVariables = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl RequestMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
            RequestMethod::Put => "PUT",
            RequestMethod::Patch => "PATCH",
            RequestMethod::Delete => "DELETE",
            RequestMethod::Head => "HEAD",
        }
    }

    pub fn is_get(&self) -> bool {
        matches!(self, RequestMethod::Get)
    }
}

impl std::fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn generate_uuid() -> Id {
    Uuid::new_v4().to_string()
}

pub fn is_uuid(value: &str) -> bool {
    Uuid::parse_str(value).is_ok()
}
