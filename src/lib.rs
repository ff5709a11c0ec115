use serde::{Deserialize, Serialize};

pub mod api;
pub mod cli;
pub mod dates;
pub mod links;
pub mod manager;
pub mod memory;
pub mod model;
pub mod redirect;
pub mod render;
pub mod routes;
pub mod validate;

/// The create/edit form as posted by the browser. A non-empty `key` turns the
/// submission into an update of that link.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct LinkForm {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default, rename = "expiresAt")]
    pub expires_at: String, // datetime-local value, blank for none
    #[serde(default, rename = "XSRF")]
    pub xsrf: String,
}

/// Forms that only carry the XSRF token, like delete.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct XsrfForm {
    #[serde(default, rename = "XSRF")]
    pub xsrf: String,
}
