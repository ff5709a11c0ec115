use url::Url;

use crate::model::ShortLink;

/// Builds the public short link for a key or alias from the configured base,
/// e.g. `https://tinyurl.example.com/` + `docs`.
#[derive(Clone, Debug)]
pub struct ShortLinkBuilder {
    base: String, // always ends with '/'
    without_protocol: String,
}

impl ShortLinkBuilder {
    pub fn new(public_base: &Url) -> Self {
        let mut base = public_base.as_str().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let without_protocol = match base.split_once("://") {
            Some((_, rest)) => rest.to_string(),
            None => base.clone(),
        };
        Self { base, without_protocol }
    }

    pub fn short_url(&self, key_or_alias: &str) -> String {
        format!("{}{}", self.base, urlencoding::encode(key_or_alias))
    }

    pub fn short_url_without_protocol(&self, key_or_alias: &str) -> String {
        format!("{}{}", self.without_protocol, urlencoding::encode(key_or_alias))
    }

    pub fn for_link(&self, link: &ShortLink) -> String {
        self.short_url(link.public_segment())
    }

    /// Prefix shown next to the alias input.
    pub fn prefix(&self) -> &str {
        &self.base
    }
}
