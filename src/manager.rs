//! View state behind the link list: the links mirrored from the backend, the
//! link being edited and the toasts waiting to be shown.

use std::sync::Arc;

use serde::Serialize;

use crate::{
    LinkForm,
    api::{ApiError, UrlApi},
    dates,
    model::{CreateUrlRequest, LinkChanges, ShortLink, UrlPatch},
    validate::{self, ValidationError},
};

const LOAD_ERROR: &str = "Error al cargar los enlaces";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Default,
    Destructive,
}

/// A toast.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: Variant,
}

impl Notification {
    pub fn info(title: &str, description: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            variant: Variant::Default,
        }
    }

    pub fn error(title: &str, description: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            variant: Variant::Destructive,
        }
    }
}

/// What a mutation did.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The backend accepted it and the local list reflects the change.
    Applied,
    /// Nothing differed from the stored record, no call was made.
    Unchanged,
    /// The form did not validate, no call was made.
    Rejected(ValidationError),
    /// The backend call failed; local state is untouched.
    Failed,
}

#[derive(Debug)]
pub struct ClipboardError {
    pub message: String,
}

impl std::fmt::Display for ClipboardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ClipboardError {}

pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// The desktop clipboard.
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    #[cfg(feature = "clipboard")]
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard = arboard::Clipboard::new().map_err(|e| ClipboardError {
            message: e.to_string(),
        })?;
        clipboard.set_text(text.to_string()).map_err(|e| ClipboardError {
            message: e.to_string(),
        })
    }

    #[cfg(not(feature = "clipboard"))]
    fn set_text(&mut self, _text: &str) -> Result<(), ClipboardError> {
        Err(ClipboardError {
            message: "built without clipboard support".to_string(),
        })
    }
}

/// Decodes each record on its own; a malformed one is logged and left out so
/// the rest of the list still shows.
fn decode_links(records: Vec<serde_json::Value>) -> Vec<ShortLink> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<ShortLink>(record) {
            Ok(link) => Some(link),
            Err(e) => {
                tracing::error!("skipping link record: {e}");
                None
            }
        })
        .collect()
}

pub struct LinkManager {
    api: Arc<dyn UrlApi>,
    links: Vec<ShortLink>,
    editing: Option<ShortLink>,
    loading: bool,
    error: Option<String>,
    notifications: Vec<Notification>,
}

impl LinkManager {
    pub fn new(api: Arc<dyn UrlApi>) -> Self {
        Self {
            api,
            links: Vec::new(),
            editing: None,
            loading: false,
            error: None,
            notifications: Vec::new(),
        }
    }

    pub fn links(&self) -> &[ShortLink] {
        &self.links
    }

    pub fn editing(&self) -> Option<&ShortLink> {
        self.editing.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn find(&self, key_or_alias: &str) -> Option<&ShortLink> {
        self.links
            .iter()
            .find(|link| link.key == key_or_alias || (!link.alias.is_empty() && link.alias == key_or_alias))
    }

    /// Drains the queued toasts.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    /// Replaces the list with the backend's. On failure the error flag is set
    /// and the previous list is kept.
    pub async fn load(&mut self) {
        self.loading = true;
        self.error = None;
        let result = match self.api.list().await {
            Ok(response) if response.is_ok() => response.json::<Vec<serde_json::Value>>().map(decode_links),
            Ok(response) => Err(ApiError::Status(response.status())),
            Err(e) => Err(e),
        };
        match result {
            Ok(links) => {
                tracing::debug!("loaded {} links", links.len());
                self.links = links;
            }
            Err(e) => {
                tracing::error!("{e}");
                self.error = Some(LOAD_ERROR.to_string());
                self.notify(Notification::error(
                    "Error",
                    "No se pudieron cargar los enlaces. Por favor, intenta de nuevo.",
                ));
            }
        }
        self.loading = false;
    }

    /// Create when the form carries no key, update otherwise.
    pub async fn submit(&mut self, form: &LinkForm) -> Outcome {
        match form.key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => {
                let key = key.to_string();
                self.update(&key, form).await
            }
            _ => self.create(form).await,
        }
    }

    pub async fn create(&mut self, form: &LinkForm) -> Outcome {
        let request = match Self::create_request(form) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!("rejected new link: {e}");
                return Outcome::Rejected(e);
            }
        };
        match self.api.create(&request).await {
            Ok(link) => {
                tracing::info!("created {}", &link);
                self.links.insert(0, link);
                self.editing = None;
                self.notify(Notification::info(
                    "Link creado",
                    "El link corto ha sido creado exitosamente.",
                ));
                Outcome::Applied
            }
            Err(e) => {
                tracing::error!("{e}");
                self.notify(Notification::error(
                    "Error",
                    "No se pudo crear el link corto. Por favor, intenta de nuevo.",
                ));
                Outcome::Failed
            }
        }
    }

    fn create_request(form: &LinkForm) -> Result<CreateUrlRequest, ValidationError> {
        let url = validate::validate_target_url(&form.url)?;
        let expires_at = validate::parse_expiration(&form.expires_at)?;
        validate::validate_expiration(expires_at, dates::now_local())?;
        let alias = form.alias.trim();
        Ok(CreateUrlRequest {
            url,
            alias: (!alias.is_empty()).then(|| alias.to_string()),
            expires_at: expires_at.as_ref().map(dates::to_iso_utc),
        })
    }

    /// Sends only the fields that changed. An unchanged form closes the edit
    /// without calling the backend.
    pub async fn update(&mut self, key: &str, form: &LinkForm) -> Outcome {
        let original = match self.links.iter().find(|link| link.key == key) {
            Some(link) => link.clone(),
            None => match self.editing.as_ref().filter(|link| link.key == key) {
                Some(link) => link.clone(),
                None => {
                    tracing::error!("no link with key {key} to update");
                    self.notify(Notification::error(
                        "Error",
                        "No se pudo actualizar el link corto. Por favor, intenta de nuevo.",
                    ));
                    return Outcome::Failed;
                }
            },
        };

        let patch = match Self::patch(&original, form) {
            Ok(patch) => patch,
            Err(e) => {
                tracing::debug!("rejected edit of {key}: {e}");
                return Outcome::Rejected(e);
            }
        };
        if patch.is_empty() {
            tracing::debug!("nothing changed for {key}");
            self.editing = None;
            return Outcome::Unchanged;
        }

        match self.api.update(key, &patch).await {
            Ok(updated) => {
                tracing::info!("updated {}", &updated);
                for link in self.links.iter_mut().filter(|link| link.key == key) {
                    *link = updated.clone();
                }
                self.editing = None;
                self.notify(Notification::info(
                    "Link actualizado",
                    "El link ha sido actualizado exitosamente.",
                ));
                Outcome::Applied
            }
            Err(e) => {
                tracing::error!("{e}");
                self.notify(Notification::error(
                    "Error",
                    "No se pudo actualizar el link corto. Por favor, intenta de nuevo.",
                ));
                Outcome::Failed
            }
        }
    }

    fn patch(original: &ShortLink, form: &LinkForm) -> Result<UrlPatch, ValidationError> {
        let changes = LinkChanges {
            url: form.url.trim().to_string(),
            alias: form.alias.trim().to_string(),
            expires_at: validate::parse_expiration(&form.expires_at)?,
        };
        let mut patch = UrlPatch::diff(original, &changes);
        if let Some(url) = patch.url.as_mut() {
            *url = validate::validate_target_url(url)?;
        }
        if let Some(expires_at) = patch.expires_at.as_ref().and(changes.expires_at) {
            validate::validate_expiration(Some(expires_at), dates::now_local())?;
        }
        Ok(patch)
    }

    /// Removes the link once the backend acknowledges the delete.
    pub async fn delete(&mut self, key: &str) -> Outcome {
        let result = match self.api.delete(key).await {
            Ok(response) if response.is_ok() => Ok(()),
            Ok(response) => Err(ApiError::Status(response.status())),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                tracing::info!("deleted {key}");
                self.links.retain(|link| link.key != key);
                if self.editing.as_ref().is_some_and(|link| link.key == key) {
                    self.editing = None;
                }
                self.notify(Notification::info(
                    "Link eliminado",
                    "El link ha sido eliminado exitosamente.",
                ));
                Outcome::Applied
            }
            Err(e) => {
                tracing::error!("{e}");
                self.notify(Notification::error(
                    "Error",
                    "No se pudo eliminar el link. Por favor, intenta de nuevo.",
                ));
                Outcome::Failed
            }
        }
    }

    /// Opens the edit form for `key`. Returns false when no such link is listed.
    pub fn begin_edit(&mut self, key: &str) -> bool {
        self.editing = self.links.iter().find(|link| link.key == key).cloned();
        self.editing.is_some()
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    pub fn copy_to_clipboard(&mut self, clipboard: &mut dyn Clipboard, text: &str) {
        if let Err(e) = clipboard.set_text(text) {
            tracing::error!("{e}");
        }
        self.notify(Notification::info("Copiado", "El link ha sido copiado al portapapeles."));
    }
}
