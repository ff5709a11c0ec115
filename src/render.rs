use std::{convert::Infallible, sync::Arc};

use csrf::{AesGcmCsrfProtection, CsrfProtection};
use handlebars::Handlebars;
use rand::Rng;
use serde::Serialize;
use tokio::sync::Mutex;
use url::Url;
use warp::http::{HeaderValue, StatusCode, Uri};

use crate::{
    LinkForm, XsrfForm,
    api::UrlApi,
    dates,
    links::ShortLinkBuilder,
    manager::{LinkManager, Outcome},
    model::ShortLink,
    redirect::{Navigator, RedirectError, RedirectState, RedirectView},
};

const PARENT_PARTIAL: &str = "base";
pub const TEMPLATES: [&str; 3] = ["base", "home", "redirect"];

#[derive(Debug)]
pub struct SetupError {
    pub message: String,
}

impl std::fmt::Display for SetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SetupError {}

/// One entry of the link list as the templates see it.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkCard {
    pub key: String,
    pub short_url: String,
    pub short_display: String,
    pub url: String,
    pub hit: i64,
    pub created: String,
    pub expires: Option<String>,
}

impl LinkCard {
    pub fn new(link: &ShortLink, links: &ShortLinkBuilder) -> Self {
        Self {
            key: link.key.clone(),
            short_url: links.for_link(link),
            short_display: links.short_url_without_protocol(link.public_segment()),
            url: link.url.clone(),
            hit: link.hit,
            created: dates::format_date(&link.created_at.0),
            expires: link.expires_at.as_ref().map(|d| dates::format_date(&d.0)),
        }
    }
}

/// Values shown in the create/edit form.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct FormView {
    key: String,
    url: String,
    alias: String,
    expires_at: String,
    editing: bool,
}

impl FormView {
    fn from_link(link: &ShortLink) -> Self {
        Self {
            key: link.key.clone(),
            url: link.url.clone(),
            alias: link.alias.clone(),
            expires_at: link
                .expires_at
                .as_ref()
                .map(|d| dates::to_input_value(&d.0))
                .unwrap_or_default(),
            editing: true,
        }
    }

    fn from_form(form: &LinkForm) -> Self {
        let key = form.key.clone().unwrap_or_default();
        Self {
            editing: !key.trim().is_empty(),
            key,
            url: form.url.clone(),
            alias: form.alias.clone(),
            expires_at: form.expires_at.clone(),
        }
    }
}

/// Captures the destination of a resolved link for the 307 answer.
#[derive(Debug, Default)]
struct Location {
    target: Option<String>,
}

impl Navigator for Location {
    fn navigate(&mut self, url: &str) {
        self.target = Some(url.to_string());
    }
}

/// The `Location` value for a destination. Parseable URLs are sent in their
/// percent-encoded form with the fragment kept; anything else is sent as is
/// when it is a legal header value.
fn redirect_location(target: &str) -> Option<String> {
    let location = match Url::parse(target) {
        Ok(url) => String::from(url),
        Err(_) => target.to_string(),
    };
    HeaderValue::from_str(&location).ok().map(|_| location)
}

#[derive(Clone)]
pub struct Renderer {
    links: ShortLinkBuilder,
    csrf_token: csrf::CsrfToken,
    api: Arc<dyn UrlApi>,
    manager: Arc<Mutex<LinkManager>>,
    handlebars: Arc<Handlebars<'static>>,
}

fn redirect_home() -> Result<Box<dyn warp::Reply>, Infallible> {
    Ok(Box::new(warp::reply::with_header(
        warp::redirect::see_other(Uri::from_static("/")),
        "Cache-Control",
        "no-cache",
    )))
}

impl Renderer {
    /// Registers `base`, `home` and `redirect` from `templates_dir`.
    pub fn load_templates(templates_dir: &str) -> Result<Handlebars<'static>, SetupError> {
        let mut handlebars = Handlebars::new();
        for name in TEMPLATES {
            handlebars
                .register_template_file(name, format!("{}/{}.hbs", templates_dir, name))
                .map_err(|e| SetupError {
                    message: format!("template {}: {}", name, e),
                })?;
        }
        Ok(handlebars)
    }

    pub fn new(
        links: ShortLinkBuilder,
        api: Arc<dyn UrlApi>,
        handlebars: Handlebars<'static>,
    ) -> Result<Self, SetupError> {
        let mut secret_key = [0u8; 32];
        rand::rng().fill_bytes(&mut secret_key);
        let protect = AesGcmCsrfProtection::from_key(secret_key);

        let mut nonce = [0u8; 64];
        rand::rng().fill_bytes(&mut nonce);
        let csrf_token = protect.generate_token(&nonce).map_err(|e| SetupError {
            message: format!("csrf token: {:?}", e),
        })?;

        Ok(Self {
            links,
            csrf_token,
            manager: Arc::new(Mutex::new(LinkManager::new(Arc::clone(&api)))),
            api,
            handlebars: Arc::new(handlebars),
        })
    }

    pub fn xsrf(&self) -> String {
        self.csrf_token.b64_string()
    }

    fn html(&self, template: &str, context: &serde_json::Value, status: StatusCode) -> Result<Box<dyn warp::Reply>, Infallible> {
        match self.handlebars.render(template, context) {
            Ok(body) => Ok(Box::new(warp::reply::with_status(warp::reply::html(body), status))),
            Err(e) => {
                tracing::error!("{e}");
                Ok(Box::new(warp::reply::with_status(
                    warp::reply::html(String::from("Internal Server Error")),
                    StatusCode::INTERNAL_SERVER_ERROR,
                )))
            }
        }
    }

    fn home_page(
        &self,
        manager: &mut LinkManager,
        form: FormView,
        form_error: Option<&str>,
        status: StatusCode,
    ) -> Result<Box<dyn warp::Reply>, Infallible> {
        let cards: Vec<LinkCard> = manager
            .links()
            .iter()
            .map(|link| LinkCard::new(link, &self.links))
            .collect();
        let dialog_open = form.editing || form_error.is_some();
        let context = serde_json::json!({
            "parent": PARENT_PARTIAL,
            "prefix": self.links.prefix(),
            "links": cards,
            "loading": manager.is_loading(),
            "error": manager.error(),
            "form": form,
            "formError": form_error,
            "dialogOpen": dialog_open,
            "notifications": manager.take_notifications(),
            "XSRF": self.xsrf(),
        });
        self.html("home", &context, status)
    }

    /// A fresh page view: the list is fetched again and any open edit is closed.
    pub async fn home(&self) -> Result<Box<dyn warp::Reply>, Infallible> {
        let mut manager = self.manager.lock().await;
        manager.cancel_edit();
        manager.load().await;
        self.home_page(&mut manager, FormView::default(), None, StatusCode::OK)
    }

    pub async fn edit(&self, key: &str) -> Result<Box<dyn warp::Reply>, Infallible> {
        let mut manager = self.manager.lock().await;
        if !manager.begin_edit(key) {
            manager.load().await;
            if !manager.begin_edit(key) {
                tracing::debug!("no link {key} to edit");
                // toasts from the reload belong to this request only
                manager.take_notifications();
                return redirect_home();
            }
        }
        let form = manager.editing().map(FormView::from_link).unwrap_or_default();
        self.home_page(&mut manager, form, None, StatusCode::OK)
    }

    pub async fn cancel(&self) -> Result<Box<dyn warp::Reply>, Infallible> {
        self.manager.lock().await.cancel_edit();
        redirect_home()
    }

    pub async fn submit(&self, form: LinkForm) -> Result<Box<dyn warp::Reply>, Infallible> {
        if form.xsrf != self.xsrf() {
            tracing::debug!("xsrf mismatch on submit");
            return redirect_home();
        }

        let mut manager = self.manager.lock().await;
        match manager.submit(&form).await {
            Outcome::Rejected(e) => self.home_page(
                &mut manager,
                FormView::from_form(&form),
                Some(e.message()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            Outcome::Applied | Outcome::Unchanged | Outcome::Failed => {
                manager.cancel_edit();
                self.home_page(&mut manager, FormView::default(), None, StatusCode::OK)
            }
        }
    }

    pub async fn delete(&self, key: &str, form: XsrfForm) -> Result<Box<dyn warp::Reply>, Infallible> {
        if form.xsrf != self.xsrf() {
            tracing::debug!("xsrf mismatch on delete");
            return redirect_home();
        }

        let mut manager = self.manager.lock().await;
        manager.delete(key).await;
        self.home_page(&mut manager, FormView::default(), None, StatusCode::OK)
    }

    /// Visiting a short link: 307 to the destination, or an error page.
    pub async fn redirect(&self, key_or_alias: &str) -> Result<Box<dyn warp::Reply>, Infallible> {
        let (mut view, _guard) = RedirectView::mount(key_or_alias);
        let mut location = Location::default();
        let state = view.resolve(self.api.as_ref(), &mut location).await.clone();

        let error = match (state, location.target) {
            (RedirectState::Navigated(_), Some(target)) => match redirect_location(&target) {
                Some(location) => {
                    tracing::info!("{} -> {}", key_or_alias, &location);
                    return Ok(Box::new(warp::reply::with_header(
                        warp::reply::with_header(
                            warp::reply::with_status(warp::reply(), StatusCode::TEMPORARY_REDIRECT),
                            "Location",
                            location,
                        ),
                        "Cache-Control",
                        "no-cache",
                    )));
                }
                None => {
                    tracing::error!("destination of {key_or_alias} is not a valid location: {target:?}");
                    RedirectError::Other
                }
            },
            (RedirectState::Failed(e), _) => e,
            (state, _) => {
                tracing::error!("unexpected redirect state for {key_or_alias}: {:?}", state);
                RedirectError::Other
            }
        };

        let status = match error {
            RedirectError::Expired => StatusCode::GONE,
            RedirectError::NotFound => StatusCode::NOT_FOUND,
            RedirectError::Other => StatusCode::BAD_GATEWAY,
        };
        let context = serde_json::json!({
            "parent": PARENT_PARTIAL,
            "keyOrAlias": key_or_alias,
            "message": error.message(),
            "notifications": [{
                "title": "Error de redirección",
                "description": error.message(),
                "variant": "destructive",
            }],
        });
        self.html("redirect", &context, status)
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::model::BackendDate;

    fn links() -> ShortLinkBuilder {
        ShortLinkBuilder::new(&Url::parse("https://tiny.example").unwrap())
    }

    fn link(alias: &str, expires_at: Option<&[i64]>) -> ShortLink {
        ShortLink {
            key: "k1".to_string(),
            url: "https://example.com/very/long".to_string(),
            alias: alias.to_string(),
            hit: 7,
            created_at: BackendDate::from_parts(&[2024, 1, 15, 10, 30]).unwrap(),
            expires_at: expires_at.map(|parts| BackendDate::from_parts(parts).unwrap()),
        }
    }

    #[test]
    fn test_card_uses_key_without_alias() {
        let card = LinkCard::new(&link("", None), &links());
        assert_eq!(card.short_url, "https://tiny.example/k1");
        assert_eq!(card.short_display, "tiny.example/k1");
        assert_eq!(card.created, "Jan 15, 2024, 10:30:00 AM");
        assert!(card.expires.is_none());
    }

    #[test]
    fn test_card_prefers_alias() {
        let card = LinkCard::new(&link("docs", Some(&[2030, 2, 1])), &links());
        assert_eq!(card.short_url, "https://tiny.example/docs");
        assert_eq!(card.expires.as_deref(), Some("Feb 1, 2030, 12:00:00 AM"));
    }

    #[test]
    fn test_form_view_from_link() {
        let view = FormView::from_link(&link("docs", Some(&[2030, 2, 1, 9, 15])));
        assert!(view.editing);
        assert_eq!(view.key, "k1");
        assert_eq!(view.expires_at, "2030-02-01T09:15:00");
    }

    #[test]
    fn test_redirect_location() {
        assert_eq!(
            redirect_location("https://example.com/docs#install").as_deref(),
            Some("https://example.com/docs#install")
        );
        assert_eq!(
            redirect_location("https://example.com/a b?q=x y").as_deref(),
            Some("https://example.com/a%20b?q=x%20y")
        );
        assert_eq!(redirect_location("/relative/path").as_deref(), Some("/relative/path"));
        assert_eq!(redirect_location("bad\nvalue"), None);
    }

    #[test]
    fn test_form_view_from_new_form() {
        let view = FormView::from_form(&LinkForm {
            key: Some(String::new()),
            url: "bad".to_string(),
            ..LinkForm::default()
        });
        assert!(!view.editing);
        assert_eq!(view.url, "bad");
    }
}
