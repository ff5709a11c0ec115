//! Command-line access to the same link manager the web pages use.

use std::sync::Arc;

use clap::Subcommand;

use crate::{
    LinkForm,
    api::UrlApi,
    dates,
    links::ShortLinkBuilder,
    manager::{LinkManager, Outcome, SystemClipboard, Variant},
    redirect::{Navigator, RedirectState, RedirectView},
};

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List every link
    List,
    /// Shorten a URL
    Create {
        url: String,
        #[arg(long)]
        alias: Option<String>,
        /// YYYY-MM-DD or YYYY-MM-DDTHH:MM, local time
        #[arg(long)]
        expires_at: Option<String>,
    },
    /// Change a link; only the given fields are sent
    Edit {
        key: String,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        alias: Option<String>,
        #[arg(long, conflicts_with = "clear_expiry")]
        expires_at: Option<String>,
        #[arg(long)]
        clear_expiry: bool,
    },
    /// Delete a link by key
    Delete { key: String },
    /// Copy a link's public short URL to the clipboard
    Copy { key_or_alias: String },
    /// Resolve a key or alias and print its destination
    Open { key_or_alias: String },
}

#[derive(Debug)]
pub struct CliError {
    pub message: String,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl CliError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn navigate(&mut self, url: &str) {
        println!("{}", url);
    }
}

fn print_notifications(manager: &mut LinkManager) {
    for notification in manager.take_notifications() {
        match notification.variant {
            Variant::Default => eprintln!("{}: {}", notification.title, notification.description),
            Variant::Destructive => eprintln!("[{}] {}", notification.title, notification.description),
        }
    }
}

fn outcome_result(outcome: Outcome) -> Result<(), CliError> {
    match outcome {
        Outcome::Applied => Ok(()),
        Outcome::Unchanged => {
            eprintln!("Sin cambios.");
            Ok(())
        }
        Outcome::Rejected(e) => Err(CliError::new(e.message())),
        Outcome::Failed => Err(CliError::new("la operación falló")),
    }
}

async fn loaded(api: Arc<dyn UrlApi>) -> Result<LinkManager, CliError> {
    let mut manager = LinkManager::new(api);
    manager.load().await;
    if let Some(error) = manager.error() {
        let message = error.to_string();
        print_notifications(&mut manager);
        return Err(CliError::new(message));
    }
    Ok(manager)
}

/// Form values for editing `key`, starting from the stored record.
fn edit_form(
    manager: &LinkManager,
    key: &str,
    url: Option<String>,
    alias: Option<String>,
    expires_at: Option<String>,
    clear_expiry: bool,
) -> Result<LinkForm, CliError> {
    let original = manager
        .links()
        .iter()
        .find(|link| link.key == key)
        .ok_or_else(|| CliError::new(format!("no existe un link con clave {}", key)))?;
    let stored_expiry = original
        .expires_at
        .as_ref()
        .map(|d| dates::to_input_value(&d.0))
        .unwrap_or_default();
    Ok(LinkForm {
        key: Some(original.key.clone()),
        url: url.unwrap_or_else(|| original.url.clone()),
        alias: alias.unwrap_or_else(|| original.alias.clone()),
        expires_at: match (clear_expiry, expires_at) {
            (true, _) => String::new(),
            (false, Some(value)) => value,
            (false, None) => stored_expiry,
        },
        xsrf: String::new(),
    })
}

pub async fn run(command: Command, api: Arc<dyn UrlApi>, links: &ShortLinkBuilder) -> Result<(), CliError> {
    tracing::debug!("{:?}", &command);
    match command {
        Command::List => {
            let mut manager = loaded(api).await?;
            if manager.links().is_empty() {
                println!("No hay links creados aún. ¡Crea uno nuevo!");
            }
            for link in manager.links() {
                println!("{}  {}", links.for_link(link), link);
            }
            print_notifications(&mut manager);
            Ok(())
        }
        Command::Create { url, alias, expires_at } => {
            let mut manager = LinkManager::new(api);
            let form = LinkForm {
                key: None,
                url,
                alias: alias.unwrap_or_default(),
                expires_at: expires_at.unwrap_or_default(),
                xsrf: String::new(),
            };
            let outcome = manager.create(&form).await;
            if let Some(link) = manager.links().first() {
                println!("{}", links.for_link(link));
            }
            print_notifications(&mut manager);
            outcome_result(outcome)
        }
        Command::Edit {
            key,
            url,
            alias,
            expires_at,
            clear_expiry,
        } => {
            let mut manager = loaded(api).await?;
            let form = edit_form(&manager, &key, url, alias, expires_at, clear_expiry)?;
            let outcome = manager.submit(&form).await;
            if outcome == Outcome::Applied
                && let Some(link) = manager.links().iter().find(|link| link.key == key)
            {
                println!("{}  {}", links.for_link(link), link);
            }
            print_notifications(&mut manager);
            outcome_result(outcome)
        }
        Command::Delete { key } => {
            let mut manager = LinkManager::new(api);
            let outcome = manager.delete(&key).await;
            print_notifications(&mut manager);
            outcome_result(outcome)
        }
        Command::Copy { key_or_alias } => {
            let mut manager = loaded(api).await?;
            let short_url = manager
                .find(&key_or_alias)
                .map(|link| links.for_link(link))
                .ok_or_else(|| CliError::new(format!("no existe el link {}", key_or_alias)))?;
            manager.copy_to_clipboard(&mut SystemClipboard, &short_url);
            println!("{}", short_url);
            print_notifications(&mut manager);
            Ok(())
        }
        Command::Open { key_or_alias } => {
            let (mut view, _guard) = RedirectView::mount(&key_or_alias);
            match view.resolve(api.as_ref(), &mut PrintNavigator).await {
                RedirectState::Failed(e) => Err(CliError::new(e.message())),
                _ => Ok(()),
            }
        }
    }
}
