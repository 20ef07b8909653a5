//! CLI module for the merlion application
//!
//! This module turns parsed commands into calls on the library: stores are
//! opened from the user config, and results are printed to stdout.
use std::{path::PathBuf, sync::Arc};

use dialoguer::{theme::ColorfulTheme, Input, Password};
use log::{debug, info, warn};

use crate::{
    export_notes, load_stores, Commands, CredentialStore, Credentials, ExportSummary, FileStore,
    MerlionError, Note, NoteStore, RemoteStore, Result, SqlStore, StoreKind, StoreManager,
    UserConfig, VaultDescriptor, REMOTE_STORE_NAME, SQL_STORE_NAME,
};

/// CLI Application handler - processes CLI commands against the configured stores
pub struct App {
    /// User configuration, including the vault list
    config: UserConfig,

    /// Where `config` was loaded from
    config_path: PathBuf,

    /// Saved cloud credentials
    credentials: Arc<CredentialStore>,

    /// Address of the note service
    base_url: String,

    /// Whether to display verbose output
    verbose: bool,
}

impl App {
    pub fn new(
        config: UserConfig,
        config_path: PathBuf,
        credentials: Arc<CredentialStore>,
        base_url: String,
        verbose: bool,
    ) -> Self {
        Self {
            config,
            config_path,
            credentials,
            base_url,
            verbose,
        }
    }

    /// Run the CLI application with the given command
    pub async fn run(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::List { vault, tag, format } => self.list_notes(vault, tag, &format).await,
            Commands::Show { id, vault, json } => self.show_note(&id, vault, json).await,
            Commands::Export {
                from,
                from_path,
                to,
                to_path,
            } => self.export(from, from_path, to, to_path).await,
            Commands::Vault {
                provider,
                path,
                name,
                email,
            } => {
                let credentials = match provider {
                    StoreKind::Remote => Some(prompt_credentials(email)?),
                    _ => None,
                };
                self.add_vault(provider, path, name, credentials).await
            }
            Commands::Logout => self.logout(),
            Commands::Vaults => {
                self.print_vaults();
                Ok(())
            }
        }
    }

    /// Builds a manager from the config and activates the `vault`-th store.
    async fn open_manager(&self, vault: Option<usize>) -> Result<StoreManager> {
        let stores = load_stores(&self.config, self.credentials.clone(), &self.base_url)?;
        let count = stores.len();
        let mut manager = StoreManager::new(stores)?;

        let index = vault.unwrap_or(0);
        if index >= count {
            return Err(MerlionError::ConfigError {
                message: format!("vault {} does not exist, {} configured", index, count),
            });
        }
        for _ in 0..index {
            manager.next_store();
        }
        manager.list().await?;
        debug!("Using vault {}", manager.active_name());
        Ok(manager)
    }

    async fn list_notes(&self, vault: Option<usize>, tag: Option<String>, format: &str) -> Result<()> {
        let manager = self.open_manager(vault).await?;
        let wanted = tag.map(|t| t.trim().to_lowercase());
        let mut notes: Vec<&Note> = manager
            .notes()
            .iter()
            .filter(|n| match &wanted {
                Some(tag) => n.tags.iter().any(|t| t.to_lowercase() == *tag),
                None => true,
            })
            .collect();
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        if notes.is_empty() {
            println!("No notes found in {}.", manager.active_name());
            return Ok(());
        }

        match format {
            "json" => println!("{}", serde_json::to_string_pretty(&notes)?),
            _ => self.display_notes_text(&notes),
        }
        println!(
            "\nFound {} note{} in {}",
            notes.len(),
            if notes.len() == 1 { "" } else { "s" },
            manager.active_name()
        );
        Ok(())
    }

    async fn show_note(&self, id: &str, vault: Option<usize>, json: bool) -> Result<()> {
        let mut manager = self.open_manager(vault).await?;
        if manager.search_by_id(id).is_none() {
            return Err(MerlionError::NoteNotFound { id: id.to_string() });
        }
        let note = manager.get_full(id).await?;

        if json {
            println!("{}", serde_json::to_string_pretty(&note)?);
        } else {
            self.display_notes_text(&[&note]);
            println!("\n{}", note.content.as_deref().unwrap_or_default());
        }
        Ok(())
    }

    /// Display notes in text format
    fn display_notes_text(&self, notes: &[&Note]) {
        // Use terminal width for formatting if available
        let term_width = terminal_size::terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(80);

        for (i, note) in notes.iter().enumerate() {
            if i > 0 {
                println!("{}", "-".repeat(term_width.min(50)));
            }

            let updated_at = note.updated_at.format("%Y-%m-%d %H:%M");
            let marker = if note.is_favorite { " *" } else { "" };
            println!("ID: {} | Updated: {}", note.note_id, updated_at);
            println!("Title: {}{}", console::style(&note.title).bold(), marker);

            if !note.tags.is_empty() {
                let tags = note
                    .tags
                    .iter()
                    .map(|tag| format!("#{}", tag))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("Tags: {}", console::style(tags).cyan());
            }
            if self.verbose {
                println!(
                    "Created: {} | Work log: {}",
                    note.created_at.to_rfc3339(),
                    note.is_work_log
                );
            }
        }
    }

    fn open_store(&self, kind: StoreKind, path: Option<String>) -> Result<Box<dyn NoteStore>> {
        let store: Box<dyn NoteStore> = match kind {
            StoreKind::Sql => match path {
                Some(path) => Box::new(SqlStore::open(&crate::expand_home(&path)?)?),
                None => Box::new(SqlStore::open_default()?),
            },
            StoreKind::File => {
                let path = path.ok_or_else(|| MerlionError::ConfigError {
                    message: "a vault path is required for the file provider".to_string(),
                })?;
                Box::new(FileStore::new(&path, None)?)
            }
            StoreKind::Remote => {
                match RemoteStore::from_credential_store(self.credentials.clone(), &self.base_url)? {
                    Some(remote) => Box::new(remote),
                    None => {
                        return Err(MerlionError::MissingCredentials {
                            message: "you need to login to use Cloud".to_string(),
                        })
                    }
                }
            }
        };
        Ok(store)
    }

    async fn export(
        &self,
        from: StoreKind,
        from_path: Option<String>,
        to: StoreKind,
        to_path: Option<String>,
    ) -> Result<()> {
        let source = self.open_store(from, from_path)?;
        let destination = self.open_store(to, to_path)?;
        let summary = export_notes(source.as_ref(), destination.as_ref()).await?;
        self.print_export_summary(&summary);
        Ok(())
    }

    fn print_export_summary(&self, summary: &ExportSummary) {
        println!(
            "Exported {} of {} notes from {} to {}",
            console::style(summary.exported).green().bold(),
            summary.total_notes,
            summary.source,
            summary.destination
        );
        if summary.error_count() > 0 {
            println!(
                "{}",
                console::style(format!("{} notes failed:", summary.error_count())).red()
            );
            for (title, error) in &summary.failed_notes {
                println!("  {}: {}", title, error);
            }
        }
    }

    /// Records a new vault in the config.
    ///
    /// A remote vault is added only once the service accepts `credentials`,
    /// which are then saved to the credential store.
    async fn add_vault(
        &mut self,
        provider: StoreKind,
        path: Option<String>,
        name: Option<String>,
        credentials: Option<Credentials>,
    ) -> Result<()> {
        let vault = match provider {
            StoreKind::Sql => {
                if path.is_some() {
                    warn!("Ignoring the path of a sql vault, set MERLION_DB_PATH instead");
                }
                VaultDescriptor::new(
                    StoreKind::Sql,
                    name.unwrap_or_else(|| SQL_STORE_NAME.to_string()),
                    "",
                )
            }
            StoreKind::File => {
                let path = path.ok_or_else(|| MerlionError::ConfigError {
                    message: "a vault path is required for the file provider".to_string(),
                })?;
                let store = FileStore::new(&path, None)?;
                let root = store.root().display().to_string();
                VaultDescriptor::new(StoreKind::File, name.unwrap_or_else(|| root.clone()), root)
            }
            StoreKind::Remote => {
                let credentials = credentials.ok_or_else(|| MerlionError::MissingCredentials {
                    message: "email and password are required to log in".to_string(),
                })?;
                let remote = RemoteStore::new(&self.base_url, None)?
                    .with_credential_store(self.credentials.clone());
                remote.validate(credentials).await?;
                println!("Logged in to {}", remote.base_url());
                VaultDescriptor::new(
                    StoreKind::Remote,
                    name.unwrap_or_else(|| REMOTE_STORE_NAME.to_string()),
                    "",
                )
            }
        };

        info!("Adding {} vault {}", vault.provider, vault.name);
        println!(
            "Added {} vault {}",
            vault.provider,
            console::style(&vault.name).bold()
        );
        self.config.add_vault(vault);
        self.config.save_to(&self.config_path)
    }

    fn logout(&mut self) -> Result<()> {
        self.credentials.remove()?;
        let removed = self.config.remove_vaults(StoreKind::Remote);
        if removed > 0 {
            self.config.save_to(&self.config_path)?;
        }
        info!("Logged out, removed {} cloud vaults from config", removed);
        println!("Credentials have been removed from disk");
        Ok(())
    }

    fn print_vaults(&self) {
        if self.config.vaults.is_empty() {
            println!("No vaults configured in {}", self.config_path.display());
            return;
        }
        for (i, vault) in self.config.vaults.iter().enumerate() {
            let name = if vault.name.is_empty() {
                vault.provider.to_string()
            } else {
                vault.name.clone()
            };
            println!(
                "{}: {} ({}) {}",
                i,
                console::style(name).bold(),
                vault.provider,
                vault.path
            );
        }
    }
}

/// Asks for the cloud account; the password is read without echo.
fn prompt_credentials(email: Option<String>) -> Result<Credentials> {
    let theme = ColorfulTheme::default();
    let email = match email {
        Some(email) => email,
        None => Input::<String>::with_theme(&theme)
            .with_prompt("Email")
            .interact_text()
            .map_err(prompt_error)?,
    };
    let password = Password::with_theme(&theme)
        .with_prompt("Password")
        .interact()
        .map_err(prompt_error)?;
    Ok(Credentials::new(email, password))
}

fn prompt_error(e: dialoguer::Error) -> MerlionError {
    MerlionError::ApplicationError {
        message: format!("failed to read input: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        dir: tempfile::TempDir,
        app: App,
    }

    fn fixture(base_url: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        let config = UserConfig::load_from(&config_path).unwrap();
        let credentials = Arc::new(CredentialStore::with_dir(dir.path().join("creds")).unwrap());
        let app = App::new(config, config_path, credentials, base_url.to_string(), false);
        Fixture { dir, app }
    }

    #[tokio::test]
    async fn cloud_vault_logs_in_and_saves_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/login"))
            .and(body_json(json!({"email": "u@x", "password": "p"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "abc"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut fx = fixture(&server.uri());
        fx.app
            .add_vault(StoreKind::Remote, None, None, Some(Credentials::new("u@x", "p")))
            .await
            .unwrap();

        let saved = fx.app.credentials.load().unwrap().unwrap();
        assert_eq!(saved.email, "u@x");

        let config = UserConfig::load_from(&fx.app.config_path).unwrap();
        assert_eq!(config.vaults.len(), 1);
        assert_eq!(config.vaults[0].provider, StoreKind::Remote);
        assert_eq!(config.vaults[0].name, REMOTE_STORE_NAME);

        let stores = load_stores(&config, fx.app.credentials.clone(), &server.uri()).unwrap();
        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].kind(), StoreKind::Remote);
    }

    #[tokio::test]
    async fn rejected_login_adds_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/login"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let mut fx = fixture(&server.uri());
        let err = fx
            .app
            .add_vault(StoreKind::Remote, None, None, Some(Credentials::new("u@x", "bad")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert!(fx.app.credentials.load().unwrap().is_none());
        assert!(UserConfig::load_from(&fx.app.config_path)
            .unwrap()
            .vaults
            .is_empty());
    }

    #[tokio::test]
    async fn file_vault_is_stored_with_absolute_path() {
        let mut fx = fixture(crate::DEFAULT_BASE_URL);
        let vault_dir = fx.dir.path().join("notes");
        fx.app
            .add_vault(
                StoreKind::File,
                Some(vault_dir.to_str().unwrap().to_string()),
                None,
                None,
            )
            .await
            .unwrap();
        fx.app
            .add_vault(StoreKind::Sql, None, Some("Work DB".to_string()), None)
            .await
            .unwrap();

        let config = UserConfig::load_from(&fx.app.config_path).unwrap();
        assert_eq!(config.vaults.len(), 2);
        assert_eq!(config.vaults[0].provider, StoreKind::File);
        assert_eq!(config.vaults[0].path, vault_dir.to_str().unwrap());
        assert_eq!(config.vaults[0].name, config.vaults[0].path);
        assert!(vault_dir.is_dir());
        assert_eq!(config.vaults[1].name, "Work DB");
    }

    #[tokio::test]
    async fn file_vault_needs_a_path() {
        let mut fx = fixture(crate::DEFAULT_BASE_URL);
        let err = fx
            .app
            .add_vault(StoreKind::File, None, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
