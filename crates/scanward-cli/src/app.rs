//! Application state for the scanward front end.
//!
//! `App` wires the configuration, session storage, API client, session
//! store and navigator together, the way a dashboard would at page load.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Result};
use tracing::{debug, error, info, warn};

use scanward_core::api::login_error_message;
use scanward_core::auth::{StorageKind, INVALID_SESSION_MESSAGE};
use scanward_core::guard::navigator::Navigation;
use scanward_core::{
    ApiClient, ApiError, Config, GuardDecision, Navigator, Route, RouteGuard, SessionStore,
};

use crate::cli::GlobalOptions;

/// Maximum length for identifier input.
const MAX_IDENTIFIER_LENGTH: usize = 254;

pub struct App {
    pub config: Config,
    pub api: ApiClient,
    pub session: SessionStore,
    pub navigator: Navigator,
}

impl App {
    /// Create a new application instance. The session stays in its
    /// restoring state until `start` runs.
    pub fn new(options: &GlobalOptions) -> Result<Self> {
        let mut config = Config::load_with_env();
        if let Some(ref url) = options.api_url {
            config.api_base_url = Some(url.clone());
        }
        let storage_kind = if options.ephemeral {
            StorageKind::Memory
        } else {
            config.storage
        };
        debug!(api = config.api_base_url(), storage = ?storage_kind, "Config loaded");

        let data_dir = config.data_dir().unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to local data directory");
            PathBuf::from("./.scanward")
        });

        let api = ApiClient::new(config.api_base_url())?;
        let session = SessionStore::new(storage_kind.open(&data_dir), api.clone());
        let navigator = Navigator::new(RouteGuard::new(session.clone()));

        Ok(Self {
            config,
            api,
            session,
            navigator,
        })
    }

    /// Restore the persisted session.
    pub async fn start(&mut self) {
        let state = self.session.restore().await;
        debug!(authenticated = state.is_authenticated(), "Session restore finished");
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub async fn login(&mut self, identifier: Option<String>, password: Option<String>) -> Result<()> {
        let identifier = match identifier {
            Some(id) => id,
            None => Self::prompt_identifier(self.config.last_identifier.as_deref())?,
        };
        let password = match password {
            Some(password) => password,
            None => rpassword::prompt_password("Password: ")?,
        };

        let identifier = identifier.trim().to_string();
        if identifier.is_empty() || password.is_empty() {
            bail!("Username/email and password required");
        }
        if identifier.len() > MAX_IDENTIFIER_LENGTH {
            bail!("Username/email is too long");
        }

        let token = match self.api.authenticate(&identifier, &password).await {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "Login exchange failed");
                bail!(login_error_message(&e));
            }
        };

        let identity = match self.session.establish(token).await {
            Ok(identity) => identity,
            Err(e) => {
                // Details stay in the log; the user only sees the generic message
                if e.is_decode_failure() {
                    error!(error = %e, "Backend issued an unusable credential");
                } else {
                    error!(error = %e, "Could not persist the new session");
                }
                bail!(INVALID_SESSION_MESSAGE);
            }
        };

        self.config.last_identifier = Some(identifier);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        info!(user = %identity.display_name, role = %identity.role, "Login successful");
        println!("{}", identity.navbar_label());
        self.open(Route::landing_for(identity.role).path())
    }

    pub async fn logout(&mut self) -> Result<()> {
        self.session.clear().await;
        println!("Logged out.");
        self.open(Route::Login.path())
    }

    fn prompt_identifier(last: Option<&str>) -> Result<String> {
        match last {
            Some(last) => print!("Username or email [{}]: ", last),
            None => print!("Username or email: "),
        }
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();

        Ok(match (input.is_empty(), last) {
            (true, Some(last)) => last.to_string(),
            _ => input.to_string(),
        })
    }

    // =========================================================================
    // Views
    // =========================================================================

    pub fn whoami(&self) -> Result<()> {
        match self.session.identity() {
            Some(identity) => println!("{} ({})", identity.navbar_label(), identity.role),
            None => println!("Not logged in"),
        }
        Ok(())
    }

    pub fn open(&self, path: &str) -> Result<()> {
        let navigation = self.navigator.resolve(path);
        println!("{}", describe(path, &navigation));
        Ok(())
    }

    pub async fn fetch(&self, path: &str) -> Result<()> {
        if !self.session.is_authenticated() {
            bail!("Not logged in. Run `scanward login` first.");
        }

        match self.api.get_json(path).await {
            Ok(value) => {
                println!("{}", serde_json::to_string_pretty(&value)?);
                Ok(())
            }
            Err(e) => {
                let rejected = e
                    .downcast_ref::<ApiError>()
                    .map(ApiError::is_unauthorized)
                    .unwrap_or(false);
                if rejected {
                    // The decoded role is only advisory; the backend has the final say
                    warn!("Backend rejected the stored credential");
                    bail!("Session is no longer accepted by the server. Please log in again.");
                }
                Err(e)
            }
        }
    }
}

/// One-line description of a navigation outcome.
fn describe(path: &str, navigation: &Navigation) -> String {
    match navigation.decision {
        GuardDecision::Render => format!("Rendering {}", path_of(path, navigation)),
        GuardDecision::Loading => "Loading...".to_string(),
        GuardDecision::Redirect(route) => format!("{} -> redirecting to {}", path, route.path()),
    }
}

fn path_of(path: &str, navigation: &Navigation) -> String {
    navigation
        .requested
        .map(|route| route.path().to_string())
        .unwrap_or_else(|| path.to_string())
}
