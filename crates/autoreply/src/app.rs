//! Console front end: one page at a time, each with its own context.

use std::sync::Arc;

use anyhow::{Context, Result};
use autoreply_core::{
    ApiClient, AuthFlowController, AuthState, Email, EmailId, EmailWorklistController, Error,
    FileStorage, PageContext, SessionStore, SettingsController, SettingsPolicy,
};
use tracing::{debug, info};
use url::Url;

use crate::command::{Command, HELP, SettingChange};
use crate::config::AppConfig;
use crate::navigator::SystemNavigator;

/// The page currently shown.
enum Page {
    Login,
    Dashboard(EmailWorklistController),
    Settings(SettingsController),
}

/// Whether the command loop should keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next command.
    Continue,
    /// Stop.
    Exit,
}

/// Application state.
pub struct App {
    api: ApiClient,
    session: Arc<SessionStore>,
    navigator: Arc<SystemNavigator>,
    app_url: Url,
    /// Controller of the most recent login page; also used for logout.
    auth: AuthFlowController,
    page: Page,
    /// Context of `page`. Left whenever another page is opened.
    context: PageContext,
}

impl App {
    /// Restores the persisted session and builds the backend client.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let api = ApiClient::new(&config.client_config()?).context("Failed to create API client")?;
        let session = Arc::new(SessionStore::restore(FileStorage::new(&config.data_dir)));
        let navigator = Arc::new(SystemNavigator::new(config.app_url.clone()));
        let context = PageContext::new();
        let auth = AuthFlowController::new(
            api.clone(),
            Arc::clone(&session),
            navigator.clone(),
            context.clone(),
        );

        Ok(Self {
            api,
            session,
            navigator,
            app_url: config.app_url.clone(),
            auth,
            page: Page::Login,
            context,
        })
    }

    /// Resolves the first page from the location the app was opened at.
    pub async fn start(&mut self, location: &Url) {
        match self.auth.mount(location).await {
            Ok(()) if self.auth.is_authenticated() => self.open_dashboard().await,
            Ok(()) => println!("Welcome. Type `login` to sign in with Google."),
            Err(e) => report_sign_in_failure(&e),
        }
    }

    /// Runs one command.
    pub async fn handle(&mut self, command: Command) -> Flow {
        match command {
            Command::Login => self.login().await,
            Command::Callback(raw) => self.callback(&raw).await,
            Command::WhoAmI => self.whoami(),
            Command::Emails => self.open_dashboard().await,
            Command::Generate(id) => self.generate(&id).await,
            Command::Send { id, text } => self.send(&id, text).await,
            Command::Settings => self.open_settings().await,
            Command::Set(change) => self.set(change).await,
            Command::Logout => self.logout().await,
            Command::Help => println!("{HELP}"),
            Command::Quit => return Flow::Exit,
        }
        Flow::Continue
    }

    /// Leaves the current page and returns the context for the next one.
    fn switch_context(&mut self) -> PageContext {
        self.context.leave();
        self.context = PageContext::new();
        self.context.clone()
    }

    fn open_login(&mut self) {
        let context = self.switch_context();
        self.auth = AuthFlowController::new(
            self.api.clone(),
            Arc::clone(&self.session),
            self.navigator.clone(),
            context,
        );
        self.page = Page::Login;
    }

    async fn login(&mut self) {
        if self.session.is_active() {
            println!("Already signed in. Type `logout` first to switch accounts.");
            return;
        }
        if !matches!(self.page, Page::Login) {
            self.open_login();
        }

        self.auth.reset();
        match self.auth.sign_in().await {
            Ok(()) => println!(
                "Continue in your browser. When Google sends you back, paste the address with \
                 `callback <url>`."
            ),
            Err(e) => report_sign_in_failure(&e),
        }
    }

    async fn callback(&mut self, raw: &str) {
        if self.session.is_active() {
            println!("Already signed in.");
            return;
        }
        let location = match self.app_url.join(raw) {
            Ok(location) => location,
            Err(e) => {
                println!("That does not look like an address: {e}");
                return;
            }
        };
        if !matches!(self.page, Page::Login) {
            self.open_login();
        }

        match self.auth.mount(&location).await {
            Ok(()) => {
                if let AuthState::Authenticated(user) = self.auth.state() {
                    println!("Signed in as {}.", user.name);
                } else {
                    println!("No sign-in code found in that address.");
                    return;
                }
                self.open_dashboard().await;
            }
            Err(e) => report_sign_in_failure(&e),
        }
        debug!("Location is now {}", self.navigator.location());
    }

    fn whoami(&self) {
        match self.session.current_user() {
            Some(user) => {
                println!("{}", user.name);
                if let Some(email) = &user.email {
                    println!("  email:         {email}");
                }
                if let Some(picture) = &user.profile_pic {
                    println!("  picture:       {picture}");
                }
                println!("  manual review: {}", on_off(user.manual_review));
            }
            None => println!("Not signed in."),
        }
    }

    async fn open_dashboard(&mut self) {
        if !self.require_session() {
            return;
        }
        if !matches!(self.page, Page::Dashboard(_)) {
            let context = self.switch_context();
            self.page = Page::Dashboard(EmailWorklistController::new(
                self.api.clone(),
                Arc::clone(&self.session),
                context,
            ));
        }
        let Page::Dashboard(worklist) = &self.page else {
            return;
        };

        println!("Loading unread emails...");
        match worklist.refresh().await {
            Ok(()) => print_worklist(worklist),
            Err(e) => report(&e, worklist.error()),
        }
    }

    async fn generate(&self, id: &EmailId) {
        let Some(worklist) = self.worklist() else {
            return;
        };
        match worklist.generate_response(id).await {
            Ok(text) => {
                println!("Generated reply for {id}:");
                println!("{}", indent(&text));
                println!("Type `send {id}` to send it, or `send {id} <text>` to send an edited version.");
            }
            Err(e) => report(&e, worklist.entry_error(id)),
        }
    }

    async fn send(&self, id: &EmailId, text: Option<String>) {
        let Some(worklist) = self.worklist() else {
            return;
        };
        let text = text
            .or_else(|| worklist.get(id).and_then(|email| email.ai_response))
            .unwrap_or_default();
        match worklist.send_response(id, &text).await {
            Ok(()) => println!("Reply sent. {} unread email(s) left.", worklist.len()),
            Err(e) => report(&e, worklist.entry_error(id)),
        }
    }

    fn worklist(&self) -> Option<&EmailWorklistController> {
        if let Page::Dashboard(worklist) = &self.page {
            Some(worklist)
        } else {
            println!("Open your emails first with `emails`.");
            None
        }
    }

    async fn open_settings(&mut self) {
        if !self.require_session() {
            return;
        }
        if !matches!(self.page, Page::Settings(_)) {
            let context = self.switch_context();
            self.page = Page::Settings(SettingsController::new(
                self.api.clone(),
                Arc::clone(&self.session),
                context,
            ));
        }
        let Page::Settings(settings) = &self.page else {
            return;
        };

        match settings.load().await {
            Ok(policy) => print_policy(&policy),
            Err(e) => report(&e, settings.error()),
        }
    }

    async fn set(&self, change: SettingChange) {
        let Page::Settings(settings) = &self.page else {
            println!("Open the settings first with `settings`.");
            return;
        };
        // Editing defaults would overwrite the stored policy unseen.
        let Some(current) = settings.policy() else {
            println!("Settings have not loaded yet. Type `settings` to load them first.");
            return;
        };
        let policy = change.apply(current);
        match settings.save(policy).await {
            Ok(saved) => {
                println!("Settings saved successfully!");
                print_policy(&saved);
            }
            Err(e) => report(&e, settings.error()),
        }
    }

    async fn logout(&mut self) {
        let result = self.auth.logout().await;
        self.open_login();
        match result {
            Ok(()) => println!("Signed out."),
            Err(e) => println!("Signed out locally. {}", e.user_message()),
        }
        info!("Returned to the login page");
    }

    fn require_session(&self) -> bool {
        let active = self.session.is_active();
        if !active {
            println!("Sign in first with `login`.");
        }
        active
    }
}

fn report(error: &Error, page_message: Option<String>) {
    if error.is_invalid_local_state() {
        println!("{}", error.user_message());
    } else {
        println!("{}", page_message.unwrap_or_else(|| error.user_message()));
    }
    if error.is_auth_rejection() {
        println!("Type `logout` and `login` to start a new session.");
    }
}

fn report_sign_in_failure(error: &Error) {
    println!("{}", error.user_message());
    println!("Type `login` to try again.");
}

fn print_worklist(worklist: &EmailWorklistController) {
    let emails = worklist.emails();
    if emails.is_empty() {
        println!("No unread emails found.");
        return;
    }
    println!("Unread Emails ({})", emails.len());
    for email in &emails {
        print_email(email, worklist.entry_error(&email.id));
    }
}

fn print_email(email: &Email, inline_error: Option<String>) {
    println!();
    println!("[{}] {}", email.id, email.subject);
    println!("  From: {}", email.from);
    println!("{}", indent(&email.body));
    if let Some(reply) = &email.ai_response {
        println!("  AI Generated Response:");
        println!("{}", indent(reply));
    }
    if let Some(message) = inline_error {
        println!("  ! {message}");
    }
}

fn print_policy(policy: &SettingsPolicy) {
    println!("Email Response Settings");
    println!("  manual_review: {}", on_off(policy.manual_review));
    println!("  tone:          {:?}", policy.response_tone);
    println!("  length:        {:?}", policy.response_length);
}

const fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            api_url: "http://127.0.0.1:9/api".to_string(),
            app_url: Url::parse("http://localhost:3000/").unwrap(),
            data_dir: dir.to_path_buf(),
            timeout: None,
        }
    }

    fn signed_in_app(dir: &std::path::Path) -> App {
        let record = r#"{"user": {"id": "1", "name": "A"}, "stored_at": "2026-01-01T00:00:00Z"}"#;
        std::fs::write(dir.join("user.json"), record).unwrap();
        let app = App::new(&config(dir)).unwrap();
        assert!(app.session.is_active());
        app
    }

    #[test]
    fn test_indent() {
        assert_eq!(indent("a\nb"), "    a\n    b");
    }

    #[tokio::test]
    async fn test_commands_without_session_stay_on_login() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::new(&config(dir.path())).unwrap();

        assert_eq!(app.handle(Command::Emails).await, Flow::Continue);
        assert!(matches!(app.page, Page::Login));
        assert_eq!(app.handle(Command::Settings).await, Flow::Continue);
        assert!(matches!(app.page, Page::Login));
        assert_eq!(app.handle(Command::Quit).await, Flow::Exit);
    }

    #[tokio::test]
    async fn test_switching_pages_leaves_previous_context() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::new(&config(dir.path())).unwrap();
        let first = app.context.clone();

        app.open_login();

        assert!(!first.is_active());
        assert!(app.context.is_active());
    }

    #[tokio::test]
    async fn test_set_refused_until_policy_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = signed_in_app(dir.path());
        let context = app.switch_context();
        app.page = Page::Settings(SettingsController::new(
            app.api.clone(),
            Arc::clone(&app.session),
            context,
        ));

        app.handle(Command::Set(SettingChange::ManualReview(false)))
            .await;

        let Page::Settings(settings) = &app.page else {
            panic!("left the settings page");
        };
        // a save against the unreachable backend would have set an error
        assert!(settings.error().is_none());
        assert!(settings.policy().is_none());
        assert!(app.session.current_user().unwrap().manual_review);
    }
}
