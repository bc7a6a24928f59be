//! Application wiring and command handlers.
//!
//! Each command is a navigation: it opens a route through the router, which
//! runs that route's guard, and only then runs the page logic.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use taskdash_core::config::TokenStorage;
use taskdash_core::forms::{FieldError, LoginForm, RegistrationForm, UploadForm};
use taskdash_core::models::{Page, Task, TaskDetail};
use taskdash_core::{
    ApiClient, Config, FileTokenStore, KeyringTokenStore, MemoryTokenStore, Navigation, Route,
    Router, SessionManager, TokenStore,
};

use crate::format::{format_optional, format_timestamp, truncate_string};

/// Width of the message column in the task table
const MESSAGE_COLUMN_WIDTH: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { login: Option<String> },
    Register { login: Option<String> },
    Logout,
    Status,
    Models,
    Tasks { page: u32 },
    Task { id: String },
    Upload { model_id: String, file: String },
}

pub struct App {
    config: Config,
    api: ApiClient,
    session: Arc<SessionManager>,
    router: Router,
    cancel: CancellationToken,
}

impl App {
    pub fn new(config: Config, ephemeral: bool) -> Result<Self> {
        let api = ApiClient::new(config.api_url()?)?;

        let store: Arc<dyn TokenStore> = if ephemeral {
            Arc::new(MemoryTokenStore::new())
        } else {
            match config.token_storage {
                TokenStorage::File => Arc::new(FileTokenStore::new(config.cache_dir()?)),
                TokenStorage::Keyring => Arc::new(KeyringTokenStore::new()),
            }
        };

        let session = Arc::new(SessionManager::new(Arc::new(api.clone()), store));
        let router = Router::new(session.clone());

        Ok(Self {
            config,
            api,
            session,
            router,
            cancel: CancellationToken::new(),
        })
    }

    /// Token that abandons any navigation in progress when cancelled
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Login { login } => self.login(login).await,
            Command::Register { login } => self.register(login).await,
            Command::Logout => {
                self.session.load();
                self.session.logout();
                println!("Logged out.");
                Ok(())
            }
            Command::Status => self.status().await,
            Command::Models => self.models().await,
            Command::Tasks { page } => self.tasks(page).await,
            Command::Task { id } => self.task(id).await,
            Command::Upload { model_id, file } => self.upload(model_id, file).await,
        }
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Open a protected route, failing if the guards send us elsewhere
    async fn open(&self, route: Route) -> Result<()> {
        match self.router.navigate(route.clone(), &self.cancel).await {
            Navigation::Render(rendered) if rendered == route => Ok(()),
            Navigation::Render(Route::Login) => match self.session.state().error {
                Some(reason) => bail!("Please log in again ({}).", reason),
                None => bail!("Please log in first: taskdash login"),
            },
            Navigation::Render(other) => bail!("Redirected to {}", other),
            Navigation::Abandoned => bail!("Cancelled"),
            Navigation::TooManyRedirects(last) => bail!("Too many redirects (last: {})", last),
        }
    }

    /// Open an auth page; `false` means a usable session already exists
    async fn open_auth_page(&self, route: Route) -> Result<bool> {
        match self.router.navigate(route.clone(), &self.cancel).await {
            Navigation::Render(rendered) if rendered == route => Ok(true),
            Navigation::Render(Route::Home) => Ok(false),
            Navigation::Render(other) => bail!("Redirected to {}", other),
            Navigation::Abandoned => bail!("Cancelled"),
            Navigation::TooManyRedirects(last) => bail!("Too many redirects (last: {})", last),
        }
    }

    fn authorized_api(&self) -> Result<ApiClient> {
        let token = self
            .session
            .access_token()
            .context("No access token after navigation")?;
        Ok(self.api.with_token(token))
    }

    // =========================================================================
    // Auth pages
    // =========================================================================

    async fn login(&mut self, login: Option<String>) -> Result<()> {
        if !self.open_auth_page(Route::Login).await? {
            println!("Already logged in.");
            return Ok(());
        }

        let form = LoginForm {
            login: match login {
                Some(l) => l,
                None => prompt_login(self.config.last_login.as_deref())?,
            },
            password: prompt_password("Password: ")?,
        };
        ensure_valid(&form.validate())?;

        self.session.login(&form.login, &form.password).await?;

        self.remember_login(form.login);
        println!("Logged in.");
        Ok(())
    }

    async fn register(&mut self, login: Option<String>) -> Result<()> {
        if !self.open_auth_page(Route::Registration).await? {
            println!("Already logged in.");
            return Ok(());
        }

        let form = RegistrationForm {
            login: match login {
                Some(l) => l,
                None => prompt_login(None)?,
            },
            password: prompt_password("Password: ")?,
            password_repeated: prompt_password("Repeat password: ")?,
            is_confirm: prompt_yes_no("Accept the terms of service? [y/N]: ")?,
        };
        ensure_valid(&form.validate())?;

        self.session.register(&form.login, &form.password).await?;
        info!("Account created, logging in");

        self.session
            .login(&form.login, &form.password)
            .await
            .map_err(|e| anyhow::anyhow!("Account created, but login failed: {}", e))?;

        self.remember_login(form.login);
        println!("Account created and logged in.");
        Ok(())
    }

    fn remember_login(&mut self, login: String) {
        self.config.last_login = Some(login);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
    }

    async fn status(&self) -> Result<()> {
        let pair = self.session.load();
        if pair.is_empty() {
            println!("Not logged in.");
            return Ok(());
        }
        if let Some(access) = pair.access_token.as_deref() {
            match self.session.check(access).await {
                Ok(valid) => println!("Access token: {}", if valid { "valid" } else { "expired" }),
                Err(e) => println!("Access token: unknown ({})", e),
            }
        }
        if let Some(refresh) = pair.refresh_token.as_deref() {
            match self.session.check(refresh).await {
                Ok(valid) => println!("Refresh token: {}", if valid { "valid" } else { "expired" }),
                Err(e) => println!("Refresh token: unknown ({})", e),
            }
        }
        println!("Session: {:?}", self.session.status());
        Ok(())
    }

    // =========================================================================
    // Task pages
    // =========================================================================

    async fn models(&self) -> Result<()> {
        self.open(Route::CreateTask).await?;
        let models = self.api.list_models().await?;
        if models.is_empty() {
            println!("No models available.");
        }
        for model in models {
            println!("{:<38} {}", model.id, model.name);
        }
        Ok(())
    }

    async fn tasks(&self, page: u32) -> Result<()> {
        self.open(Route::Home).await?;
        let page = self
            .authorized_api()?
            .list_tasks(page.max(1), self.config.batch_size)
            .await?;
        print_task_page(&page);
        Ok(())
    }

    async fn task(&self, id: String) -> Result<()> {
        self.open(Route::TaskDetail(id.clone())).await?;
        let task = self.authorized_api()?.get_task(&id).await?;
        print_task_detail(&task);
        Ok(())
    }

    async fn upload(&self, model_id: String, file: String) -> Result<()> {
        self.open(Route::CreateTask).await?;

        let path = Path::new(&file);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|_| path.is_file());
        let form = UploadForm {
            model_id,
            file_name,
        };
        ensure_valid(&form.validate())?;

        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", file))?;
        let task = self
            .authorized_api()?
            .upload_task(&form.model_id, form.file_name.as_deref().unwrap_or_default(), bytes)
            .await?;

        println!("Created task {} ({})", task.id, Route::TaskDetail(task.id.clone()));
        print_task_detail(&task);
        Ok(())
    }
}

fn ensure_valid(errors: &[FieldError]) -> Result<()> {
    if errors.is_empty() {
        return Ok(());
    }
    for error in errors {
        eprintln!("  {}", error);
    }
    bail!("Please fix the fields above")
}

fn print_task_page(page: &Page<Task>) {
    if page.data.is_empty() {
        println!("No tasks yet.");
        return;
    }
    println!(
        "{:<38} {:<18} {:<12} {}",
        "ID", "CREATED", "STATUS", "MESSAGE"
    );
    for task in &page.data {
        println!(
            "{:<38} {:<18} {:<12} {}",
            task.id,
            format_timestamp(&task.created_on),
            task.status,
            truncate_string(&format_optional(&task.message, "-"), MESSAGE_COLUMN_WIDTH)
        );
    }
    println!(
        "Page {}/{} ({} tasks)",
        page.current_page, page.total_pages, page.total_count
    );
    if page.has_prev() {
        println!("Previous: taskdash tasks {}", page.current_page - 1);
    }
    if page.has_next() {
        println!("Next:     taskdash tasks {}", page.current_page + 1);
    }
}

fn print_task_detail(task: &TaskDetail) {
    println!("Task:     {}", task.id);
    println!("Status:   {}", task.status);
    println!("Created:  {}", format_timestamp(&task.created_on));
    println!("Updated:  {}", format_timestamp(&task.updated_on));
    if let Some(ref message) = task.message {
        println!("Message:  {}", message);
    }
    if let Some(ref file) = task.file {
        println!("File:     {} ({})", file.original_name, file.url);
    }
    match task.predict {
        Some(ref predict) => println!(
            "Result:   {} ({})",
            predict.result,
            predict.probability_display()
        ),
        None => println!("Result:   pending"),
    }
}

fn prompt_login(last: Option<&str>) -> Result<String> {
    match last {
        Some(last) => print!("Login [{}]: ", last),
        None => print!("Login: "),
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

fn prompt_password(prompt: &str) -> Result<String> {
    Ok(rpassword::prompt_password(prompt)?)
}

fn prompt_yes_no(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}
