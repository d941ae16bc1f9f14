// Command-line surface: argument definitions and command dispatch.
//
// Output goes to a caller-supplied writer so the same code serves the
// binary and the integration tests.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use medivision_api::{ApiError, ApiResponse};
use medivision_core::access::Screen;
use medivision_core::alert::AlertKind;
use medivision_core::model::{HistoryEntry, MedicineResult, ProfileUpdate, RegisterData, User};
use medivision_core::prefs::{Language, Theme};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::app::{AppState, LOGOUT_ACTION};
use crate::scan::ScanRoute;
use crate::search::{SearchEvent, SuggestionView};

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(
    name = "medivision",
    about = "Identify medicines by name or by photo",
    version
)]
pub struct Cli {
    /// Config file. Defaults to medivision.toml in the platform config dir.
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,
    /// Print the raw `{data, error}` response as JSON.
    #[arg(long, global = true)]
    pub json: bool,
    /// Display language for names and messages.
    #[arg(long, global = true, value_name = "en|bn")]
    pub lang: Option<Language>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Email a login OTP.
    SendOtp { email: String },
    /// Sign in with the emailed OTP.
    VerifyOtp { email: String, otp: String },
    /// Sign in with email and password.
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out after confirming on stdin.
    Logout {
        /// Skip the confirmation.
        #[arg(long)]
        yes: bool,
    },
    /// Email a signup OTP.
    SignupOtp { name: String, email: String },
    /// Finish signup with the emailed OTP.
    SignupVerify { email: String, otp: String },
    /// Create an account with a password.
    Register {
        name: String,
        email: String,
        #[arg(long)]
        password: String,
        #[command(flatten)]
        details: ProfileFields,
    },
    /// Show or edit the signed-in profile.
    Profile {
        #[command(subcommand)]
        action: Option<ProfileCommand>,
    },
    /// Profile, recent history and reachable screens.
    Dashboard,
    /// Full-text medicine search.
    Search {
        #[arg(required = true, num_args = 1..)]
        term: Vec<String>,
    },
    /// Live suggestions for search-box input read line by line from stdin.
    /// `!N` picks suggestion N, `?text` submits a full search.
    Suggest,
    /// Identify a medicine from a photo.
    Scan { path: PathBuf },
    /// Show one medicine.
    Medicine { id: String },
    /// Recent scans, uploads and views.
    History {
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Show or change the color theme.
    Theme { action: Option<ThemeAction> },
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    Show,
    Update {
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        details: ProfileFields,
    },
    SetImage { path: PathBuf },
    RemoveImage,
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct ProfileFields {
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub gender: Option<String>,
    /// Date of birth, YYYY-MM-DD.
    #[arg(long, value_name = "date")]
    pub date_of_birth: Option<String>,
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long)]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ThemeAction {
    Toggle,
    Light,
    Dark,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run one command. Returns `Ok(false)` when the command completed but the
/// server (or local validation) reported an error.
pub async fn execute<W: Write>(
    app: &mut AppState,
    command: Command,
    json: bool,
    out: &mut W,
) -> anyhow::Result<bool> {
    let mut printer = Printer { app, json, out };
    match command {
        Command::SendOtp { email } => {
            let resp = printer.app.send_otp(&email).await;
            printer.response(resp, |p, m| p.line(&m.message))
        }
        Command::VerifyOtp { email, otp } => {
            let resp = printer.app.verify_otp(&email, &otp).await;
            printer.response(resp, Printer::user)
        }
        Command::Login { email, password } => {
            let resp = printer.app.login(&email, &password).await;
            printer.response(resp, Printer::user)
        }
        Command::Logout { yes } => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            confirm_logout(printer.app, stdin, yes, json, printer.out).await
        }
        Command::SignupOtp { name, email } => {
            let resp = printer.app.send_signup_otp(&name, &email).await;
            printer.response(resp, |p, m| p.line(&m.message))
        }
        Command::SignupVerify { email, otp } => {
            let resp = printer.app.verify_signup_otp(&email, &otp).await;
            printer.response(resp, Printer::user)
        }
        Command::Register {
            name,
            email,
            password,
            details,
        } => {
            let data = RegisterData {
                name,
                email,
                password,
                phone: details.phone,
                gender: details.gender,
                date_of_birth: details.date_of_birth,
                location: details.location,
                bio: details.bio,
            };
            let resp = printer.app.register(&data).await;
            printer.response(resp, Printer::user)
        }
        Command::Profile { action } => match action.unwrap_or(ProfileCommand::Show) {
            ProfileCommand::Show => {
                let resp = printer.app.load_profile().await;
                printer.response(resp, Printer::user)
            }
            ProfileCommand::Update { name, details } => {
                let update = ProfileUpdate {
                    name,
                    phone: details.phone,
                    gender: details.gender,
                    date_of_birth: details.date_of_birth,
                    location: details.location,
                    bio: details.bio,
                };
                if update.is_empty() {
                    anyhow::bail!("nothing to update: pass at least one field");
                }
                let resp = printer.app.update_profile(&update).await;
                printer.response(resp, Printer::user)
            }
            ProfileCommand::SetImage { path } => {
                let resp = printer.app.upload_profile_image(&path).await;
                printer.response(resp, Printer::user)
            }
            ProfileCommand::RemoveImage => {
                let resp = printer.app.remove_profile_image().await;
                printer.response(resp, Printer::user)
            }
        },
        Command::Dashboard => {
            let (profile, history) = printer.app.refresh_dashboard().await;
            let screens = printer.app.available_screens();
            printer.dashboard(profile, history, &screens)
        }
        Command::Search { term } => {
            let resp = printer.app.search(&term.join(" ")).await;
            printer.response(resp, |p, results| {
                if results.is_empty() {
                    p.line("No medicines found")
                } else {
                    p.medicines(&results)
                }
            })
        }
        Command::Suggest => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            run_suggest(printer.app, stdin, json, printer.out).await?;
            Ok(true)
        }
        Command::Scan { path } => {
            let resp = printer.app.scan(&path).await;
            printer.response(resp, |p, route| match route {
                ScanRoute::NotFound => Ok(()),
                ScanRoute::Detail(medicine) => p.medicine_detail(&medicine),
                ScanRoute::Results(results) => p.medicines(&results),
            })
        }
        Command::Medicine { id } => {
            let resp = printer.app.medicine(&id).await;
            printer.response(resp, |p, m| p.medicine_detail(&m))
        }
        Command::History { limit } => {
            let resp = printer.app.history(limit).await;
            printer.response(resp, |p, entries| p.history(&entries))
        }
        Command::Theme { action } => {
            let theme = match action {
                None => printer.app.theme.theme(),
                Some(ThemeAction::Toggle) => printer.app.toggle_theme(),
                Some(ThemeAction::Light) => set_theme(printer.app, Theme::Light),
                Some(ThemeAction::Dark) => set_theme(printer.app, Theme::Dark),
            };
            printer.response(ApiResponse::from(Ok::<_, ApiError>(theme)), |p, theme| {
                p.line(theme.as_str())
            })
        }
    }
}

fn set_theme(app: &mut AppState, theme: Theme) -> Theme {
    app.theme.set(theme);
    theme
}

// ---------------------------------------------------------------------------
// Logout confirmation
// ---------------------------------------------------------------------------

/// Raise the logout confirmation and answer it with the first input line
/// (a button id), or with the destructive button when `yes` is set. Any
/// other answer, including end of input, cancels.
pub async fn confirm_logout<R, W>(
    app: &mut AppState,
    mut input: R,
    yes: bool,
    json: bool,
    out: &mut W,
) -> anyhow::Result<bool>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    app.request_logout();
    let answer = if yes {
        LOGOUT_ACTION.to_string()
    } else {
        if let (false, Some(alert)) = (json, app.alerts.current()) {
            let ids: Vec<&str> = alert.actions.iter().map(|a| a.id.as_str()).collect();
            write!(out, "{} [{}] ", alert.message, ids.join("/"))?;
            out.flush()?;
        }
        let mut line = String::new();
        input
            .read_line(&mut line)
            .await
            .context("failed to read input")?;
        line.trim().to_lowercase()
    };

    let mut printer = Printer { app, json, out };
    match printer.app.answer_logout(&answer).await {
        Some(resp) => printer.response(resp, |_, ()| Ok(())),
        None => {
            printer.app.alerts.hide();
            if json {
                let cancelled = serde_json::json!({ "data": null });
                writeln!(printer.out, "{cancelled}")?;
            } else {
                printer.line("cancelled")?;
            }
            Ok(true)
        }
    }
}

// ---------------------------------------------------------------------------
// Suggestions loop
// ---------------------------------------------------------------------------

/// Feed each input line to the suggestion controller and print events as
/// they arrive. At end of input, waits out the debounce window and drains
/// every request still in flight.
pub async fn run_suggest<R, W>(
    app: &AppState,
    input: R,
    json: bool,
    out: &mut W,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let (mut controller, mut events) = app.suggestions();
    let mut view = SuggestionView::default();
    let mut lines = input.lines();
    let language = app.language.language();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read input")? else {
                    break;
                };
                if let Some(index) = line.strip_prefix('!') {
                    let picked = index
                        .trim()
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|i| view.suggestions.get(i).cloned());
                    match picked {
                        Some(record) => controller.select(record).await,
                        None => writeln!(out, "no suggestion {}", index.trim())?,
                    }
                } else if let Some(text) = line.strip_prefix('?') {
                    controller.submit(text);
                } else {
                    controller.input(&line).await;
                }
            }
            Some(event) = events.recv() => {
                print_event(&event, json, language, out)?;
                view.apply(event);
            }
        }
    }

    tokio::time::sleep(app.config().search.debounce() + Duration::from_millis(50)).await;
    drop(controller);
    while let Some(event) = events.recv().await {
        print_event(&event, json, language, out)?;
        view.apply(event);
    }
    Ok(())
}

fn print_event<W: Write>(
    event: &SearchEvent,
    json: bool,
    language: Language,
    out: &mut W,
) -> anyhow::Result<()> {
    if json {
        let value = match event {
            SearchEvent::Cleared => serde_json::json!({ "event": "cleared" }),
            SearchEvent::Suggestions { term, results } => {
                serde_json::json!({ "event": "suggestions", "term": term, "data": results })
            }
            SearchEvent::SuggestionsFailed { term, error }
            | SearchEvent::SearchFailed { term, error } => {
                serde_json::json!({ "event": "failed", "term": term, "error": error.to_string() })
            }
            SearchEvent::Selected(record) => {
                serde_json::json!({ "event": "selected", "data": record })
            }
            SearchEvent::Results { term, results } => {
                serde_json::json!({ "event": "results", "term": term, "data": results })
            }
        };
        writeln!(out, "{value}")?;
        return Ok(());
    }

    match event {
        SearchEvent::Cleared => writeln!(out, "(cleared)")?,
        SearchEvent::Suggestions { term, results } => {
            writeln!(out, "suggestions for {term:?}:")?;
            for (i, m) in results.iter().enumerate() {
                writeln!(out, "  {}. {}", i + 1, m.display_name(language))?;
            }
        }
        SearchEvent::SuggestionsFailed { term, error } => {
            writeln!(out, "suggestions for {term:?} failed: {error}")?
        }
        SearchEvent::Selected(m) => {
            writeln!(out, "selected {} ({})", m.display_name(language), m.id)?
        }
        SearchEvent::Results { term, results } => {
            writeln!(out, "{} result(s) for {term:?}:", results.len())?;
            for m in results {
                writeln!(out, "  {} ({})", m.display_name(language), m.id)?;
            }
        }
        SearchEvent::SearchFailed { term, error } => {
            writeln!(out, "search for {term:?} failed: {error}")?
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

struct Printer<'a, W: Write> {
    app: &'a mut AppState,
    json: bool,
    out: &'a mut W,
}

impl<W: Write> Printer<'_, W> {
    fn line(&mut self, text: &str) -> anyhow::Result<()> {
        writeln!(self.out, "{text}")?;
        Ok(())
    }

    /// Print a response either as JSON or through `render`, followed by the
    /// alert it raised.
    fn response<T, F>(&mut self, resp: ApiResponse<T>, render: F) -> anyhow::Result<bool>
    where
        T: Serialize,
        F: FnOnce(&mut Self, T) -> anyhow::Result<()>,
    {
        let ok = resp.is_ok();
        if self.json {
            writeln!(self.out, "{}", serde_json::to_string_pretty(&resp)?)?;
            return Ok(ok);
        }
        if let Some(data) = resp.data {
            render(self, data)?;
        }
        self.alert()?;
        Ok(ok)
    }

    fn alert(&mut self) -> anyhow::Result<()> {
        if let Some(alert) = self.app.alerts.current() {
            let tag = match alert.kind {
                AlertKind::Success => "ok",
                AlertKind::Error => "error",
                AlertKind::Warning => "warning",
                AlertKind::Info => "info",
            };
            writeln!(self.out, "[{tag}] {}: {}", alert.title, alert.message)?;
        }
        self.app.alerts.hide();
        Ok(())
    }

    fn user(&mut self, user: User) -> anyhow::Result<()> {
        writeln!(self.out, "{} <{}>", user.name, user.email)?;
        writeln!(self.out, "  role: {}", user.role)?;
        for (label, value) in [
            ("phone", &user.phone),
            ("gender", &user.gender),
            ("born", &user.date_of_birth),
            ("image", &user.image),
        ] {
            if let Some(value) = value {
                writeln!(self.out, "  {label}: {value}")?;
            }
        }
        Ok(())
    }

    fn medicines(&mut self, results: &[MedicineResult]) -> anyhow::Result<()> {
        let language = self.app.language.language();
        for m in results {
            let mut line = format!("{} ({})", m.display_name(language), m.id);
            if let Some(brand) = m.display_brand(language) {
                line.push_str(&format!(" - {brand}"));
            }
            if let Some(score) = m.similarity.or(m.confidence) {
                line.push_str(&format!(" [{:.0}%]", score * 100.0));
            }
            writeln!(self.out, "{line}")?;
        }
        Ok(())
    }

    fn medicine_detail(&mut self, m: &MedicineResult) -> anyhow::Result<()> {
        let language = self.app.language.language();
        let image_base = self.app.image_base();
        writeln!(self.out, "{} ({})", m.display_name(language), m.id)?;
        if let Some(brand) = m.display_brand(language) {
            writeln!(self.out, "  brand: {brand}")?;
        }
        if let Some(url) = m.image_url(&image_base) {
            writeln!(self.out, "  image: {url}")?;
        }
        if let Some(url) = m.matched_image_url(&image_base) {
            writeln!(self.out, "  matched: {url}")?;
        }
        for (key, value) in &m.extra {
            match value {
                serde_json::Value::String(s) => writeln!(self.out, "  {key}: {s}")?,
                serde_json::Value::Null => {}
                other => writeln!(self.out, "  {key}: {other}")?,
            }
        }
        Ok(())
    }

    fn history(&mut self, entries: &[HistoryEntry]) -> anyhow::Result<()> {
        if entries.is_empty() {
            return self.line("No history yet");
        }
        let language = self.app.language.language();
        for entry in entries {
            let outcome = match (entry.is_successful, entry.top_result()) {
                (true, Some(m)) => m.display_name(language).to_string(),
                (true, None) => "-".to_string(),
                (false, _) => entry
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "failed".to_string()),
            };
            writeln!(
                self.out,
                "{}  {:<6}  {}",
                entry.created_at.format("%Y-%m-%d %H:%M"),
                format!("{:?}", entry.action_type).to_lowercase(),
                outcome
            )?;
        }
        Ok(())
    }

    fn dashboard(
        &mut self,
        profile: ApiResponse<User>,
        history: ApiResponse<Vec<HistoryEntry>>,
        screens: &[Screen],
    ) -> anyhow::Result<bool> {
        let ok = profile.is_ok() && history.is_ok();
        if self.json {
            let value = serde_json::json!({
                "profile": profile,
                "history": history,
                "screens": screens,
            });
            writeln!(self.out, "{}", serde_json::to_string_pretty(&value)?)?;
            return Ok(ok);
        }
        if let Some(user) = profile.data {
            self.user(user)?;
        }
        if let Some(entries) = history.data {
            self.history(&entries)?;
        }
        let names: Vec<String> = screens
            .iter()
            .filter_map(|s| serde_json::to_value(s).ok())
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        writeln!(self.out, "screens: {}", names.join(", "))?;
        self.alert()?;
        Ok(ok)
    }
}
