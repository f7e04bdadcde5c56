//! Purpose: `yuyu` CLI entry point and argument surface.
//! Role: Binary crate root; parses args, builds the client, delegates to dispatch.
//! Invariants: Command output goes to stdout; diagnostics and notices go to stderr.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.

use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

use yuyu::api::{Error, ErrorKind, to_exit_code};
use yuyu::notice::{Notice, NoticeSink, notice_json};

mod command_dispatch;
mod config_paths;

const DEFAULT_API_URL: &str = "http://localhost:8081/api";

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage).with_message(clap_error_summary(&err)),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    let state_dir = cli.dir.unwrap_or_else(config_paths::default_state_dir);
    let api_url = cli
        .api_url
        .or_else(|| std::env::var("YUYU_API_URL").ok())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    command_dispatch::dispatch_command(cli.command, &state_dir, &api_url, color_mode)
        .map_err(|err| (err, color_mode))
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid arguments");
    first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string()
}

#[derive(Parser)]
#[command(
    name = "yuyu",
    version,
    about = "Command-line client for the Yuyu video-sharing platform",
    after_help = r#"EXAMPLES
  $ yuyu login alice secret
  $ yuyu video list --sort views
  $ yuyu video upload --title "First catch" --file clip.mp4 --cover cover.png
  $ yuyu notify watch

  $ yuyu <command> --help"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        help = "State directory for the stored credential (default: ~/.yuyu)",
        value_hint = ValueHint::DirPath
    )]
    dir: Option<PathBuf>,
    #[arg(
        long,
        help = "Platform API base url (default: $YUYU_API_URL or http://localhost:8081/api)"
    )]
    api_url: Option<String>,
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SortArg {
    Latest,
    Views,
    Popularity,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Create an account (request a code with `yuyu send-code` first)")]
    Register {
        username: String,
        email: String,
        password: String,
        #[arg(long, help = "Email verification code")]
        code: String,
    },
    #[command(about = "Log in and store the credential")]
    Login { username: String, password: String },
    #[command(about = "Log out and discard the stored credential")]
    Logout,
    #[command(about = "Show the logged-in profile")]
    Whoami {
        #[arg(long)]
        json: bool,
    },
    #[command(about = "Claim the daily fish-coin reward")]
    Claim,
    #[command(name = "send-code", about = "Email a registration verification code")]
    SendCode { email: String },
    #[command(about = "Change the account password")]
    Passwd {
        #[arg(long)]
        old: String,
        #[arg(long)]
        new: String,
    },
    #[command(about = "Update profile fields")]
    Profile {
        #[arg(long)]
        nickname: Option<String>,
        #[arg(long)]
        bio: Option<String>,
    },
    #[command(about = "Upload a new avatar image")]
    Avatar { image: PathBuf },
    #[command(about = "Look up users", arg_required_else_help = true)]
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
    #[command(about = "Browse, upload, and manage videos", arg_required_else_help = true)]
    Video {
        #[command(subcommand)]
        command: VideoCommand,
    },
    #[command(about = "Read and write comments", arg_required_else_help = true)]
    Comment {
        #[command(subcommand)]
        command: CommentCommand,
    },
    #[command(about = "Notification center", arg_required_else_help = true)]
    Notify {
        #[command(subcommand)]
        command: NotifyCommand,
    },
    #[command(about = "Generate shell completions")]
    Completion { shell: Shell },
}

#[derive(Subcommand)]
enum UserCommand {
    #[command(about = "Show a public profile")]
    Show {
        username: String,
        #[arg(long)]
        json: bool,
    },
    #[command(about = "List a user's videos")]
    Videos {
        user_id: u64,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        size: u32,
        #[arg(long)]
        json: bool,
    },
    #[command(about = "Search users")]
    Search {
        query: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        size: u32,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum VideoCommand {
    #[command(about = "List videos")]
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        size: u32,
        #[arg(long, default_value = "latest", value_enum)]
        sort: SortArg,
        #[arg(long)]
        json: bool,
    },
    #[command(about = "Search videos")]
    Search {
        query: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        size: u32,
        #[arg(long)]
        json: bool,
    },
    #[command(about = "Show one video")]
    Show {
        id: u64,
        #[arg(long)]
        json: bool,
    },
    #[command(about = "Upload a video with its cover image")]
    Upload {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, value_hint = ValueHint::FilePath)]
        file: PathBuf,
        #[arg(long, value_hint = ValueHint::FilePath)]
        cover: PathBuf,
    },
    #[command(about = "Edit a video's title or description")]
    Edit {
        id: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    #[command(about = "Delete a video")]
    Delete { id: u64 },
    #[command(about = "Feed a fish to a video (reward)")]
    Feed { id: u64 },
}

#[derive(Subcommand)]
enum CommentCommand {
    #[command(about = "List a video's comments")]
    List {
        video_id: u64,
        #[arg(long)]
        json: bool,
    },
    #[command(about = "Comment on a video")]
    Post { video_id: u64, content: String },
    #[command(about = "Delete a comment")]
    Delete { comment_id: u64 },
}

#[derive(Subcommand)]
enum NotifyCommand {
    #[command(about = "List notifications")]
    List {
        #[arg(long)]
        json: bool,
    },
    #[command(about = "Mark one notification read")]
    Read { id: u64 },
    #[command(name = "read-all", about = "Mark every notification read")]
    ReadAll,
    #[command(about = "Poll for notifications until interrupted")]
    Watch {
        #[arg(long, default_value_t = 30, help = "Poll interval in seconds")]
        interval: u64,
    },
}

#[derive(Copy, Clone)]
enum AnsiColor {
    Red,
    Yellow,
}

impl AnsiColor {
    fn code(self) -> &'static str {
        match self {
            AnsiColor::Red => "31",
            AnsiColor::Yellow => "33",
        }
    }
}

fn colorize_label(label: &str, use_color: bool, color: AnsiColor) -> String {
    if use_color {
        format!("\x1b[{}m{label}\x1b[0m", color.code())
    } else {
        label.to_string()
    }
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        let label = colorize_label("error:", color_mode.use_color(is_tty), AnsiColor::Red);
        let message = err.message().unwrap_or("unknown error");
        eprintln!("{label} {message}");
        if let Some(hint) = err.hint() {
            eprintln!("  {hint}");
        }
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    if let Some(message) = err.message() {
        inner.insert("message".to_string(), json!(message));
    }
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(code) = err.code() {
        inner.insert("code".to_string(), json!(code));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

/// Notice sink for the CLI: a colored one-liner on a TTY, a JSON line otherwise.
struct CliNotices {
    color_mode: ColorMode,
}

impl NoticeSink for CliNotices {
    fn emit(&self, notice: Notice) {
        let is_tty = io::stderr().is_terminal();
        if is_tty {
            let label = colorize_label("notice:", self.color_mode.use_color(is_tty), AnsiColor::Yellow);
            eprintln!("{label} {} ({})", notice.message, notice.op);
            return;
        }

        let value = notice_json(&notice);
        let json = serde_json::to_string(&value).unwrap_or_else(|_| {
            "{\"notice\":{\"kind\":\"error\",\"message\":\"json encode failed\"}}".to_string()
        });
        eprintln!("{json}");
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}
