use std::fmt;

use learn_core::model::{LessonId, MilestoneWeights, PostId, SubjectId, UserId};

const DEFAULT_DB_URL: &str = "sqlite://dev.sqlite3";
const DEFAULT_USER_ID: &str = "00000000-0000-0000-0000-000000000001";
const DEFAULT_TUTOR_SUBJECT: &str = "dsa";

#[derive(Debug, PartialEq, Eq)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { name: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidDbUrl { raw: String },
    InvalidId { flag: &'static str, raw: String },
    InvalidWeights { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { name } => write!(f, "missing <{name}>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidWeights { raw } => {
                write!(f, "invalid --weights value (expected c/v/q summing to 100): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_id<T: std::str::FromStr>(flag: &'static str, raw: &str) -> Result<T, ArgsError> {
    raw.trim().parse().map_err(|_| ArgsError::InvalidId {
        flag,
        raw: raw.to_owned(),
    })
}

fn parse_weights(raw: &str) -> Result<MilestoneWeights, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidWeights {
        raw: raw.to_owned(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Lessons {
        subject: Option<SubjectId>,
    },
    View {
        lesson: LessonId,
    },
    WatchVideo {
        lesson: LessonId,
        url: String,
    },
    Quiz {
        lesson: LessonId,
        answers: Vec<String>,
    },
    Dashboard {
        follow: bool,
    },
    Discuss {
        lesson: LessonId,
        text: Option<String>,
        reply_to: Option<PostId>,
    },
    Tutor {
        subject: String,
        question: String,
    },
    Profile {
        username: Option<String>,
        email: Option<String>,
    },
    Seed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub db_url: String,
    pub user: UserId,
    pub weights: MilestoneWeights,
    pub command: Command,
}

/// Environment defaults, kept separate so parsing can be tested.
#[derive(Debug, Clone, Default)]
pub struct Env {
    pub db_url: Option<String>,
    pub user_id: Option<String>,
    pub weights: Option<String>,
}

impl Env {
    pub fn from_process() -> Self {
        Self {
            db_url: std::env::var("LEARN_DB_URL").ok(),
            user_id: std::env::var("LEARN_USER_ID").ok(),
            weights: std::env::var("LEARN_PROGRESS_WEIGHTS").ok(),
        }
    }
}

impl Args {
    /// Parse `argv` (without the program name). Flags may appear anywhere
    /// and win over the environment. `Ok(None)` means help was requested.
    pub fn parse(
        argv: impl IntoIterator<Item = String>,
        env: &Env,
    ) -> Result<Option<Self>, ArgsError> {
        let mut db_url = env
            .db_url
            .clone()
            .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
        let mut user: UserId = parse_id(
            "LEARN_USER_ID",
            env.user_id.as_deref().unwrap_or(DEFAULT_USER_ID),
        )?;
        let mut weights = env
            .weights
            .as_deref()
            .map(parse_weights)
            .transpose()?
            .unwrap_or_default();
        let mut subject: Option<String> = None;
        let mut reply_to: Option<PostId> = None;
        let mut follow = false;
        let mut username: Option<String> = None;
        let mut email: Option<String> = None;
        let mut positional: Vec<String> = Vec::new();

        let mut args = argv.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    let value = require_value(&mut args, "--user")?;
                    user = parse_id("--user", &value)?;
                }
                "--weights" => {
                    let value = require_value(&mut args, "--weights")?;
                    weights = parse_weights(&value)?;
                }
                "--subject" => subject = Some(require_value(&mut args, "--subject")?),
                "--reply-to" => {
                    let value = require_value(&mut args, "--reply-to")?;
                    reply_to = Some(parse_id("--reply-to", &value)?);
                }
                "--follow" => follow = true,
                "--name" => username = Some(require_value(&mut args, "--name")?),
                "--email" => email = Some(require_value(&mut args, "--email")?),
                "--help" | "-h" => return Ok(None),
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let name = positional.next().ok_or(ArgsError::MissingArgument {
            name: "command",
        })?;
        let mut lesson = || -> Result<LessonId, ArgsError> {
            let raw = positional
                .next()
                .ok_or(ArgsError::MissingArgument { name: "lesson" })?;
            parse_id("<lesson>", &raw)
        };

        let command = match name.as_str() {
            "lessons" => Command::Lessons {
                subject: subject
                    .as_deref()
                    .map(|raw| parse_id("--subject", raw))
                    .transpose()?,
            },
            "view" => Command::View { lesson: lesson()? },
            "watch-video" => {
                let lesson = lesson()?;
                let url = positional
                    .next()
                    .ok_or(ArgsError::MissingArgument { name: "url" })?;
                Command::WatchVideo { lesson, url }
            }
            "quiz" => {
                let lesson = lesson()?;
                Command::Quiz {
                    lesson,
                    answers: positional.collect(),
                }
            }
            "dashboard" => Command::Dashboard { follow },
            "discuss" => {
                let lesson = lesson()?;
                let text: Vec<String> = positional.collect();
                Command::Discuss {
                    lesson,
                    text: (!text.is_empty()).then(|| text.join(" ")),
                    reply_to,
                }
            }
            "tutor" => {
                let question: Vec<String> = positional.collect();
                if question.is_empty() {
                    return Err(ArgsError::MissingArgument { name: "question" });
                }
                Command::Tutor {
                    subject: subject.unwrap_or_else(|| DEFAULT_TUTOR_SUBJECT.into()),
                    question: question.join(" "),
                }
            }
            "profile" => Command::Profile { username, email },
            "seed" => Command::Seed,
            _ => return Err(ArgsError::UnknownCommand(name)),
        };

        Ok(Some(Self {
            db_url,
            user,
            weights,
            command,
        }))
    }
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  learn [options] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  lessons [--subject <id>]          List lessons with your completion");
    eprintln!("  view <lesson>                     Show a lesson and record the visit");
    eprintln!("  watch-video <lesson> <url>        Record a watched video");
    eprintln!("  quiz <lesson> <answers...>        Answer the lesson quiz in order (- skips)");
    eprintln!("  dashboard [--follow]              Show stats; --follow keeps refreshing");
    eprintln!("  discuss <lesson> [<text>]         List posts, or post text");
    eprintln!("          [--reply-to <post>]       Reply to an existing post");
    eprintln!("  tutor [--subject <name>] <text>   Ask the AI tutor (default subject: dsa)");
    eprintln!("  profile [--name <username>]       Show or update your profile");
    eprintln!("          [--email <address>]       Set your email (new profiles take its name)");
    eprintln!("  seed                              Load the demo catalog");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>                 SQLite URL (default: {DEFAULT_DB_URL})");
    eprintln!("  --user <uuid>                     Learner id");
    eprintln!("  --weights <c/v/q>                 Milestone weights (default: 30/30/40)");
    eprintln!("  -h, --help                        Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LEARN_DB_URL, LEARN_USER_ID, LEARN_PROGRESS_WEIGHTS,");
    eprintln!("  LEARN_AI_API_KEY, LEARN_AI_BASE_URL, LEARN_AI_MODEL, RUST_LOG");
}

pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}
