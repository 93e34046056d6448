use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use lms_core::inbox::{badge_label, sort_newest_first};
use lms_core::model::{AnnouncementId, AssessmentId, CourseId, ResourceId, User, UserId};
use lms_core::{ItemKind, is_eligible_for_certificate};
use services::{AppServices, ClientConfig, Clock, CompletionEvent, ProgressSource};
use tracing_subscriber::{EnvFilter, fmt as log_fmt, layer::SubscriberExt, util::SubscriberInitExt};

const USER_ID_VAR: &str = "LMS_USER_ID";
const USER_NAME_VAR: &str = "LMS_USER_NAME";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArg { what: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidId { what: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    NoLearner,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArg { what } => write!(f, "missing {what}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidId { what, raw } => write!(f, "invalid {what}: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::NoLearner => write!(
                f,
                "no learner: pass --user <id>, set {USER_ID_VAR}, or sign in once with --user"
            ),
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

fn parse_id<T: FromStr>(raw: &str, what: &'static str) -> Result<T, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidId {
        what,
        raw: raw.to_string(),
    })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  lms [options] dashboard");
    eprintln!("  lms [options] courses");
    eprintln!("  lms [options] course <course_id>");
    eprintln!("  lms [options] complete <course_id> <resource_id>");
    eprintln!("  lms [options] quiz <course_id> <assessment_id> <answer>...");
    eprintln!("  lms [options] enroll <course_id>");
    eprintln!("  lms [options] unenroll <course_id>");
    eprintln!("  lms [options] announcements [--mark-read <announcement_id>]");
    eprintln!("  lms [options] notifications [--mark-all]");
    eprintln!("  lms [options] watch");
    eprintln!("  lms [options] logout");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --api <url>        LMS API base URL");
    eprintln!("  --db <sqlite_url>  local cache database");
    eprintln!("  --user <id>        sign in as this learner");
    eprintln!("  --name <name>      display name stored with --user");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LMS_API_BASE_URL, LMS_API_TOKEN, LMS_CACHE_DB_URL,");
    eprintln!("  LMS_POLL_INTERVAL_SECS, LMS_HTTP_TIMEOUT_SECS, {USER_ID_VAR}, {USER_NAME_VAR}");
}

//
// ─── ARGS ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Dashboard,
    Courses,
    Course(CourseId),
    Complete {
        course_id: CourseId,
        resource_id: ResourceId,
    },
    Quiz {
        course_id: CourseId,
        assessment_id: AssessmentId,
        answers: Vec<String>,
    },
    Enroll(CourseId),
    Unenroll(CourseId),
    Announcements {
        mark_read: Option<AnnouncementId>,
    },
    Notifications {
        mark_all: bool,
    },
    Watch,
    Logout,
}

impl Command {
    fn from_parts(
        name: &str,
        positionals: Vec<String>,
        mark_read: Option<AnnouncementId>,
        mark_all: bool,
    ) -> Result<Self, ArgsError> {
        let mut rest = positionals.into_iter();
        let course = |rest: &mut std::vec::IntoIter<String>| {
            let raw = rest.next().ok_or(ArgsError::MissingArg { what: "course id" })?;
            parse_id::<CourseId>(&raw, "course id")
        };

        let command = match name {
            "dashboard" => Self::Dashboard,
            "courses" => Self::Courses,
            "course" => Self::Course(course(&mut rest)?),
            "complete" => {
                let course_id = course(&mut rest)?;
                let raw = rest
                    .next()
                    .ok_or(ArgsError::MissingArg { what: "resource id" })?;
                Self::Complete {
                    course_id,
                    resource_id: parse_id(&raw, "resource id")?,
                }
            }
            "quiz" => {
                let course_id = course(&mut rest)?;
                let raw = rest
                    .next()
                    .ok_or(ArgsError::MissingArg { what: "assessment id" })?;
                let assessment_id = parse_id(&raw, "assessment id")?;
                return Ok(Self::Quiz {
                    course_id,
                    assessment_id,
                    answers: rest.collect(),
                });
            }
            "enroll" => Self::Enroll(course(&mut rest)?),
            "unenroll" => Self::Unenroll(course(&mut rest)?),
            "announcements" => Self::Announcements { mark_read },
            "notifications" => Self::Notifications { mark_all },
            "watch" => Self::Watch,
            "logout" => Self::Logout,
            other => return Err(ArgsError::UnknownCommand(other.to_string())),
        };

        match rest.next() {
            Some(extra) => Err(ArgsError::UnknownArg(extra)),
            None => Ok(command),
        }
    }
}

struct Args {
    api_url: Option<String>,
    db_url: Option<String>,
    user_id: Option<UserId>,
    user_name: Option<String>,
    command: Command,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut api_url = None;
        let mut db_url = None;
        let mut user_id = None;
        let mut user_name = None;
        let mut mark_read = None;
        let mut mark_all = false;
        let mut command = None;
        let mut positionals = Vec::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--api" => api_url = Some(require_value(args, "--api")?),
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = Some(normalize_sqlite_url(value));
                }
                "--user" => {
                    let value = require_value(args, "--user")?;
                    user_id = Some(parse_id(&value, "--user value")?);
                }
                "--name" => user_name = Some(require_value(args, "--name")?),
                "--mark-read" => {
                    let value = require_value(args, "--mark-read")?;
                    mark_read = Some(parse_id(&value, "announcement id")?);
                }
                "--mark-all" => mark_all = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ if command.is_none() => command = Some(arg),
                _ => positionals.push(arg),
            }
        }

        let name = command.unwrap_or_else(|| "dashboard".to_string());
        Ok(Self {
            api_url,
            db_url,
            user_id,
            user_name,
            command: Command::from_parts(&name, positionals, mark_read, mark_all)?,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
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

/// Create the cache file's parent directory so the pool can open it.
fn prepare_cache_dir(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = db_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,services=info,storage=info".into()),
        )
        .with(log_fmt::layer().with_writer(std::io::stderr))
        .init();
}

//
// ─── COMMANDS ─────────────────────────────────────────────────────────────────
//

/// Pick the learner: explicit flag, then environment, then the saved session.
async fn resolve_learner(
    services: &AppServices,
    args: &Args,
    token: Option<&str>,
) -> Result<User, Box<dyn std::error::Error>> {
    let from_env = std::env::var(USER_ID_VAR)
        .ok()
        .map(|raw| parse_id::<UserId>(&raw, USER_ID_VAR))
        .transpose()?;

    let session = services.session();
    let current = session.current();
    let saved = current.user().cloned();
    let saved_token = current.session.as_ref().map(|s| s.token.clone());

    let Some(user_id) = args.user_id.or(from_env) else {
        return saved.ok_or_else(|| ArgsError::NoLearner.into());
    };
    if let Some(user) = saved.filter(|u| u.id == user_id && args.user_name.is_none()) {
        return Ok(user);
    }

    let name = args
        .user_name
        .clone()
        .or_else(|| std::env::var(USER_NAME_VAR).ok())
        .unwrap_or_default();
    let user = User {
        id: user_id,
        name,
        email: None,
        username: None,
        role: Some("student".to_string()),
    };
    // Re-signing in keeps the saved token unless a new one was configured.
    let token = token
        .map(str::to_string)
        .or(saved_token)
        .unwrap_or_default();
    let stored = session.sign_in(user, token).await?;
    Ok(stored.user)
}

fn source_note(source: ProgressSource) -> &'static str {
    match source {
        ProgressSource::Live => "",
        ProgressSource::Cached => " (offline, cached)",
        ProgressSource::Unavailable => " (unavailable)",
    }
}

async fn dashboard(services: &AppServices, learner: &User) -> Result<(), Box<dyn std::error::Error>> {
    let course_ids: Vec<CourseId> = services
        .enrollments()
        .enrolled_course_ids(learner.id)
        .await?
        .into_iter()
        .collect();
    if course_ids.is_empty() {
        println!("Not enrolled in any course.");
        return Ok(());
    }

    let mut rows = services.progress().dashboard(learner.id, &course_ids).await;
    rows.sort_by_key(|row| row.course_id);
    let completion = services.completion();
    for row in rows {
        let title = row
            .course
            .as_ref()
            .map_or_else(|| format!("Course {}", row.course_id), |c| c.title.clone());
        println!(
            "{:>4}  {:<40} {:>3}%  {}/{}{}",
            row.course_id,
            title,
            row.progress.rounded_percentage(),
            row.progress.completed_items,
            row.progress.total_items,
            source_note(row.source),
        );
        if let Some(CompletionEvent::NewlyEligible { course_id }) =
            completion.observe(row.course_id, &row.progress)
        {
            println!("      complete: run `lms course {course_id}` for the certificate");
        }
    }
    Ok(())
}

async fn courses(services: &AppServices, learner: &User) -> Result<(), Box<dyn std::error::Error>> {
    let api = services.api();
    let enrollments = services.enrollments();
    let (catalogue, enrolled) = tokio::join!(
        api.list_courses(),
        enrollments.enrolled_course_ids(learner.id),
    );
    let mut catalogue = catalogue?;
    let enrolled = enrolled?;
    catalogue.sort_by_key(|c| c.id);
    if catalogue.is_empty() {
        println!("No courses published.");
    }
    for course in &catalogue {
        let marker = if enrolled.contains(&course.id) { "*" } else { " " };
        let instructor = course.instructor_name.as_deref().unwrap_or("-");
        println!("{marker} {:>4}  {:<40} {instructor}", course.id, course.title);
    }
    Ok(())
}

async fn course(
    services: &AppServices,
    learner: &User,
    course_id: CourseId,
) -> Result<(), Box<dyn std::error::Error>> {
    let view = services.progress().course_view(learner.id, course_id).await;
    if view.source == ProgressSource::Unavailable && view.items.is_empty() {
        println!("Course {course_id}: progress unavailable right now.");
        return Ok(());
    }

    for item in &view.items {
        let mark = if item.done { "x" } else { " " };
        let label = match item.kind {
            ItemKind::Resource(id) => view
                .resources
                .iter()
                .find(|r| r.id == id)
                .map_or_else(|| format!("resource {id}"), |r| r.title.clone()),
            ItemKind::Assessment(id) => view
                .assessment(id)
                .map_or_else(|| format!("quiz {id}"), |a| format!("Quiz: {}", a.title)),
        };
        println!("[{mark}] {label}");
    }
    println!(
        "{}% complete ({}/{}, {} left){}",
        view.progress.rounded_percentage(),
        view.progress.completed_items,
        view.progress.total_items,
        view.progress.remaining_items(),
        source_note(view.source),
    );

    if is_eligible_for_certificate(&view.progress) {
        let course = services.api().get_course(course_id).await?;
        let certificate = services
            .completion()
            .certificate(&course, learner, &view.progress)?;
        println!();
        println!("Certificate {}", certificate.number);
        println!("  {} completed {}", certificate.learner_name, certificate.course_title);
        if let Some(instructor) = &certificate.instructor_name {
            println!("  instructor: {instructor}");
        }
        println!("  issued {}", certificate.issued_at.format("%Y-%m-%d"));
    }
    Ok(())
}

async fn quiz(
    services: &AppServices,
    learner: &User,
    course_id: CourseId,
    assessment_id: AssessmentId,
    answers: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let progress = services.progress();
    let assessment = progress.assessment(course_id, assessment_id).await?;
    let unanswerable = assessment.unanswerable_questions();
    if !unanswerable.is_empty() {
        eprintln!("note: questions {unanswerable:?} have no correct option and cannot be scored");
    }
    let answers: BTreeMap<usize, String> = answers.into_iter().enumerate().collect();
    let submission = progress
        .submit_quiz(learner.id, course_id, &assessment, &answers)
        .await?;

    let grade = submission.grade;
    let verdict = if grade.passed { "passed" } else { "failed" };
    println!(
        "{}: {}/{} ({:.0}%) {verdict}, attempt {}",
        assessment.title,
        grade.score,
        grade.max_score,
        grade.percentage,
        submission.attempt.attempt_number,
    );
    Ok(())
}

async fn announcements(
    services: &AppServices,
    learner: &User,
    mark_read: Option<AnnouncementId>,
) -> Result<(), Box<dyn std::error::Error>> {
    let feed_service = services.announcements();
    if let Some(id) = mark_read {
        feed_service.mark_read(learner.id, id).await?;
    }

    let enrolled = services.enrollments().enrolled_course_ids(learner.id).await?;
    let feed = feed_service.feed(learner.id, &enrolled).await?;
    if feed.announcements.is_empty() {
        println!("No announcements.");
    }
    for announcement in &feed.announcements {
        let marker = if feed.is_read(announcement.id) { " " } else { "*" };
        println!(
            "{marker} {:>4}  [course {}] {}  ({})",
            announcement.id,
            announcement.course_id,
            announcement.title,
            announcement.created_at.format("%Y-%m-%d %H:%M"),
        );
    }
    Ok(())
}

async fn notifications(
    services: &AppServices,
    learner: &User,
    mark_all: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let notifications = services.notifications();
    let mut list = if mark_all {
        // Fetches the current list itself and mirrors confirmed reads locally.
        let outcome = notifications.mark_all_read(learner.id).await?;
        println!("Marked {} notification(s) read.", outcome.marked.len());
        if !outcome.is_complete() {
            println!("{} could not be marked; try again later.", outcome.failed.len());
        }
        notifications.cached(learner.id).await?
    } else {
        notifications.refresh(learner.id).await?
    };
    sort_newest_first(&mut list);
    if list.is_empty() {
        println!("No notifications.");
    }
    for notification in &list {
        let marker = if notification.is_unread() { "*" } else { " " };
        println!(
            "{marker} {:>4}  {}  ({})",
            notification.id,
            notification.title,
            notification.created_at.format("%Y-%m-%d %H:%M"),
        );
    }
    Ok(())
}

async fn watch(services: &AppServices, learner: &User) -> Result<(), Box<dyn std::error::Error>> {
    let session = services.session();
    let mut updates = session.subscribe();
    let mut poller = services.start_inbox_poller(learner.id);
    eprintln!("Watching inbox every {:?}; Ctrl-C to stop.", poller.period());

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                println!(
                    "announcements: {}  notifications: {}",
                    badge_label(state.unread_announcements).unwrap_or_else(|| "0".into()),
                    badge_label(state.unread_notifications).unwrap_or_else(|| "0".into()),
                );
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    poller.stop().await;
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let mut config = ClientConfig::from_env()?;
    if let Some(api_url) = &args.api_url {
        config = config.with_api_base_url(api_url)?;
    }
    if let Some(db_url) = &args.db_url {
        config = config.with_cache_db_url(db_url.clone());
    }
    prepare_cache_dir(&config.cache_db_url)?;

    let services = AppServices::from_config(&config, Clock::default()).await?;

    if args.command == Command::Logout {
        services.session().sign_out().await?;
        println!("Signed out.");
        return Ok(());
    }

    let learner = resolve_learner(&services, &args, config.api_token.as_deref()).await?;
    tracing::debug!(user_id = %learner.id, command = ?args.command, "running command");

    match args.command {
        Command::Dashboard => dashboard(&services, &learner).await,
        Command::Courses => courses(&services, &learner).await,
        Command::Course(course_id) => course(&services, &learner, course_id).await,
        Command::Complete {
            course_id,
            resource_id,
        } => {
            let progress = services
                .progress()
                .mark_resource_complete(learner.id, course_id, resource_id)
                .await?;
            println!(
                "{}% complete ({}/{})",
                progress.rounded_percentage(),
                progress.completed_items,
                progress.total_items
            );
            if services.completion().observe(course_id, &progress).is_some() {
                println!("Course complete: run `lms course {course_id}` for the certificate.");
            }
            Ok(())
        }
        Command::Quiz {
            course_id,
            assessment_id,
            answers,
        } => quiz(&services, &learner, course_id, assessment_id, answers).await,
        Command::Enroll(course_id) => {
            services.enrollments().enroll(learner.id, course_id).await?;
            println!("Enrolled in course {course_id}.");
            Ok(())
        }
        Command::Unenroll(course_id) => {
            services.enrollments().unenroll(learner.id, course_id).await?;
            println!("Left course {course_id}.");
            Ok(())
        }
        Command::Announcements { mark_read } => {
            announcements(&services, &learner, mark_read).await
        }
        Command::Notifications { mark_all } => notifications(&services, &learner, mark_all).await,
        Command::Watch => watch(&services, &learner).await,
        Command::Logout => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
