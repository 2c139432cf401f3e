use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use dobro_portal::{
    AppState,
    config::{AppConfig, Env},
    guard::{Guarded, LOADING_PLACEHOLDER},
    handlers,
    models::{Attachment, LoginRequest, RegistrationRequest, Role, VolunteerApplication, VolunteerStatus},
    storage::{FileSessionStore, MemorySessionStore, SessionStoreState},
    views::{self, FundDraft, FundEdit, ReportDraft},
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Cli
///
/// Command-line client for the fundraising platform. Each sub-command is one view of
/// the web client; the profile directory plays the part of the browser's storage.
#[derive(Parser)]
#[command(name = "dobro-portal", version, about)]
struct Cli {
    /// Keep the session in memory only; nothing is read from or written to disk.
    #[arg(long, global = true)]
    ephemeral: bool,

    /// Session directory, overriding PORTAL_PROFILE_DIR.
    #[arg(long, global = true, value_name = "DIR")]
    profile: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and remember the session.
    Login {
        username: String,
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the session.
    Logout,
    /// Show the current session.
    Whoami,
    /// Create an account.
    Register {
        username: String,
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long, value_parser = parse_role)]
        role: Role,
    },
    /// List funds that are collecting (or completed ones).
    Funds {
        #[arg(long)]
        completed: bool,
    },
    /// Show a fund and what you can do with it.
    Fund { id: i64 },
    /// Donate to a fund.
    Donate {
        fund: i64,
        amount: f64,
        #[arg(long)]
        description: Option<String>,
    },
    /// Your donation history.
    Donations,
    /// Completed donations to a fund you manage.
    FundDonations { id: i64 },
    /// Apply as a volunteer for a fund.
    Volunteer {
        fund: i64,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        telegram: String,
        #[arg(long, default_value = "")]
        city: String,
        #[arg(long, default_value = "")]
        message: String,
    },
    /// Volunteer applications received by a fund you manage.
    VolunteerRequests { fund: i64 },
    /// Accept or reject a volunteer application.
    Review {
        fund: i64,
        request: i64,
        decision: Decision,
    },
    /// Spending reports of a fund.
    Reports { fund: i64 },
    /// Publish a spending report for a completed fund.
    Report {
        fund: i64,
        #[arg(long)]
        description: String,
        #[arg(long)]
        total: f64,
        #[arg(long = "expense")]
        expenses: Vec<String>,
        #[arg(long = "purchase")]
        purchases: Vec<String>,
        #[arg(long = "photo")]
        photos: Vec<PathBuf>,
    },
    /// Start a new fund.
    CreateFund {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        target: f64,
        /// Last day of collection, YYYY-MM-DD.
        #[arg(long)]
        end_date: NaiveDate,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long)]
        image: PathBuf,
    },
    /// Change a fund's details. Omitted options keep their current value.
    EditFund {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        target: Option<f64>,
        /// Last day of collection, YYYY-MM-DD.
        #[arg(long)]
        end_date: Option<NaiveDate>,
        #[arg(long)]
        category: Option<String>,
        /// New cover image.
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Delete a fund.
    DeleteFund { id: i64 },
    /// An organizer's profile.
    Organizer { username: String },
    /// Your profile.
    Profile,
    /// Download a fund's cover image.
    FundImage {
        id: i64,
        #[arg(long)]
        out: PathBuf,
    },
    /// Download a report photo.
    Photo {
        fund: i64,
        report: i64,
        photo: i64,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Decision {
    Accept,
    Reject,
}

impl From<Decision> for VolunteerStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Accept => VolunteerStatus::Accepted,
            Decision::Reject => VolunteerStatus::Rejected,
        }
    }
}

fn parse_role(raw: &str) -> Result<Role, String> {
    raw.trim()
        .to_ascii_uppercase()
        .parse()
        .map_err(|e: dobro_portal::models::UnknownRole| e.to_string())
}

/// main
///
/// Entry point: configuration, logging, session restore, then one command.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Configuration (fail-fast in production)
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let mut config = AppConfig::load();
    if let Some(dir) = cli.profile.clone() {
        config.profile_dir = dir;
    }

    // 2. Logging. Output goes to stderr so command output stays clean on stdout.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dobro_portal=debug,reqwest=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
    }

    tracing::debug!(env = ?config.env, api = %config.api_url, "client starting");

    // 3. Session store and unified state
    let store: SessionStoreState = if cli.ephemeral {
        Arc::new(MemorySessionStore::new())
    } else {
        Arc::new(FileSessionStore::new(config.profile_dir.clone()))
    };
    let state = AppState::build(config, store).context("failed to build the HTTP client")?;

    // 4. Resolve Loading before any view is evaluated.
    state.auth.mount();

    run(&state, cli.command).await
}

async fn run(state: &AppState, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login { username, password } => {
            let claims = handlers::login(state, LoginRequest { username, password }).await?;
            println!(
                "Вы вошли как {} ({})",
                claims.display_name.as_deref().unwrap_or(&claims.sub),
                claims.role.label()
            );
        }
        Command::Logout => {
            handlers::logout(state);
            println!("Вы вышли из системы");
        }
        Command::Whoami => {
            let session = handlers::whoami(state);
            match (session.username(), session.role()) {
                (Some(username), role) => println!(
                    "{} (@{}) {}",
                    session.display_name().unwrap_or(username),
                    username,
                    role.map(|r| r.label()).unwrap_or_default()
                ),
                (None, _) => println!("Вы не вошли в систему"),
            }
        }
        Command::Register {
            username,
            password,
            display_name,
            role,
        } => {
            let request = RegistrationRequest {
                username,
                display_name,
                password,
                role,
            };
            handlers::register(state, request).await?;
            println!("Регистрация прошла успешно. Теперь войдите в систему.");
        }
        Command::Funds { completed } => {
            let funds = handlers::funds(state, completed).await?;
            if funds.is_empty() {
                println!("Фондов пока нет");
            }
            for fund in &funds {
                println!("{}", views::fund_line(fund));
            }
        }
        Command::Fund { id } => {
            emit(handlers::fund_details(state, id).await?, |view| print!("{view}"));
        }
        Command::Donate {
            fund,
            amount,
            description,
        } => {
            let donation = handlers::donate(state, fund, amount, description.as_deref()).await?;
            emit(donation, |donation| match donation.confirmation_url {
                Some(url) => println!("Перейдите для оплаты: {url}"),
                None => println!("Пожертвование #{} создано", donation.id),
            });
        }
        Command::Donations => {
            emit(handlers::donation_history(state).await?, |donations| {
                for donation in &donations {
                    println!("{}", views::donation_line(donation));
                }
            });
        }
        Command::FundDonations { id } => {
            emit(handlers::fund_donations(state, id).await?, |(fund, donations)| {
                println!("{}", fund.title);
                for donation in &donations {
                    println!("{}", views::donation_line(donation));
                }
            });
        }
        Command::Volunteer {
            fund,
            email,
            telegram,
            city,
            message,
        } => {
            let application = VolunteerApplication {
                email,
                telegram,
                city,
                message,
            };
            emit(handlers::apply_volunteer(state, fund, application).await?, |request| {
                println!("Заявка #{} отправлена", request.id)
            });
        }
        Command::VolunteerRequests { fund } => {
            emit(handlers::fund_volunteer_requests(state, fund).await?, |(fund, requests)| {
                println!("{}", fund.title);
                for request in &requests {
                    println!("{}", views::volunteer_request_line(request));
                }
            });
        }
        Command::Review {
            fund,
            request,
            decision,
        } => {
            let reviewed =
                handlers::review_volunteer_request(state, fund, request, decision.into()).await?;
            emit(reviewed, |request| println!("{}", views::volunteer_request_line(&request)));
        }
        Command::Reports { fund } => {
            for report in handlers::fund_reports(state, fund).await? {
                for line in views::report_lines(&report) {
                    println!("{line}");
                }
            }
        }
        Command::Report {
            fund,
            description,
            total,
            expenses,
            purchases,
            photos,
        } => {
            let mut attachments = Vec::with_capacity(photos.len());
            for path in &photos {
                attachments.push(read_attachment(path).await?);
            }
            let draft = ReportDraft {
                description,
                total_spent: total,
                expenses,
                purchases,
            };
            emit(handlers::create_report(state, fund, draft, attachments).await?, |report| {
                println!("Отчет #{} опубликован", report.id)
            });
        }
        Command::CreateFund {
            title,
            description,
            target,
            end_date,
            category,
            image,
        } => {
            let image = read_attachment(&image).await?;
            let draft = FundDraft {
                title,
                description,
                target_amount: target,
                end_date,
                category,
            };
            let today = Utc::now().date_naive();
            emit(handlers::create_fund(state, draft, image, today).await?, |fund| {
                println!("Фонд #{} успешно создан", fund.id)
            });
        }
        Command::EditFund {
            id,
            title,
            description,
            target,
            end_date,
            category,
            image,
        } => {
            let image = match image {
                Some(path) => Some(read_attachment(&path).await?),
                None => None,
            };
            let edit = FundEdit {
                title,
                description,
                target_amount: target,
                end_date,
                category,
            };
            let today = Utc::now().date_naive();
            emit(handlers::update_fund(state, id, edit, image, today).await?, |fund| {
                println!("Фонд #{} обновлен", fund.id)
            });
        }
        Command::DeleteFund { id } => {
            emit(handlers::delete_fund(state, id).await?, |()| println!("Фонд удален"));
        }
        Command::Organizer { username } => {
            emit(handlers::organizer(state, &username).await?, |organizer| {
                println!(
                    "{} (@{})",
                    organizer.display_name.as_deref().unwrap_or(&organizer.username),
                    organizer.username
                );
                for fund in &organizer.funds {
                    println!("{}", views::fund_line(fund));
                }
            });
        }
        Command::Profile => {
            emit(handlers::profile(state).await?, |page| {
                print!("{}", page.view);
                for fund in page.own_funds.iter().flatten() {
                    println!("{}", views::fund_line(fund));
                }
                for request in page.volunteer_requests.iter().flatten() {
                    println!("{}", views::volunteer_request_line(request));
                }
                for donation in page.donations.iter().flatten() {
                    println!("{}", views::donation_line(donation));
                }
            });
        }
        Command::FundImage { id, out } => {
            let bytes = handlers::fund_image(state, id).await?;
            tokio::fs::write(&out, bytes)
                .await
                .with_context(|| format!("failed to write {}", out.display()))?;
        }
        Command::Photo {
            fund,
            report,
            photo,
            out,
        } => {
            let bytes = handlers::report_photo(state, fund, report, photo).await?;
            tokio::fs::write(&out, bytes)
                .await
                .with_context(|| format!("failed to write {}", out.display()))?;
        }
    }
    Ok(())
}

/// Prints a guarded view: the placeholder, the login redirect, or the content.
fn emit<T>(guarded: Guarded<T>, show: impl FnOnce(T)) {
    match guarded {
        Guarded::Placeholder => println!("{LOADING_PLACEHOLDER}"),
        Guarded::Redirect { from, .. } => {
            println!("Требуется вход: выполните `dobro-portal login` и повторите ({from})")
        }
        Guarded::Content(value) => show(value),
    }
}

async fn read_attachment(path: &Path) -> anyhow::Result<Attachment> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let content_type = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    };

    Ok(Attachment {
        file_name,
        content_type: content_type.to_string(),
        data,
    })
}
