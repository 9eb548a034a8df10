#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vidconfig::VidConfig;
use vidshare::reconcile::{confirm, Reconcile};
use vidshare::storage::FileStorage;
use vidshare::types::{
    Attachment, SettingsUpdate, Theme, User, VideoOrder, VideoQuery, VideoUpload, Vote,
};
use vidshare::{Error as VidshareError, Session, SessionState, VidshareClient};

mod render;

#[derive(Parser)]
#[command(name = "vidline", about = "A CLI for the video-sharing site")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and remember the issued credential
    Login {
        /// Defaults to `login.username` from the config
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account
    Register {
        username: String,
        email: String,
        #[arg(long)]
        password: Option<String>,
        /// Defaults to the password
        #[arg(long)]
        confirm_password: Option<String>,
    },
    /// Log out and forget the credential
    Logout,
    /// Show who the stored credential belongs to
    Whoami,
    /// List videos
    List {
        /// Search titles
        #[arg(long)]
        search: Option<String>,
        /// views, created_at, likes or unique_views; prefix with '-' for descending
        #[arg(long)]
        order: Option<VideoOrder>,
        #[arg(long)]
        page: Option<u64>,
        /// Defaults to `display.page_size` from the config
        #[arg(long)]
        page_size: Option<u64>,
        /// Only videos from this channel
        #[arg(long)]
        channel: Option<String>,
    },
    /// Most watched videos of the past week
    Trending,
    /// Videos from channels you subscribe to
    Feed {
        #[arg(long)]
        page: Option<u64>,
    },
    /// Show a channel and its videos
    Channel { username: String },
    /// Your watch history
    History,
    /// Videos you liked
    Liked,
    /// Videos saved for later
    WatchLater,
    /// Show a single video
    Show { id: u64 },
    /// Vote on a video; voting the same way again withdraws the vote
    Vote {
        id: u64,
        /// like or dislike
        vote: Vote,
    },
    /// Add a video to, or remove it from, watch later
    ToggleWatchLater { id: u64 },
    /// Delete one of your videos
    Delete { id: u64 },
    /// Upload a video
    Upload {
        title: String,
        /// Path to the video file
        video: PathBuf,
        #[arg(long, default_value = "")]
        description: String,
        /// Path to a thumbnail image
        #[arg(long)]
        thumbnail: Option<PathBuf>,
    },
    /// Show your profile settings
    Settings,
    /// Update your profile settings; omitted fields keep their current value
    SettingsUpdate {
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        channel_description: Option<String>,
        /// Path to a new profile photo
        #[arg(long)]
        photo: Option<PathBuf>,
    },
    /// List comments on a video
    Comments { id: u64 },
    /// Comment on a video
    Comment {
        id: u64,
        text: String,
        /// Reply to this comment
        #[arg(long)]
        reply_to: Option<u64>,
    },
    /// Like or unlike a comment
    CommentLike {
        /// The video the comment belongs to
        video: u64,
        comment: u64,
    },
    /// Subscribe to, or unsubscribe from, a channel
    Subscribe { username: String },
    /// Show or change the presentation theme
    Theme {
        /// light or dark
        theme: Option<Theme>,
        /// Switch to the other theme
        #[arg(long, conflicts_with = "theme")]
        toggle: bool,
    },
    /// Generate shell completions
    #[command(hide = true)]
    Completions {
        /// The shell to generate completions for
        shell: Shell,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vidline=warn,vidshare=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config() -> Result<VidConfig> {
    VidConfig::load().with_context(|| "Failed to load vidshare config")
}

fn open_session(config: &VidConfig) -> Result<Session> {
    let storage_path = config.storage_path()?;
    tracing::debug!(
        base_url = %config.base_url(),
        storage = %storage_path.display(),
        "opening session"
    );
    let storage = FileStorage::open(&storage_path)
        .with_context(|| format!("Failed to open client storage: {}", storage_path.display()))?;
    let client = VidshareClient::with_storage(config.base_url(), Arc::new(storage))?;
    Ok(Session::new(client))
}

/// Resolves the session and refuses to continue without a logged-in user.
async fn require_user(session: &Session) -> Result<User> {
    match session.resolve().await {
        SessionState::Authenticated(user) => Ok(user),
        _ => Err(anyhow::anyhow!(
            "Not logged in. Run `vidline login` first."
        )),
    }
}

fn read_attachment(path: &Path) -> Result<Attachment> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let file_name = path
        .file_name()
        .map_or_else(|| "upload".to_string(), |name| name.to_string_lossy().into_owned());
    let attachment = Attachment::new(file_name, bytes);
    let mime = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .and_then(|ext| mime_for_extension(&ext));
    Ok(match mime {
        Some(mime) => attachment.with_mime(mime),
        None => attachment,
    })
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    Some(match ext {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => return None,
    })
}

fn handle_error(err: &anyhow::Error) -> ! {
    if let Some(VidshareError::Api {
        status,
        message,
        body,
    }) = err.downcast_ref::<VidshareError>()
    {
        eprintln!(
            "{}",
            render::format_api_error(*status, message, body.as_ref())
        );
        process::exit(1);
    }

    eprintln!("{err:#}");
    process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    if let Err(err) = run(cli).await {
        handle_error(&err);
    }

    Ok(())
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "vidline", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config()?;
    let show_counts = config.display.show_counts;
    let session = open_session(&config)?;
    let client = session.client();

    match cli.command {
        Command::Completions { .. } => {}
        Command::Login { username, password } => {
            let username = config.username(username)?;
            let password = config.password(password)?;
            session.login(&username, &password).await?;
            if let Some(user) = session.state().user() {
                println!("Logged in as {}.", user.username.bold());
            }
        }
        Command::Register {
            username,
            email,
            password,
            confirm_password,
        } => {
            let password = config.password(password)?;
            let confirm_password = confirm_password.unwrap_or_else(|| password.clone());
            session
                .register(&username, &email, &password, &confirm_password)
                .await?;
            println!("Registered and logged in as {}.", username.bold());
        }
        Command::Logout => {
            session.logout().await?;
            println!("Logged out.");
        }
        Command::Whoami => match session.resolve().await {
            SessionState::Authenticated(user) => render::print_user(&user),
            _ => println!("{}", "Not logged in.".dimmed()),
        },
        Command::List {
            search,
            order,
            page,
            page_size,
            channel,
        } => {
            let query = VideoQuery {
                search,
                ordering: order,
                page,
                page_size: page_size.or(Some(config.display.page_size)),
                channel,
            };
            let page = client.list_videos(&query).await?;
            render::print_page(&page, show_counts);
        }
        Command::Trending => {
            render::print_videos(&client.trending().await?, show_counts);
        }
        Command::Feed { page } => {
            require_user(&session).await?;
            let page = client.subscribed_feed(page).await?;
            render::print_page(&page, show_counts);
        }
        Command::Channel { username } => {
            let page = client.list_channel_videos(&username).await?;
            render::print_channel(&page, show_counts);
        }
        Command::History => {
            require_user(&session).await?;
            render::print_videos(&client.history().await?, show_counts);
        }
        Command::Liked => {
            require_user(&session).await?;
            render::print_videos(&client.liked_videos().await?, show_counts);
        }
        Command::WatchLater => {
            require_user(&session).await?;
            render::print_videos(&client.watch_later().await?, show_counts);
        }
        Command::Show { id } => {
            println!("{}", render::format_detail(&client.get_video(id).await?));
        }
        Command::Vote { id, vote } => {
            let video = Mutex::new(client.get_video(id).await?);
            confirm(&video, client.vote_video(id, vote)).await?;
            let video = video.into_inner().unwrap_or_else(|e| e.into_inner());
            println!("{}", render::format_video(&video, true));
        }
        Command::ToggleWatchLater { id } => {
            let video = Mutex::new(client.get_video(id).await?);
            confirm(&video, client.toggle_watch_later(id)).await?;
            let video = video.into_inner().unwrap_or_else(|e| e.into_inner());
            let state = if video.is_watch_later {
                "Saved to watch later"
            } else {
                "Removed from watch later"
            };
            println!("{state}: {}", video.title);
        }
        Command::Delete { id } => {
            let user = require_user(&session).await?;
            let listing = Mutex::new(client.list_channel_videos(&user.username).await?);
            confirm(&listing, client.delete_video(id)).await?;
            let listing = listing.into_inner().unwrap_or_else(|e| e.into_inner());
            println!("Deleted video {id}.");
            render::print_channel(&listing, show_counts);
        }
        Command::Upload {
            title,
            video,
            description,
            thumbnail,
        } => {
            require_user(&session).await?;
            let upload = VideoUpload {
                title,
                description,
                video: read_attachment(&video)?,
                thumbnail: thumbnail.as_deref().map(read_attachment).transpose()?,
            };
            let uploaded = client.upload_video(upload).await?;
            println!("Uploaded video {}.", uploaded.video_id);
        }
        Command::Settings => {
            require_user(&session).await?;
            render::print_settings(&client.settings().await?);
        }
        Command::SettingsUpdate {
            display_name,
            channel_description,
            photo,
        } => {
            require_user(&session).await?;
            let current = client.settings().await?;
            let update = SettingsUpdate {
                display_name: display_name.unwrap_or_else(|| current.display_name.clone()),
                channel_description: channel_description
                    .unwrap_or_else(|| current.channel_description.clone()),
                photo: photo.as_deref().map(read_attachment).transpose()?,
            };
            let settings = Mutex::new(current);
            confirm(&settings, client.update_settings(update)).await?;
            let settings = settings.into_inner().unwrap_or_else(|e| e.into_inner());
            render::print_settings(&settings);
        }
        Command::Comments { id } => {
            render::print_comments(&client.comments(id).await?);
        }
        Command::Comment { id, text, reply_to } => {
            let comment = client.add_comment(id, &text, reply_to).await?;
            render::print_comment(&comment);
        }
        Command::CommentLike { video, comment } => {
            let mut comments = client.comments(video).await?;
            let outcome = client.toggle_comment_like(comment).await?;
            outcome.reconcile_all(&mut comments);
            render::print_comments(&comments);
        }
        Command::Subscribe { username } => {
            let page = Mutex::new(client.list_channel_videos(&username).await?);
            confirm(&page, client.toggle_subscribe(&username)).await?;
            let page = page.into_inner().unwrap_or_else(|e| e.into_inner());
            render::print_channel(&page, show_counts);
        }
        Command::Theme { theme, toggle } => {
            let next = if toggle {
                Some(session.theme().toggled())
            } else {
                theme
            };
            if let Some(next) = next {
                session.set_theme(next);
            }
            println!("{}", session.theme());
        }
    }

    Ok(())
}
