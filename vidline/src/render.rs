use colored::{Color, Colorize};
use std::fmt::Write;
use time::macros::format_description;
use time::OffsetDateTime;
use vidshare::types::{ChannelVideos, Comment, Page, Settings, User, Video, Vote};

pub fn format_time(at: OffsetDateTime) -> String {
    at.format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .unwrap_or_else(|_| at.to_string())
}

fn vote_marker(vote: Option<Vote>) -> String {
    match vote {
        Some(Vote::Like) => "▲".color(Color::Green).to_string(),
        Some(Vote::Dislike) => "▼".color(Color::Red).to_string(),
        None => " ".to_string(),
    }
}

pub fn format_video(video: &Video, show_counts: bool) -> String {
    let saved = if video.is_watch_later { "★" } else { " " };
    let id = format!("{:>6}", video.id);
    let mut line = format!(
        "{} {} {} {:40} {}",
        id.bold(),
        vote_marker(video.user_vote),
        saved.color(Color::Yellow),
        video.title,
        video.channel.color(Color::Cyan)
    );
    if show_counts {
        let _ = write!(
            line,
            "  {} views, {} 👍 {} 👎",
            video.views, video.likes, video.dislikes
        );
    }
    if let Some(at) = video.watched_at {
        let _ = write!(line, "  watched {}", format_time(at));
    }
    if let Some(at) = video.saved_at {
        let _ = write!(line, "  saved {}", format_time(at));
    }
    line
}

pub fn format_detail(video: &Video) -> String {
    let mut out = format!("{}\n", video.title.bold());
    let subscribed = if video.is_subscribed {
        " (subscribed)"
    } else {
        ""
    };
    let _ = writeln!(
        out,
        "by {} · {} subscribers{subscribed}",
        video.channel.color(Color::Cyan),
        video.subscriber_count
    );
    let _ = writeln!(
        out,
        "{} views ({} unique) · {} likes · {} dislikes · uploaded {}",
        video.views,
        video.unique_views,
        video.likes,
        video.dislikes,
        format_time(video.created_at)
    );
    let vote = video.user_vote.map_or("none", Vote::as_param);
    let _ = writeln!(
        out,
        "your vote: {vote} · watch later: {}",
        if video.is_watch_later { "yes" } else { "no" }
    );
    if !video.description.is_empty() {
        let _ = writeln!(out, "\n{}", video.description);
    }
    let _ = write!(
        out,
        "\n{}",
        video.streaming_url.as_deref().unwrap_or(&video.video_url)
    );
    out
}

pub fn print_videos(videos: &[Video], show_counts: bool) {
    if videos.is_empty() {
        println!("{}", "No videos.".dimmed());
    }
    for video in videos {
        println!("{}", format_video(video, show_counts));
    }
}

pub fn print_page(page: &Page<Video>, show_counts: bool) {
    print_videos(&page.results, show_counts);
    let mut footer = format!("{} total", page.count);
    if page.previous.is_some() {
        footer.push_str(" · has previous page");
    }
    if page.next.is_some() {
        footer.push_str(" · has next page");
    }
    println!("{}", footer.dimmed());
}

pub fn print_channel(page: &ChannelVideos, show_counts: bool) {
    let state = if page.is_subscribed {
        "subscribed".color(Color::Green)
    } else {
        "not subscribed".dimmed()
    };
    println!(
        "{} · {} subscribers · {state}",
        page.channel.bold(),
        page.subscriber_count
    );
    print_videos(&page.results, show_counts);
}

fn format_comment(comment: &Comment, depth: usize) -> String {
    let indent = "    ".repeat(depth);
    let heart = if comment.liked {
        "♥".color(Color::Red).to_string()
    } else {
        "♡".to_string()
    };
    format!(
        "{indent}[{}] {} {} {heart} {}\n{indent}    {}",
        comment.id,
        comment.author.color(Color::Cyan),
        format_time(comment.created_at).dimmed(),
        comment.likes,
        comment.text
    )
}

pub fn print_comments(comments: &[Comment]) {
    if comments.is_empty() {
        println!("{}", "No comments yet.".dimmed());
    }
    for comment in comments {
        println!("{}", format_comment(comment, 0));
        for reply in &comment.replies {
            println!("{}", format_comment(reply, 1));
        }
    }
}

pub fn print_comment(comment: &Comment) {
    println!("{}", format_comment(comment, 0));
}

pub fn print_user(user: &User) {
    let name = user.display_name.as_deref().unwrap_or(&user.username);
    println!("{} ({})", name.bold(), user.username);
    if let Some(email) = user.email.as_deref().filter(|e| !e.is_empty()) {
        println!("{email}");
    }
}

pub fn print_settings(settings: &Settings) {
    println!("username:            {}", settings.username);
    println!("email:               {}", settings.email);
    println!("display name:        {}", settings.display_name);
    println!("channel description: {}", settings.channel_description);
    println!("photo:               {}", settings.photo_url);
}

/// Renders a non-success API response, listing field errors when the body
/// carries them.
pub fn format_api_error(status: u16, message: &str, body: Option<&serde_json::Value>) -> String {
    let mut output = format!("API error ({status}): {message}");

    let Some(fields) = body.and_then(serde_json::Value::as_object) else {
        return output;
    };
    let mut lines = Vec::new();
    for (key, val) in fields {
        if matches!(key.as_str(), "error" | "detail" | "success") {
            continue;
        }
        if let Some(arr) = val.as_array() {
            for item in arr {
                if let Some(text) = item.as_str() {
                    lines.push(format!("{key}: {}", text.replace('\n', " ")));
                } else {
                    lines.push(format!("{key}: {item}"));
                }
            }
        } else if let Some(text) = val.as_str() {
            lines.push(format!("{key}: {}", text.replace('\n', " ")));
        }
    }
    for line in lines {
        let _ = write!(output, "\n  - {line}");
    }
    output
}
