use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

// =============================================================================
// ACCOUNTS
// =============================================================================

/// A user as reported by the auth endpoints.
///
/// Login and register only return `id` and `username`; `me` adds the profile
/// fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<u64>,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub channel_description: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl User {
    /// A user known only by name.
    #[must_use]
    pub fn named(username: impl Into<String>) -> Self {
        Self {
            id: None,
            username: username.into(),
            email: None,
            display_name: None,
            channel_description: None,
            photo_url: None,
        }
    }
}

/// Response of login and register.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub success: bool,
    pub user: Option<User>,
    /// Bearer credential issued by the server
    pub access_token: Option<String>,
}

/// Response of `me`. This is the only source of identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub user: Option<User>,
}

impl Identity {
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.user
            .as_ref()
            .filter(|_| self.authenticated)
            .map(|user| user.username.as_str())
    }
}

/// Profile settings for the logged-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub channel_description: String,
    #[serde(default)]
    pub photo_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SettingsEnvelope {
    pub settings: Settings,
}

/// Profile update sent as a multipart form.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub display_name: String,
    pub channel_description: String,
    /// Optional new profile photo
    pub photo: Option<Attachment>,
}

// =============================================================================
// VIDEOS
// =============================================================================

/// A viewer's vote on a video. "No vote" is represented as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Vote {
    Like,
    Dislike,
}

impl Vote {
    /// Value of the `vote` form field.
    #[must_use]
    pub const fn as_param(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
        }
    }
}

impl From<Vote> for i8 {
    fn from(vote: Vote) -> Self {
        match vote {
            Vote::Like => 1,
            Vote::Dislike => -1,
        }
    }
}

impl TryFrom<i8> for Vote {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Like),
            -1 => Ok(Self::Dislike),
            other => Err(format!("invalid vote value: {other}")),
        }
    }
}

impl FromStr for Vote {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" | "up" => Ok(Self::Like),
            "dislike" | "down" => Ok(Self::Dislike),
            other => Err(format!("invalid vote '{other}', expected like or dislike")),
        }
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

/// Reads a wire vote where `null` and `0` both mean "no vote".
pub(crate) fn vote_value<'de, D>(deserializer: D) -> Result<Option<Vote>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<i8>::deserialize(deserializer)? {
        None | Some(0) => Ok(None),
        Some(value) => Vote::try_from(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// A video record. Detail responses also carry `user_vote` and
/// `is_watch_later`; history and watch-later listings carry `watched_at` and
/// `saved_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub video_url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub streaming_url: Option<String>,
    #[serde(default)]
    pub optimized_url: Option<String>,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub unique_views: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub dislikes: u64,
    /// Username of the uploader
    pub channel: String,
    #[serde(default)]
    pub subscriber_count: u64,
    #[serde(default)]
    pub is_subscribed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, deserialize_with = "vote_value")]
    pub user_vote: Option<Vote>,
    #[serde(default)]
    pub is_watch_later: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub watched_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub saved_at: Option<OffsetDateTime>,
}

/// A page of a paginated listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// An unpaginated listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing<T> {
    pub results: Vec<T>,
}

/// A channel page: the uploader's videos plus subscription state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelVideos {
    pub channel: String,
    #[serde(default)]
    pub subscriber_count: u64,
    #[serde(default)]
    pub is_subscribed: bool,
    pub results: Vec<Video>,
}

/// Field a listing can be sorted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Views,
    CreatedAt,
    Likes,
    UniqueViews,
}

impl SortKey {
    pub const VALUES: &'static [&'static str] = &["views", "created_at", "likes", "unique_views"];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Views => "views",
            Self::CreatedAt => "created_at",
            Self::Likes => "likes",
            Self::UniqueViews => "unique_views",
        }
    }
}

/// Listing order, e.g. `-views` for most viewed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoOrder {
    pub key: SortKey,
    pub descending: bool,
}

impl FromStr for VideoOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (descending, name) = s
            .strip_prefix('-')
            .map_or((false, s), |rest| (true, rest));
        let key = match name {
            "views" => SortKey::Views,
            "created_at" => SortKey::CreatedAt,
            "likes" => SortKey::Likes,
            "unique_views" => SortKey::UniqueViews,
            _ => {
                return Err(format!(
                    "invalid ordering '{s}', expected one of: {} (optionally prefixed with '-')",
                    SortKey::VALUES.join(", ")
                ))
            }
        };
        Ok(Self { key, descending })
    }
}

impl fmt::Display for VideoOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            f.write_str("-")?;
        }
        f.write_str(self.key.as_str())
    }
}

/// Filters for the main video listing.
#[derive(Debug, Clone, Default)]
pub struct VideoQuery {
    /// Title search
    pub search: Option<String>,
    pub ordering: Option<VideoOrder>,
    /// Page number (1-indexed)
    pub page: Option<u64>,
    /// Results per page (server caps at 50)
    pub page_size: Option<u64>,
    /// Only videos from this channel (case-insensitive)
    pub channel: Option<String>,
}

impl VideoQuery {
    pub(crate) fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            self.search.clone().map(|s| ("search", s)),
            self.ordering.map(|o| ("ordering", o.to_string())),
            self.page.map(|p| ("page", p.to_string())),
            self.page_size.map(|p| ("page_size", p.to_string())),
            self.channel.clone().map(|c| ("channel", c)),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// A file to attach to a multipart form.
#[derive(Clone, Default)]
pub struct Attachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// MIME type, if known
    pub mime: Option<String>,
}

impl Attachment {
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
            mime: None,
        }
    }

    #[must_use]
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    pub(crate) fn into_part(self) -> Result<reqwest::multipart::Part, reqwest::Error> {
        let part = reqwest::multipart::Part::bytes(self.bytes).file_name(self.file_name);
        match self.mime {
            Some(mime) => part.mime_str(&mime),
            None => Ok(part),
        }
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .field("mime", &self.mime)
            .finish()
    }
}

/// A new video sent as a multipart form.
#[derive(Debug, Clone)]
pub struct VideoUpload {
    pub title: String,
    pub description: String,
    pub video: Attachment,
    pub thumbnail: Option<Attachment>,
}

/// Response of a successful upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Uploaded {
    #[serde(default)]
    pub success: bool,
    pub video_id: u64,
}

// =============================================================================
// COMMENTS
// =============================================================================

/// A comment. Top-level comments carry one level of replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub video_id: u64,
    #[serde(default)]
    pub parent_id: Option<u64>,
    pub text: String,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub liked: bool,
    pub author: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub replies: Vec<Comment>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewComment<'a> {
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommentPosted {
    pub comment: Comment,
}

// =============================================================================
// PRESENTATION
// =============================================================================

/// Light or dark presentation. Has no security relevance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(format!("invalid theme '{other}', expected light or dark")),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
