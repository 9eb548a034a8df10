//! Async client core for the video-sharing API.
//!
//! [`VidshareClient`] dispatches every request. It attaches the stored bearer
//! credential, negotiates a fresh anti-forgery token before each mutating call
//! and folds every non-success response into [`Error::Api`].
//! [`session::Session`] tracks who is logged in on top of it, and
//! [`reconcile`] applies confirmed responses to locally displayed entities.

pub mod csrf;
pub mod reconcile;
pub mod session;
pub mod storage;
pub mod types;

use crate::csrf::{CSRF_HEADER, CSRF_PATH};
use crate::reconcile::{
    CommentLikeOutcome, Deleted, SettingsOutcome, SubscriptionOutcome, VoteOutcome,
    WatchLaterOutcome,
};
use crate::storage::{ClientStorage, CredentialStore, MemoryStorage};
use crate::types::{
    ChannelVideos, Comment, CommentPosted, Listing, NewComment, Page, Settings, SettingsEnvelope,
    SettingsUpdate, Uploaded, Video, VideoQuery, VideoUpload, Vote,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::cookie::Jar;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::Form;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

pub use session::{Session, SessionState};

/// Characters left alone when a path segment is URI-encoded.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request never produced a response.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("{message}")]
    Api {
        status: u16,
        message: String,
        body: Option<Value>,
    },
    #[error("unexpected response payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("server did not set the `{0}` anti-forgery cookie")]
    MissingCsrfCookie(&'static str),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// HTTP status for failures the server answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Request payload.
#[derive(Debug, Default)]
pub enum Body {
    #[default]
    Empty,
    Json(Value),
    Form(Vec<(&'static str, String)>),
    Multipart(Form),
}

/// How a single request is sent.
#[derive(Debug)]
pub struct RequestOptions {
    pub method: Method,
    pub query: Vec<(&'static str, String)>,
    pub body: Body,
    /// Negotiate a fresh anti-forgery token and send it along
    pub csrf: bool,
}

impl RequestOptions {
    /// A plain read.
    #[must_use]
    pub fn get() -> Self {
        Self {
            method: Method::GET,
            query: Vec::new(),
            body: Body::Empty,
            csrf: false,
        }
    }

    /// A CSRF-protected POST carrying `body`.
    #[must_use]
    pub fn mutation(body: Body) -> Self {
        Self {
            method: Method::POST,
            query: Vec::new(),
            body,
            csrf: true,
        }
    }

    #[must_use]
    pub fn with_query(mut self, query: Vec<(&'static str, String)>) -> Self {
        self.query = query;
        self
    }
}

pub struct VidshareClient {
    client: Client,
    base_url: String,
    storage: Arc<dyn ClientStorage>,
    credentials: CredentialStore,
}

impl VidshareClient {
    /// Creates a client for `base_url` whose credential lives only in memory.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        Self::with_storage(base_url, Arc::new(MemoryStorage::default()))
    }

    /// Creates a client that keeps its credential in `storage`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn with_storage(
        base_url: impl Into<String>,
        storage: Arc<dyn ClientStorage>,
    ) -> Result<Self, Error> {
        let client = Client::builder()
            .cookie_provider(Arc::new(Jar::default()))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base_url,
            credentials: CredentialStore::new(Arc::clone(&storage)),
            storage,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    #[must_use]
    pub fn storage(&self) -> Arc<dyn ClientStorage> {
        Arc::clone(&self.storage)
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(Url::parse(&format!("{}{path}", self.base_url))?)
    }

    /// Sends one request and returns its JSON payload, or `None` when the
    /// response is not JSON.
    ///
    /// Cookies always travel with the request. The bearer header is attached
    /// only while a credential is stored. With `options.csrf` set, a fresh
    /// anti-forgery token is negotiated first and mirrored into
    /// [`CSRF_HEADER`].
    ///
    /// # Errors
    /// Returns [`Error::Http`] on transport failure and [`Error::Api`] for any
    /// non-success status, with the server's `error` or `detail` message when
    /// it sent one.
    pub async fn send(&self, path: &str, options: RequestOptions) -> Result<Option<Value>, Error> {
        let url = self.url(path)?;
        let csrf_token = if options.csrf {
            Some(csrf::negotiate(&self.client, self.url(CSRF_PATH)?).await?)
        } else {
            None
        };
        let token = self.credentials.get();
        tracing::debug!(
            method = %options.method,
            path,
            bearer = token.is_some(),
            csrf = csrf_token.is_some(),
            "dispatching request"
        );

        let mut request = self.client.request(options.method, url);
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        if let Some(token) = &token {
            request = request.bearer_auth(token);
        }
        if let Some(csrf_token) = &csrf_token {
            request = request.header(CSRF_HEADER, csrf_token);
        }
        request = match options.body {
            Body::Empty => request,
            Body::Json(value) => request.json(&value),
            Body::Form(fields) => request.form(&fields),
            Body::Multipart(form) => request.multipart(form),
        };

        read_response(request.send().await?).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        decode(self.send(path, RequestOptions::get()).await?)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Body) -> Result<T, Error> {
        decode(self.send(path, RequestOptions::mutation(body)).await?)
    }

    /// Lists videos, newest first unless `query` says otherwise.
    ///
    /// # Errors
    /// Returns an error if the request fails or the page cannot be decoded.
    pub async fn list_videos(&self, query: &VideoQuery) -> Result<Page<Video>, Error> {
        let options = RequestOptions::get().with_query(query.to_pairs());
        decode(self.send("/api/videos/", options).await?)
    }

    /// Retrieves a channel's videos together with its subscription state.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn list_channel_videos(&self, username: &str) -> Result<ChannelVideos, Error> {
        self.get(&format!("/api/videos/channel/{}/", encode_segment(username)))
            .await
    }

    /// Most watched videos of the past week.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn trending(&self) -> Result<Vec<Video>, Error> {
        let listing: Listing<Video> = self.get("/api/videos/trending/").await?;
        Ok(listing.results)
    }

    /// Videos from channels the current user subscribes to.
    ///
    /// # Errors
    /// Returns an error if the request fails or the page cannot be decoded.
    pub async fn subscribed_feed(&self, page: Option<u64>) -> Result<Page<Video>, Error> {
        let query = page.map(|p| ("page", p.to_string())).into_iter().collect();
        let options = RequestOptions::get().with_query(query);
        decode(self.send("/api/videos/subscribed-feed/", options).await?)
    }

    /// Watch history, most recent first. Each video carries `watched_at`.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn history(&self) -> Result<Vec<Video>, Error> {
        let listing: Listing<Video> = self.get("/api/videos/history/").await?;
        Ok(listing.results)
    }

    /// # Errors
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn liked_videos(&self) -> Result<Vec<Video>, Error> {
        let listing: Listing<Video> = self.get("/api/videos/liked/").await?;
        Ok(listing.results)
    }

    /// Videos saved for later. Each video carries `saved_at`.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn watch_later(&self) -> Result<Vec<Video>, Error> {
        let listing: Listing<Video> = self.get("/api/videos/watch-later/").await?;
        Ok(listing.results)
    }

    /// Fetches a single video including the viewer's vote and watch-later flag.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn get_video(&self, video_id: u64) -> Result<Video, Error> {
        self.get(&format!("/api/videos/{video_id}/")).await
    }

    /// Top-level comments of a video, newest first, each with its replies.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn comments(&self, video_id: u64) -> Result<Vec<Comment>, Error> {
        let listing: Listing<Comment> =
            self.get(&format!("/api/videos/{video_id}/comments/")).await?;
        Ok(listing.results)
    }

    /// Current profile settings.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn settings(&self) -> Result<Settings, Error> {
        let envelope: SettingsEnvelope = self.get("/api/auth/settings/").await?;
        Ok(envelope.settings)
    }

    /// Casts `vote`. Voting the same way twice withdraws the vote server-side.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn vote_video(&self, video_id: u64, vote: Vote) -> Result<VoteOutcome, Error> {
        let body = Body::Form(vec![("vote", vote.as_param().to_string())]);
        let mut outcome: VoteOutcome = self
            .post(&format!("/api/videos/{video_id}/vote/"), body)
            .await?;
        outcome.video_id = video_id;
        Ok(outcome)
    }

    /// # Errors
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn toggle_watch_later(&self, video_id: u64) -> Result<WatchLaterOutcome, Error> {
        let mut outcome: WatchLaterOutcome = self
            .post(&format!("/api/videos/{video_id}/watch-later/"), Body::Empty)
            .await?;
        outcome.video_id = video_id;
        Ok(outcome)
    }

    /// Deletes a video owned by the current user.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn delete_video(&self, video_id: u64) -> Result<Deleted, Error> {
        let mut deleted: Deleted = self
            .post(&format!("/api/videos/{video_id}/delete/"), Body::Empty)
            .await?;
        deleted.video_id = video_id;
        Ok(deleted)
    }

    /// Uploads a video file with an optional thumbnail.
    ///
    /// # Errors
    /// Returns an error if the form cannot be built, the request fails or the
    /// response cannot be decoded.
    pub async fn upload_video(&self, upload: VideoUpload) -> Result<Uploaded, Error> {
        let mut form = Form::new()
            .text("title", upload.title)
            .text("description", upload.description)
            .part("video_file", upload.video.into_part()?);
        if let Some(thumbnail) = upload.thumbnail {
            form = form.part("thumbnail_file", thumbnail.into_part()?);
        }
        self.post("/api/videos/upload/", Body::Multipart(form)).await
    }

    /// Updates the profile, optionally replacing the photo.
    ///
    /// # Errors
    /// Returns an error if the form cannot be built, the request fails or the
    /// response cannot be decoded.
    pub async fn update_settings(&self, update: SettingsUpdate) -> Result<SettingsOutcome, Error> {
        let mut form = Form::new()
            .text("display_name", update.display_name)
            .text("channel_description", update.channel_description);
        if let Some(photo) = update.photo {
            form = form.part("photo_file", photo.into_part()?);
        }
        self.post("/api/auth/settings/update/", Body::Multipart(form))
            .await
    }

    /// Posts a comment, or a reply when `parent_id` is set.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn add_comment(
        &self,
        video_id: u64,
        text: &str,
        parent_id: Option<u64>,
    ) -> Result<Comment, Error> {
        let body = serde_json::to_value(NewComment { text, parent_id })?;
        let posted: CommentPosted = self
            .post(
                &format!("/api/videos/{video_id}/comments/add/"),
                Body::Json(body),
            )
            .await?;
        Ok(posted.comment)
    }

    /// # Errors
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn toggle_comment_like(&self, comment_id: u64) -> Result<CommentLikeOutcome, Error> {
        let mut outcome: CommentLikeOutcome = self
            .post(
                &format!("/api/videos/comments/{comment_id}/like/"),
                Body::Empty,
            )
            .await?;
        outcome.comment_id = comment_id;
        Ok(outcome)
    }

    /// # Errors
    /// Returns an error if the request fails or the response cannot be decoded.
    pub async fn toggle_subscribe(&self, username: &str) -> Result<SubscriptionOutcome, Error> {
        let mut outcome: SubscriptionOutcome = self
            .post(
                &format!("/api/videos/channel/{}/subscribe/", encode_segment(username)),
                Body::Empty,
            )
            .await?;
        outcome.channel = username.to_string();
        Ok(outcome)
    }
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

async fn read_response(response: Response) -> Result<Option<Value>, Error> {
    let status = response.status();
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("application/json"));
    let bytes = response.bytes().await?;
    // A failure keeps its status even when the body claims JSON but isn't.
    let payload = if !is_json || bytes.is_empty() {
        None
    } else if status.is_success() {
        Some(serde_json::from_slice::<Value>(&bytes)?)
    } else {
        serde_json::from_slice::<Value>(&bytes).ok()
    };
    tracing::debug!(status = status.as_u16(), json = payload.is_some(), "response received");

    if !status.is_success() {
        return Err(Error::Api {
            status: status.as_u16(),
            message: failure_message(status.as_u16(), payload.as_ref()),
            body: payload,
        });
    }
    Ok(payload)
}

fn failure_message(status: u16, payload: Option<&Value>) -> String {
    ["error", "detail"]
        .iter()
        .find_map(|field| {
            payload?
                .get(*field)?
                .as_str()
                .filter(|message| !message.is_empty())
        })
        .map_or_else(|| format!("Request failed ({status})"), str::to_string)
}

fn decode<T: DeserializeOwned>(payload: Option<Value>) -> Result<T, Error> {
    Ok(serde_json::from_value(payload.unwrap_or(Value::Null))?)
}
