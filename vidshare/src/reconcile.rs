//! Reconciling locally displayed entities with confirmed server responses.
//!
//! Mutations never predict their effect. The caller sends the minimal input,
//! waits for the response and copies exactly the fields the response carries
//! onto its local copy. Absent fields stay as they were, and a failed call
//! commits nothing. Responses to concurrent calls overwrite in arrival order,
//! each touching only the fields it owns.

use crate::types::{vote_value, ChannelVideos, Comment, Settings, Video, Vote};
use crate::Error;
use serde::{Deserialize, Deserializer};
use std::future::IntoFuture;
use std::sync::{Mutex, PoisonError};

/// A confirmed server response that can be applied to local state of type `T`.
pub trait Reconcile<T: ?Sized> {
    /// Copies the fields carried by this response onto `local`.
    fn reconcile(&self, local: &mut T);

    fn reconcile_all(&self, items: &mut [T])
    where
        T: Sized,
    {
        for item in items {
            self.reconcile(item);
        }
    }
}

/// Awaits `call` and reconciles its response onto `local`.
///
/// The lock is taken only after the response has arrived, never across the
/// network wait. On failure `local` is left untouched and the error is
/// returned as is.
///
/// # Errors
/// Returns whatever error `call` produced.
pub async fn confirm<T, R, F>(local: &Mutex<T>, call: F) -> Result<R, Error>
where
    F: IntoFuture<Output = Result<R, Error>>,
    R: Reconcile<T>,
{
    let outcome = call.await?;
    let mut guard = local.lock().unwrap_or_else(PoisonError::into_inner);
    outcome.reconcile(&mut *guard);
    Ok(outcome)
}

// A present `null` must overwrite, so keep it distinct from an absent key.
fn present_vote<'de, D>(deserializer: D) -> Result<Option<Option<Vote>>, D::Error>
where
    D: Deserializer<'de>,
{
    vote_value(deserializer).map(Some)
}

/// Confirmed result of a vote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VoteOutcome {
    #[serde(skip)]
    pub video_id: u64,
    pub likes: Option<u64>,
    pub dislikes: Option<u64>,
    /// `Some(None)` when the server reports no remaining vote
    #[serde(default, deserialize_with = "present_vote")]
    pub user_vote: Option<Option<Vote>>,
}

impl Reconcile<Video> for VoteOutcome {
    fn reconcile(&self, video: &mut Video) {
        if video.id != self.video_id {
            return;
        }
        if let Some(likes) = self.likes {
            video.likes = likes;
        }
        if let Some(dislikes) = self.dislikes {
            video.dislikes = dislikes;
        }
        if let Some(user_vote) = self.user_vote {
            video.user_vote = user_vote;
        }
    }
}

/// Confirmed result of a watch-later toggle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WatchLaterOutcome {
    #[serde(skip)]
    pub video_id: u64,
    pub is_watch_later: Option<bool>,
}

impl Reconcile<Video> for WatchLaterOutcome {
    fn reconcile(&self, video: &mut Video) {
        if video.id != self.video_id {
            return;
        }
        if let Some(flag) = self.is_watch_later {
            video.is_watch_later = flag;
        }
    }
}

/// Confirmed result of a channel subscription toggle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SubscriptionOutcome {
    #[serde(skip)]
    pub channel: String,
    pub is_subscribed: Option<bool>,
    pub subscriber_count: Option<u64>,
}

impl Reconcile<Video> for SubscriptionOutcome {
    fn reconcile(&self, video: &mut Video) {
        if video.channel != self.channel {
            return;
        }
        if let Some(flag) = self.is_subscribed {
            video.is_subscribed = flag;
        }
        if let Some(count) = self.subscriber_count {
            video.subscriber_count = count;
        }
    }
}

impl Reconcile<ChannelVideos> for SubscriptionOutcome {
    fn reconcile(&self, page: &mut ChannelVideos) {
        if page.channel != self.channel {
            return;
        }
        if let Some(flag) = self.is_subscribed {
            page.is_subscribed = flag;
        }
        if let Some(count) = self.subscriber_count {
            page.subscriber_count = count;
        }
        <Self as Reconcile<Video>>::reconcile_all(self, &mut page.results);
    }
}

/// Confirmed result of a comment like toggle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommentLikeOutcome {
    #[serde(skip)]
    pub comment_id: u64,
    pub liked: Option<bool>,
    pub likes: Option<u64>,
}

impl Reconcile<Comment> for CommentLikeOutcome {
    fn reconcile(&self, comment: &mut Comment) {
        if comment.id != self.comment_id {
            self.reconcile_all(&mut comment.replies);
            return;
        }
        if let Some(liked) = self.liked {
            comment.liked = liked;
        }
        if let Some(likes) = self.likes {
            comment.likes = likes;
        }
    }
}

/// Settings fields as echoed back by an update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SettingsPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub channel_description: Option<String>,
    pub photo_url: Option<String>,
}

/// Confirmed result of a settings update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SettingsOutcome {
    #[serde(default)]
    pub success: bool,
    pub settings: Option<SettingsPatch>,
}

impl Reconcile<Settings> for SettingsOutcome {
    fn reconcile(&self, local: &mut Settings) {
        let Some(patch) = &self.settings else {
            return;
        };
        let fields = [
            (&mut local.username, &patch.username),
            (&mut local.email, &patch.email),
            (&mut local.display_name, &patch.display_name),
            (&mut local.channel_description, &patch.channel_description),
            (&mut local.photo_url, &patch.photo_url),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                field.clone_from(value);
            }
        }
    }
}

/// Confirmed deletion of a video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Deleted {
    #[serde(skip)]
    pub video_id: u64,
    #[serde(default)]
    pub success: bool,
}

impl Reconcile<Vec<Video>> for Deleted {
    fn reconcile(&self, videos: &mut Vec<Video>) {
        videos.retain(|video| video.id != self.video_id);
    }
}

impl Reconcile<ChannelVideos> for Deleted {
    fn reconcile(&self, page: &mut ChannelVideos) {
        <Self as Reconcile<Vec<Video>>>::reconcile(self, &mut page.results);
    }
}
