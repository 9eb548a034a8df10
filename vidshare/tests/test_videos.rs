mod common;

use common::mock_server::{header, VidshareMock};
use serde_json::json;
use std::sync::Mutex;
use vidshare::reconcile::{confirm, Reconcile};
use vidshare::types::{Attachment, VideoOrder, VideoQuery, VideoUpload, Vote};
use vidshare::Error;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_list_videos_passes_filters() {
    let mock = VidshareMock::start().await;
    mock.mount_fixture("videos/list_videos_search.json").await;

    let query = VideoQuery {
        search: Some("cat".into()),
        ordering: Some("-views".parse::<VideoOrder>().unwrap()),
        page: Some(2),
        ..VideoQuery::default()
    };
    let page = mock.client().list_videos(&query).await.unwrap();

    assert_eq!(page.count, 13);
    assert!(page.next.is_none());
    assert_eq!(page.results.len(), 1);
    assert_eq!(page.results[0].title, "Cat compilation");
}

#[tokio::test]
async fn test_get_video_decodes_viewer_state() {
    let mock = VidshareMock::start().await;
    mock.mount_fixture("videos/get_video_valid.json").await;

    let video = mock.client().get_video(7).await.unwrap();

    assert_eq!(video.channel, "alice");
    assert_eq!((video.likes, video.dislikes), (4, 1));
    assert_eq!(video.user_vote, None);
    assert!(!video.is_watch_later);
    assert_eq!(video.created_at.unix_timestamp(), 1_714_558_530);
    assert!(video.streaming_url.is_some());
}

#[tokio::test]
async fn test_missing_video_is_not_found() {
    let mock = VidshareMock::start().await;
    mock.mount_fixture("videos/get_video_not_found.json").await;

    let err = mock.client().get_video(404).await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "Not found.");
}

#[tokio::test]
async fn test_vote_is_sent_as_form_field() {
    let mock = VidshareMock::with_csrf().await;
    mock.mount_fixture("videos/vote_like_valid.json").await;

    let outcome = mock.client().vote_video(7, Vote::Dislike).await.unwrap();

    assert_eq!(outcome.video_id, 7);
    let request = &mock.requests_to("/api/videos/7/vote/").await[0];
    assert_eq!(request.body, b"vote=dislike");
    assert_eq!(
        header(request, "content-type").as_deref(),
        Some("application/x-www-form-urlencoded")
    );
}

#[tokio::test]
async fn test_personal_listings() {
    let mock = VidshareMock::start().await;
    mock.mount_fixture("videos/trending_valid.json").await;
    mock.mount_fixture("videos/history_valid.json").await;
    mock.mount_fixture("videos/liked_valid.json").await;
    mock.mount_fixture("videos/watch_later_list_valid.json").await;
    let client = mock.client();

    let trending = client.trending().await.unwrap();
    assert_eq!(trending.iter().map(|v| v.id).collect::<Vec<_>>(), vec![7, 8]);

    let history = client.history().await.unwrap();
    assert_eq!(
        history[0].watched_at.map(|at| at.unix_timestamp()),
        Some(1_714_764_000)
    );

    let liked = client.liked_videos().await.unwrap();
    assert_eq!(liked[0].id, 8);

    let saved = client.watch_later().await.unwrap();
    assert!(saved[0].saved_at.is_some());
    assert!(saved[0].watched_at.is_none());
}

#[tokio::test]
async fn test_subscribed_feed_requests_page() {
    let mock = VidshareMock::start().await;
    Mock::given(method("GET"))
        .and(path("/api/videos/subscribed-feed/"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 0, "next": null, "previous": null, "results": []
        })))
        .mount(&mock.server)
        .await;
    mock.mount_fixture("videos/subscribed_feed_valid.json").await;
    let client = mock.client();

    assert!(client.subscribed_feed(Some(3)).await.unwrap().results.is_empty());
    assert_eq!(client.subscribed_feed(None).await.unwrap().count, 1);
}

#[tokio::test]
async fn test_subscribe_reconciles_channel_page() {
    let mock = VidshareMock::with_csrf().await;
    mock.mount_fixture("channels/channel_videos_valid.json").await;
    mock.mount_fixture("channels/subscribe_valid.json").await;
    let client = mock.client();
    let local = Mutex::new(client.list_channel_videos("alice").await.unwrap());

    let outcome = confirm(&local, client.toggle_subscribe("alice"))
        .await
        .unwrap();

    assert_eq!(outcome.channel, "alice");
    let page = local.lock().unwrap();
    assert!(page.is_subscribed);
    assert_eq!(page.subscriber_count, 4);
    assert!(page
        .results
        .iter()
        .all(|video| video.is_subscribed && video.subscriber_count == 4));
}

#[tokio::test]
async fn test_self_subscription_is_refused() {
    let mock = VidshareMock::with_csrf().await;
    mock.mount_fixture("channels/subscribe_self.json").await;

    let err = mock.client().toggle_subscribe("alice").await.unwrap_err();

    assert_eq!(err.to_string(), "You cannot subscribe to your own channel.");
}

#[tokio::test]
async fn test_channel_name_is_path_encoded() {
    let mock = VidshareMock::start().await;

    let err = mock.client().list_channel_videos("a b").await.unwrap_err();

    assert!(matches!(err, Error::Api { status: 404, .. }));
    let requests = mock.requests().await;
    assert_eq!(requests[0].url.path(), "/api/videos/channel/a%20b/");
}

#[tokio::test]
async fn test_comment_like_reaches_nested_reply() {
    let mock = VidshareMock::with_csrf().await;
    mock.mount_fixture("comments/list_comments_valid.json").await;
    mock.mount_fixture("comments/like_reply_valid.json").await;
    let client = mock.client();
    let mut comments = client.comments(7).await.unwrap();
    assert_eq!(comments.iter().map(|c| c.id).collect::<Vec<_>>(), vec![11, 10]);

    let outcome = client.toggle_comment_like(12).await.unwrap();
    outcome.reconcile_all(&mut comments);

    let reply = &comments[0].replies[0];
    assert_eq!(reply.id, 12);
    assert!(reply.liked);
    assert_eq!(reply.likes, 1);
    assert!(!comments[0].liked);
    assert!(!comments[1].liked);
}

#[tokio::test]
async fn test_add_comment_and_reply() {
    let mock = VidshareMock::with_csrf().await;
    Mock::given(method("POST"))
        .and(path("/api/videos/7/comments/add/"))
        .and(body_json(json!({ "text": "Me too", "parent_id": 11 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "comment": {
                "id": 14, "video_id": 7, "parent_id": 11, "text": "Me too",
                "likes": 0, "liked": false, "author": "alice",
                "created_at": "2024-05-02T09:00:00+00:00"
            }
        })))
        .mount(&mock.server)
        .await;
    mock.mount_fixture("comments/add_comment_valid.json").await;
    let client = mock.client();

    let reply = client.add_comment(7, "Me too", Some(11)).await.unwrap();
    assert_eq!(reply.parent_id, Some(11));

    let comment = client.add_comment(7, "Nice one", None).await.unwrap();
    assert_eq!(comment.id, 13);
    let sent: serde_json::Value =
        serde_json::from_slice(&mock.requests_to("/api/videos/7/comments/add/").await[1].body)
            .unwrap();
    assert_eq!(sent, json!({ "text": "Nice one" }));
}

#[tokio::test]
async fn test_empty_comment_is_rejected() {
    let mock = VidshareMock::with_csrf().await;
    mock.mount_fixture("comments/add_comment_empty.json").await;

    let err = mock.client().add_comment(7, "", None).await.unwrap_err();

    assert_eq!(err.to_string(), "Comment text is required.");
}

#[tokio::test]
async fn test_upload_sends_multipart_form() {
    let mock = VidshareMock::with_csrf().await;
    mock.mount_fixture("videos/upload_valid.json").await;

    let upload = VideoUpload {
        title: "My cat".into(),
        description: "Sleeping".into(),
        video: Attachment::new("cat.mp4", b"fake-video".to_vec()).with_mime("video/mp4"),
        thumbnail: Some(Attachment::new("cat.jpg", b"fake-image".to_vec())),
    };
    let uploaded = mock.client().upload_video(upload).await.unwrap();

    assert_eq!(uploaded.video_id, 42);
    let request = &mock.requests_to("/api/videos/upload/").await[0];
    assert!(header(request, "content-type")
        .unwrap()
        .starts_with("multipart/form-data"));
    let body = String::from_utf8_lossy(&request.body);
    assert!(body.contains(r#"name="title""#));
    assert!(body.contains("My cat"));
    assert!(body.contains(r#"name="video_file"; filename="cat.mp4""#));
    assert!(body.contains("Content-Type: video/mp4"));
    assert!(body.contains(r#"name="thumbnail_file"; filename="cat.jpg""#));
}

#[tokio::test]
async fn test_settings_are_fetched() {
    let mock = VidshareMock::start().await;
    mock.mount_fixture("settings/get_settings_valid.json").await;

    let settings = mock.client().settings().await.unwrap();

    assert_eq!(settings.username, "alice");
    assert_eq!(settings.photo_url, "");
}
