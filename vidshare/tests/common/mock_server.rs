use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use vidshare::storage::{ClientStorage, MemoryStorage};
use vidshare::{Session, VidshareClient};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Match, Mock, MockServer, Request, Respond, ResponseTemplate};

pub const CSRF_PATH: &str = "/api/auth/csrf/";

#[derive(Deserialize)]
pub struct Fixture {
    #[serde(rename = "_meta")]
    pub meta: Option<FixtureMeta>,
    pub request: FixtureRequest,
    pub response: FixtureResponse,
}

#[derive(Deserialize)]
pub struct FixtureMeta {
    /// Query or form fields the request must carry
    pub query: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Deserialize)]
pub struct FixtureRequest {
    pub method: String,
    pub path_pattern: String,
}

#[derive(Deserialize)]
pub struct FixtureResponse {
    pub status_code: u16,
    pub body: serde_json::Value,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Issues a different `csrftoken` cookie on every negotiation.
#[derive(Default)]
pub struct CsrfIssuer {
    issued: AtomicUsize,
    set_cookie: bool,
}

impl Respond for CsrfIssuer {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let template = ResponseTemplate::new(200).set_body_json(json!({ "success": true }));
        if self.set_cookie {
            template.insert_header(
                "set-cookie",
                format!("csrftoken=token-{n}; Path=/; SameSite=Lax"),
            )
        } else {
            template
        }
    }
}

pub struct VidshareMock {
    pub server: MockServer,
}

impl VidshareMock {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Starts a server that already hands out anti-forgery cookies.
    #[allow(dead_code)]
    pub async fn with_csrf() -> Self {
        let mock = Self::start().await;
        mock.mount_csrf().await;
        mock
    }

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
    }

    #[allow(dead_code)]
    pub async fn mount_csrf(&self) {
        Mock::given(method("GET"))
            .and(path(CSRF_PATH))
            .respond_with(CsrfIssuer {
                set_cookie: true,
                ..CsrfIssuer::default()
            })
            .mount(&self.server)
            .await;
    }

    /// A CSRF endpoint that answers but never sets the cookie.
    #[allow(dead_code)]
    pub async fn mount_csrf_without_cookie(&self) {
        Mock::given(method("GET"))
            .and(path(CSRF_PATH))
            .respond_with(CsrfIssuer::default())
            .mount(&self.server)
            .await;
    }

    #[allow(dead_code)]
    pub async fn mount_fixture(&self, fixture_path: &str) {
        let full_path = Self::fixtures_dir().join(fixture_path);

        let content = fs::read_to_string(&full_path)
            .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", full_path.display(), e));

        let fixture: Fixture = serde_json::from_str(&content)
            .unwrap_or_else(|e| panic!("Failed to parse fixture {}: {}", full_path.display(), e));

        let mut mock = Mock::given(method(fixture.request.method.as_str()))
            .and(path_regex(&fixture.request.path_pattern));

        if let Some(query) = fixture.meta.as_ref().and_then(|meta| meta.query.as_ref()) {
            for (key, value) in query {
                if let Some(value) = query_value_to_string(value) {
                    mock = mock.and(field_normalized(key, value));
                }
            }
        }

        let mut template = ResponseTemplate::new(fixture.response.status_code)
            .set_body_json(&fixture.response.body);
        for (name, value) in &fixture.response.headers {
            template = template.insert_header(name.as_str(), value.as_str());
        }

        mock.respond_with(template).mount(&self.server).await;
    }

    #[allow(dead_code)]
    pub fn client(&self) -> VidshareClient {
        self.client_with(Arc::new(MemoryStorage::default()))
    }

    #[allow(dead_code)]
    pub fn client_with(&self, storage: Arc<dyn ClientStorage>) -> VidshareClient {
        VidshareClient::with_storage(self.server.uri(), storage).unwrap()
    }

    #[allow(dead_code)]
    pub fn session(&self) -> Session {
        Session::new(self.client())
    }

    /// Requests received so far, in arrival order.
    #[allow(dead_code)]
    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    #[allow(dead_code)]
    pub async fn requests_to(&self, request_path: &str) -> Vec<Request> {
        self.requests()
            .await
            .into_iter()
            .filter(|request| request.url.path() == request_path)
            .collect()
    }
}

/// Base URL of a server that has already shut down.
#[allow(dead_code)]
pub async fn unreachable_base_url() -> String {
    let server = MockServer::builder().start().await;
    let uri = server.uri();
    drop(server);
    uri
}

#[allow(dead_code)]
pub fn header(request: &Request, name: &str) -> Option<String> {
    request
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn query_value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(value) => Some(value.clone()),
        serde_json::Value::Number(value) => Some(value.to_string()),
        serde_json::Value::Bool(value) => Some(value.to_string()),
        serde_json::Value::Null | serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            None
        }
    }
}

/// Matches a field carried either in the query string or in a urlencoded body.
struct FieldNormalizedMatcher {
    key: String,
    expected: String,
}

fn field_normalized(key: impl Into<String>, expected: impl Into<String>) -> FieldNormalizedMatcher {
    FieldNormalizedMatcher {
        key: key.into(),
        expected: expected.into(),
    }
}

impl Match for FieldNormalizedMatcher {
    fn matches(&self, request: &Request) -> bool {
        if request
            .url
            .query_pairs()
            .any(|(key, value)| key == self.key.as_str() && values_match(&self.expected, &value))
        {
            return true;
        }

        form_body_value(request, &self.key)
            .is_some_and(|actual| values_match(&self.expected, &actual))
    }
}

fn values_match(expected: &str, actual: &str) -> bool {
    if expected == actual {
        return true;
    }

    match (expected.parse::<f64>(), actual.parse::<f64>()) {
        (Ok(expected), Ok(actual)) => (expected - actual).abs() < f64::EPSILON,
        _ => false,
    }
}

fn form_body_value(request: &Request, key: &str) -> Option<String> {
    url::form_urlencoded::parse(&request.body)
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
