// API client module: a small blocking HTTP client for the HackTheBox v4
// API. It is intentionally small and synchronous: one request per call,
// no retries, no timeout overrides.

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

use crate::model::{ActiveInstance, Group, MachineRecord, ReviewAccess, TodoEntry};

const DEFAULT_BASE_URL: &str = "https://www.hackthebox.com/api/v4";

/// Process-wide configuration, read from the environment exactly once at
/// startup and passed into the client. No ambient globals.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer token from `HTB_API_TOKEN`. Every endpoint requires one;
    /// `main` refuses to start without it.
    pub token: Option<String>,
    /// `HTB_API_URL`, defaulting to the public v4 API.
    pub base_url: String,
    /// Where the machine-listing snapshot lives, `HTB_CACHE_FILE` or
    /// `~/.htb_cache.json`.
    pub cache_file: PathBuf,
}

impl Config {
    pub fn from_env() -> Config {
        let token = std::env::var("HTB_API_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());
        let base_url =
            std::env::var("HTB_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let cache_file = std::env::var("HTB_CACHE_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".htb_cache.json")
            });
        Config {
            token,
            base_url,
            cache_file,
        }
    }
}

/// A response body. The API mostly speaks JSON, but a few endpoints (the
/// writeup download) return binary; those pass through untouched with
/// their status code so the caller can decide what to do.
#[derive(Debug)]
pub enum ApiBody {
    Json(Value),
    Raw { status: StatusCode, bytes: Vec<u8> },
}

/// What the machine profile endpoint said about an identifier. The
/// endpoint only knows lab (active/retired) machines; for a starting-point
/// machine it answers with a sentinel message and the caller has to go
/// scan the starting-point listing instead.
#[derive(Debug)]
pub enum ProfileOutcome {
    Lab(MachineRecord),
    StartingPoint,
    NotFound,
}

/// Flag-submission result; `status` is left loose because the backend
/// sends a number or a string depending on the outcome.
#[derive(Debug, serde::Deserialize)]
pub struct OwnResponse {
    pub status: Value,
    pub message: String,
}

impl OwnResponse {
    pub fn status_text(&self) -> String {
        match &self.status {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Blocking API client holding the HTTP client, the base URL and the
/// auth/user-agent headers sent with every request.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            let value = format!("Bearer {token}");
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&value).context("token is not a valid header value")?,
            );
        }
        headers.insert(USER_AGENT, HeaderValue::from_static("htb-cli"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ApiClient {
            client,
            base_url: config.base_url.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET an endpoint, decoding the body as JSON when possible.
    pub fn get(&self, path: &str) -> Result<ApiBody> {
        debug!(path, "GET");
        let response = self
            .client
            .get(self.url(path))
            .send()
            .with_context(|| format!("Failed to send GET {path}"))?;
        decode_body(response)
    }

    /// POST an endpoint with an optional urlencoded form.
    pub fn post_form(&self, path: &str, form: Option<&[(&str, String)]>) -> Result<ApiBody> {
        debug!(path, "POST");
        let mut request = self.client.post(self.url(path));
        if let Some(form) = form {
            request = request.form(form);
        }
        let response = request
            .send()
            .with_context(|| format!("Failed to send POST {path}"))?;
        decode_body(response)
    }

    // ---- endpoint methods ----

    /// `GET /machine/profile/{ident}` where ident is a name or id.
    pub fn machine_profile(&self, ident: &str) -> Result<ProfileOutcome> {
        let body = self.get(&format!("/machine/profile/{ident}"))?;
        let value = expect_json(body, "machine profile")?;
        if let Some(info) = value.get("info") {
            let record = serde_json::from_value(info.clone())
                .context("decoding machine profile response")?;
            return Ok(ProfileOutcome::Lab(record));
        }
        match value.get("message").and_then(Value::as_str) {
            Some("Starting Point Machine") => Ok(ProfileOutcome::StartingPoint),
            _ => Ok(ProfileOutcome::NotFound),
        }
    }

    /// One of the three machine listings.
    pub fn list_group(&self, group: Group) -> Result<Vec<MachineRecord>> {
        let path = match group {
            Group::Active => "/machine/list",
            Group::Retired => "/machine/list/retired",
            Group::StartingPoint => "/sp/machines",
        };
        self.info_of(path, "machine listing")
    }

    pub fn sp_machines(&self) -> Result<Vec<MachineRecord>> {
        self.list_group(Group::StartingPoint)
    }

    /// `GET /machine/active`; `info` is null when nothing is spawned.
    pub fn active_machine(&self) -> Result<Option<ActiveInstance>> {
        self.info_of("/machine/active", "active machine")
    }

    pub fn todo_list(&self) -> Result<Vec<TodoEntry>> {
        self.info_of("/machine/todo", "to-do list")
    }

    /// Toggle a machine in the to-do list. The response carries the list
    /// as it looks after the update; no `info` at all means the machine id
    /// was unknown.
    pub fn todo_update(&self, id: u64) -> Result<Option<Vec<TodoEntry>>> {
        let body = self.post_form(&format!("/machine/todo/update/{id}"), None)?;
        let value = expect_json(body, "to-do update")?;
        match value.get("info") {
            Some(info) if !info.is_null() => Ok(Some(
                serde_json::from_value(info.clone()).context("decoding updated to-do list")?,
            )),
            _ => Ok(None),
        }
    }

    pub fn reviews(&self, id: u64) -> Result<ReviewAccess> {
        let body = self.get(&format!("/machine/reviews/{id}"))?;
        let value = expect_json(body, "machine reviews")?;
        let message = value.get("message").cloned().unwrap_or(Value::Null);
        ReviewAccess::from_message(message)
    }

    pub fn spawn(&self, id: u64) -> Result<String> {
        self.vm_post("/vm/spawn", id)
    }

    pub fn terminate(&self, id: u64) -> Result<String> {
        self.vm_post("/vm/terminate", id)
    }

    pub fn reset(&self, id: u64) -> Result<String> {
        self.vm_post("/vm/reset", id)
    }

    /// Submit an own. The wire wants the self-rated difficulty already
    /// scaled to 10-100.
    pub fn own(&self, flag: &str, id: u64, difficulty: u32) -> Result<OwnResponse> {
        let form = [
            ("flag", flag.to_string()),
            ("id", id.to_string()),
            ("difficulty", difficulty.to_string()),
        ];
        let body = self.post_form("/machine/own", Some(form.as_slice()))?;
        let value = expect_json(body, "flag submission")?;
        serde_json::from_value(value).context("decoding flag submission response")
    }

    /// `GET /machine/writeup/{id}`. The happy path is a PDF, so the caller
    /// gets the body verbatim and checks the status itself.
    pub fn writeup(&self, id: u64) -> Result<ApiBody> {
        self.get(&format!("/machine/writeup/{id}"))
    }

    /// Decode the `info` field of a JSON response into a typed value.
    fn info_of<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let value = expect_json(self.get(path)?, what)?;
        let info = value
            .get("info")
            .cloned()
            .with_context(|| format!("missing `info` in {what} response"))?;
        serde_json::from_value(info).with_context(|| format!("decoding {what} response"))
    }

    // vm spawn/terminate/reset all take a machine_id form and answer with
    // a bare message.
    fn vm_post(&self, path: &str, id: u64) -> Result<String> {
        let form = [("machine_id", id.to_string())];
        let body = self.post_form(path, Some(form.as_slice()))?;
        let value = expect_json(body, path)?;
        value
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .with_context(|| format!("missing `message` in {path} response"))
    }
}

fn decode_body(response: reqwest::blocking::Response) -> Result<ApiBody> {
    let status = response.status();
    let bytes = response.bytes().context("Failed to read response body")?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(ApiBody::Json(value)),
        Err(_) => Ok(ApiBody::Raw {
            status,
            bytes: bytes.to_vec(),
        }),
    }
}

fn expect_json(body: ApiBody, what: &str) -> Result<Value> {
    match body {
        ApiBody::Json(value) => Ok(value),
        ApiBody::Raw { status, .. } => {
            bail!("expected JSON from the {what} endpoint, got HTTP {status} with a non-JSON body")
        }
    }
}
