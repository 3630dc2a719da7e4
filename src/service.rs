use std::time::Duration;

use anyhow::Context as _;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::settings::Roles;

/// Workgroup created on the destination server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteWorkgroup {
    pub id: String,
    pub url: String,
}

/// Placeholder module created (and published) on the destination server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteModule {
    pub id: String,
    pub workspace_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRequest<'a> {
    pub source_server: &'a str,
    pub source_id: &'a str,
    pub source_workspace_url: &'a str,
    pub destination_workspace_url: &'a str,
    pub destination_id: &'a str,
}

/// Operations the migration needs from the destination repository.
///
/// Every call blocks until the server answers. Rejections surface as
/// [`Error::Domain`].
pub trait ContentService {
    fn create_workgroup(&self, title: &str) -> Result<RemoteWorkgroup>;
    fn create_and_publish_module(&self, title: &str, workspace_url: &str) -> Result<RemoteModule>;
    fn copy_module(&self, request: &CopyRequest<'_>) -> Result<()>;
    fn edit_roles(&self, module_url: &str, roles: &Roles) -> Result<()>;
    /// Accepts every pending role request for the configured people and
    /// returns how many were accepted.
    fn accept_pending_roles(&self, roles: &Roles) -> Result<usize>;
    /// Returns the new collection's identifier.
    fn create_collection(&self, title: &str) -> Result<String>;
    /// Creates one subcollection per title under `parent_path` and returns
    /// their identifiers in the same order.
    fn add_subcollections(&self, parent_path: &str, titles: &[String]) -> Result<Vec<String>>;
    fn add_module_to_collection(&self, collection_path: &str, module_id: &str) -> Result<()>;
    fn publish_collection(&self, collection_path: &str) -> Result<()>;
    fn publish_module(&self, module_url: &str) -> Result<()>;
}

/// JSON-over-HTTP client for the destination repository.
#[derive(Debug, Clone)]
pub struct HttpContentService {
    client: Client,
    server: String,
    user: String,
    password: String,
}

impl HttpContentService {
    pub fn new(server: &str, credentials: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("content-copy/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("build http client")?;
        let (user, password) = credentials
            .split_once(':')
            .unwrap_or((credentials, ""));
        Ok(Self {
            client,
            server: server.trim_end_matches('/').to_owned(),
            user: user.to_owned(),
            password: password.to_owned(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.server, path.trim_start_matches('/'))
    }

    fn post(&self, path: &str, body: &serde_json::Value) -> RequestBuilder {
        self.client
            .post(self.endpoint(path))
            .basic_auth(&self.user, Some(&self.password))
            .json(body)
    }

    fn send(&self, path: &str, body: &serde_json::Value) -> Result<String> {
        let endpoint = self.endpoint(path);
        let response = self.post(path, body).send().map_err(|err| {
            if err.is_timeout() {
                Error::Timeout(format!("POST {endpoint}"))
            } else {
                Error::Unexpected(anyhow::Error::new(err).context(format!("POST {endpoint}")))
            }
        })?;

        let status = response.status();
        let raw = response
            .text()
            .with_context(|| format!("read response body: POST {endpoint}"))?;
        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or(raw);
            return Err(Error::Domain(format!(
                "POST {endpoint} rejected ({status}): {}",
                message.trim()
            )));
        }
        Ok(raw)
    }

    fn send_json<T: DeserializeOwned>(&self, path: &str, body: &serde_json::Value) -> Result<T> {
        let raw = self.send(path, body)?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parse response of POST {}", self.endpoint(path)))
            .map_err(Error::from)
    }
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

/// Collection paths are ids joined by `/`; each segment stays a path segment.
fn collection_endpoint(collection_path: &str, action: &str) -> String {
    format!("collections/{}/{action}", collection_path.trim_matches('/'))
}

impl ContentService for HttpContentService {
    fn create_workgroup(&self, title: &str) -> Result<RemoteWorkgroup> {
        self.send_json("workgroups", &serde_json::json!({ "title": title }))
    }

    fn create_and_publish_module(&self, title: &str, workspace_url: &str) -> Result<RemoteModule> {
        self.send_json(
            "modules",
            &serde_json::json!({ "title": title, "workspace": workspace_url }),
        )
    }

    fn copy_module(&self, request: &CopyRequest<'_>) -> Result<()> {
        self.send(
            "modules/copy",
            &serde_json::json!({
                "source_server": request.source_server,
                "source_id": request.source_id,
                "source_workspace_url": request.source_workspace_url,
                "destination_workspace_url": request.destination_workspace_url,
                "destination_id": request.destination_id,
            }),
        )
        .map(drop)
    }

    fn edit_roles(&self, module_url: &str, roles: &Roles) -> Result<()> {
        self.send(
            "modules/roles",
            &serde_json::json!({
                "module_url": module_url,
                "authors": roles.authors,
                "maintainers": roles.maintainers,
                "rightsholders": roles.rightsholders,
            }),
        )
        .map(drop)
    }

    fn accept_pending_roles(&self, roles: &Roles) -> Result<usize> {
        #[derive(Deserialize)]
        struct Accepted {
            accepted: usize,
        }

        let body = serde_json::to_value(roles).context("serialize roles")?;
        let accepted: Accepted = self.send_json("roles/accept", &body)?;
        Ok(accepted.accepted)
    }

    fn create_collection(&self, title: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct Created {
            id: String,
        }

        let created: Created =
            self.send_json("collections", &serde_json::json!({ "title": title }))?;
        Ok(created.id)
    }

    fn add_subcollections(&self, parent_path: &str, titles: &[String]) -> Result<Vec<String>> {
        #[derive(Deserialize)]
        struct Created {
            ids: Vec<String>,
        }

        let created: Created = self.send_json(
            &collection_endpoint(parent_path, "subcollections"),
            &serde_json::json!({ "titles": titles }),
        )?;
        if created.ids.len() != titles.len() {
            return Err(Error::Domain(format!(
                "asked for {} subcollections under {parent_path}, server created {}",
                titles.len(),
                created.ids.len()
            )));
        }
        Ok(created.ids)
    }

    fn add_module_to_collection(&self, collection_path: &str, module_id: &str) -> Result<()> {
        self.send(
            &collection_endpoint(collection_path, "modules"),
            &serde_json::json!({ "module_id": module_id }),
        )
        .map(drop)
    }

    fn publish_collection(&self, collection_path: &str) -> Result<()> {
        self.send(
            &collection_endpoint(collection_path, "publish"),
            &serde_json::json!({}),
        )
        .map(drop)
    }

    fn publish_module(&self, module_url: &str) -> Result<()> {
        self.send(
            "modules/publish",
            &serde_json::json!({ "module_url": module_url }),
        )
        .map(drop)
    }
}
