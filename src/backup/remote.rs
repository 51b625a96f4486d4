//! Cloud storage for backups

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use url::Url;

use crate::config::RemoteSettings;
use crate::error::{AgendaError, AgendaResult};

/// A file in the remote storage
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteObject {
    /// The file name, relative to the listed prefix
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Store a new file. This must fail rather than overwrite an existing file
    async fn upload(&self, path: &str, contents: &str) -> AgendaResult<()>;

    /// Lists the files directly under `prefix`
    async fn list(&self, prefix: &str) -> AgendaResult<Vec<RemoteObject>>;

    async fn download(&self, path: &str) -> AgendaResult<String>;
}


/// An object storage bucket, reached over its HTTP API
pub struct HttpObjectStore {
    endpoint: Url,
    api_key: String,
    bucket: String,
    client: reqwest::Client,
}

/// One entry of a listing, as the storage API returns it
#[derive(Debug, Deserialize)]
struct ListedEntry {
    name: String,
    /// Folders have no creation date
    created_at: Option<DateTime<Utc>>,
}

impl HttpObjectStore {
    pub fn new(settings: &RemoteSettings) -> Self {
        let mut endpoint = settings.endpoint.clone();
        if endpoint.path().ends_with('/') == false {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        Self {
            endpoint,
            api_key: settings.api_key.clone(),
            bucket: settings.bucket.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn object_url(&self, path: &str) -> AgendaResult<Url> {
        self.endpoint.join(&format!("object/{}/{}", self.bucket, path))
            .map_err(|err| AgendaError::Validation(format!("invalid object path {:?}: {}", path, err)))
    }

    fn list_url(&self) -> AgendaResult<Url> {
        self.endpoint.join(&format!("object/list/{}", self.bucket))
            .map_err(|err| AgendaError::Validation(format!("invalid bucket {:?}: {}", self.bucket, err)))
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header("apikey", &self.api_key)
    }
}

fn check_status(response: &reqwest::Response) -> AgendaResult<()> {
    if response.status().is_success() == false {
        return Err(AgendaError::Network(format!("Unexpected HTTP status code {:?}", response.status())));
    }
    Ok(())
}

#[async_trait]
impl RemoteStorage for HttpObjectStore {
    async fn upload(&self, path: &str, contents: &str) -> AgendaResult<()> {
        let url = self.object_url(path)?;
        log::debug!("Uploading {} bytes to {}", contents.len(), url);

        let response = self.request(reqwest::Method::POST, url)
            .header(CONTENT_TYPE, "application/json")
            .header("x-upsert", "false")
            .body(contents.to_string())
            .send()
            .await?;
        check_status(&response)
    }

    async fn list(&self, prefix: &str) -> AgendaResult<Vec<RemoteObject>> {
        let body = serde_json::json!({
            "prefix": prefix,
            "limit": 100,
            "offset": 0,
            "sortBy": { "column": "created_at", "order": "desc" },
        });

        let response = self.request(reqwest::Method::POST, self.list_url()?)
            .json(&body)
            .send()
            .await?;
        check_status(&response)?;

        let entries: Vec<ListedEntry> = response.json().await?;
        Ok(entries.into_iter()
            .filter_map(|entry| entry.created_at.map(|created_at| RemoteObject { name: entry.name, created_at }))
            .collect())
    }

    async fn download(&self, path: &str) -> AgendaResult<String> {
        let response = self.request(reqwest::Method::GET, self.object_url(path)?)
            .send()
            .await?;
        check_status(&response)?;
        Ok(response.text().await?)
    }
}
