use crate::errors::{ClientError, ClientResult};
use crate::session::SessionToken;
use reqwest::{RequestBuilder, Response, Url};
use std::time::Duration;
use taskdeck_core::{ListResponse, Page, Task, TaskDraft};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// HTTP client for the remote `item` collection.
#[derive(Clone, Debug)]
pub struct RemoteCollectionClient {
    http: reqwest::Client,
    base_url: String,
    base: Url,
    session: SessionToken,
}

impl RemoteCollectionClient {
    pub fn new(
        base_url: impl Into<String>,
        session: SessionToken,
        request_timeout: Duration,
    ) -> ClientResult<Self> {
        let base_url: String = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();
        let base = Url::parse(&base_url)
            .map_err(|e| ClientError::Config(format!("invalid API URL {}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "API URL cannot hold paths: {}",
                base_url
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url,
            base,
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self) -> String {
        format!("{}/item", self.base_url)
    }

    /// Ids are pushed as a single path segment, so `/` and `?` are escaped.
    fn item_url(&self, id: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("item").push(id);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.get() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> ClientResult<Response> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status { status, body })
    }

    /// Fetches one page. Resolves to [`ClientError::Cancelled`] as soon as
    /// `cancel` fires, abandoning the request.
    pub async fn list(
        &self,
        limit: usize,
        offset: usize,
        cancel: &CancellationToken,
    ) -> ClientResult<Page> {
        let fetch = async {
            debug!("API: GET /item limit={} offset={}", limit, offset);
            let request = self
                .http
                .get(self.collection_url())
                .query(&[("limit", limit), ("offset", offset)]);
            let response = self.send(request).await?;
            let body: ListResponse = response.json().await?;
            Ok::<_, ClientError>(body.normalize(limit, offset))
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            result = fetch => result,
        }
    }

    pub async fn create(&self, draft: &TaskDraft) -> ClientResult<Task> {
        debug!("API: POST /item {:?}", draft.text);
        let request = self.http.post(self.collection_url()).json(draft);
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    /// PUTs the full task. The task must carry a server-issued id.
    pub async fn update(&self, task: &Task) -> ClientResult<Task> {
        let id = task.server_id().ok_or_else(|| {
            ClientError::InvalidState(format!(
                "cannot update task without a server id: {:?}",
                task.id
            ))
        })?;

        debug!("API: PUT /item/{}", id);
        let request = self
            .http
            .put(self.item_url(id))
            .json(&task.without_local_state());
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    pub async fn remove(&self, id: &str) -> ClientResult<()> {
        debug!("API: DELETE /item/{}", id);
        let request = self.http.delete(self.item_url(id));
        self.send(request).await?;
        Ok(())
    }
}
