//! Typesense REST client.

use crate::import::{ImportLine, encode_jsonl, summarize};
use equipment_search_core::search::{
    CollectionSchema, CollectionSummary, Result, SearchDocument, SearchIndex, SearchIndexError,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use std::time::Duration;

const API_KEY_HEADER: &str = "X-TYPESENSE-API-KEY";

/// Typesense client implementing [`SearchIndex`].
///
/// # Example
///
/// ```no_run
/// use equipment_search_typesense::TypesenseClient;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = TypesenseClient::builder()
///     .host("typesense")
///     .port(8108)
///     .protocol("http")
///     .api_key("secret")
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// assert_eq!(client.base_url(), "http://typesense:8108");
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct TypesenseClient {
    client: Client,
    base_url: String,
    endpoint: Url,
    api_key: String,
}

impl TypesenseClient {
    /// Create a client for `base_url` (e.g. `http://localhost:8108`) with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`SearchIndexError::Transport`] if `base_url` is not a valid URL or the HTTP
    /// client cannot be created.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let endpoint = parse_endpoint(&base_url)?;
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| {
                SearchIndexError::Transport(format!("Failed to create HTTP client: {e}"))
            })?;
        Ok(Self {
            client,
            base_url,
            endpoint,
            api_key: api_key.into(),
        })
    }

    /// Create a new builder for configuring the client.
    #[must_use]
    pub fn builder() -> TypesenseClientBuilder {
        TypesenseClientBuilder::default()
    }

    /// Base URL of the Typesense node.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the endpoint made of `segments`, each percent-encoded as a single segment.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| {
                SearchIndexError::Transport(format!("{} cannot be a base URL", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, segments: &[&str]) -> Result<RequestBuilder> {
        Ok(self
            .client
            .request(method, self.url(segments)?)
            .header(API_KEY_HEADER, &self.api_key))
    }

    async fn send(request: RequestBuilder, resource: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| SearchIndexError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), %resource, %body, "Typesense request rejected");
        Err(match status {
            StatusCode::NOT_FOUND => SearchIndexError::NotFound(resource.to_string()),
            StatusCode::CONFLICT => SearchIndexError::Conflict(resource.to_string()),
            status => SearchIndexError::Api {
                status: status.as_u16(),
                message: body,
            },
        })
    }

    async fn send_json<T: Serialize + Sync>(
        request: RequestBuilder,
        body: &T,
        resource: &str,
    ) -> Result<Response> {
        Self::send(request.json(body), resource).await
    }
}

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

fn parse_endpoint(base_url: &str) -> Result<Url> {
    let endpoint = Url::parse(base_url).map_err(|e| {
        SearchIndexError::Transport(format!("Invalid Typesense URL {base_url}: {e}"))
    })?;
    if endpoint.cannot_be_a_base() {
        return Err(SearchIndexError::Transport(format!(
            "Invalid Typesense URL {base_url}: not a base URL"
        )));
    }
    Ok(endpoint)
}

/// Builder for configuring a [`TypesenseClient`].
///
/// Defaults: `http://localhost:8108`, 30 second timeout. The API key is required.
#[derive(Default, Debug)]
pub struct TypesenseClientBuilder {
    host: Option<String>,
    port: Option<u16>,
    protocol: Option<String>,
    api_key: Option<String>,
    timeout: Option<Duration>,
}

impl TypesenseClientBuilder {
    /// Set the host name.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the protocol (`http` or `https`).
    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Set the API key.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the [`TypesenseClient`].
    ///
    /// # Errors
    ///
    /// Returns [`SearchIndexError::Transport`] if:
    /// - the API key is not set
    /// - host, port and protocol do not form a valid URL
    /// - the HTTP client cannot be created
    pub fn build(self) -> Result<TypesenseClient> {
        let api_key = self
            .api_key
            .ok_or_else(|| SearchIndexError::Transport("API key not configured".to_string()))?;
        let base_url = format!(
            "{}://{}:{}",
            self.protocol.as_deref().unwrap_or("http"),
            self.host.as_deref().unwrap_or("localhost"),
            self.port.unwrap_or(8108)
        );
        let endpoint = parse_endpoint(&base_url)?;

        let client = Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|e| {
                SearchIndexError::Transport(format!("Failed to create HTTP client: {e}"))
            })?;

        tracing::info!(url = %base_url, "Typesense client configured");

        Ok(TypesenseClient {
            client,
            base_url,
            endpoint,
            api_key,
        })
    }
}

#[derive(Serialize)]
struct AliasBody<'a> {
    collection_name: &'a str,
}

impl SearchIndex for TypesenseClient {
    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        let request = self.request(reqwest::Method::POST, &["collections"])?;
        Self::send_json(request, schema, &format!("collection {}", schema.name)).await?;
        tracing::debug!(collection = %schema.name, "Created collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let request = self.request(reqwest::Method::DELETE, &["collections", name])?;
        Self::send(request, &format!("collection {name}")).await?;
        tracing::debug!(collection = %name, "Deleted collection");
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        let request = self.request(reqwest::Method::GET, &["collections"])?;
        Self::send(request, "collections")
            .await?
            .json()
            .await
            .map_err(|e| SearchIndexError::Serialization(e.to_string()))
    }

    async fn upsert_document(&self, collection: &str, document: &SearchDocument) -> Result<()> {
        let request = self
            .request(reqwest::Method::POST, &["collections", collection, "documents"])?
            .query(&[("action", "upsert")]);
        Self::send_json(request, document, &format!("collection {collection}")).await?;
        Ok(())
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        document: &SearchDocument,
    ) -> Result<()> {
        let request = self.request(
            reqwest::Method::PATCH,
            &["collections", collection, "documents", id],
        )?;
        Self::send_json(request, document, &format!("document {id} in {collection}")).await?;
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<()> {
        let request = self.request(
            reqwest::Method::DELETE,
            &["collections", collection, "documents", id],
        )?;
        Self::send(request, &format!("document {id} in {collection}")).await?;
        Ok(())
    }

    async fn import_documents(
        &self,
        collection: &str,
        documents: &[SearchDocument],
        batch_size: usize,
    ) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let body = encode_jsonl(documents)?;
        let request = self
            .request(
                reqwest::Method::POST,
                &["collections", collection, "documents", "import"],
            )?
            .query(&[("action", "upsert")])
            .query(&[("batch_size", batch_size)])
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(body);
        let response = Self::send(request, &format!("collection {collection}"))
            .await?
            .text()
            .await
            .map_err(|e| SearchIndexError::Transport(e.to_string()))?;

        let lines = response
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str::<ImportLine>)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                SearchIndexError::Serialization(format!("Invalid import response: {e}"))
            })?;

        let imported = summarize(collection, &lines)?;
        tracing::debug!(%collection, imported, "Imported documents");
        Ok(imported)
    }

    async fn upsert_alias(&self, alias: &str, collection: &str) -> Result<()> {
        let request = self.request(reqwest::Method::PUT, &["aliases", alias])?;
        let body = AliasBody {
            collection_name: collection,
        };
        Self::send_json(request, &body, &format!("alias {alias}")).await?;
        tracing::debug!(%alias, %collection, "Alias updated");
        Ok(())
    }
}
