use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{Acta, ActaId, Equipment, EquipmentId, HistoryEntry, HistoryId, User, UserId},
    protocol::{
        AssignEquipmentRequest, GenerateActaRequest, GeneratedActa, ListRequest, ListResponse,
        ListResult, LoginRequest, NewActa, NewEquipment, NewUser, ReturnEquipmentRequest,
        SearchResponse, Session, TransferEquipmentRequest, UpdateEquipment, UpdateUser,
    },
};
use tracing::{debug, info, warn};
use url::Url;

pub mod context;
pub mod coordinator;
pub mod entities;
pub mod error;
pub mod notify;

pub use context::{AppContext, Preferences};
pub use coordinator::{
    CoordinatorConfig, CoordinatorState, ListBackend, ListCoordinator, ListItem, ListQuery, Mode,
    QueryError, SearchStrategy,
};
pub use entities::{EntityKind, HttpListBackend, ACTAS, EQUIPMENT, HISTORY, USERS};
pub use error::{ClientError, ClientResult};
pub use notify::{BroadcastNotifier, LogNotifier, Notification, NotificationLevel, Notifier};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client for the inventory REST API. Cheap to clone; clones share the
/// underlying connection pool.
#[derive(Clone)]
pub struct InventoryClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl InventoryClient {
    pub fn new(base_url: &str) -> ClientResult<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    fn request(&self, method: Method, path: &str) -> ClientResult<RequestBuilder> {
        let url = self.endpoint(path)?;
        let builder = self.http.request(method, url);
        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn get_json<R>(&self, path: &str, query: &[(String, String)]) -> ClientResult<R>
    where
        R: DeserializeOwned,
    {
        let response = self.request(Method::GET, path)?.query(query).send().await?;
        read_json(response).await
    }

    async fn send_json<B, R>(&self, method: Method, path: &str, body: &B) -> ClientResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.request(method, path)?.json(body).send().await?;
        read_json(response).await
    }

    pub async fn login(&self, email: &str, password: &str) -> ClientResult<Session> {
        let session: Session = self
            .send_json(
                Method::POST,
                "auth/login",
                &LoginRequest {
                    email: email.to_string(),
                    password: password.to_string(),
                },
            )
            .await?;
        info!(user_id = session.user.id.0, "signed in to inventory API");
        Ok(session)
    }

    pub async fn list_entities<T>(
        &self,
        entity: &EntityKind,
        request: &ListRequest,
    ) -> ClientResult<ListResult<T>>
    where
        T: DeserializeOwned,
    {
        debug!(
            entity = entity.name,
            page = request.page,
            page_size = request.page_size,
            filters = ?request.filters,
            "GET list"
        );
        let response: ListResponse<T> = self
            .get_json(entity.path, &request.query_pairs())
            .await?;
        Ok(response.into())
    }

    pub async fn search_entities<T>(&self, entity: &EntityKind, term: &str) -> ClientResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        debug!(entity = entity.name, term, "GET search");
        let response: SearchResponse<T> = self
            .get_json(
                &format!("{}/search", entity.path),
                &[("q".to_string(), term.to_string())],
            )
            .await?;
        Ok(response.items)
    }

    pub async fn create_equipment(&self, equipment: &NewEquipment) -> ClientResult<Equipment> {
        self.send_json(Method::POST, EQUIPMENT.path, equipment).await
    }

    pub async fn update_equipment(
        &self,
        id: EquipmentId,
        updates: &UpdateEquipment,
    ) -> ClientResult<Equipment> {
        self.send_json(Method::PUT, &format!("{}/{id}", EQUIPMENT.path), updates)
            .await
    }

    pub async fn delete_equipment(&self, id: EquipmentId) -> ClientResult<()> {
        let response = self
            .request(Method::DELETE, &format!("{}/{id}", EQUIPMENT.path))?
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    pub async fn create_user(&self, user: &NewUser) -> ClientResult<User> {
        self.send_json(Method::POST, USERS.path, user).await
    }

    pub async fn update_user(&self, id: UserId, updates: &UpdateUser) -> ClientResult<User> {
        self.send_json(Method::PUT, &format!("{}/{id}", USERS.path), updates)
            .await
    }

    pub async fn assign_equipment(
        &self,
        request: &AssignEquipmentRequest,
    ) -> ClientResult<HistoryEntry> {
        self.send_json(Method::POST, &format!("{}/assign", HISTORY.path), request)
            .await
    }

    pub async fn return_equipment(
        &self,
        id: HistoryId,
        request: &ReturnEquipmentRequest,
    ) -> ClientResult<HistoryEntry> {
        self.send_json(
            Method::POST,
            &format!("{}/{id}/return", HISTORY.path),
            request,
        )
        .await
    }

    /// Closes the active assignment and opens a new one for the target user.
    pub async fn transfer_equipment(
        &self,
        id: HistoryId,
        request: &TransferEquipmentRequest,
    ) -> ClientResult<HistoryEntry> {
        self.send_json(
            Method::POST,
            &format!("{}/{id}/transfer", HISTORY.path),
            request,
        )
        .await
    }

    pub async fn create_acta(&self, acta: &NewActa) -> ClientResult<Acta> {
        self.send_json(Method::POST, ACTAS.path, acta).await
    }

    pub async fn generate_acta(
        &self,
        id: ActaId,
        history_id: HistoryId,
    ) -> ClientResult<GeneratedActa> {
        self.send_json(
            Method::POST,
            &format!("{}/{id}/generate", ACTAS.path),
            &GenerateActaRequest { history_id },
        )
        .await
    }
}

fn normalize_base_url(raw: &str) -> ClientResult<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ClientError::InvalidUrl("empty base url".to_string()));
    }
    // Url::join drops the last path segment unless it ends with a slash.
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    let url = Url::parse(&with_slash)?;
    if url.cannot_be_a_base() {
        return Err(ClientError::InvalidUrl(format!("{raw} cannot be a base url")));
    }
    Ok(url)
}

async fn ensure_success(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let err = ClientError::from_response(status, &body);
    warn!(status = status.as_u16(), error = %err, "inventory API rejected request");
    Err(err)
}

async fn read_json<R: DeserializeOwned>(response: Response) -> ClientResult<R> {
    let response = ensure_success(response).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
