//! Typed backend endpoints called on behalf of a signed-in user.

use crate::models::connection::{
    ConnectionCompleteRequest, ConnectionStartRequest, ConnectionStartResponse,
};
use crate::models::{
    Area, AreaPatch, ConnectionStatus, DiscordChannel, NewArea, Provider, ServiceInfo,
};
use crate::services::authed_client::{AuthedClient, TokenStore};
use crate::services::backend_client::{decode_json, expect_success};
use crate::services::error::ApiError;
use reqwest::Method;

impl AuthedClient {
    pub async fn list_areas(&self, store: &dyn TokenStore) -> Result<Vec<Area>, ApiError> {
        let response = self
            .send(store, |backend| backend.request(Method::GET, "/areas"))
            .await?;
        decode_json(response).await
    }

    pub async fn get_area(&self, store: &dyn TokenStore, id: &str) -> Result<Area, ApiError> {
        let path = format!("/areas/{}", id);
        let response = self
            .send(store, |backend| backend.request(Method::GET, &path))
            .await?;
        decode_json(response).await
    }

    pub async fn create_area(
        &self,
        store: &dyn TokenStore,
        area: &NewArea,
    ) -> Result<Area, ApiError> {
        let response = self
            .send(store, |backend| {
                backend.request(Method::POST, "/areas").json(area)
            })
            .await?;
        decode_json(response).await
    }

    pub async fn update_area(
        &self,
        store: &dyn TokenStore,
        id: &str,
        patch: &AreaPatch,
    ) -> Result<Area, ApiError> {
        let path = format!("/areas/{}", id);
        let response = self
            .send(store, |backend| {
                backend.request(Method::PATCH, &path).json(patch)
            })
            .await?;
        decode_json(response).await
    }

    pub async fn delete_area(&self, store: &dyn TokenStore, id: &str) -> Result<(), ApiError> {
        let path = format!("/areas/{}", id);
        let response = self
            .send(store, |backend| backend.request(Method::DELETE, &path))
            .await?;
        expect_success(response).await
    }

    pub async fn list_services(
        &self,
        store: &dyn TokenStore,
    ) -> Result<Vec<ServiceInfo>, ApiError> {
        let response = self
            .send(store, |backend| backend.request(Method::GET, "/services"))
            .await?;
        decode_json(response).await
    }

    pub async fn list_connections(
        &self,
        store: &dyn TokenStore,
    ) -> Result<Vec<ConnectionStatus>, ApiError> {
        let response = self
            .send(store, |backend| backend.request(Method::GET, "/connections"))
            .await?;
        decode_json(response).await
    }

    /// Ask the backend for the provider authorization URL bound to `state`.
    pub async fn start_connection(
        &self,
        store: &dyn TokenStore,
        provider: Provider,
        state: &str,
        redirect_uri: &str,
    ) -> Result<String, ApiError> {
        let path = format!("/connections/{}/start", provider.slug());
        let body = ConnectionStartRequest {
            state,
            redirect_uri,
        };
        let response = self
            .send(store, |backend| {
                backend.request(Method::POST, &path).json(&body)
            })
            .await?;
        let started: ConnectionStartResponse = decode_json(response).await?;
        Ok(started.url)
    }

    pub async fn complete_connection(
        &self,
        store: &dyn TokenStore,
        provider: Provider,
        code: &str,
        state: &str,
        redirect_uri: &str,
    ) -> Result<(), ApiError> {
        let path = format!("/connections/{}/complete", provider.slug());
        let body = ConnectionCompleteRequest {
            code,
            state,
            redirect_uri,
        };
        let response = self
            .send(store, |backend| {
                backend.request(Method::POST, &path).json(&body)
            })
            .await?;
        expect_success(response).await
    }

    pub async fn discord_channels(
        &self,
        store: &dyn TokenStore,
        guild_id: &str,
    ) -> Result<Vec<DiscordChannel>, ApiError> {
        let path = format!("/connections/discord/guilds/{}/channels", guild_id);
        let response = self
            .send(store, |backend| backend.request(Method::GET, &path))
            .await?;
        decode_json(response).await
    }
}
