use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client as HttpClient, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::api::ContactsApi;
use crate::api::models::{
    AssociationResult, CollectionResponse, Contact, ContactPage, MEETING_PROPERTIES,
    MEETING_TO_CONTACT_ASSOCIATION, CONTACT_PROPERTIES, Meeting, MeetingInput, ObjectRecord,
    Owner, PropertyDefinition, PropertyPatch, SearchRequest,
};
use crate::config::BrandCredentials;
use crate::error::ApiError;
use crate::utils::normalize_url;

pub struct HubSpotClient {
    pub http: HttpClient,
    base: String,
    token: String,
}

impl HubSpotClient {
    /// Fails with [`ApiError::Config`] before any request when the base URL
    /// or token is missing.
    pub fn new(credentials: &BrandCredentials, timeout: Duration) -> Result<Self, ApiError> {
        if credentials.base_url.trim().is_empty() || credentials.token.trim().is_empty() {
            return Err(ApiError::config("HUBSPOT_API_BASE or HUBSPOT_ACCESS_TOKEN"));
        }
        let base = normalize_url(&credentials.base_url)
            .trim_end_matches('/')
            .to_string();
        Url::parse(&base).map_err(|e| ApiError::config(format!("a valid HUBSPOT_API_BASE ({e})")))?;
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base,
            token: credentials.token.trim().to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Url::parse(&format!("{}{}", self.base, path))
            .map_err(|e| ApiError::config(format!("a valid endpoint for {path} ({e})")))
    }

    /// `GET` endpoint for one page of contacts; an empty cursor is left out.
    fn list_url(&self, after: Option<&str>, limit: u32) -> Result<Url, ApiError> {
        let mut url = self.endpoint("/crm/v3/objects/contacts")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &limit.to_string());
            query.append_pair("properties", &CONTACT_PROPERTIES.join(","));
            if let Some(after) = after.filter(|a| !a.is_empty()) {
                query.append_pair("after", after);
            }
        }
        Ok(url)
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
    }

    async fn check(resp: Response) -> Result<Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        warn!("HubSpot returned {status}: {body}");
        Err(ApiError::from_response(status.as_u16(), body))
    }

    async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        let resp = Self::check(resp).await?;
        let text = resp.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        debug!("GET {url}");
        let resp = self.with_auth(self.http.get(url)).send().await?;
        Self::decode(resp).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: Url,
        body: &serde_json::Value,
    ) -> Result<T, ApiError> {
        debug!("{method} {url}");
        let resp = self
            .with_auth(self.http.request(method, url))
            .json(body)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn read_meetings(&self, contact_id: &str, ids: Vec<String>) -> Result<Vec<Meeting>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({
            "properties": MEETING_PROPERTIES,
            "inputs": ids.iter().map(|id| json!({ "id": id })).collect::<Vec<_>>(),
        });
        let url = self.endpoint("/crm/v3/objects/meetings/batch/read")?;
        let resp: CollectionResponse<ObjectRecord> =
            self.send_json(reqwest::Method::POST, url, &body).await?;
        let mut meetings: Vec<Meeting> = resp
            .results
            .into_iter()
            .map(|record| Meeting::from_record(contact_id, record))
            .collect();
        meetings.sort_by(|a, b| b.occurred_at().cmp(&a.occurred_at()));
        Ok(meetings)
    }
}

#[async_trait]
impl ContactsApi for HubSpotClient {
    async fn list_contacts(&self, after: Option<&str>, limit: u32) -> Result<ContactPage, ApiError> {
        let url = self.list_url(after, limit)?;
        let resp: CollectionResponse<Contact> = self.get_json(url).await?;
        Ok(resp.into())
    }

    async fn search_contacts(&self, request: &SearchRequest) -> Result<ContactPage, ApiError> {
        let url = self.endpoint("/crm/v3/objects/contacts/search")?;
        let body = serde_json::to_value(request)?;
        let resp: CollectionResponse<Contact> =
            self.send_json(reqwest::Method::POST, url, &body).await?;
        Ok(resp.into())
    }

    async fn get_contact(&self, id: &str) -> Result<Contact, ApiError> {
        let mut url = self.endpoint(&format!("/crm/v3/objects/contacts/{id}"))?;
        url.query_pairs_mut()
            .append_pair("properties", &CONTACT_PROPERTIES.join(","));
        self.get_json(url).await
    }

    async fn create_contact(&self, properties: &PropertyPatch) -> Result<Contact, ApiError> {
        let url = self.endpoint("/crm/v3/objects/contacts")?;
        self.send_json(reqwest::Method::POST, url, &json!({ "properties": properties }))
            .await
    }

    async fn update_contact(&self, id: &str, properties: &PropertyPatch) -> Result<Contact, ApiError> {
        let url = self.endpoint(&format!("/crm/v3/objects/contacts/{id}"))?;
        self.send_json(reqwest::Method::PATCH, url, &json!({ "properties": properties }))
            .await
    }

    async fn contact_properties(&self) -> Result<Vec<PropertyDefinition>, ApiError> {
        let url = self.endpoint("/crm/v3/properties/contacts")?;
        let resp: CollectionResponse<PropertyDefinition> = self.get_json(url).await?;
        Ok(resp.results)
    }

    async fn total_contacts_estimate(&self) -> Result<Option<u64>, ApiError> {
        let mut url = self.endpoint("/crm/v3/objects/contacts")?;
        url.query_pairs_mut().append_pair("limit", "1");
        let resp: CollectionResponse<serde_json::Value> = self.get_json(url).await?;
        Ok(resp.total)
    }

    async fn owners(&self) -> Result<Vec<Owner>, ApiError> {
        let url = self.endpoint("/crm/v3/owners")?;
        let resp: CollectionResponse<Owner> = self.get_json(url).await?;
        Ok(resp.results)
    }

    async fn meetings_for_contact(&self, contact_id: &str) -> Result<Vec<Meeting>, ApiError> {
        let url = self.endpoint(&format!(
            "/crm/v4/objects/contacts/{contact_id}/associations/meetings"
        ))?;
        let assoc: CollectionResponse<AssociationResult> = self.get_json(url).await?;
        let ids = assoc.results.iter().filter_map(|a| a.object_id()).collect();
        self.read_meetings(contact_id, ids).await
    }

    async fn create_meeting(&self, contact_id: &str, input: &MeetingInput) -> Result<Meeting, ApiError> {
        let url = self.endpoint("/crm/v3/objects/meetings")?;
        let body = json!({
            "properties": input.to_properties(),
            "associations": [{
                "to": { "id": contact_id },
                "types": [{
                    "associationCategory": "HUBSPOT_DEFINED",
                    "associationTypeId": MEETING_TO_CONTACT_ASSOCIATION,
                }],
            }],
        });
        let record: ObjectRecord = self.send_json(reqwest::Method::POST, url, &body).await?;
        Ok(Meeting::from_record(contact_id, record))
    }

    async fn update_meeting(
        &self,
        contact_id: &str,
        meeting_id: &str,
        input: &MeetingInput,
    ) -> Result<Meeting, ApiError> {
        let url = self.endpoint(&format!("/crm/v3/objects/meetings/{meeting_id}"))?;
        let body = json!({ "properties": input.to_properties() });
        let record: ObjectRecord = self.send_json(reqwest::Method::PATCH, url, &body).await?;
        Ok(Meeting::from_record(contact_id, record))
    }

    async fn delete_meeting(&self, meeting_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("/crm/v3/objects/meetings/{meeting_id}"))?;
        debug!("DELETE {url}");
        let resp = self.with_auth(self.http.delete(url)).send().await?;
        Self::check(resp).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(base: &str, token: &str) -> BrandCredentials {
        BrandCredentials {
            base_url: base.into(),
            token: token.into(),
        }
    }

    #[test]
    fn missing_credentials_fail_before_any_request() {
        let err = HubSpotClient::new(&creds("", "pat-123"), Duration::from_secs(5))
            .err()
            .unwrap();
        assert!(matches!(err, ApiError::Config { .. }));

        let err = HubSpotClient::new(&creds("https://api.hubapi.com", "  "), Duration::from_secs(5))
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Missing HUBSPOT_API_BASE or HUBSPOT_ACCESS_TOKEN");
    }

    #[test]
    fn base_url_is_normalized() {
        let client = HubSpotClient::new(&creds("api.hubapi.com/", "pat-123"), Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "https://api.hubapi.com");
        assert_eq!(
            client.endpoint("/crm/v3/objects/contacts/search").unwrap().as_str(),
            "https://api.hubapi.com/crm/v3/objects/contacts/search"
        );
    }

    #[test]
    fn list_url_carries_limit_properties_and_cursor() {
        let client = HubSpotClient::new(&creds("https://api.hubapi.com", "pat-123"), Duration::from_secs(5)).unwrap();

        let url = client.list_url(Some("abc"), 12).unwrap();
        assert_eq!(url.path(), "/crm/v3/objects/contacts");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("limit".to_string(), "12".to_string()));
        assert_eq!(pairs[1], ("properties".to_string(), CONTACT_PROPERTIES.join(",")));
        assert_eq!(pairs[2], ("after".to_string(), "abc".to_string()));

        for after in [None, Some("")] {
            let url = client.list_url(after, 100).unwrap();
            assert!(url.query_pairs().all(|(key, _)| key != "after"));
        }
    }
}
