use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::config::Credentials;
use crate::domain::{Query, RecordId};
use crate::error::{ConfigError, FetchError, FluError};

pub const EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
pub const DATABASE: &str = "nucleotide";
const EFETCH_POST_THRESHOLD: usize = 200;

pub trait EntrezClient {
    /// Runs esearch and returns at most `max_results` UIDs in service order.
    fn search(&self, query: &Query, max_results: usize) -> Result<Vec<RecordId>, FetchError>;
    /// Runs efetch for `ids` and returns the concatenated GenBank flat files.
    fn fetch_genbank(&self, ids: &[RecordId]) -> Result<String, FetchError>;
}

impl<C: EntrezClient + ?Sized> EntrezClient for &C {
    fn search(&self, query: &Query, max_results: usize) -> Result<Vec<RecordId>, FetchError> {
        (**self).search(query, max_results)
    }

    fn fetch_genbank(&self, ids: &[RecordId]) -> Result<String, FetchError> {
        (**self).fetch_genbank(ids)
    }
}

/// Search then fetch. An empty id list short-circuits to an empty string.
pub fn fetch_metadata<C: EntrezClient + ?Sized>(
    client: &C,
    query: &Query,
    max_results: usize,
) -> Result<String, FetchError> {
    if max_results == 0 {
        tracing::debug!("max_results is 0, skipping esearch");
        return Ok(String::new());
    }
    let ids = client.search(query, max_results)?;
    tracing::info!(%query, ids = ids.len(), "esearch complete");
    if ids.is_empty() {
        return Ok(String::new());
    }
    let text = client.fetch_genbank(&ids)?;
    tracing::info!(bytes = text.len(), "efetch complete");
    Ok(text)
}

#[derive(Debug, Clone, Default)]
pub struct FetcherOptions {
    pub max_retries: usize,
    pub timeout: Option<Duration>,
}

#[derive(Clone)]
pub struct EntrezHttpClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
    options: FetcherOptions,
}

impl EntrezHttpClient {
    pub fn new(credentials: Credentials, options: FetcherOptions) -> Result<Self, FluError> {
        Self::with_base_url(credentials, options, EUTILS_BASE_URL)
    }

    pub fn with_base_url(
        credentials: Credentials,
        options: FetcherOptions,
        base_url: &str,
    ) -> Result<Self, FluError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("{}/{}", credentials.tool, env!("CARGO_PKG_VERSION")))
                .map_err(|err| ConfigError::InvalidHeader(err.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(options.timeout)
            .build()
            .map_err(|err| FetchError::Http(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            options,
        })
    }

    fn identity_params(&self) -> Vec<(&'static str, String)> {
        identity_params(&self.credentials)
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, FetchError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const BASE_DELAY_MS: u64 = 200;
        let max_retries = self.options.max_retries;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < max_retries && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        tracing::warn!(status, attempt, "retrying NCBI request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < max_retries && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        tracing::warn!(error = %err, attempt, "retrying NCBI request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(FetchError::Http(err.to_string()));
                }
            }
        }
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, FetchError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "NCBI request failed".to_string());
        Err(FetchError::Status { status, message })
    }
}

impl EntrezClient for EntrezHttpClient {
    fn search(&self, query: &Query, max_results: usize) -> Result<Vec<RecordId>, FetchError> {
        let url = format!("{}/esearch.fcgi", self.base_url);
        let mut params = search_params(query, max_results);
        params.extend(self.identity_params());

        let response = self.send_with_retries(|| self.client.get(&url).query(&params))?;
        let response = Self::handle_status(response)?;
        let body = response
            .text()
            .map_err(|err| FetchError::Http(err.to_string()))?;
        let mut ids = parse_search_ids(&body)?;
        ids.truncate(max_results);
        Ok(ids)
    }

    fn fetch_genbank(&self, ids: &[RecordId]) -> Result<String, FetchError> {
        if ids.is_empty() {
            return Ok(String::new());
        }
        let url = format!("{}/efetch.fcgi", self.base_url);
        let mut params = fetch_params(ids);
        params.extend(self.identity_params());

        let response = if ids.len() > EFETCH_POST_THRESHOLD {
            self.send_with_retries(|| self.client.post(&url).form(&params))?
        } else {
            self.send_with_retries(|| self.client.get(&url).query(&params))?
        };
        let response = Self::handle_status(response)?;
        response
            .text()
            .map_err(|err| FetchError::Http(err.to_string()))
    }
}

pub fn search_params(query: &Query, max_results: usize) -> Vec<(&'static str, String)> {
    vec![
        ("db", DATABASE.to_string()),
        ("term", query.as_str().to_string()),
        ("retmax", max_results.to_string()),
        ("retmode", "json".to_string()),
    ]
}

pub fn fetch_params(ids: &[RecordId]) -> Vec<(&'static str, String)> {
    let joined = ids
        .iter()
        .map(RecordId::as_str)
        .collect::<Vec<_>>()
        .join(",");
    vec![
        ("db", DATABASE.to_string()),
        ("id", joined),
        ("rettype", "gb".to_string()),
        ("retmode", "text".to_string()),
    ]
}

pub fn identity_params(credentials: &Credentials) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("email", credentials.email.clone()),
        ("tool", credentials.tool.clone()),
    ];
    if let Some(api_key) = &credentials.api_key {
        params.push(("api_key", api_key.clone()));
    }
    params
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    esearchresult: SearchResult,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    idlist: Vec<String>,
    #[serde(default, rename = "ERROR")]
    error: Option<String>,
}

pub fn parse_search_ids(body: &str) -> Result<Vec<RecordId>, FetchError> {
    let envelope: SearchEnvelope =
        serde_json::from_str(body).map_err(|err| FetchError::SearchResponse(err.to_string()))?;
    if let Some(error) = envelope.esearchresult.error {
        return Err(FetchError::SearchRejected(error));
    }
    Ok(envelope
        .esearchresult
        .idlist
        .into_iter()
        .map(RecordId::new)
        .collect())
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_search_ids_in_service_order() {
        let body = r#"{
            "header": {"type": "esearch", "version": "0.3"},
            "esearchresult": {
                "count": "41023", "retmax": "3", "retstart": "0",
                "idlist": ["2845113740", "2845113738", "2845113736"]
            }
        }"#;
        let ids = parse_search_ids(body).unwrap();
        let ids: Vec<&str> = ids.iter().map(RecordId::as_str).collect();
        assert_eq!(ids, vec!["2845113740", "2845113738", "2845113736"]);
    }

    #[test]
    fn parse_search_reports_service_error() {
        let body = r#"{"esearchresult": {"ERROR": "Invalid db name specified: nucleotid"}}"#;
        let err = parse_search_ids(body).unwrap_err();
        assert_matches!(err, FetchError::SearchRejected(message) if message.contains("nucleotid"));
    }

    #[test]
    fn parse_search_rejects_html() {
        let err = parse_search_ids("<html>busy</html>").unwrap_err();
        assert_matches!(err, FetchError::SearchResponse(_));
    }

    #[test]
    fn fetch_params_join_ids() {
        let ids = vec![RecordId::new("1"), RecordId::new("22")];
        let params = fetch_params(&ids);
        assert!(params.contains(&("id", "1,22".to_string())));
        assert!(params.contains(&("rettype", "gb".to_string())));
        assert!(params.contains(&("db", "nucleotide".to_string())));
    }

    #[test]
    fn identity_params_include_api_key_when_set() {
        let mut credentials = Credentials::new("someone@example.org");
        assert_eq!(identity_params(&credentials).len(), 2);
        credentials.api_key = Some("key".to_string());
        let params = identity_params(&credentials);
        assert!(params.contains(&("api_key", "key".to_string())));
    }
}
