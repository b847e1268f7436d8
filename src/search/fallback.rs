use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ProviderSpec;
use crate::credentials::{Credential, CredentialResolver};
use crate::providers::{SearchOptions, SearchPayload, SearchProvider};
use crate::usage::UsageStore;

/// A configured provider paired with the adapter that talks to it.
#[derive(Debug, Clone)]
pub struct Provider<A> {
    pub spec: ProviderSpec,
    pub adapter: A,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub count: u32,
    pub options: SearchOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub provider: String,
    pub query: String,
    pub results: SearchPayload,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("query must not be empty")]
    EmptyQuery,

    /// Every provider was skipped or failed. `last_error` is the most recent
    /// failure of a provider that was actually called, if any was.
    #[error("all search providers exhausted or failed")]
    Exhausted { last_error: Option<String> },
}

/// Why a provider was passed over without being called.
#[derive(Debug, thiserror::Error)]
enum Skip {
    #[error("monthly quota used ({used}/{limit})")]
    QuotaExceeded { used: u32, limit: u32 },

    #[error("credential {key} not set")]
    MissingCredential { key: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderUsage {
    pub provider: String,
    pub family: &'static str,
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    pub month: String,
}

/// Tries providers one at a time, charging quota only to the one that answers.
pub struct FallbackSearch<A, C> {
    providers: Vec<Provider<A>>,
    primary: Option<String>,
    usage: Arc<UsageStore>,
    credentials: C,
}

impl<A: SearchProvider, C: CredentialResolver> FallbackSearch<A, C> {
    pub fn new(
        providers: Vec<Provider<A>>,
        primary: Option<String>,
        usage: Arc<UsageStore>,
        credentials: C,
    ) -> Self {
        if let Some(primary) = &primary
            && !providers.iter().any(|p| &p.spec.id == primary)
        {
            warn!(primary = %primary, "primary provider is not configured, using configured order");
        }
        Self {
            providers,
            primary,
            usage,
            credentials,
        }
    }

    /// The primary provider first, then the rest in configured order.
    pub fn attempt_order(&self) -> Vec<&Provider<A>> {
        let primary = self.primary.as_deref();
        let (mut order, rest): (Vec<_>, Vec<_>) = self
            .providers
            .iter()
            .partition(|p| Some(p.spec.id.as_str()) == primary);
        order.extend(rest);
        order
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResult, SearchError> {
        if request.query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let mut last_error = None;
        for provider in self.attempt_order() {
            let id = provider.spec.id.as_str();
            let credential = match self.admit(&provider.spec).await {
                Ok(credential) => credential,
                Err(skip @ Skip::MissingCredential { .. }) => {
                    warn!(provider = id, reason = %skip, "skipping provider");
                    continue;
                }
                Err(skip) => {
                    info!(provider = id, reason = %skip, "skipping provider");
                    continue;
                }
            };

            debug!(provider = id, count = request.count, "attempting search");
            match provider
                .adapter
                .search(&credential, &request.query, request.count, &request.options)
                .await
            {
                Ok(results) => {
                    self.usage.increment(id).await;
                    info!(provider = id, results = ?results.item_count(), "search succeeded");
                    return Ok(SearchResult {
                        provider: id.to_string(),
                        query: request.query.clone(),
                        results,
                    });
                }
                Err(e) => {
                    warn!(provider = id, error = %e, "provider failed, falling back");
                    last_error = Some(e.to_string());
                }
            }
        }

        warn!(last_error = last_error.as_deref().unwrap_or("-"), "no provider could serve the search");
        Err(SearchError::Exhausted { last_error })
    }

    /// Quota first, then credential: a provider over quota is never asked for a key.
    async fn admit(&self, spec: &ProviderSpec) -> Result<Credential, Skip> {
        let used = self.usage.get_usage(&spec.id).await;
        if used >= spec.monthly_limit {
            return Err(Skip::QuotaExceeded {
                used,
                limit: spec.monthly_limit,
            });
        }
        self.credentials
            .resolve(&spec.api_key_env)
            .ok_or_else(|| Skip::MissingCredential {
                key: spec.api_key_env.clone(),
            })
    }

    /// Current-month usage of every configured provider, in attempt order.
    pub async fn usage_report(&self) -> Vec<ProviderUsage> {
        let month = self.usage.current_month().to_string();
        let mut report = Vec::with_capacity(self.providers.len());
        for provider in self.attempt_order() {
            let spec = &provider.spec;
            let used = self.usage.get_usage(&spec.id).await;
            report.push(ProviderUsage {
                provider: spec.id.clone(),
                family: spec.family.as_str(),
                used,
                limit: spec.monthly_limit,
                remaining: spec.monthly_limit.saturating_sub(used),
                month: month.clone(),
            });
        }
        report
    }
}


#[cfg(test)]
mod http_tests {
    use super::*;
    use crate::credentials::EnvCredentials;
    use crate::providers::{Adapter, ProviderFamily};
    use reqwest::Client;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn server_error_from_real_adapter_exhausts_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let creds_path = dir.path().join("credentials.json");
        std::fs::write(&creds_path, r#"{"QUOTA_SEARCH_HTTP_TEST_KEY": "k"}"#).unwrap();

        let spec = ProviderSpec {
            id: "own".into(),
            family: ProviderFamily::Custom,
            api_key_env: "QUOTA_SEARCH_HTTP_TEST_KEY".into(),
            monthly_limit: 10,
            endpoint: Some(server.uri()),
            options: Default::default(),
        };
        let usage = Arc::new(UsageStore::in_memory());
        let search = FallbackSearch::new(
            vec![Provider {
                adapter: Adapter::for_spec(Client::new(), &spec),
                spec,
            }],
            None,
            usage.clone(),
            EnvCredentials::new().with_file(&creds_path),
        );

        let request = SearchRequest {
            query: "test".into(),
            count: 10,
            options: SearchOptions::default(),
        };
        let err = search.search(&request).await.unwrap_err();

        match err {
            SearchError::Exhausted {
                last_error: Some(message),
            } => assert!(message.contains("500"), "got: {message}"),
            other => panic!("expected Exhausted with last error, got: {other:?}"),
        }
        assert_eq!(usage.get_usage("own").await, 0);
    }
}
