//! Paginated HTTP client for the review endpoint.
//!
//! The endpoint takes `app_id`, `lang`, `country`, `sort`, `count` and an
//! optional `continuation_token`, and answers with
//! `{"reviews": [...], "next_token": "..."}`.

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::catalog::AppEntry;
use crate::errors::TrainingError;
use crate::nlp::{FetchProgress, Review, ReviewSource};
use crate::studio_config::ScraperSection;

#[derive(Debug, Deserialize)]
struct ReviewPage {
    #[serde(default)]
    reviews: Vec<Review>,
    #[serde(default)]
    next_token: Option<String>,
}

pub struct HttpReviewSource {
    client: reqwest::Client,
    endpoint: String,
    page_size: usize,
    lang: String,
    country: String,
}

impl HttpReviewSource {
    pub fn new(settings: &ScraperSection) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: settings.endpoint.clone(),
            page_size: settings.page_size.max(1),
            lang: settings.lang.clone(),
            country: settings.country.clone(),
        }
    }

    async fn fetch_page(
        &self,
        package: &str,
        count: usize,
        token: Option<&str>,
    ) -> anyhow::Result<ReviewPage> {
        let count = count.to_string();
        let mut query = vec![
            ("app_id", package),
            ("lang", self.lang.as_str()),
            ("country", self.country.as_str()),
            ("sort", "newest"),
            ("count", count.as_str()),
        ];
        if let Some(token) = token {
            query.push(("continuation_token", token));
        }
        self.client
            .get(&self.endpoint)
            .query(&query)
            .send()
            .await
            .context("Failed to send review request")?
            .error_for_status()
            .context("Review endpoint returned error status")?
            .json::<ReviewPage>()
            .await
            .context("Failed to parse review page")
    }
}

#[async_trait]
impl ReviewSource for HttpReviewSource {
    async fn fetch(
        &self,
        app: &AppEntry,
        limit: usize,
        on_progress: FetchProgress<'_>,
    ) -> Result<Vec<Review>, TrainingError> {
        let mut reviews: Vec<Review> = Vec::new();
        let mut token: Option<String> = None;

        while reviews.len() < limit {
            let count = self.page_size.min(limit - reviews.len());
            let page = match self.fetch_page(&app.package, count, token.as_deref()).await {
                Ok(page) => page,
                // Whatever was fetched so far is kept.
                Err(e) if !reviews.is_empty() => {
                    warn!(
                        app = %app.slug,
                        fetched = reviews.len(),
                        error = %format!("{:#}", e),
                        "stopping scrape early"
                    );
                    break;
                }
                Err(e) => return Err(TrainingError::Scrape(format!("{:#}", e))),
            };
            if page.reviews.is_empty() {
                break;
            }
            reviews.extend(page.reviews);
            debug!(app = %app.slug, fetched = reviews.len(), limit, "scrape progress");
            on_progress(reviews.len(), limit);

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        reviews.truncate(limit);
        Ok(reviews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::Router;
    use axum::extract::Query;
    use axum::routing::get;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves three pages of two reviews each.
    async fn serve_pages() -> String {
        async fn handler(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
            let page: usize = params
                .get("continuation_token")
                .and_then(|t| t.parse().ok())
                .unwrap_or(0);
            if page >= 3 {
                return Json(json!({ "reviews": [] }));
            }
            let reviews: Vec<Value> = (0..2)
                .map(|i| {
                    json!({
                        "content": format!("review {}-{}", page, i),
                        "score": 5,
                        "at": "2024-01-01"
                    })
                })
                .collect();
            Json(json!({ "reviews": reviews, "next_token": (page + 1).to_string() }))
        }

        let app = Router::new().route("/reviews", get(handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/reviews", addr)
    }

    fn source(endpoint: String, page_size: usize) -> HttpReviewSource {
        HttpReviewSource::new(&ScraperSection {
            endpoint,
            page_size,
            ..ScraperSection::default()
        })
    }

    #[tokio::test]
    async fn test_follows_continuation_tokens_until_empty_page() {
        let endpoint = serve_pages().await;
        let scraper = source(endpoint, 2);
        let seen = Mutex::new(Vec::new());
        let report = |fetched: usize, total: usize| seen.lock().unwrap().push((fetched, total));

        let entry = crate::catalog::default_apps().remove(0);
        let reviews = scraper.fetch(&entry, 100, &report).await.unwrap();
        assert_eq!(reviews.len(), 6);
        assert_eq!(reviews[0].content, "review 0-0");
        assert_eq!(*seen.lock().unwrap(), vec![(2, 100), (4, 100), (6, 100)]);
    }

    #[tokio::test]
    async fn test_stops_at_limit() {
        let endpoint = serve_pages().await;
        let scraper = source(endpoint, 2);
        let entry = crate::catalog::default_apps().remove(0);
        let reviews = scraper.fetch(&entry, 3, &|_, _| {}).await.unwrap();
        assert_eq!(reviews.len(), 3);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_scrape_error() {
        let scraper = source("http://127.0.0.1:9/reviews".to_string(), 2);
        let entry = crate::catalog::default_apps().remove(0);
        let err = scraper.fetch(&entry, 10, &|_, _| {}).await.unwrap_err();
        assert!(matches!(err, TrainingError::Scrape(_)));
    }
}
