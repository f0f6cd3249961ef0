//! HTTP Social Search
//!
//! `GET {search_url}?query=..&since=..&until=..&limit=..` returning `[{text, created_at}]`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;

use crate::ports::social::{SearchError, SocialPost, SocialSearchPort};

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub search_url: String,
    pub api_token: Option<String>,
    pub timeout: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_url: "http://127.0.0.1:8085/search".to_string(),
            api_token: None,
            timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpSocialSearch {
    config: SearchConfig,
    http: Client,
}

impl HttpSocialSearch {
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SearchError::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }
}

/// Keep posts created in `[since, until)` and cap at `limit`, keeping server order
pub fn clip_posts(
    posts: Vec<SocialPost>,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
    limit: usize,
) -> Vec<SocialPost> {
    posts
        .into_iter()
        .filter(|p| p.created_at >= since && p.created_at < until)
        .take(limit)
        .collect()
}

#[async_trait]
impl SocialSearchPort for HttpSocialSearch {
    async fn search(
        &self,
        keyword: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SocialPost>, SearchError> {
        let since_param = since.to_rfc3339_opts(SecondsFormat::Secs, true);
        let until_param = until.to_rfc3339_opts(SecondsFormat::Secs, true);
        let limit_param = limit.to_string();

        let mut req = self.http.get(&self.config.search_url).query(&[
            ("query", keyword),
            ("since", since_param.as_str()),
            ("until", until_param.as_str()),
            ("limit", limit_param.as_str()),
        ]);
        if let Some(token) = self.config.api_token.as_deref().filter(|t| !t.is_empty()) {
            req = req.bearer_auth(token);
        }

        let response = req
            .send()
            .await
            .map_err(|e| SearchError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Http(format!("status {}", status)));
        }

        let posts: Vec<SocialPost> = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?;

        Ok(clip_posts(posts, since, until, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post(text: &str, minute: u32) -> SocialPost {
        SocialPost {
            text: text.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
        }
    }

    #[test]
    fn test_clip_posts() {
        let since = Utc.with_ymd_and_hms(2024, 5, 1, 12, 1, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2024, 5, 1, 12, 10, 0).unwrap();
        let posts = vec![post("a", 3), post("b", 2), post("c", 0), post("d", 1)];

        let clipped = clip_posts(posts.clone(), since, until, 10);
        let texts: Vec<_> = clipped.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "d"]);

        assert_eq!(clip_posts(posts, since, until, 1).len(), 1);
    }

    #[test]
    fn test_clip_posts_excludes_until() {
        let since = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2024, 5, 1, 12, 5, 0).unwrap();
        let late = SocialPost {
            text: "after the tick".to_string(),
            created_at: until + chrono::Duration::seconds(5),
        };
        let posts = vec![late, post("boundary", 5), post("inside", 4)];

        // A post at `until` belongs to the next tick
        let clipped = clip_posts(posts, since, until, 100);
        let texts: Vec<_> = clipped.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["inside"]);
    }

    #[test]
    fn test_post_wire_format() {
        let parsed: Vec<SocialPost> = serde_json::from_str(
            r#"[{"text":"moon soon","created_at":"2024-05-01T12:00:00Z"}]"#,
        )
        .unwrap();
        assert_eq!(parsed[0], post("moon soon", 0));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_http_error() {
        let search = HttpSocialSearch::new(SearchConfig {
            search_url: "http://127.0.0.1:1/search".to_string(),
            timeout: Duration::from_secs(2),
            ..SearchConfig::default()
        })
        .unwrap();

        let now = Utc::now();
        let result = search
            .search("sol", now - chrono::Duration::minutes(1), now, 10)
            .await;
        assert!(matches!(result, Err(SearchError::Http(_))));
    }
}
