//! External collaborators: the channel scanner and the content classifier.

pub mod cache;
pub mod http;
pub mod wire;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{ChannelSnapshot, Classification};
use crate::error::{ClassifierError, ScanError};

/// Post texts sent to the classifier.
pub const CLASSIFY_SAMPLE_POSTS: usize = 20;
/// Characters kept per post text.
pub const CLASSIFY_TEXT_LIMIT: usize = 500;

#[async_trait]
pub trait ChannelScanner: Send + Sync {
    /// Fetch a resolved snapshot of a public channel.
    async fn scan(&self, username: &str) -> Result<ChannelSnapshot, ScanError>;
}

#[async_trait]
pub trait ContentClassifier: Send + Sync {
    /// `Ok(None)` means the classifier had no answer for this channel.
    async fn classify(&self, request: &ClassifyRequest) -> Result<Option<Classification>, ClassifierError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifyRequest {
    pub username: String,
    pub title: String,
    pub description: String,
    pub posts: Vec<String>,
}

impl ClassifyRequest {
    pub fn from_snapshot(snapshot: &ChannelSnapshot) -> Self {
        let posts = snapshot
            .posts
            .iter()
            .filter(|p| !p.text.trim().is_empty())
            .take(CLASSIFY_SAMPLE_POSTS)
            .map(|p| p.text.chars().take(CLASSIFY_TEXT_LIMIT).collect())
            .collect();
        Self {
            username: snapshot.username.clone(),
            title: snapshot.title.clone(),
            description: snapshot.description.clone(),
            posts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::healthy_snapshot;
    use chrono::Utc;

    #[test]
    fn request_samples_non_empty_texts() {
        let mut snapshot = healthy_snapshot("sampled", Utc::now());
        snapshot.posts[0].text = "x".repeat(2_000);
        snapshot.posts[1].text = "   ".into();
        snapshot.posts[2].text = "hello".into();

        let request = ClassifyRequest::from_snapshot(&snapshot);
        assert_eq!(request.username, "sampled");
        assert_eq!(request.posts.len(), 2);
        assert_eq!(request.posts[0].chars().count(), CLASSIFY_TEXT_LIMIT);
        assert_eq!(request.posts[1], "hello");
    }
}
