//! Mock AI adapter for testing without API calls.
//!
//! Returns canned listing copy for development and testing purposes.

use crate::domain::{DomainError, ListingCopy, ListingDraft};
use crate::ports::AiPort;
use std::time::Duration;
use tracing::info;

/// Mock AI adapter.
///
/// Produces predetermined copy without network access. Simulates latency
/// with a configurable delay.
pub struct MockAiAdapter {
    /// Simulated network delay in milliseconds.
    delay_ms: u64,
}

impl MockAiAdapter {
    /// Create a new mock adapter with default delay (100ms).
    pub fn new() -> Self {
        Self { delay_ms: 100 }
    }

    /// Create a mock adapter with custom delay.
    pub fn with_delay(delay_ms: u64) -> Self {
        Self { delay_ms }
    }
}

impl Default for MockAiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AiPort for MockAiAdapter {
    async fn generate_listing(&self, draft: &ListingDraft) -> Result<ListingCopy, DomainError> {
        info!(
            title = %draft.title,
            has_image = draft.image_base64.is_some(),
            "[MOCK] Simulating listing-copy generation"
        );

        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;

        let item = if draft.title.trim().is_empty() {
            "Secondhand item"
        } else {
            draft.title.trim()
        };
        let price_line = match draft.price {
            Some(p) => format!("Asking {p}, open to reasonable offers."),
            None => "Price negotiable — make an offer.".to_string(),
        };

        Ok(ListingCopy {
            title: format!("[MOCK] {item} in good condition"),
            body: format!(
                "{price_line}\n\
                 Kept clean and working; minor signs of use as expected for a \
                 secondhand item. Usage period: about 1 year. Pickup preferred \
                 near {}. This is mock copy — configure an API key for real \
                 generation.",
                if draft.location.trim().is_empty() {
                    "the seller's neighbourhood"
                } else {
                    draft.location.trim()
                }
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_adapter() {
        let adapter = MockAiAdapter::with_delay(10);
        let draft = ListingDraft {
            title: "Folding bike".into(),
            price: Some(150),
            location: "Mangwon-dong".into(),
            ..ListingDraft::default()
        };

        let copy = adapter.generate_listing(&draft).await.unwrap();

        assert!(copy.title.contains("Folding bike"));
        assert!(copy.body.contains("Asking 150"));
        assert!(copy.body.contains("Mangwon-dong"));
    }
}
