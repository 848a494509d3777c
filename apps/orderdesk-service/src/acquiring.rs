//! Acquiring collaborator.
//!
//! The payment provider is outside this service. All the coordinator needs
//! from it is an opaque redirect reference for a new payment, so that is the
//! whole interface. The handle is passed in explicitly and shared as
//! `Arc<dyn Acquiring>`.

use async_trait::async_trait;
use orderdesk_core::Payment;
use uuid::Uuid;

/// Produces redirect references for payment intents.
#[async_trait]
pub trait Acquiring: Send + Sync {
    /// Returns the redirect reference for `payment`. Treated as infallible.
    async fn redirect_url(&self, payment: &Payment) -> String;
}

/// Acquiring stand-in that mints `{base_url}/pay/{token}` references.
#[derive(Debug, Clone)]
pub struct FakeAcquiring {
    base_url: String,
}

impl FakeAcquiring {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        FakeAcquiring {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Acquiring for FakeAcquiring {
    async fn redirect_url(&self, _payment: &Payment) -> String {
        format!("{}/pay/{}", self.base_url, Uuid::new_v4().simple())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use orderdesk_core::{Order, PaymentMethod};

    #[tokio::test]
    async fn test_fake_redirects_are_unique() {
        let acquiring = FakeAcquiring::new("https://acq.example/");
        let payment = Payment::new(&Order::new("loc", Utc::now()), PaymentMethod::Card, Utc::now());

        let a = acquiring.redirect_url(&payment).await;
        let b = acquiring.redirect_url(&payment).await;

        assert!(a.starts_with("https://acq.example/pay/"));
        assert_ne!(a, b);
    }
}
