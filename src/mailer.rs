//! Outgoing email seam
//!
//! Actual delivery is an external collaborator; the default implementation
//! records the confirmation link in the log so the flow stays testable
//! without an SMTP dependency.

use async_trait::async_trait;

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send the account confirmation email containing the confirmation URL
    async fn send_confirmation(&self, to: &str, name: &str, url: &str) -> anyhow::Result<()>;
}

/// Mailer that only logs the message
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_confirmation(&self, to: &str, name: &str, url: &str) -> anyhow::Result<()> {
        tracing::info!("Confirmation email for {} <{}>: {}", name, to, url);
        Ok(())
    }
}

/// Build the confirmation URL embedded in the email
pub fn confirmation_url(base_url: &str, email: &str) -> String {
    format!("{}/confirmar-cuenta/{}", base_url.trim_end_matches('/'), email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_url() {
        assert_eq!(
            confirmation_url("http://localhost:5500/", "ana@example.com"),
            "http://localhost:5500/confirmar-cuenta/ana@example.com"
        );
    }

    #[tokio::test]
    async fn test_log_mailer_never_fails() {
        let mailer = LogMailer;
        assert!(mailer
            .send_confirmation("ana@example.com", "Ana", "http://x/confirmar-cuenta/ana@example.com")
            .await
            .is_ok());
    }
}
