use async_trait::async_trait;

/// Outbound customer notifications (confirmations, reminders, receipts).
/// Delivery is a boundary concern; the default implementation just logs.
#[async_trait]
pub trait NotificationProvider: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

pub struct LogNotifier;

#[async_trait]
impl NotificationProvider for LogNotifier {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
        tracing::info!("notification to {to}: {subject}");
        Ok(())
    }
}
