//! Outbound email seam.
//!
//! The engine only sends one kind of mail: report notices to the
//! instance's moderators. The embedding server supplies the transport.

use async_trait::async_trait;

use crate::error::Result;

/// A report notice for the moderator inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_report_email(&self, email: ReportEmail) -> Result<()>;
}
