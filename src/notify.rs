//! Best-effort email. Handlers enqueue after their write has committed; a
//! background task delivers, and failures only reach the log.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::MailConfig;
use crate::models::{Order, SellerApplication, SellerStatus, WishlistItem};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport error: {0}")]
    Transport(String),
    #[error("mail provider rejected message with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Posts messages to a transactional mail HTTP API.
pub struct HttpMailer {
    http: reqwest::Client,
    config: MailConfig,
}

#[derive(Serialize)]
struct MailPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(config: MailConfig) -> Result<Self, MailError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MailError::Transport(e.to_string()))?;
        Ok(HttpMailer { http, config })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&MailPayload {
                from: &self.config.from,
                to: &email.to,
                subject: &email.subject,
                text: &email.body,
            })
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MailError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Used when no mail API is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        info!("Mail delivery disabled, dropping \"{}\" to {}", email.subject, email.to);
        Ok(())
    }
}

#[derive(Clone)]
pub struct Notifier {
    sender: mpsc::UnboundedSender<Email>,
}

impl Notifier {
    /// Spawns the delivery task on the current tokio runtime.
    pub fn start(mailer: Arc<dyn Mailer>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run(mailer, receiver));
        Notifier { sender }
    }

    pub fn notify(&self, email: Email) {
        debug!("Queueing \"{}\" for {}", email.subject, email.to);
        if let Err(e) = self.sender.send(email) {
            warn!("Notification queue closed, dropping \"{}\"", e.0.subject);
        }
    }
}

async fn run(mailer: Arc<dyn Mailer>, mut receiver: mpsc::UnboundedReceiver<Email>) {
    while let Some(email) = receiver.recv().await {
        match mailer.send(&email).await {
            Ok(()) => debug!("Sent \"{}\" to {}", email.subject, email.to),
            Err(e) => warn!("Failed to send \"{}\" to {}: {}", email.subject, email.to, e),
        }
    }
    debug!("Notification queue drained");
}

pub fn order_status_email(to: &str, order: &Order) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("Your Aalaboo order is now {}", order.status),
        body: format!(
            "Order {} ({} item(s), total {:.2}) is now: {}.",
            order.id,
            order.items.iter().map(|i| i.quantity).sum::<u32>(),
            order.amount,
            order.status
        ),
    }
}

pub fn request_message_email(to: &str, item: &WishlistItem, message: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("Update on your request for {}", item.name),
        body: message.to_string(),
    }
}

pub fn request_accepted_email(to: &str, item: &WishlistItem, size: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("{} is in your cart", item.name),
        body: format!(
            "Your request for {} has been accepted. One item in size {} was added to your cart.",
            item.name, size
        ),
    }
}

pub fn seller_decision_email(application: &SellerApplication) -> Email {
    let outcome = match application.status {
        SellerStatus::Approved => "approved. Welcome to Aalaboo",
        SellerStatus::Rejected => "not approved this time",
        SellerStatus::Pending => "still under review",
    };
    let mut body = format!("Your seller application for {} was {}.", application.shop_name, outcome);
    if let Some(note) = &application.admin_note {
        body.push_str(&format!("\n\n{}", note));
    }
    Email {
        to: application.email.clone(),
        subject: format!("Your Aalaboo seller application: {}", application.status),
        body,
    }
}
