//! Transactional email via SMTP (lettre) with Askama templates.
//!
//! Every send has an HTML and a plain-text part. Notification sends are
//! best-effort: callers spawn them with [`EmailService::spawn_send`] so a
//! mail outage never fails the request that triggered it.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;

#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeHtml<'a> {
    name: &'a str,
    base_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeText<'a> {
    name: &'a str,
    base_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    name: &'a str,
    org_name: &'a str,
    order_number: i64,
    total: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    name: &'a str,
    org_name: &'a str,
    order_number: i64,
    total: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_status.html")]
struct OrderStatusHtml<'a> {
    name: &'a str,
    org_name: &'a str,
    order_number: i64,
    status: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_status.txt")]
struct OrderStatusText<'a> {
    name: &'a str,
    org_name: &'a str,
    order_number: i64,
    status: &'a str,
}

#[derive(Template)]
#[template(path = "email/refund_decision.html")]
struct RefundDecisionHtml<'a> {
    name: &'a str,
    org_name: &'a str,
    order_number: i64,
    decision: &'a str,
}

#[derive(Template)]
#[template(path = "email/refund_decision.txt")]
struct RefundDecisionText<'a> {
    name: &'a str,
    org_name: &'a str,
    order_number: i64,
    decision: &'a str,
}

#[derive(Template)]
#[template(path = "email/ticket_update.html")]
struct TicketUpdateHtml<'a> {
    name: &'a str,
    org_name: &'a str,
    subject: &'a str,
    update: &'a str,
}

#[derive(Template)]
#[template(path = "email/ticket_update.txt")]
struct TicketUpdateText<'a> {
    name: &'a str,
    org_name: &'a str,
    subject: &'a str,
    update: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Email service for transactional notifications.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    base_url: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig, base_url: &str) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            base_url: base_url.to_string(),
        })
    }

    /// Send a welcome email after registration.
    ///
    /// # Errors
    ///
    /// Returns error if the email fails to render or send.
    pub async fn send_welcome(&self, to: &str, name: &str) -> Result<(), EmailError> {
        let base_url = self.base_url.as_str();
        let html = WelcomeHtml { name, base_url }.render()?;
        let text = WelcomeText { name, base_url }.render()?;

        self.send_multipart(to, "Welcome to Merchkins", &text, &html)
            .await
    }

    /// Send an order confirmation after checkout.
    ///
    /// # Errors
    ///
    /// Returns error if the email fails to render or send.
    pub async fn send_order_confirmation(
        &self,
        to: &str,
        name: &str,
        org_name: &str,
        order_number: i64,
        total: &str,
    ) -> Result<(), EmailError> {
        let html = OrderConfirmationHtml {
            name,
            org_name,
            order_number,
            total,
        }
        .render()?;
        let text = OrderConfirmationText {
            name,
            org_name,
            order_number,
            total,
        }
        .render()?;

        self.send_multipart(
            to,
            &format!("Order #{order_number} confirmed — {org_name}"),
            &text,
            &html,
        )
        .await
    }

    /// Notify the customer of an order status change.
    ///
    /// # Errors
    ///
    /// Returns error if the email fails to render or send.
    pub async fn send_order_status(
        &self,
        to: &str,
        name: &str,
        org_name: &str,
        order_number: i64,
        status: &str,
    ) -> Result<(), EmailError> {
        let html = OrderStatusHtml {
            name,
            org_name,
            order_number,
            status,
        }
        .render()?;
        let text = OrderStatusText {
            name,
            org_name,
            order_number,
            status,
        }
        .render()?;

        self.send_multipart(
            to,
            &format!("Order #{order_number} is now {status}"),
            &text,
            &html,
        )
        .await
    }

    /// Notify the customer of a refund decision.
    ///
    /// # Errors
    ///
    /// Returns error if the email fails to render or send.
    pub async fn send_refund_decision(
        &self,
        to: &str,
        name: &str,
        org_name: &str,
        order_number: i64,
        decision: &str,
    ) -> Result<(), EmailError> {
        let html = RefundDecisionHtml {
            name,
            org_name,
            order_number,
            decision,
        }
        .render()?;
        let text = RefundDecisionText {
            name,
            org_name,
            order_number,
            decision,
        }
        .render()?;

        self.send_multipart(
            to,
            &format!("Refund update for order #{order_number}"),
            &text,
            &html,
        )
        .await
    }

    /// Notify a customer about activity on their support ticket.
    ///
    /// # Errors
    ///
    /// Returns error if the email fails to render or send.
    pub async fn send_ticket_update(
        &self,
        to: &str,
        name: &str,
        org_name: &str,
        subject: &str,
        update: &str,
    ) -> Result<(), EmailError> {
        let html = TicketUpdateHtml {
            name,
            org_name,
            subject,
            update,
        }
        .render()?;
        let text = TicketUpdateText {
            name,
            org_name,
            subject,
            update,
        }
        .render()?;

        self.send_multipart(to, &format!("Ticket update: {subject}"), &text, &html)
            .await
    }

    /// Spawn a best-effort send. Failures are logged and dropped.
    pub fn spawn_send<F>(fut: F)
    where
        F: std::future::Future<Output = Result<(), EmailError>> + Send + 'static,
    {
        tokio::spawn(async move {
            if let Err(e) = fut.await {
                tracing::warn!(error = %e, "Notification email failed");
            }
        });
    }

    async fn send_multipart(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent");
        Ok(())
    }
}
