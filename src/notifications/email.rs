//! Outbound verification email, sent over SMTP.
//!
//! A registration cannot be completed without receiving the code, so mail
//! credentials are validated at startup rather than at send time.

use anyhow::Result;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::MailConfig;

/// Outbound mail collaborator. Send either works or fails once; there is
/// no retry.
#[async_trait]
pub trait VerificationMailer: Send + Sync {
    async fn send_verification_code(&self, to_email: &str, code: &str) -> Result<()>;
}

/// SMTP-backed mailer using the `[mail]` config section.
pub struct SmtpMailer {
    config: MailConfig,
}

impl SmtpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    async fn send_email(&self, to_email: &str, subject: &str, text: &str, html: &str) -> Result<()> {
        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        let from: Mailbox = format!("{} <{}>", self.config.from_name, from_address).parse()?;
        let to: Mailbox = to_email.parse()?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html.to_string()),
                    ),
            )?;

        let mailer = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer
        };

        mailer.build().send(email).await?;

        tracing::info!("Sent verification email to {}", to_email);
        Ok(())
    }
}

#[async_trait]
impl VerificationMailer for SmtpMailer {
    async fn send_verification_code(&self, to_email: &str, code: &str) -> Result<()> {
        let subject = "Your verification code";
        let text = format!("Your verification code is: {}", code);
        let html = render_verification_html(code);
        self.send_email(to_email, subject, &text, &html).await
    }
}

fn render_verification_html(code: &str) -> String {
    format!(
        r#"<html>
<body style="font-family: sans-serif;">
  <p>Your verification code is:</p>
  <p style="font-size: 24px; font-weight: bold; letter-spacing: 4px;">{}</p>
  <p>Enter it in the app to activate your account.</p>
</body>
</html>"#,
        code
    )
}
