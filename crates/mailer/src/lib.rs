use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub from_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound-mail transport seam. The server only ever talks to this trait;
/// real delivery lives behind it.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutboundMail) -> anyhow::Result<()>;
}

/// Development transport: emits the mail through tracing instead of SMTP.
pub struct LogMailer {
    config: MailerConfig,
}

impl LogMailer {
    pub fn new(config: MailerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutboundMail) -> anyhow::Result<()> {
        tracing::info!(
            from = %self.config.from_address,
            to = %mail.to,
            subject = %mail.subject,
            body = %mail.body,
            "outbound mail (log transport)"
        );
        Ok(())
    }
}

pub fn reset_code_mail(to: &str, code: &str) -> OutboundMail {
    OutboundMail {
        to: to.to_string(),
        subject: "Your password reset code".to_string(),
        body: format!(
            "Use the 6-digit code {code} to reset your password. \
             The code expires in 30 minutes."
        ),
    }
}
