use async_trait::async_trait;

use super::{NotificationTransport, NotifyError};
use crate::config::SmsConfig;
use crate::monitoring::types::PHONE_LEN;

const MAX_MESSAGE_LEN: usize = 1600;

/// Twilio Messages API transport
pub struct TwilioSms {
    client: reqwest::Client,
    config: SmsConfig,
}

impl TwilioSms {
    pub fn new(config: SmsConfig) -> Self {
        Self { client: reqwest::Client::new(), config }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

/// Trimmed recipient and body, or the reason they cannot be sent
fn validate_parameters<'a>(
    recipient: &'a str,
    message: &'a str,
) -> Result<(&'a str, &'a str), NotifyError> {
    let recipient = recipient.trim();
    if recipient.chars().count() != PHONE_LEN {
        return Err(NotifyError::InvalidParameters("recipient must be a 10 digit phone number"));
    }

    let message = message.trim();
    if message.is_empty() || message.chars().count() > MAX_MESSAGE_LEN {
        return Err(NotifyError::InvalidParameters("message must be 1 to 1600 characters"));
    }

    Ok((recipient, message))
}

#[async_trait]
impl NotificationTransport for TwilioSms {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        let (recipient, message) = validate_parameters(recipient, message)?;
        let to = format!("+{}{}", self.config.country_code, recipient);

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("From", self.config.from_phone.as_str()), ("To", to.as_str()), ("Body", message)])
            .send()
            .await?;

        match response.status().as_u16() {
            200 | 201 => Ok(()),
            status => Err(NotifyError::Rejected { status }),
        }
    }

    fn name(&self) -> &str {
        "twilio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn config(api_base: String) -> SmsConfig {
        SmsConfig {
            account_sid: "AC123".to_string(),
            auth_token: "secret".to_string(),
            from_phone: "+15005550006".to_string(),
            country_code: "1".to_string(),
            api_base,
        }
    }

    #[test]
    fn test_parameter_validation() {
        assert!(validate_parameters(" 5551234567 ", "hello").is_ok());
        assert!(validate_parameters("555", "hello").is_err());
        assert!(validate_parameters("5551234567", "   ").is_err());
        assert!(validate_parameters("5551234567", &"x".repeat(1601)).is_err());
        assert!(validate_parameters("5551234567", &"x".repeat(1600)).is_ok());
    }

    #[test]
    fn test_messages_url() {
        let sms = TwilioSms::new(config("https://api.twilio.com/".to_string()));
        assert_eq!(sms.messages_url(), "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json");
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_not_sent() {
        // Nothing listens here; validation has to fail first.
        let sms = TwilioSms::new(config("http://127.0.0.1:1".to_string()));
        let err = sms.send("12", "hello").await.unwrap_err();
        assert!(matches!(err, NotifyError::InvalidParameters(_)));
    }

    /// Read headers plus a `content-length` body
    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut raw = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&raw).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if raw.len() >= header_end + 4 + content_length {
                    return text;
                }
            }
        }
        String::from_utf8_lossy(&raw).to_string()
    }

    async fn gateway(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            request
        });
        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn test_created_is_success() {
        let (base, request) = gateway("201 Created").await;
        let sms = TwilioSms::new(config(base));

        sms.send("5551234567", "Alert: down").await.unwrap();

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /2010-04-01/Accounts/AC123/Messages.json"));
        assert!(request.to_ascii_lowercase().contains("authorization: basic"));
        assert!(request.contains("To=%2B15551234567"));
    }

    #[tokio::test]
    async fn test_other_status_is_rejected() {
        let (base, _request) = gateway("400 Bad Request").await;
        let sms = TwilioSms::new(config(base));

        let err = sms.send("5551234567", "Alert: down").await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { status: 400 }));
    }
}
