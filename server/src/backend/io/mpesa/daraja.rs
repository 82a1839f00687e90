//! Safaricom Daraja B2C client.
//!
//! A payout is two calls: an OAuth client-credentials token, then the B2C
//! payment request. Daraja answers `ResponseCode: "0"` when it has accepted the
//! request for processing; the final result is posted later to the result URL
//! and is not awaited here.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::backend::domain::gateway::{
    B2cRequest, DisbursementGateway, GatewayAcceptance, GatewayError,
};
use crate::config::DarajaConfig;

const TOKEN_PATH: &str = "/oauth/v1/generate?grant_type=client_credentials";
const B2C_PATH: &str = "/mpesa/b2c/v1/paymentrequest";
const COMMAND_ID: &str = "BusinessPayment";
/// Refresh this long before Daraja says the token expires
const TOKEN_SLACK: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Seconds, sent as a string
    expires_in: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct B2cResponse {
    #[serde(rename = "ConversationID")]
    conversation_id: Option<String>,
    #[serde(rename = "OriginatorConversationID")]
    originator_conversation_id: Option<String>,
    response_code: Option<String>,
    response_description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DarajaFault {
    error_code: Option<String>,
    error_message: Option<String>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct DarajaGateway {
    config: DarajaConfig,
    base_url: String,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl DarajaGateway {
    pub fn new(config: DarajaConfig) -> Self {
        let base_url = config.environment.base_url().to_string();
        Self::with_base_url(config, base_url)
    }

    pub fn with_base_url(config: DarajaConfig, base_url: String) -> Self {
        Self {
            config,
            base_url,
            client: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting Daraja access token");
        let response = self
            .client
            .get(format!("{}{}", self.base_url, TOKEN_PATH))
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Authentication(format!("{}: {}", status, body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Authentication(format!("unreadable token response: {}", e)))?;
        let lifetime = token
            .expires_in
            .parse::<u64>()
            .map(Duration::from_secs)
            .unwrap_or(TOKEN_SLACK)
            .saturating_sub(TOKEN_SLACK);

        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    fn b2c_payload(&self, request: &B2cRequest) -> serde_json::Value {
        serde_json::json!({
            "OriginatorConversationID": request.originator_conversation_id,
            "InitiatorName": self.config.initiator_name,
            "SecurityCredential": self.config.security_credential,
            "CommandID": COMMAND_ID,
            "Amount": request.amount,
            "PartyA": self.config.shortcode,
            "PartyB": request.phone,
            "Remarks": request.remarks,
            "QueueTimeOutURL": self.config.timeout_url,
            "ResultURL": self.config.result_url,
            "Occasion": request.account_reference,
        })
    }
}

/// Turn a B2C reply into an acceptance or the gateway's reason for refusing
fn interpret_b2c(status: StatusCode, body: &str) -> Result<GatewayAcceptance, GatewayError> {
    if !status.is_success() {
        let fault: Option<DarajaFault> = serde_json::from_str(body).ok();
        let (code, description) = match fault {
            Some(fault) => (
                fault.error_code.unwrap_or_else(|| status.as_u16().to_string()),
                fault.error_message.unwrap_or_else(|| body.to_string()),
            ),
            None => (status.as_u16().to_string(), body.to_string()),
        };
        return Err(GatewayError::Rejected { code, description });
    }

    let reply: B2cResponse = serde_json::from_str(body).map_err(|e| GatewayError::Rejected {
        code: "unparseable".to_string(),
        description: e.to_string(),
    })?;
    let code = reply.response_code.unwrap_or_default();
    let description = reply.response_description.unwrap_or_default();
    match (code.as_str(), reply.conversation_id) {
        ("0", Some(conversation_id)) => Ok(GatewayAcceptance {
            conversation_id,
            originator_conversation_id: reply.originator_conversation_id.unwrap_or_default(),
            description,
        }),
        _ => Err(GatewayError::Rejected { code, description }),
    }
}

#[async_trait]
impl DisbursementGateway for DarajaGateway {
    async fn send_b2c(&self, request: &B2cRequest) -> Result<GatewayAcceptance, GatewayError> {
        let token = self.access_token().await?;

        let response = self
            .client
            .post(format!("{}{}", self.base_url, B2C_PATH))
            .bearer_auth(token)
            .json(&self.b2c_payload(request))
            .send()
            .await
            .map_err(|e| {
                error!("Daraja B2C request failed: {}", e);
                GatewayError::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let acceptance = interpret_b2c(status, &body)?;
        info!(
            account = %request.account_reference,
            conversation_id = %acceptance.conversation_id,
            "Daraja accepted B2C payout"
        );
        Ok(acceptance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MpesaEnvironment;
    use rust_decimal::Decimal;

    fn config() -> DarajaConfig {
        DarajaConfig {
            environment: MpesaEnvironment::Sandbox,
            consumer_key: "key".to_string(),
            consumer_secret: "secret".to_string(),
            shortcode: "600980".to_string(),
            initiator_name: "testapi".to_string(),
            security_credential: "credential".to_string(),
            result_url: "https://example.test/b2c/result".to_string(),
            timeout_url: "https://example.test/b2c/timeout".to_string(),
        }
    }

    #[test]
    fn test_b2c_payload_fields() {
        let gateway = DarajaGateway::new(config());
        let request = B2cRequest::for_loan(12, "254712345678".to_string(), Decimal::from(15_000));
        let payload = gateway.b2c_payload(&request);

        assert_eq!(payload["CommandID"], "BusinessPayment");
        assert_eq!(payload["Amount"], 15_000);
        assert_eq!(payload["PartyA"], "600980");
        assert_eq!(payload["PartyB"], "254712345678");
        assert_eq!(payload["Occasion"], "LOAN12");
        assert_eq!(payload["ResultURL"], "https://example.test/b2c/result");
        assert_eq!(gateway.base_url, "https://sandbox.safaricom.co.ke");
    }

    #[test]
    fn test_accepted_reply() {
        let body = r#"{
            "ConversationID": "AG_20240215_0000123abc",
            "OriginatorConversationID": "f1c2-77",
            "ResponseCode": "0",
            "ResponseDescription": "Accept the service request successfully."
        }"#;
        let acceptance = interpret_b2c(StatusCode::OK, body).unwrap();
        assert_eq!(acceptance.conversation_id, "AG_20240215_0000123abc");
        assert_eq!(acceptance.originator_conversation_id, "f1c2-77");
    }

    #[test]
    fn test_refused_replies() {
        let body = r#"{"ResponseCode": "1", "ResponseDescription": "Insufficient funds"}"#;
        let err = interpret_b2c(StatusCode::OK, body).unwrap_err();
        assert!(matches!(err, GatewayError::Rejected { ref code, .. } if code == "1"));

        let body = r#"{"requestId": "1-2", "errorCode": "400.002.02", "errorMessage": "Bad Request - Invalid PartyB"}"#;
        let err = interpret_b2c(StatusCode::BAD_REQUEST, body).unwrap_err();
        match err {
            GatewayError::Rejected { code, description } => {
                assert_eq!(code, "400.002.02");
                assert!(description.contains("Invalid PartyB"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = interpret_b2c(StatusCode::BAD_GATEWAY, "upstream down").unwrap_err();
        assert!(matches!(err, GatewayError::Rejected { ref code, .. } if code == "502"));
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_a_transport_error() {
        let gateway = DarajaGateway::with_base_url(config(), "http://127.0.0.1:9".to_string());
        let request = B2cRequest::for_loan(1, "254712345678".to_string(), Decimal::from(100));
        let err = gateway.send_b2c(&request).await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }
}
