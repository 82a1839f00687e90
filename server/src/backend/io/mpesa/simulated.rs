//! Local stand-in for the Daraja API.

use async_trait::async_trait;
use tracing::info;

use crate::backend::domain::gateway::{
    B2cRequest, DisbursementGateway, GatewayAcceptance, GatewayError,
};

/// Accepts every payout and hands back a `SIM` conversation id
#[derive(Debug, Clone, Default)]
pub struct SimulatedGateway;

impl SimulatedGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DisbursementGateway for SimulatedGateway {
    async fn send_b2c(&self, request: &B2cRequest) -> Result<GatewayAcceptance, GatewayError> {
        let conversation_id = format!("SIM{}", uuid::Uuid::new_v4().simple()).to_uppercase();
        info!(
            phone = %request.phone,
            amount = request.amount,
            account = %request.account_reference,
            %conversation_id,
            "Simulated B2C payout accepted"
        );
        Ok(GatewayAcceptance {
            conversation_id,
            originator_conversation_id: request.originator_conversation_id.clone(),
            description: "Accept the service request successfully.".to_string(),
        })
    }
}
