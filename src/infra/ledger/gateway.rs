//! Ledger gateway client implementation.
//!
//! Talks to the signer gateway, the external service that owns the RPC
//! connection, key material, and gas handling for the token contract. This
//! engine only issues transfers and reads balances through it.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use crate::domain::{AppError, LedgerError, TokenLedgerClient};

/// Wire code the gateway uses for a funding shortfall
const INSUFFICIENT_BALANCE_CODE: &str = "insufficient_balance";

/// Ledger gateway client configuration
#[derive(Debug, Clone)]
pub struct LedgerGatewayConfig {
    /// Gateway base URL
    pub base_url: String,
    /// Optional bearer credential for the gateway
    pub api_key: Option<SecretString>,
    /// Funding account transfers are sent from
    pub funding_address: String,
    /// Per-call HTTP timeout
    pub timeout: std::time::Duration,
}

impl LedgerGatewayConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, funding_address: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            funding_address: funding_address.into(),
            timeout: std::time::Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: SecretString) -> Self {
        self.api_key = Some(api_key);
        self
    }
}

/// Token ledger client backed by the signer gateway's HTTP API
pub struct LedgerGatewayClient {
    http_client: Client,
    config: LedgerGatewayConfig,
}

#[derive(Debug, Serialize)]
struct TransferRequestBody<'a> {
    to: &'a str,
    /// Exact decimal amount as a string
    amount: String,
    /// Client-generated idempotency reference attached to the transaction
    reference: &'a str,
}

#[derive(Debug, Deserialize)]
struct TransferResponseBody {
    tx_hash: String,
}

#[derive(Debug, Deserialize)]
struct BalanceResponseBody {
    balance: Decimal,
}

#[derive(Debug, Deserialize)]
struct DecimalsResponseBody {
    decimals: u32,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: GatewayErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetail {
    #[serde(rename = "type")]
    code: String,
    message: String,
}

impl LedgerGatewayClient {
    pub fn new(config: LedgerGatewayConfig) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Ledger(LedgerError::Configuration(e.to_string())))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.header(
                "Authorization",
                format!("Bearer {}", key.expose_secret()),
            ),
            None => builder,
        }
    }

    /// Map a non-success gateway response into a ledger error, preserving the
    /// insufficient-balance discriminant.
    async fn error_from_response(response: reqwest::Response) -> AppError {
        let status = response.status();
        match response.json::<GatewayErrorBody>().await {
            Ok(body) if body.error.code == INSUFFICIENT_BALANCE_CODE => {
                AppError::Ledger(LedgerError::InsufficientBalance(body.error.message))
            }
            Ok(body) => {
                warn!(status = %status, code = %body.error.code, "Gateway rejected request");
                AppError::Ledger(LedgerError::TransferFailed(format!(
                    "{}: {}",
                    body.error.code, body.error.message
                )))
            }
            Err(_) => AppError::Ledger(LedgerError::InvalidResponse(format!(
                "gateway returned {status} with unreadable body"
            ))),
        }
    }
}

#[async_trait]
impl TokenLedgerClient for LedgerGatewayClient {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let response = self
            .request(self.http_client.get(self.url("/health")))
            .send()
            .await
            .map_err(|e| AppError::Ledger(LedgerError::Connection(e.to_string())))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::Ledger(LedgerError::Connection(format!(
                "gateway health returned {}",
                response.status()
            ))))
        }
    }

    fn funding_address(&self) -> &str {
        &self.config.funding_address
    }

    #[instrument(skip(self))]
    async fn decimals(&self) -> Result<u32, AppError> {
        let response = self
            .request(self.http_client.get(self.url("/v1/token/decimals")))
            .send()
            .await
            .map_err(|e| AppError::Ledger(LedgerError::Connection(e.to_string())))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let body: DecimalsResponseBody = response
            .json()
            .await
            .map_err(|e| AppError::Ledger(LedgerError::InvalidResponse(e.to_string())))?;
        Ok(body.decimals)
    }

    #[instrument(skip(self))]
    async fn balance_of(&self, address: &str) -> Result<Decimal, AppError> {
        let url = self.url(&format!("/v1/token/balance/{address}"));
        debug!(url = %url, "Querying token balance");

        let response = self
            .request(self.http_client.get(&url))
            .send()
            .await
            .map_err(|e| AppError::Ledger(LedgerError::Connection(e.to_string())))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let body: BalanceResponseBody = response
            .json()
            .await
            .map_err(|e| AppError::Ledger(LedgerError::InvalidResponse(e.to_string())))?;
        Ok(body.balance)
    }

    #[instrument(skip(self, amount), fields(amount = %amount))]
    async fn transfer(
        &self,
        to: &str,
        amount: Decimal,
        reference: &str,
    ) -> Result<String, AppError> {
        let body = TransferRequestBody {
            to,
            amount: amount.to_string(),
            reference,
        };

        let response = self
            .request(self.http_client.post(self.url("/v1/token/transfer")))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Transfer request failed to reach gateway");
                AppError::Ledger(LedgerError::Connection(e.to_string()))
            })?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let body: TransferResponseBody = response
            .json()
            .await
            .map_err(|e| AppError::Ledger(LedgerError::InvalidResponse(e.to_string())))?;
        Ok(body.tx_hash)
    }

    #[instrument(skip(self))]
    async fn find_transfer(&self, reference: &str) -> Result<Option<String>, AppError> {
        let url = self.url(&format!("/v1/token/transfers/{reference}"));

        let response = self
            .request(self.http_client.get(&url))
            .send()
            .await
            .map_err(|e| AppError::Ledger(LedgerError::Connection(e.to_string())))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let body: TransferResponseBody = response
            .json()
            .await
            .map_err(|e| AppError::Ledger(LedgerError::InvalidResponse(e.to_string())))?;
        Ok(Some(body.tx_hash))
    }
}
