//! Secrets resolved by invoking a remote function (AWS Lambda).
//!
//! The function itself is authorized with the ambient AWS credential chain of
//! the host; the key pair it returns is what the store client uses.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_lambda::Client as LambdaClient;
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_types::region::Region;
use tracing::{error, info, instrument};

use super::{BootstrapError, Credentials, SecretsBootstrap, parse_lambda_payload};

#[derive(Debug, Clone)]
pub struct LambdaSecretsBootstrap {
    client: LambdaClient,
    function_name: String,
}

impl LambdaSecretsBootstrap {
    pub fn new(client: LambdaClient, function_name: impl Into<String>) -> Self {
        Self {
            client,
            function_name: function_name.into(),
        }
    }

    /// Build a client for `region` from the host's default credential chain.
    pub async fn from_region(region: impl Into<String>, function_name: impl Into<String>) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.into()))
            .load()
            .await;
        Self::new(LambdaClient::new(&shared), function_name)
    }
}

#[async_trait]
impl SecretsBootstrap for LambdaSecretsBootstrap {
    #[instrument(skip(self), fields(function = %self.function_name))]
    async fn resolve(&self) -> Result<Credentials, BootstrapError> {
        let output = self
            .client
            .invoke()
            .function_name(&self.function_name)
            .send()
            .await
            .map_err(|e| {
                error!(error = %DisplayErrorContext(&e), "secrets function invocation failed");
                BootstrapError::Invoke(DisplayErrorContext(&e).to_string())
            })?;

        let payload: &[u8] = output.payload().map(|blob| blob.as_ref()).unwrap_or_default();
        let parsed = parse_lambda_payload(payload);

        match (output.function_error(), parsed) {
            (_, Err(e)) => Err(e),
            (Some(kind), Ok(_)) => Err(BootstrapError::Remote(kind.to_string())),
            (None, Ok(creds)) => {
                info!("secrets resolved");
                Ok(creds)
            }
        }
    }
}
