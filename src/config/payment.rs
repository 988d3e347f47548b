//! Payment provider configuration (PayOS)

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

const MAX_RETRIES: u32 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub payos_client_id: String,

    pub payos_api_key: String,

    /// Key for request and webhook HMAC signatures
    pub payos_checksum_key: String,

    #[serde(default = "default_base_url")]
    pub payos_base_url: String,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Retries for transient provider failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Frontend origin; the default return URL is `{client_url}/payment/success`
    pub client_url: String,

    /// Public origin of this service; cancel callbacks point here
    pub public_url: String,
}

impl PaymentConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        if self.payos_client_id.trim().is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__PAYOS_CLIENT_ID"));
        }
        if self.payos_api_key.trim().is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__PAYOS_API_KEY"));
        }
        if self.payos_checksum_key.trim().is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__PAYOS_CHECKSUM_KEY"));
        }
        if !is_http_url(&self.payos_base_url) {
            return Err(ValidationError::InvalidUrl("payos_base_url"));
        }
        if production && !self.payos_base_url.starts_with("https://") {
            return Err(ValidationError::ProviderUrlMustBeHttps);
        }
        if !is_http_url(&self.client_url) {
            return Err(ValidationError::InvalidUrl("client_url"));
        }
        if !is_http_url(&self.public_url) {
            return Err(ValidationError::InvalidUrl("public_url"));
        }
        if self.request_timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.max_retries > MAX_RETRIES {
            return Err(ValidationError::TooManyRetries);
        }
        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            payos_client_id: String::new(),
            payos_api_key: String::new(),
            payos_checksum_key: String::new(),
            payos_base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_max_retries(),
            client_url: String::new(),
            public_url: String::new(),
        }
    }
}

fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty())
}

fn default_base_url() -> String {
    "https://api-merchant.payos.vn".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> PaymentConfig {
        PaymentConfig {
            payos_client_id: "client-id".to_string(),
            payos_api_key: "api-key".to_string(),
            payos_checksum_key: "checksum-key".to_string(),
            client_url: "https://app.example.com".to_string(),
            public_url: "https://api.example.com".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = PaymentConfig::default();
        assert_eq!(config.payos_base_url, "https://api-merchant.payos.vn");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(valid().validate(true).is_ok());
    }

    #[test]
    fn test_validation_missing_credentials() {
        let config = PaymentConfig {
            payos_checksum_key: " ".to_string(),
            ..valid()
        };
        assert_eq!(
            config.validate(false),
            Err(ValidationError::MissingRequired("PAYMENT__PAYOS_CHECKSUM_KEY"))
        );
    }

    #[test]
    fn test_validation_relative_client_url() {
        let config = PaymentConfig {
            client_url: "/payment".to_string(),
            ..valid()
        };
        assert_eq!(config.validate(false), Err(ValidationError::InvalidUrl("client_url")));
    }

    #[test]
    fn test_plain_http_provider_only_outside_production() {
        let config = PaymentConfig {
            payos_base_url: "http://localhost:9999".to_string(),
            ..valid()
        };
        assert!(config.validate(false).is_ok());
        assert_eq!(config.validate(true), Err(ValidationError::ProviderUrlMustBeHttps));
    }

    #[test]
    fn test_validation_retry_cap() {
        let config = PaymentConfig {
            max_retries: 11,
            ..valid()
        };
        assert_eq!(config.validate(false), Err(ValidationError::TooManyRetries));
    }
}
