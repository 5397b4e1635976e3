//! Session configuration.

use serde::{Deserialize, Serialize};

use crate::types::Category;
use crate::Result;

/// Configuration for a [`PurchaseSession`](crate::PurchaseSession).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Application package name. Scopes every persisted key.
    pub package_name: String,

    /// Base64 receipt verification key. `None` or empty disables verification.
    #[serde(default)]
    pub license_key: Option<String>,

    /// Correlation code the external purchase flow is launched with.
    #[serde(default = "default_purchase_request_code")]
    pub purchase_request_code: i32,

    /// Suffix appended to persisted keys.
    #[serde(default = "default_settings_version")]
    pub settings_version: String,
}

fn default_purchase_request_code() -> i32 {
    2061984
}

fn default_settings_version() -> String {
    ".v2_4".to_string()
}

impl BillingConfig {
    /// Create a configuration with defaults and no verification key.
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            license_key: None,
            purchase_request_code: default_purchase_request_code(),
            settings_version: default_settings_version(),
        }
    }

    /// Set the receipt verification key.
    pub fn with_license_key(mut self, key: impl Into<String>) -> Self {
        self.license_key = Some(key.into());
        self
    }

    pub fn with_purchase_request_code(mut self, code: i32) -> Self {
        self.purchase_request_code = code;
        self
    }

    pub fn with_settings_version(mut self, version: impl Into<String>) -> Self {
        self.settings_version = version.into();
        self
    }

    /// Load a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Prefix shared by every persisted key of this application.
    pub fn preferences_name(&self) -> String {
        format!("{}_preferences", self.package_name)
    }

    /// Key under which the ownership cache of `category` is stored.
    pub fn cache_key(&self, category: Category) -> String {
        let name = match category {
            Category::OneTime => "products",
            Category::Subscription => "subscriptions",
        };
        format!(
            "{}.{}.cache{}",
            self.preferences_name(),
            name,
            self.settings_version
        )
    }

    /// Key of the history-restored flag.
    pub fn restored_key(&self) -> String {
        format!(
            "{}.products.restored{}",
            self.preferences_name(),
            self.settings_version
        )
    }

    /// Whether a non-empty verification key is configured.
    pub fn verifies_receipts(&self) -> bool {
        self.license_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}
