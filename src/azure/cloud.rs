//! Azure cloud environments and their endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A sovereign Azure cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CloudEnvironment {
    #[default]
    AzureCloud,
    AzureChinaCloud,
    AzureUSGovernment,
}

impl CloudEnvironment {
    /// Resource Manager endpoint.
    pub fn resource_manager(&self) -> &'static str {
        match self {
            Self::AzureCloud => "https://management.azure.com",
            Self::AzureChinaCloud => "https://management.chinacloudapi.cn",
            Self::AzureUSGovernment => "https://management.usgovcloudapi.net",
        }
    }

    /// Microsoft Entra authority host used for token requests.
    pub fn authority_host(&self) -> &'static str {
        match self {
            Self::AzureCloud => "https://login.microsoftonline.com",
            Self::AzureChinaCloud => "https://login.chinacloudapi.cn",
            Self::AzureUSGovernment => "https://login.microsoftonline.us",
        }
    }

    /// Token audience for Resource Manager.
    pub fn audience(&self) -> &'static str {
        match self {
            Self::AzureCloud => "https://management.core.windows.net/",
            Self::AzureChinaCloud => "https://management.core.chinacloudapi.cn/",
            Self::AzureUSGovernment => "https://management.core.usgovcloudapi.net/",
        }
    }

    /// OAuth2 scope derived from the audience.
    pub fn scope(&self) -> String {
        format!("{}.default", self.audience())
    }
}

impl fmt::Display for CloudEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AzureCloud => write!(f, "AzureCloud"),
            Self::AzureChinaCloud => write!(f, "AzureChinaCloud"),
            Self::AzureUSGovernment => write!(f, "AzureUSGovernment"),
        }
    }
}

impl FromStr for CloudEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "azurecloud" | "public" => Ok(Self::AzureCloud),
            "azurechinacloud" | "china" => Ok(Self::AzureChinaCloud),
            "azureusgovernment" | "usgov" => Ok(Self::AzureUSGovernment),
            _ => Err(format!(
                "Invalid cloud environment '{}'. Valid values: AzureCloud, AzureChinaCloud, AzureUSGovernment",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cloud_names() {
        assert_eq!(
            "azurecloud".parse::<CloudEnvironment>().unwrap(),
            CloudEnvironment::AzureCloud
        );
        assert_eq!(
            "AzureUSGovernment".parse::<CloudEnvironment>().unwrap(),
            CloudEnvironment::AzureUSGovernment
        );
        assert!("mars".parse::<CloudEnvironment>().is_err());
    }

    #[test]
    fn test_public_cloud_scope() {
        assert_eq!(
            CloudEnvironment::AzureCloud.scope(),
            "https://management.core.windows.net/.default"
        );
    }
}
