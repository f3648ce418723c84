use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupStatus {
    Pending,
    Approved,
    Rejected,
}

impl SignupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignupStatus::Pending => "pending",
            SignupStatus::Approved => "approved",
            SignupStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "approved" => SignupStatus::Approved,
            "rejected" => SignupStatus::Rejected,
            _ => SignupStatus::Pending,
        }
    }
}

/// Aggregate result of a provisioning run. Written only by the orchestrator;
/// never reopens `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    FullyProvisioned,
    PartiallyProvisioned,
    Cancelled,
}

impl ProvisionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionOutcome::FullyProvisioned => "fully_provisioned",
            ProvisionOutcome::PartiallyProvisioned => "partially_provisioned",
            ProvisionOutcome::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "fully_provisioned" => Some(ProvisionOutcome::FullyProvisioned),
            "partially_provisioned" => Some(ProvisionOutcome::PartiallyProvisioned),
            "cancelled" => Some(ProvisionOutcome::Cancelled),
            _ => None,
        }
    }
}

/// One requested capability. Each variant carries only its own fields;
/// a variant that is absent from the request means the feature was not
/// requested and its provisioning step is skipped entirely.
///
/// Password fields hold vault tokens, never plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureRequest {
    Ssl,
    Dns,
    Email(EmailAccountRequest),
    Database(DatabaseAccountRequest),
}

impl FeatureRequest {
    pub fn label(&self) -> &'static str {
        match self {
            FeatureRequest::Ssl => "ssl",
            FeatureRequest::Dns => "dns",
            FeatureRequest::Email(_) => "email",
            FeatureRequest::Database(_) => "database",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAccountRequest {
    pub username: String,
    pub quota_mb: i64,
    pub password_encrypted: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseAccountRequest {
    pub name: String,
    pub username: String,
    pub password_encrypted: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for s in [
            SignupStatus::Pending,
            SignupStatus::Approved,
            SignupStatus::Rejected,
        ] {
            assert_eq!(SignupStatus::from_str(s.as_str()), s);
        }
        assert_eq!(SignupStatus::from_str("garbage"), SignupStatus::Pending);
    }

    #[test]
    fn outcome_round_trips() {
        for o in [
            ProvisionOutcome::FullyProvisioned,
            ProvisionOutcome::PartiallyProvisioned,
            ProvisionOutcome::Cancelled,
        ] {
            assert_eq!(ProvisionOutcome::from_str(o.as_str()), Some(o));
        }
        assert_eq!(ProvisionOutcome::from_str("pending"), None);
    }

    #[test]
    fn feature_serialization_is_tagged() {
        let features = vec![
            FeatureRequest::Ssl,
            FeatureRequest::Email(EmailAccountRequest {
                username: "info".into(),
                quota_mb: 1024,
                password_encrypted: "token".into(),
            }),
        ];
        let json = serde_json::to_value(&features).unwrap();
        assert_eq!(json[0]["kind"], "ssl");
        assert_eq!(json[1]["kind"], "email");
        assert_eq!(json[1]["username"], "info");

        let back: Vec<FeatureRequest> = serde_json::from_value(json).unwrap();
        assert_eq!(back, features);
    }
}
