//! # Custom Destination Endpoint Specs
//!
//! A transfer destination is normally the name of a configured database.
//! A destination string of the form `<provider>:<uuid>[:<credential>]`
//! instead names a bare endpoint directly; the orchestrator constructs the
//! endpoint from the parsed spec and delivers into its root.

use uuid::Uuid;

/// A parsed `<provider>:<uuid>[:<credential>]` destination string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomEndpointSpec {
    pub provider: String,
    pub id: Uuid,
    pub credential: Option<String>,
}

impl CustomEndpointSpec {
    /// Parse a destination string; `None` means the string is a database
    /// name, not a custom endpoint spec.
    pub fn parse(destination: &str) -> Option<Self> {
        let mut parts = destination.splitn(3, ':');
        let provider = parts.next()?;
        let id = parts.next()?;
        if provider.is_empty() {
            return None;
        }
        let id = Uuid::parse_str(id).ok()?;
        let credential = parts.next().filter(|c| !c.is_empty()).map(str::to_string);
        Some(Self {
            provider: provider.to_string(),
            id,
            credential,
        })
    }

    /// Stable name under which the constructed endpoint is registered
    pub fn canonical_name(&self) -> String {
        format!("{}:{}", self.provider, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENDPOINT_ID: &str = "f81d4fae-7dec-11d0-a765-00a0c91e6bf6";

    #[test]
    fn test_parse_provider_and_id() {
        let spec = CustomEndpointSpec::parse(&format!("globus:{ENDPOINT_ID}")).unwrap();
        assert_eq!(spec.provider, "globus");
        assert_eq!(spec.id.to_string(), ENDPOINT_ID);
        assert!(spec.credential.is_none());
    }

    #[test]
    fn test_parse_with_credential() {
        let spec = CustomEndpointSpec::parse(&format!("globus:{ENDPOINT_ID}:sekrit")).unwrap();
        assert_eq!(spec.credential.as_deref(), Some("sekrit"));
    }

    #[test]
    fn test_database_names_are_not_custom_specs() {
        assert!(CustomEndpointSpec::parse("kbase").is_none());
        assert!(CustomEndpointSpec::parse("jdp").is_none());
        assert!(CustomEndpointSpec::parse("globus:not-a-uuid").is_none());
        assert!(CustomEndpointSpec::parse(&format!(":{ENDPOINT_ID}")).is_none());
    }

    #[test]
    fn test_canonical_name_drops_credential() {
        let spec = CustomEndpointSpec::parse(&format!("globus:{ENDPOINT_ID}:sekrit")).unwrap();
        assert_eq!(spec.canonical_name(), format!("globus:{ENDPOINT_ID}"));
    }
}
