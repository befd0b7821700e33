//! Role based access decisions.

use super::credentials::Credentials;
use super::users::{ROLE_ADMIN, ROLE_WRITER};
use async_trait::async_trait;
use axum::http::Method;
use podium_core::{AsyncHandler, Error, Result};
use podium_store::auxiliary::ACL_SUFFIX;
use podium_store::ResourceIdentifier;
use std::collections::BTreeSet;
use std::fmt;

/// What a request does to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessMode {
    Read,
    Append,
    Write,
    /// Changing who may access a resource.
    Control,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccessMode::Read => "read",
            AccessMode::Append => "append",
            AccessMode::Write => "write",
            AccessMode::Control => "control",
        };
        f.write_str(name)
    }
}

/// The modes `method` needs on `target`.
///
/// Access control resources only ever need `Control`.
pub fn required_modes(method: &Method, target: &ResourceIdentifier) -> BTreeSet<AccessMode> {
    if target.as_str().ends_with(ACL_SUFFIX) {
        return BTreeSet::from([AccessMode::Control]);
    }
    let mode = match *method {
        Method::GET | Method::HEAD | Method::OPTIONS => AccessMode::Read,
        Method::POST => AccessMode::Append,
        _ => AccessMode::Write,
    };
    BTreeSet::from([mode])
}

/// Input of an authorizer.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub credentials: Credentials,
    pub target: ResourceIdentifier,
    pub modes: BTreeSet<AccessMode>,
}

/// Grants modes by role: reading is public when configured so, appending
/// and writing need the `writer` role and control needs `admin`.
pub struct RoleAuthorizer {
    public_read: bool,
}

impl RoleAuthorizer {
    pub fn new(public_read: bool) -> Self {
        Self { public_read }
    }

    fn allows(&self, credentials: &Credentials, mode: AccessMode) -> bool {
        let agent = credentials.agent.as_ref();
        match mode {
            AccessMode::Read => self.public_read || agent.is_some(),
            AccessMode::Append | AccessMode::Write => agent
                .map(|a| a.has_role(ROLE_WRITER) || a.has_role(ROLE_ADMIN))
                .unwrap_or(false),
            AccessMode::Control => agent.map(|a| a.has_role(ROLE_ADMIN)).unwrap_or(false),
        }
    }
}

#[async_trait]
impl AsyncHandler<AuthorizationRequest> for RoleAuthorizer {
    async fn handle(&self, input: &AuthorizationRequest) -> Result<()> {
        let denied: Vec<String> = input
            .modes
            .iter()
            .filter(|mode| !self.allows(&input.credentials, **mode))
            .map(|mode| mode.to_string())
            .collect();
        if denied.is_empty() {
            return Ok(());
        }

        let message = format!("{} access to {}", denied.join(", "), input.target);
        if input.credentials.is_public() {
            Err(Error::Unauthorized(message))
        } else {
            Err(Error::Forbidden(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::Agent;

    fn id(s: &str) -> ResourceIdentifier {
        ResourceIdentifier::parse(s).unwrap()
    }

    fn agent(roles: &[&str]) -> Credentials {
        Credentials {
            agent: Some(Agent {
                id: "a".into(),
                username: None,
                roles: roles.iter().map(|r| r.to_string()).collect(),
            }),
        }
    }

    fn request(credentials: Credentials, method: Method, target: &str) -> AuthorizationRequest {
        let target = id(target);
        AuthorizationRequest {
            credentials,
            modes: required_modes(&method, &target),
            target,
        }
    }

    #[test]
    fn test_required_modes() {
        let doc = id("http://h/doc");
        assert_eq!(required_modes(&Method::GET, &doc), BTreeSet::from([AccessMode::Read]));
        assert_eq!(required_modes(&Method::POST, &doc), BTreeSet::from([AccessMode::Append]));
        assert_eq!(required_modes(&Method::PATCH, &doc), BTreeSet::from([AccessMode::Write]));
        assert_eq!(
            required_modes(&Method::GET, &id("http://h/doc.acl")),
            BTreeSet::from([AccessMode::Control])
        );
    }

    #[tokio::test]
    async fn test_public_read() {
        let open = RoleAuthorizer::new(true);
        assert!(open
            .handle(&request(Credentials::public(), Method::GET, "http://h/x"))
            .await
            .is_ok());

        let closed = RoleAuthorizer::new(false);
        let err = closed
            .handle(&request(Credentials::public(), Method::GET, "http://h/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_write_needs_writer() {
        let authorizer = RoleAuthorizer::new(true);

        let err = authorizer
            .handle(&request(Credentials::public(), Method::PUT, "http://h/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));

        let err = authorizer
            .handle(&request(agent(&["user"]), Method::PUT, "http://h/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        assert!(authorizer
            .handle(&request(agent(&[ROLE_WRITER]), Method::PUT, "http://h/x"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_control_needs_admin() {
        let authorizer = RoleAuthorizer::new(true);
        let err = authorizer
            .handle(&request(agent(&[ROLE_WRITER]), Method::GET, "http://h/x.acl"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        assert!(authorizer
            .handle(&request(agent(&[ROLE_ADMIN]), Method::PUT, "http://h/x.acl"))
            .await
            .is_ok());
    }
}
