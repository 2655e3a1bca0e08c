//! Request principal resolution.

use std::collections::HashMap;

use axum::{
    async_trait,
    body::Body,
    extract::State,
    headers::{
        authorization::{Basic, Bearer},
        Authorization, HeaderMapExt,
    },
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use common::config::{Auth, Token, User};
use controller::project::Project;
use tracing::debug;

use crate::{error::RegistryError, state::AppState};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum Principal {
    #[default]
    Anonymous,

    User {
        name: String,
        admin: bool,
        projects: Vec<String>,
        scanner: bool,
    },

    Token {
        name: String,
        projects: Vec<String>,
        scanner_pull: bool,
    },
}

/// Principal of the request, stored in the request extensions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct SecurityContext {
    pub principal: Principal,
}

impl SecurityContext {
    pub(crate) fn get<B>(req: &Request<B>) -> SecurityContext {
        req.extensions()
            .get::<SecurityContext>()
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn is_authenticated(&self) -> bool {
        self.principal != Principal::Anonymous
    }

    pub(crate) fn name(&self) -> &str {
        match &self.principal {
            Principal::Anonymous => "anonymous",
            Principal::User { name, .. } | Principal::Token { name, .. } => name,
        }
    }

    fn is_member(&self, project_name: &str) -> bool {
        match &self.principal {
            Principal::Anonymous => false,
            Principal::User {
                admin, projects, ..
            } => *admin || projects.iter().any(|project| project == project_name),
            Principal::Token { projects, .. } => {
                projects.iter().any(|project| project == project_name)
            }
        }
    }

    /// Scanners pull artifacts regardless of the project pull policies.
    pub(crate) fn is_scanner(&self) -> bool {
        matches!(
            self.principal,
            Principal::User { scanner: true, .. } | Principal::Token { scanner_pull: true, .. }
        )
    }

    pub(crate) fn can_pull(&self, project: &Project) -> bool {
        project.is_public() || self.is_scanner() || self.is_member(&project.name)
    }

    pub(crate) fn can_push(&self, project: &Project) -> bool {
        self.is_member(&project.name)
    }
}

#[async_trait]
pub(crate) trait Authenticator: Send + Sync {
    /// Resolve the principal from the request headers.
    ///
    /// Requests without credentials are anonymous; invalid credentials are rejected.
    async fn authenticate(&self, headers: &HeaderMap) -> Result<SecurityContext, RegistryError>;
}

/// Authenticator backed by the accounts listed in the configuration file.
pub(crate) struct StaticAuthenticator {
    users: HashMap<String, User>,
    tokens: HashMap<String, Token>,
}

impl StaticAuthenticator {
    pub(crate) fn new(auth: &Auth) -> Self {
        Self {
            users: auth
                .users
                .iter()
                .map(|user| (user.name.clone(), user.clone()))
                .collect(),
            tokens: auth
                .tokens
                .iter()
                .map(|token| (token.token.clone(), token.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<SecurityContext, RegistryError> {
        if let Some(Authorization(basic)) = headers.typed_get::<Authorization<Basic>>() {
            let user = self
                .users
                .get(basic.username())
                .filter(|user| user.password == basic.password())
                .ok_or_else(|| RegistryError::unauthorized("invalid username or password"))?;

            return Ok(SecurityContext {
                principal: Principal::User {
                    name: user.name.clone(),
                    admin: user.admin,
                    projects: user.projects.clone(),
                    scanner: user.scanner,
                },
            });
        }

        if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
            let token = self
                .tokens
                .get(bearer.token())
                .ok_or_else(|| RegistryError::unauthorized("invalid token"))?;

            return Ok(SecurityContext {
                principal: Principal::Token {
                    name: token.name.clone(),
                    projects: token.projects.clone(),
                    scanner_pull: token.scanner_pull,
                },
            });
        }

        if headers.contains_key(header::AUTHORIZATION) {
            return Err(RegistryError::unauthorized(
                "unsupported authorization scheme",
            ));
        }

        Ok(SecurityContext::default())
    }
}

pub(crate) async fn security(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next<Body>,
) -> Result<Response, RegistryError> {
    let context = state.authenticator.authenticate(req.headers()).await?;

    debug!(principal = context.name(), "request authenticated");
    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::http::{header, HeaderMap, HeaderValue};
    use common::config::{Auth, Token, User};
    use controller::project::{Project, PUBLIC};

    use super::*;

    fn authenticator() -> StaticAuthenticator {
        StaticAuthenticator::new(&Auth {
            users: vec![User {
                name: String::from("dev"),
                password: String::from("secret"),
                admin: false,
                projects: vec![String::from("library")],
                scanner: false,
            }],
            tokens: vec![Token {
                token: String::from("scan-token"),
                name: String::from("scanner"),
                projects: Vec::new(),
                scanner_pull: true,
            }],
        })
    }

    fn headers(authorization: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(authorization));
        headers
    }

    fn project(name: &str, public: bool) -> Project {
        Project {
            id: 1,
            name: name.to_string(),
            metadata: HashMap::from([(PUBLIC.to_string(), public.to_string())]),
        }
    }

    #[tokio::test]
    async fn basic() {
        // dev:secret
        let context = authenticator()
            .authenticate(&headers("Basic ZGV2OnNlY3JldA=="))
            .await
            .unwrap();

        assert_eq!(context.name(), "dev");
        assert!(context.can_push(&project("library", false)));
        assert!(!context.can_pull(&project("private", false)));
        assert!(context.can_pull(&project("public", true)));
        assert!(!context.is_scanner());

        // dev:wrong
        assert!(authenticator()
            .authenticate(&headers("Basic ZGV2Ondyb25n"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn bearer() {
        let context = authenticator()
            .authenticate(&headers("Bearer scan-token"))
            .await
            .unwrap();

        assert!(context.is_scanner());
        assert!(context.can_pull(&project("private", false)));
        assert!(!context.can_push(&project("private", false)));

        assert!(authenticator()
            .authenticate(&headers("Bearer unknown"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn anonymous() {
        let context = authenticator()
            .authenticate(&HeaderMap::new())
            .await
            .unwrap();

        assert!(!context.is_authenticated());
        assert!(context.can_pull(&project("public", true)));
        assert!(!context.can_push(&project("public", true)));

        assert!(authenticator()
            .authenticate(&headers("Digest realm=\"registry\""))
            .await
            .is_err());
    }
}
