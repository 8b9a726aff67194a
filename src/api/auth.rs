//! Cookie session and role gating
//!
//! Sessions are issued elsewhere; requests arrive carrying `session`, `uinf`
//! (username), `role` (JSON array or bare string of role ids) and `library`
//! cookies. This module only reads them.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use percent_encoding::percent_decode_str;

use super::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    SuperAdmin,
    Member,
    EResourceEditor,
}

impl Role {
    pub fn id(self) -> &'static str {
        match self {
            Role::SuperAdmin => "1",
            Role::Member => "2",
            Role::EResourceEditor => "3",
        }
    }
}

/// The caller as described by request cookies
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub username: String,
    pub roles: Vec<String>,
    pub library_id: Option<u32>,
}

impl Session {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.iter().any(|r| r == role.id())
    }

    pub fn has_any(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.has_role(*r))
    }

    /// 403 unless the caller holds one of `roles`
    pub fn require_any(&self, roles: &[Role]) -> Result<(), ApiError> {
        if self.has_any(roles) {
            Ok(())
        } else {
            Err(ApiError::forbidden("Insufficient permissions"))
        }
    }

    /// Super admins manage every library; members only their own
    pub fn can_edit_library(&self, library_id: u32) -> bool {
        self.has_role(Role::SuperAdmin)
            || (self.has_role(Role::Member) && self.library_id == Some(library_id))
    }

    /// Members without an admin or e-resource role
    pub fn is_member_only(&self) -> bool {
        self.has_role(Role::Member) && !self.has_any(&[Role::SuperAdmin, Role::EResourceEditor])
    }
}

/// Split a `Cookie` header into decoded name/value pairs
pub fn parse_cookies(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim().trim_matches('"');
            let decoded = percent_decode_str(value).decode_utf8_lossy().into_owned();
            Some((name.to_string(), decoded))
        })
        .collect()
}

/// Role cookie as a list of ids: `["1","3"]`, `[1,3]`, `"2"` or `2`
pub fn parse_roles(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Array(items)) => items.iter().filter_map(role_id).collect(),
        Ok(value) => role_id(&value).into_iter().collect(),
        Err(_) if raw.is_empty() => Vec::new(),
        Err(_) => vec![raw.to_string()],
    }
}

fn role_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl Session {
    pub fn from_cookie_header(header: &str) -> Result<Self, ApiError> {
        let cookies = parse_cookies(header);

        let username = cookies
            .get("uinf")
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Not signed in"))?;
        let roles = cookies
            .get("role")
            .map(|r| parse_roles(r))
            .filter(|r| !r.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Missing role"))?;
        let library_id = cookies.get("library").and_then(|l| l.trim().parse().ok());

        Ok(Session {
            username: username.clone(),
            roles,
            library_id,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join("; ");
        Session::from_cookie_header(&header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cookies_decodes_values() {
        let cookies = parse_cookies("session=abc; uinf=jdoe; role=%5B%221%22%2C%223%22%5D; library=12");
        assert_eq!(cookies["uinf"], "jdoe");
        assert_eq!(cookies["role"], r#"["1","3"]"#);
        assert_eq!(cookies["library"], "12");
    }

    #[test]
    fn test_parse_roles_variants() {
        assert_eq!(parse_roles(r#"["1","3"]"#), vec!["1", "3"]);
        assert_eq!(parse_roles("[2, 3]"), vec!["2", "3"]);
        assert_eq!(parse_roles(r#""2""#), vec!["2"]);
        assert_eq!(parse_roles("2"), vec!["2"]);
        assert_eq!(parse_roles("admin"), vec!["admin"]);
        assert!(parse_roles("").is_empty());
        assert!(parse_roles("[]").is_empty());
    }

    #[test]
    fn test_session_requires_username_and_role() {
        assert!(Session::from_cookie_header("role=1").is_err());
        assert!(Session::from_cookie_header("uinf=jdoe").is_err());
        assert!(Session::from_cookie_header("uinf=jdoe; role=[]").is_err());

        let session = Session::from_cookie_header("uinf=jdoe; role=2; library=7").unwrap();
        assert_eq!(session.username, "jdoe");
        assert!(session.has_role(Role::Member));
        assert_eq!(session.library_id, Some(7));
    }

    #[test]
    fn test_library_editing_rights() {
        let member = Session {
            username: "m".to_string(),
            roles: vec!["2".to_string()],
            library_id: Some(7),
        };
        assert!(member.can_edit_library(7));
        assert!(!member.can_edit_library(8));
        assert!(member.is_member_only());
        assert!(member.require_any(&[Role::SuperAdmin, Role::EResourceEditor]).is_err());

        let admin = Session {
            username: "a".to_string(),
            roles: vec!["1".to_string()],
            library_id: None,
        };
        assert!(admin.can_edit_library(8));
        assert!(!admin.is_member_only());
    }
}
