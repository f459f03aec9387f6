use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Account role. `auth_1` and `auth_2` are the two review tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "citizen")]
    Citizen,
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "auth_1")]
    Auth1,
    #[serde(rename = "auth_2")]
    Auth2,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Citizen => "citizen",
            Self::Admin => "admin",
            Self::Auth1 => "auth_1",
            Self::Auth2 => "auth_2",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "citizen" => Some(Self::Citizen),
            "admin" => Some(Self::Admin),
            "auth_1" => Some(Self::Auth1),
            "auth_2" => Some(Self::Auth2),
            _ => None,
        }
    }

    /// Roles allowed to review submissions.
    pub fn is_reviewer(&self) -> bool {
        matches!(self, Self::Admin | Self::Auth1 | Self::Auth2)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// Stored account. Contains the password hash; never returned by the API
/// (see [`UserProfile`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub country_code: String,
    pub phone: String,
    /// `country_code` + `phone`; unique across accounts.
    pub full_phone_number: String,
    pub role: Role,
    pub created_at: String,
    pub updated_at: String,
}

/// Public view of a [`User`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub country_code: String,
    pub phone: String,
    pub full_phone_number: String,
    pub role: Role,
    pub created_at: String,
}

impl From<&User> for UserProfile {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            name: u.name.clone(),
            email: u.email.clone(),
            country_code: u.country_code.clone(),
            phone: u.phone.clone(),
            full_phone_number: u.full_phone_number.clone(),
            role: u.role,
            created_at: u.created_at.clone(),
        }
    }
}

/// Body for signup and admin user creation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub country_code: String,
    pub phone: String,
    /// Ignored on public signup; honoured for admin-created accounts.
    #[serde(default)]
    pub role: Option<Role>,
}

// ---------------------------------------------------------------------------
// Sessions and tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims carried by both access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub name: String,
    pub role: Role,
    /// Session id; revoking the session invalidates both tokens.
    pub sid: String,
    pub typ: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// A JWT issuance record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub issued_at: String,
    pub expires_at: String,
    pub revoked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&Claims> for Actor {
    fn from(c: &Claims) -> Self {
        Self {
            id: c.sub.clone(),
            role: c.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::Auth1).unwrap(), "\"auth_1\"");
        assert_eq!(serde_json::to_string(&Role::Citizen).unwrap(), "\"citizen\"");
        let r: Role = serde_json::from_str("\"auth_2\"").unwrap();
        assert_eq!(r, Role::Auth2);
        for role in [Role::Citizen, Role::Admin, Role::Auth1, Role::Auth2] {
            assert_eq!(Role::from_str(role.as_str()), Some(role));
        }
        assert_eq!(Role::from_str("root"), None);
    }

    #[test]
    fn reviewer_roles() {
        assert!(!Role::Citizen.is_reviewer());
        assert!(Role::Admin.is_reviewer());
        assert!(Role::Auth1.is_reviewer());
        assert!(Role::Auth2.is_reviewer());
    }

    #[test]
    fn profile_omits_password_hash() {
        let user = User {
            id: "u1".into(),
            name: "Asha".into(),
            email: "asha@example.com".into(),
            password_hash: "$argon2id$...".into(),
            country_code: "+91".into(),
            phone: "9800000000".into(),
            full_phone_number: "+919800000000".into(),
            role: Role::Citizen,
            created_at: "2024-01-01T00:00:00Z".into(),
            updated_at: "2024-01-01T00:00:00Z".into(),
        };
        let json = serde_json::to_value(UserProfile::from(&user)).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["fullPhoneNumber"], "+919800000000");
    }
}
