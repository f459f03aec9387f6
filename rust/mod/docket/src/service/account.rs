use std::sync::LazyLock;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use regex::Regex;

use docket_core::{new_id, now_rfc3339, ListParams, ListResult, ServiceError};
use docket_sql::Value;

use crate::model::{
    Actor, Claims, CreateUser, Role, Session, TokenKind, TokenPair, User, UserProfile,
};
use crate::schema::EMAIL;
use crate::service::{require_admin, required, DocketService};
use crate::store::table;

const MIN_PASSWORD_LEN: usize = 6;
const BAD_LOGIN: &str = "invalid email or password";

static COUNTRY_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+\d{1,4}$").unwrap_or_else(|e| panic!("country code pattern: {e}"))
});
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4,15}$").unwrap_or_else(|e| panic!("phone pattern: {e}")));

// ── Password helpers ──

/// Hash a plain password with argon2id.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    use argon2::Argon2;
    use password_hash::rand_core::OsRng;
    use password_hash::{PasswordHasher, SaltString};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ServiceError::Internal(format!("password hashing failed: {e}")))
}

/// Verify a password against a stored hash. Unparseable hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::Argon2;
    use password_hash::{PasswordHash, PasswordVerifier};

    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

impl DocketService {
    // ── Accounts ──

    /// Public registration. Always creates a citizen.
    pub fn signup(&self, input: CreateUser) -> Result<UserProfile, ServiceError> {
        let user = self.insert_user(input, Role::Citizen)?;
        Ok(UserProfile::from(&user))
    }

    /// Admin-created account with any role.
    pub fn create_user(&self, actor: &Actor, input: CreateUser) -> Result<UserProfile, ServiceError> {
        require_admin(actor)?;
        let role = input.role.unwrap_or(Role::Citizen);
        let user = self.insert_user(input, role)?;
        Ok(UserProfile::from(&user))
    }

    fn insert_user(&self, input: CreateUser, role: Role) -> Result<User, ServiceError> {
        let name = required(&input.name, "name")?;
        let email = input.email.trim().to_ascii_lowercase();
        if !EMAIL.is_match(&email) {
            return Err(ServiceError::Validation(format!("{email:?} is not a valid email")));
        }
        if input.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ServiceError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let country_code = input.country_code.trim().to_string();
        if !COUNTRY_CODE.is_match(&country_code) {
            return Err(ServiceError::Validation(
                "country code must look like +91".into(),
            ));
        }
        let phone = input.phone.trim().to_string();
        if !PHONE.is_match(&phone) {
            return Err(ServiceError::Validation("phone must be 4 to 15 digits".into()));
        }

        let now = now_rfc3339();
        let user = User {
            id: new_id(),
            name,
            email,
            password_hash: hash_password(&input.password)?,
            full_phone_number: format!("{country_code}{phone}"),
            country_code,
            phone,
            role,
            created_at: now.clone(),
            updated_at: now,
        };
        self.store.insert_record(
            table::USERS,
            &user.id,
            &user,
            &[
                ("email", user.email.clone().into()),
                ("phone", user.full_phone_number.clone().into()),
                ("role", user.role.as_str().into()),
                ("created_at", user.created_at.clone().into()),
            ],
            "an account with this email or phone",
        )?;
        tracing::info!(user = %user.id, role = %user.role, "account created");
        Ok(user)
    }

    /// Create the bootstrap admin from a pre-computed hash unless an
    /// account with `email` already exists. Returns whether one was created.
    pub fn ensure_admin(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> Result<bool, ServiceError> {
        let email = email.trim().to_ascii_lowercase();
        if !EMAIL.is_match(&email) {
            return Err(ServiceError::Configuration(format!(
                "admin email {email:?} is not valid"
            )));
        }
        if password_hash::PasswordHash::new(password_hash).is_err() {
            return Err(ServiceError::Configuration(
                "admin password hash is not in PHC format".into(),
            ));
        }
        if self.find_user_by_email(&email)?.is_some() {
            return Ok(false);
        }

        let now = now_rfc3339();
        let user = User {
            id: new_id(),
            name: name.trim().to_string(),
            email,
            password_hash: password_hash.to_string(),
            country_code: String::new(),
            phone: String::new(),
            full_phone_number: String::new(),
            role: Role::Admin,
            created_at: now.clone(),
            updated_at: now,
        };
        self.store.insert_record(
            table::USERS,
            &user.id,
            &user,
            &[
                ("email", user.email.clone().into()),
                ("phone", Value::Null),
                ("role", user.role.as_str().into()),
                ("created_at", user.created_at.clone().into()),
            ],
            "admin account",
        )?;
        tracing::info!(user = %user.id, email = %user.email, "bootstrap admin created");
        Ok(true)
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        self.store.find_record(table::USERS, &[("email", email.into())])
    }

    pub fn profile(&self, user_id: &str) -> Result<UserProfile, ServiceError> {
        let user: User = self.store.get_record(table::USERS, user_id)?;
        Ok(UserProfile::from(&user))
    }

    pub fn list_users(
        &self,
        actor: &Actor,
        params: &ListParams,
    ) -> Result<ListResult<UserProfile>, ServiceError> {
        require_admin(actor)?;
        let (users, total): (Vec<User>, usize) =
            self.store
                .list_records(table::USERS, &[], params.limit, params.offset)?;
        Ok(ListResult {
            items: users.iter().map(UserProfile::from).collect(),
            total,
        })
    }

    // ── Sessions ──

    /// Check credentials and open a session.
    pub fn login(&self, email: &str, password: &str) -> Result<(TokenPair, UserProfile), ServiceError> {
        let email = email.trim().to_ascii_lowercase();
        let user = match self.find_user_by_email(&email)? {
            Some(u) if verify_password(password, &u.password_hash) => u,
            _ => {
                tracing::info!(email = %email, "login rejected");
                return Err(ServiceError::Unauthorized(BAD_LOGIN.into()));
            }
        };
        let tokens = self.issue_tokens(&user)?;
        Ok((tokens, UserProfile::from(&user)))
    }

    /// Issue an access/refresh pair bound to a new session.
    pub fn issue_tokens(&self, user: &User) -> Result<TokenPair, ServiceError> {
        let session_id = new_id();
        let now = chrono::Utc::now();
        let access_exp = now + chrono::Duration::seconds(self.config.access_token_ttl);
        let refresh_exp = now + chrono::Duration::seconds(self.config.refresh_token_ttl);

        let claims = |typ: TokenKind, exp: i64| Claims {
            sub: user.id.clone(),
            name: user.name.clone(),
            role: user.role,
            sid: session_id.clone(),
            typ,
            iat: now.timestamp(),
            exp,
        };
        let key = EncodingKey::from_secret(self.config.jwt_secret.as_bytes());
        let sign = |c: &Claims| {
            encode(&Header::default(), c, &key)
                .map_err(|e| ServiceError::Internal(format!("JWT encode failed: {e}")))
        };
        let access_token = sign(&claims(TokenKind::Access, access_exp.timestamp()))?;
        let refresh_token = sign(&claims(TokenKind::Refresh, refresh_exp.timestamp()))?;

        let session = Session {
            id: session_id.clone(),
            user_id: user.id.clone(),
            issued_at: now.to_rfc3339(),
            expires_at: refresh_exp.to_rfc3339(),
            revoked: false,
        };
        self.store.insert_record(
            table::SESSIONS,
            &session.id,
            &session,
            &[
                ("user_id", session.user_id.clone().into()),
                ("revoked", false.into()),
                ("created_at", session.issued_at.clone().into()),
            ],
            "session",
        )?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_ttl,
        })
    }

    /// Decode a token of the expected kind. Its session must still be live.
    pub fn verify_token(&self, token: &str, kind: TokenKind) -> Result<Claims, ServiceError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {e}")))?;
        let claims = data.claims;
        if claims.typ != kind {
            return Err(ServiceError::Unauthorized("wrong token type".into()));
        }

        match self.store.get_record::<Session>(table::SESSIONS, &claims.sid) {
            Ok(s) if !s.revoked => Ok(claims),
            Ok(_) => Err(ServiceError::Unauthorized("session has been revoked".into())),
            Err(ServiceError::NotFound(_)) => {
                Err(ServiceError::Unauthorized("unknown session".into()))
            }
            Err(e) => Err(e),
        }
    }

    /// Trade a refresh token for a new pair. The old session is revoked.
    pub fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenPair, ServiceError> {
        let claims = self.verify_token(refresh_token, TokenKind::Refresh)?;
        let user: User = self
            .store
            .get_record(table::USERS, &claims.sub)
            .map_err(|_| ServiceError::Unauthorized("user not found".into()))?;
        self.revoke_session(&claims.sid)?;
        self.issue_tokens(&user)
    }

    pub fn revoke_session(&self, session_id: &str) -> Result<(), ServiceError> {
        let mut session: Session = self.store.get_record(table::SESSIONS, session_id)?;
        if session.revoked {
            return Ok(());
        }
        session.revoked = true;
        self.store.update_record(
            table::SESSIONS,
            session_id,
            &session,
            &[("revoked", true.into())],
        )?;
        tracing::debug!(session = %session_id, "session revoked");
        Ok(())
    }
}
