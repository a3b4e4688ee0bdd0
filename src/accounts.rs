use crate::{
    auth::{AuthUser, issue_token},
    config::{AppConfig, BootstrapAdmin},
    error::AppError,
    models::{
        AuthResponse, CreateAccountRequest, LoginRequest, NewUser, PublicUser, RegisterRequest,
        Role, User,
    },
    password::{dummy_hash, hash_password, verify_password},
    policy::{self, Action, Resource},
    repository::{Repository, StoreError},
};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Profile
///
/// The account fields shared by self-registration and admin-issued creation,
/// after trimming and validation.
struct Profile {
    first_name: String,
    last_name: String,
    email: String,
    password: String,
}

fn required(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn validate_email(raw: &str) -> Result<String, AppError> {
    let email = required("email", raw)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !email.contains(' ') => {
            Ok(email)
        }
        _ => Err(AppError::validation("email is not a valid address")),
    }
}

fn validate_profile(
    first_name: &str,
    last_name: &str,
    email: &str,
    password: &str,
) -> Result<Profile, AppError> {
    let profile = Profile {
        first_name: required("first_name", first_name)?,
        last_name: required("last_name", last_name)?,
        email: validate_email(email)?,
        password: password.to_string(),
    };
    if profile.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(profile)
}

/// Accounts
///
/// Authentication service and identity operations over a borrowed repository.
/// Every output is a [`PublicUser`]; the stored credential never leaves this module.
pub struct Accounts<'a> {
    repo: &'a dyn Repository,
    config: &'a AppConfig,
}

impl<'a> Accounts<'a> {
    pub fn new(repo: &'a dyn Repository, config: &'a AppConfig) -> Self {
        Self { repo, config }
    }

    async fn insert(
        &self,
        profile: Profile,
        role: Role,
        specialization: Option<String>,
        qualifications: Option<String>,
    ) -> Result<User, AppError> {
        if self.repo.find_user_by_email(&profile.email).await?.is_some() {
            return Err(AppError::DuplicateEmail);
        }

        let password_hash = hash_password(&profile.password, self.config.password)?;
        let keep_instructor_field = |field: Option<String>| {
            field
                .filter(|_| role == Role::Instructor)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let new_user = NewUser {
            first_name: profile.first_name,
            last_name: profile.last_name,
            email: profile.email,
            password_hash,
            role,
            specialization: keep_instructor_field(specialization),
            qualifications: keep_instructor_field(qualifications),
        };

        // The unique index settles the race between the lookup above and this insert.
        let user = self.repo.create_user(new_user).await.map_err(|e| match e {
            StoreError::AlreadyExists => AppError::DuplicateEmail,
            other => other.into(),
        })?;

        tracing::info!(user_id = %user.id, role = %user.role, "account created");
        Ok(user)
    }

    /// register
    ///
    /// Self-service sign-up. Always yields a student account; asking for any
    /// other role is refused.
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, AppError> {
        match req.role {
            None | Some(Role::Student) => {}
            Some(role) => {
                tracing::warn!(requested = %role, "self-registration asked for an elevated role");
                return Err(AppError::Forbidden);
            }
        }

        let profile = validate_profile(&req.first_name, &req.last_name, &req.email, &req.password)?;
        let user = self.insert(profile, Role::Student, None, None).await?;
        let token = issue_token(&user, self.config)?;
        Ok(AuthResponse {
            token,
            user: user.into(),
        })
    }

    /// login
    ///
    /// Unknown email and wrong password produce the same `InvalidCredentials`.
    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, AppError> {
        if req.email.trim().is_empty() || req.password.is_empty() {
            return Err(AppError::validation("email and password are required"));
        }

        let Some(user) = self.repo.find_user_by_email(req.email.trim()).await? else {
            // Same Argon2 work as a wrong password; the outcome is discarded.
            let _ = verify_password(&dummy_hash(self.config.password)?, &req.password);
            tracing::debug!("login attempt for unknown email");
            return Err(AppError::InvalidCredentials);
        };
        if !verify_password(&user.password_hash, &req.password) {
            tracing::debug!(user_id = %user.id, "login attempt with wrong password");
            return Err(AppError::InvalidCredentials);
        }

        let token = issue_token(&user, self.config)?;
        tracing::info!(user_id = %user.id, "login succeeded");
        Ok(AuthResponse {
            token,
            user: user.into(),
        })
    }

    /// admin_create_account
    ///
    /// Creates an account of any role. Specialization and qualifications are
    /// kept for instructors only.
    pub async fn admin_create_account(
        &self,
        actor: &AuthUser,
        role: Role,
        req: CreateAccountRequest,
    ) -> Result<PublicUser, AppError> {
        policy::require(Some(actor), Action::CreateAccount, Resource::Nothing)?;

        let profile = validate_profile(&req.first_name, &req.last_name, &req.email, &req.password)?;
        let user = self
            .insert(profile, role, req.specialization, req.qualifications)
            .await?;
        Ok(user.into())
    }

    pub async fn list_accounts(&self, actor: &AuthUser, role: Role) -> Result<Vec<PublicUser>, AppError> {
        policy::require(Some(actor), Action::ListAccounts, Resource::Nothing)?;
        let users = self.repo.list_users_by_role(role).await?;
        Ok(users.into_iter().map(PublicUser::from).collect())
    }

    /// check_email_exists
    ///
    /// Exact, case-sensitive match.
    pub async fn check_email_exists(&self, actor: &AuthUser, email: &str) -> Result<bool, AppError> {
        policy::require(Some(actor), Action::CheckEmail, Resource::Nothing)?;
        Ok(self.repo.find_user_by_email(email).await?.is_some())
    }

    /// profile
    ///
    /// The caller's own account, including both back-reference lists.
    pub async fn profile(&self, actor: &AuthUser) -> Result<PublicUser, AppError> {
        policy::require(Some(actor), Action::ViewProfile, Resource::Nothing)?;
        self.repo
            .get_user(actor.id)
            .await?
            .map(PublicUser::from)
            .ok_or_else(|| AppError::not_found("user"))
    }

    /// ensure_admin
    ///
    /// Startup bootstrap: creates the configured admin unless the email is
    /// already taken. Returns the account when one was created.
    pub async fn ensure_admin(&self, admin: &BootstrapAdmin) -> Result<Option<PublicUser>, AppError> {
        if let Some(existing) = self.repo.find_user_by_email(&admin.email).await? {
            if existing.role != Role::Admin {
                tracing::warn!(
                    user_id = %existing.id,
                    "bootstrap admin email belongs to a non-admin account, skipping"
                );
            }
            return Ok(None);
        }

        let profile = validate_profile("Admin", "User", &admin.email, &admin.password)?;
        let user = self.insert(profile, Role::Admin, None, None).await?;
        tracing::info!(user_id = %user.id, "bootstrap admin created");
        Ok(Some(user.into()))
    }
}
