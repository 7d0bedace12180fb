//! Employee, company and access-code storage

#[cfg(feature = "sqlite")]
use super::database::DatabaseEmployeeStore;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use scouter_applications::{
    ApplicationError, ApplicationResult, Role, RoleBearer, TenantScoped,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use utoipa::ToSchema;
use uuid::Uuid;

fn new_public_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_true() -> bool {
    true
}

/// Tenant record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyData {
    #[serde(default = "new_public_id")]
    pub public_id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl CompanyData {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            public_id: new_public_id(),
            name: name.into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

impl TenantScoped for CompanyData {
    fn tenant_id(&self) -> &str {
        &self.public_id
    }
}

/// Stored employee account
#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeData {
    pub public_id: String,
    /// Identity provider subject, linked on the first access-gate pass
    pub auth_subject: Option<String>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub role: Role,
    pub company_id: String,
    pub is_onboarding: bool,
    pub created_at: DateTime<Utc>,
}

impl EmployeeData {
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        role: Role,
        company_id: impl Into<String>,
    ) -> Self {
        Self {
            public_id: new_public_id(),
            auth_subject: None,
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            username: None,
            password_hash: None,
            role,
            company_id: company_id.into(),
            is_onboarding: false,
            created_at: Utc::now(),
        }
    }

    /// Set login credentials, hashing `password`
    pub fn with_credentials(mut self, username: &str, password: &str) -> ApplicationResult<Self> {
        self.username = Some(username.to_string());
        self.password_hash = Some(hash_password(password)?);
        Ok(self)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Whether `subject` names this employee (public id or linked provider subject)
    pub fn answers_to(&self, subject: &str) -> bool {
        self.public_id == subject || self.auth_subject.as_deref() == Some(subject)
    }

    pub fn verify_password(&self, password: &str) -> bool {
        self.password_hash
            .as_deref()
            .map(|hash| verify_password(password, hash))
            .unwrap_or(false)
    }
}

impl TenantScoped for EmployeeData {
    fn tenant_id(&self) -> &str {
        &self.company_id
    }
}

impl RoleBearer for EmployeeData {
    fn roles(&self) -> Option<Vec<Role>> {
        Some(vec![self.role])
    }

    fn principal(&self) -> &str {
        &self.public_id
    }
}

/// Invitation code granting a role within a company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessCodeData {
    pub code: String,
    pub role: Role,
    pub company_id: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl TenantScoped for AccessCodeData {
    fn tenant_id(&self) -> &str {
        &self.company_id
    }
}

/// Company as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompanyOut {
    pub public_id: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&CompanyData> for CompanyOut {
    fn from(company: &CompanyData) -> Self {
        Self {
            public_id: company.public_id.clone(),
            name: company.name.clone(),
            is_active: company.is_active,
            created_at: company.created_at,
        }
    }
}

/// Employee as returned by the API; never carries the password hash
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmployeeOut {
    pub public_id: String,
    pub full_name: String,
    pub email: String,
    pub username: Option<String>,
    pub role: Role,
    pub company_id: String,
    pub is_onboarding: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&EmployeeData> for EmployeeOut {
    fn from(employee: &EmployeeData) -> Self {
        Self {
            public_id: employee.public_id.clone(),
            full_name: employee.full_name(),
            email: employee.email.clone(),
            username: employee.username.clone(),
            role: employee.role,
            company_id: employee.company_id.clone(),
            is_onboarding: employee.is_onboarding,
            created_at: employee.created_at,
        }
    }
}

/// Identifying fields shown before an employee has finished onboarding
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmployeeBase {
    pub public_id: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
}

impl From<&EmployeeData> for EmployeeBase {
    fn from(employee: &EmployeeData) -> Self {
        Self {
            public_id: employee.public_id.clone(),
            full_name: employee.full_name(),
            email: employee.email.clone(),
            role: employee.role,
        }
    }
}

fn has_username(employee: &EmployeeData, username: &str) -> bool {
    employee
        .username
        .as_deref()
        .is_some_and(|name| name.eq_ignore_ascii_case(username))
}

/// Hash a password with argon2 and a random salt
pub fn hash_password(password: &str) -> ApplicationResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApplicationError::validation(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored argon2 hash; malformed hashes never match
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[derive(Debug, Default)]
pub struct MemoryDirectory {
    companies: HashMap<String, CompanyData>,
    employees: HashMap<String, EmployeeData>,
    access_codes: HashMap<String, AccessCodeData>,
}

impl MemoryDirectory {
    fn employee_mut(&mut self, public_id: &str) -> ApplicationResult<&mut EmployeeData> {
        self.employees
            .get_mut(public_id)
            .ok_or_else(|| ApplicationError::not_found("Employee not found"))
    }
}

/// Employee directory backend
#[derive(Debug, Clone)]
pub enum EmployeeStore {
    Memory(Arc<RwLock<MemoryDirectory>>),
    #[cfg(feature = "sqlite")]
    Database(DatabaseEmployeeStore),
}

impl Default for EmployeeStore {
    fn default() -> Self {
        Self::memory()
    }
}

impl EmployeeStore {
    pub fn memory() -> Self {
        EmployeeStore::Memory(Arc::new(RwLock::new(MemoryDirectory::default())))
    }

    #[cfg(feature = "sqlite")]
    pub fn database(store: DatabaseEmployeeStore) -> Self {
        EmployeeStore::Database(store)
    }

    pub async fn insert_company(&self, company: CompanyData) -> ApplicationResult<()> {
        match self {
            EmployeeStore::Memory(dir) => {
                let mut dir = dir.write().await;
                if dir.companies.contains_key(&company.public_id) {
                    return Err(ApplicationError::conflict("Company already exists"));
                }
                dir.companies.insert(company.public_id.clone(), company);
                Ok(())
            }
            #[cfg(feature = "sqlite")]
            EmployeeStore::Database(db) => db.insert_company(&company).await,
        }
    }

    pub async fn get_company(&self, public_id: &str) -> ApplicationResult<Option<CompanyData>> {
        match self {
            EmployeeStore::Memory(dir) => Ok(dir.read().await.companies.get(public_id).cloned()),
            #[cfg(feature = "sqlite")]
            EmployeeStore::Database(db) => db.get_company(public_id).await,
        }
    }

    /// Add an employee; email and username must be unique
    pub async fn insert_employee(&self, employee: EmployeeData) -> ApplicationResult<()> {
        match self {
            EmployeeStore::Memory(dir) => {
                let mut dir = dir.write().await;
                let clash = dir.employees.values().any(|existing| {
                    existing.public_id == employee.public_id
                        || existing.email.eq_ignore_ascii_case(&employee.email)
                        || matches!(
                            (&existing.username, &employee.username),
                            (Some(a), Some(b)) if a.eq_ignore_ascii_case(b)
                        )
                });
                if clash {
                    return Err(ApplicationError::conflict("Employee already exists"));
                }
                debug!(employee = %employee.public_id, company = %employee.company_id, "Employee added");
                dir.employees.insert(employee.public_id.clone(), employee);
                Ok(())
            }
            #[cfg(feature = "sqlite")]
            EmployeeStore::Database(db) => db.insert_employee(&employee).await,
        }
    }

    /// Resolve a token subject to an employee
    pub async fn find_by_subject(&self, subject: &str) -> ApplicationResult<Option<EmployeeData>> {
        match self {
            EmployeeStore::Memory(dir) => Ok(dir
                .read()
                .await
                .employees
                .values()
                .find(|e| e.answers_to(subject))
                .cloned()),
            #[cfg(feature = "sqlite")]
            EmployeeStore::Database(db) => db.find_by_subject(subject).await,
        }
    }

    pub async fn find_by_email(&self, email: &str) -> ApplicationResult<Option<EmployeeData>> {
        match self {
            EmployeeStore::Memory(dir) => Ok(dir
                .read()
                .await
                .employees
                .values()
                .find(|e| e.email.eq_ignore_ascii_case(email))
                .cloned()),
            #[cfg(feature = "sqlite")]
            EmployeeStore::Database(db) => db.find_by_email(email).await,
        }
    }

    /// Usernames compare case-insensitively, like emails
    pub async fn find_by_username(&self, username: &str) -> ApplicationResult<Option<EmployeeData>> {
        match self {
            EmployeeStore::Memory(dir) => Ok(dir
                .read()
                .await
                .employees
                .values()
                .find(|e| has_username(e, username))
                .cloned()),
            #[cfg(feature = "sqlite")]
            EmployeeStore::Database(db) => db.find_by_username(username).await,
        }
    }

    /// Employees of one company, oldest first
    pub async fn list_by_company(&self, company_id: &str) -> ApplicationResult<Vec<EmployeeData>> {
        match self {
            EmployeeStore::Memory(dir) => {
                let mut employees: Vec<_> = dir
                    .read()
                    .await
                    .employees
                    .values()
                    .filter(|e| e.company_id == company_id)
                    .cloned()
                    .collect();
                employees.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.email.cmp(&b.email)));
                Ok(employees)
            }
            #[cfg(feature = "sqlite")]
            EmployeeStore::Database(db) => db.list_by_company(company_id).await,
        }
    }

    pub async fn insert_access_code(&self, code: AccessCodeData) -> ApplicationResult<()> {
        match self {
            EmployeeStore::Memory(dir) => {
                let mut dir = dir.write().await;
                if dir.access_codes.contains_key(&code.code) {
                    return Err(ApplicationError::conflict("Access code already exists"));
                }
                dir.access_codes.insert(code.code.clone(), code);
                Ok(())
            }
            #[cfg(feature = "sqlite")]
            EmployeeStore::Database(db) => db.insert_access_code(&code).await,
        }
    }

    /// Active code granting `role`, in any company
    pub async fn find_active_access_code(
        &self,
        code: &str,
        role: Role,
    ) -> ApplicationResult<Option<AccessCodeData>> {
        match self {
            EmployeeStore::Memory(dir) => Ok(dir
                .read()
                .await
                .access_codes
                .get(code)
                .filter(|c| c.is_active && c.role == role)
                .cloned()),
            #[cfg(feature = "sqlite")]
            EmployeeStore::Database(db) => db.find_active_access_code(code, role).await,
        }
    }

    /// Bind an identity provider subject and mark the employee as onboarding
    pub async fn link_subject(
        &self,
        public_id: &str,
        subject: &str,
    ) -> ApplicationResult<EmployeeData> {
        match self {
            EmployeeStore::Memory(dir) => {
                let mut dir = dir.write().await;
                let taken = dir
                    .employees
                    .values()
                    .any(|e| e.public_id != public_id && e.auth_subject.as_deref() == Some(subject));
                if taken {
                    return Err(ApplicationError::conflict(
                        "Identity is already linked to another employee",
                    ));
                }

                let employee = dir.employee_mut(public_id)?;
                employee.auth_subject = Some(subject.to_string());
                employee.is_onboarding = true;
                Ok(employee.clone())
            }
            #[cfg(feature = "sqlite")]
            EmployeeStore::Database(db) => db.link_subject(public_id, subject).await,
        }
    }

    /// Store credentials and leave the onboarding state
    pub async fn complete_profile(
        &self,
        public_id: &str,
        username: &str,
        password_hash: &str,
    ) -> ApplicationResult<EmployeeData> {
        match self {
            EmployeeStore::Memory(dir) => {
                let mut dir = dir.write().await;
                let taken = dir
                    .employees
                    .values()
                    .any(|e| e.public_id != public_id && has_username(e, username));
                if taken {
                    return Err(ApplicationError::conflict("Username is already taken"));
                }

                let employee = dir.employee_mut(public_id)?;
                employee.username = Some(username.to_string());
                employee.password_hash = Some(password_hash.to_string());
                employee.is_onboarding = false;
                Ok(employee.clone())
            }
            #[cfg(feature = "sqlite")]
            EmployeeStore::Database(db) => db.complete_profile(public_id, username, password_hash).await,
        }
    }
}

/// Employee entry in a seed file; `password` is hashed on load
#[derive(Debug, Clone, Deserialize)]
pub struct EmployeeSeed {
    #[serde(default = "new_public_id")]
    pub public_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub company_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub auth_subject: Option<String>,
}

/// Initial directory contents, loaded from JSON at startup
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DirectorySeed {
    pub companies: Vec<CompanyData>,
    pub employees: Vec<EmployeeSeed>,
    pub access_codes: Vec<AccessCodeData>,
}

impl DirectorySeed {
    pub fn from_file(path: &Path) -> ApplicationResult<Self> {
        let content = std::fs::read_to_string(path).map_err(scouter_core::ScouterError::from)?;
        let seed = serde_json::from_str(&content).map_err(scouter_core::ScouterError::from)?;
        Ok(seed)
    }

    /// Insert everything, skipping records that already exist
    pub async fn apply(self, store: &EmployeeStore) -> ApplicationResult<()> {
        let (companies, employees, codes) = (
            self.companies.len(),
            self.employees.len(),
            self.access_codes.len(),
        );

        for company in self.companies {
            skip_existing(store.insert_company(company).await)?;
        }

        for seed in self.employees {
            let mut employee = EmployeeData::new(
                seed.email,
                seed.first_name,
                seed.last_name,
                seed.role,
                seed.company_id,
            );
            employee.public_id = seed.public_id;
            employee.auth_subject = seed.auth_subject;
            if let (Some(username), Some(password)) = (seed.username, seed.password) {
                employee = employee.with_credentials(&username, &password)?;
            }
            skip_existing(store.insert_employee(employee).await)?;
        }

        for code in self.access_codes {
            skip_existing(store.insert_access_code(code).await)?;
        }

        info!(companies, employees, access_codes = codes, "Applied directory seed");
        Ok(())
    }
}

fn skip_existing(result: ApplicationResult<()>) -> ApplicationResult<()> {
    match result {
        Err(ApplicationError::Conflict { .. }) => Ok(()),
        other => other,
    }
}
