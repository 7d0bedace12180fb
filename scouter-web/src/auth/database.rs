//! SQLite-backed employee directory

use super::employees::{AccessCodeData, CompanyData, EmployeeData};
use chrono::{DateTime, Utc};
use scouter_applications::{ApplicationError, ApplicationResult, Role};
use scouter_core::ScouterError;
use sqlx::SqlitePool;
use tracing::{debug, info};

const COMPONENT: &str = "auth.database";

fn storage_error(message: &str, e: sqlx::Error) -> ApplicationError {
    ApplicationError::Core(ScouterError::storage(message, COMPONENT, e))
}

/// Unique-constraint violations surface as conflicts
fn insert_error(message: &str, conflict: &str, e: sqlx::Error) -> ApplicationError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => ApplicationError::conflict(conflict),
        _ => storage_error(message, e),
    }
}

fn parse_role(role: &str) -> ApplicationResult<Role> {
    role.parse()
        .map_err(|e: String| ApplicationError::Core(ScouterError::validation(e, "role", COMPONENT)))
}

#[derive(Debug, sqlx::FromRow)]
struct CompanyRecord {
    public_id: String,
    name: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<CompanyRecord> for CompanyData {
    fn from(record: CompanyRecord) -> Self {
        Self {
            public_id: record.public_id,
            name: record.name,
            is_active: record.is_active,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EmployeeRecord {
    public_id: String,
    auth_subject: Option<String>,
    email: String,
    first_name: String,
    last_name: String,
    username: Option<String>,
    password_hash: Option<String>,
    role: String,
    company_id: String,
    is_onboarding: bool,
    created_at: DateTime<Utc>,
}

impl EmployeeRecord {
    fn into_employee(self) -> ApplicationResult<EmployeeData> {
        Ok(EmployeeData {
            role: parse_role(&self.role)?,
            public_id: self.public_id,
            auth_subject: self.auth_subject,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            username: self.username,
            password_hash: self.password_hash,
            company_id: self.company_id,
            is_onboarding: self.is_onboarding,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AccessCodeRecord {
    code: String,
    role: String,
    company_id: String,
    is_active: bool,
}

impl AccessCodeRecord {
    fn into_access_code(self) -> ApplicationResult<AccessCodeData> {
        Ok(AccessCodeData {
            role: parse_role(&self.role)?,
            code: self.code,
            company_id: self.company_id,
            is_active: self.is_active,
        })
    }
}

const EMPLOYEE_COLUMNS: &str = "public_id, auth_subject, email, first_name, last_name, username, \
     password_hash, role, company_id, is_onboarding, created_at";

/// Employee directory over a SQLite pool
#[derive(Debug, Clone)]
pub struct DatabaseEmployeeStore {
    pool: SqlitePool,
}

impl DatabaseEmployeeStore {
    /// Wrap `pool`, creating the directory tables if needed
    pub async fn new(pool: SqlitePool) -> ApplicationResult<Self> {
        let store = Self { pool };
        store.create_tables().await?;
        info!("Database employee store initialized");
        Ok(store)
    }

    async fn create_tables(&self) -> ApplicationResult<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS companies (
                public_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS employees (
                public_id TEXT PRIMARY KEY,
                auth_subject TEXT UNIQUE,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                username TEXT UNIQUE COLLATE NOCASE,
                password_hash TEXT,
                role TEXT NOT NULL,
                company_id TEXT NOT NULL,
                is_onboarding BOOLEAN NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_employees_company ON employees(company_id)",
            r#"
            CREATE TABLE IF NOT EXISTS access_codes (
                code TEXT PRIMARY KEY,
                role TEXT NOT NULL,
                company_id TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT 1
            )
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| storage_error("Failed to create directory tables", e))?;
        }

        Ok(())
    }

    pub async fn insert_company(&self, company: &CompanyData) -> ApplicationResult<()> {
        sqlx::query(
            "INSERT INTO companies (public_id, name, is_active, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&company.public_id)
        .bind(&company.name)
        .bind(company.is_active)
        .bind(company.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error("Failed to insert company", "Company already exists", e))?;
        Ok(())
    }

    pub async fn get_company(&self, public_id: &str) -> ApplicationResult<Option<CompanyData>> {
        let record = sqlx::query_as::<_, CompanyRecord>(
            "SELECT public_id, name, is_active, created_at FROM companies WHERE public_id = ?1",
        )
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_error("Failed to load company", e))?;

        Ok(record.map(CompanyData::from))
    }

    pub async fn insert_employee(&self, employee: &EmployeeData) -> ApplicationResult<()> {
        sqlx::query(&format!(
            "INSERT INTO employees ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            EMPLOYEE_COLUMNS
        ))
        .bind(&employee.public_id)
        .bind(&employee.auth_subject)
        .bind(&employee.email)
        .bind(&employee.first_name)
        .bind(&employee.last_name)
        .bind(&employee.username)
        .bind(&employee.password_hash)
        .bind(employee.role.as_str())
        .bind(&employee.company_id)
        .bind(employee.is_onboarding)
        .bind(employee.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error("Failed to insert employee", "Employee already exists", e))?;

        debug!(employee = %employee.public_id, "Employee stored");
        Ok(())
    }

    async fn find_one(&self, filter: &str, value: &str) -> ApplicationResult<Option<EmployeeData>> {
        let record = sqlx::query_as::<_, EmployeeRecord>(&format!(
            "SELECT {} FROM employees WHERE {}",
            EMPLOYEE_COLUMNS, filter
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_error("Failed to load employee", e))?;

        record.map(EmployeeRecord::into_employee).transpose()
    }

    pub async fn find_by_subject(&self, subject: &str) -> ApplicationResult<Option<EmployeeData>> {
        self.find_one("public_id = ?1 OR auth_subject = ?1", subject).await
    }

    pub async fn find_by_email(&self, email: &str) -> ApplicationResult<Option<EmployeeData>> {
        self.find_one("email = ?1 COLLATE NOCASE", email).await
    }

    pub async fn find_by_username(&self, username: &str) -> ApplicationResult<Option<EmployeeData>> {
        self.find_one("username = ?1", username).await
    }

    pub async fn list_by_company(&self, company_id: &str) -> ApplicationResult<Vec<EmployeeData>> {
        sqlx::query_as::<_, EmployeeRecord>(&format!(
            "SELECT {} FROM employees WHERE company_id = ?1 ORDER BY created_at, email",
            EMPLOYEE_COLUMNS
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error("Failed to list employees", e))?
        .into_iter()
        .map(EmployeeRecord::into_employee)
        .collect()
    }

    pub async fn insert_access_code(&self, code: &AccessCodeData) -> ApplicationResult<()> {
        sqlx::query(
            "INSERT INTO access_codes (code, role, company_id, is_active) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&code.code)
        .bind(code.role.as_str())
        .bind(&code.company_id)
        .bind(code.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error("Failed to insert access code", "Access code already exists", e))?;
        Ok(())
    }

    pub async fn find_active_access_code(
        &self,
        code: &str,
        role: Role,
    ) -> ApplicationResult<Option<AccessCodeData>> {
        sqlx::query_as::<_, AccessCodeRecord>(
            "SELECT code, role, company_id, is_active FROM access_codes \
             WHERE code = ?1 AND role = ?2 AND is_active = 1",
        )
        .bind(code)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_error("Failed to load access code", e))?
        .map(AccessCodeRecord::into_access_code)
        .transpose()
    }

    async fn require(&self, public_id: &str) -> ApplicationResult<EmployeeData> {
        self.find_one("public_id = ?1", public_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Employee not found"))
    }

    pub async fn link_subject(
        &self,
        public_id: &str,
        subject: &str,
    ) -> ApplicationResult<EmployeeData> {
        let result = sqlx::query(
            "UPDATE employees SET auth_subject = ?1, is_onboarding = 1 WHERE public_id = ?2",
        )
        .bind(subject)
        .bind(public_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            insert_error(
                "Failed to link identity",
                "Identity is already linked to another employee",
                e,
            )
        })?;

        if result.rows_affected() == 0 {
            return Err(ApplicationError::not_found("Employee not found"));
        }
        self.require(public_id).await
    }

    pub async fn complete_profile(
        &self,
        public_id: &str,
        username: &str,
        password_hash: &str,
    ) -> ApplicationResult<EmployeeData> {
        let result = sqlx::query(
            "UPDATE employees SET username = ?1, password_hash = ?2, is_onboarding = 0 \
             WHERE public_id = ?3",
        )
        .bind(username)
        .bind(password_hash)
        .bind(public_id)
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error("Failed to complete profile", "Username is already taken", e))?;

        if result.rows_affected() == 0 {
            return Err(ApplicationError::not_found("Employee not found"));
        }
        self.require(public_id).await
    }
}
