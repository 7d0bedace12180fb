//! Company-scoped read endpoints
//!
//! The company is looked up before the tenant guard runs: an unknown id is
//! 404 for everyone, a known id owned by another tenant is always 403.

use crate::{
    auth::{
        employees::{CompanyData, CompanyOut, EmployeeOut},
        CurrentEmployee, RequireRecruiter,
    },
    ApiError, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    Json,
};
use scouter_applications::require_same_tenant;
use tracing::debug;

async fn load_company(state: &AppState, company_id: &str) -> ApiResult<CompanyData> {
    state
        .employees
        .get_company(company_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Company not found"))
}

/// Company of the caller
#[utoipa::path(
    get,
    path = "/api/companies/{company_id}",
    tag = "Companies",
    params(("company_id" = String, Path, description = "Company public id")),
    responses(
        (status = 200, description = "Company", body = CompanyOut),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Company belongs to another tenant"),
        (status = 404, description = "Company not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_company(
    State(state): State<AppState>,
    CurrentEmployee(employee): CurrentEmployee,
    Path(company_id): Path<String>,
) -> ApiResult<Json<CompanyOut>> {
    let company = load_company(&state, &company_id).await?;
    require_same_tenant(&employee, &company)?;

    Ok(Json(CompanyOut::from(&company)))
}

/// Staff of the caller's company (admins and recruiters only)
#[utoipa::path(
    get,
    path = "/api/companies/{company_id}/employees",
    tag = "Companies",
    params(("company_id" = String, Path, description = "Company public id")),
    responses(
        (status = 200, description = "Employees of the company", body = [EmployeeOut]),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Wrong tenant or insufficient role"),
        (status = 404, description = "Company not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_company_employees(
    State(state): State<AppState>,
    RequireRecruiter(employee): RequireRecruiter,
    Path(company_id): Path<String>,
) -> ApiResult<Json<Vec<EmployeeOut>>> {
    let company = load_company(&state, &company_id).await?;
    require_same_tenant(&employee, &company)?;

    let employees = state.employees.list_by_company(&company.public_id).await?;
    debug!(company = %company.public_id, count = employees.len(), "Listed employees");

    Ok(Json(employees.iter().map(EmployeeOut::from).collect()))
}
