use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::{normalize_email, parse_date};
use crate::{
    AppState,
    auth::PrivilegedOperator,
    errors::{ApiError, ApiResult},
    extract::{ApiPath, FormBody},
    mailer::new_employee_email,
    media::{EMPLOYEE_DOCUMENT, FileField, FormData, MediaManager},
    models::{Employee, EmployeeForm},
    views::{EmployeeList, EmployeeResponse, MessageResponse, employee_view},
};

const EMPLOYEE_FIELDS: &[FileField] = &[
    FileField {
        name: "faceImage",
        max_count: 1,
        policy: &EMPLOYEE_DOCUMENT,
    },
    FileField {
        name: "certificate",
        max_count: 1,
        policy: &EMPLOYEE_DOCUMENT,
    },
];

const DATE_FIELDS: [&str; 4] = ["startDate", "endDate", "certificateStartDate", "certificateEndDate"];

fn date_slot<'a>(employee: &'a mut Employee, field: &str) -> Option<&'a mut Option<DateTime<Utc>>> {
    match field {
        "startDate" => Some(&mut employee.start_date),
        "endDate" => Some(&mut employee.end_date),
        "certificateStartDate" => Some(&mut employee.certificate_start_date),
        "certificateEndDate" => Some(&mut employee.certificate_end_date),
        _ => None,
    }
}

/// Sets every non-blank date field present in the form.
fn apply_dates(employee: &mut Employee, form: &FormData) -> ApiResult<()> {
    for field in DATE_FIELDS {
        if let Some(raw) = form.trimmed(field) {
            let value = parse_date(field, raw)?;
            if let Some(slot) = date_slot(employee, field) {
                *slot = Some(value);
            }
        }
    }
    Ok(())
}

/// Writes the uploaded `faceImage` / `certificate`, replacing previous files. Both
/// are checked before either is written.
async fn apply_files(state: &AppState, employee: &mut Employee, form: &mut FormData) -> ApiResult<()> {
    let face = form.take_file("faceImage");
    let certificate = form.take_file("certificate");
    for file in face.iter().chain(certificate.iter()) {
        MediaManager::check(&EMPLOYEE_DOCUMENT, file)?;
    }

    let manager = state.media();
    if let Some(file) = face {
        let stored = manager.accept(&EMPLOYEE_DOCUMENT, file).await?;
        manager.replace(&mut employee.face_image, stored.path).await;
    }
    if let Some(file) = certificate {
        let stored = manager.accept(&EMPLOYEE_DOCUMENT, file).await?;
        manager.replace(&mut employee.certificate, stored.path).await;
    }
    Ok(())
}

/// Mails every admin-status or allowlisted user about the new hire. Runs detached;
/// failures are only logged.
fn notify_new_employee(state: &AppState, employee: Employee) {
    let repo = state.repo.clone();
    let mailer = state.mailer.clone();
    let operators = state.config.privileged_operators.clone();

    tokio::spawn(async move {
        let recipients: BTreeSet<String> = match repo.list_notification_recipients(&operators).await {
            Ok(users) => users
                .into_iter()
                .map(|u| u.email.to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "could not load notification recipients");
                return;
            }
        };
        if recipients.is_empty() {
            return;
        }

        let count = recipients.len();
        match mailer
            .send(new_employee_email(recipients.into_iter().collect(), &employee))
            .await
        {
            Ok(()) => tracing::info!(employee_id = %employee.id, recipients = count, "new employee notification sent"),
            Err(e) => tracing::warn!(employee_id = %employee.id, error = %e, "new employee notification failed"),
        }
    });
}

#[utoipa::path(
    get,
    path = "/api/employees",
    responses(
        (status = 200, description = "Registry, newest first", body = EmployeeList),
        (status = 403, description = "Privileged operator rights required")
    )
)]
pub async fn list_employees(
    _operator: PrivilegedOperator,
    State(state): State<AppState>,
) -> ApiResult<Json<EmployeeList>> {
    let employees = state.repo.list_employees().await?;

    Ok(Json(EmployeeList {
        employees: employees.iter().map(|e| employee_view(&state.server, e)).collect(),
    }))
}

/// create_employee
///
/// `name`, `email` and `phone` are required; the email must be unused in the registry.
/// Optional `faceImage` and `certificate` files (images or PDF, 10 MB).
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body(content = EmployeeForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Employee created", body = EmployeeResponse),
        (status = 400, description = "Missing fields, duplicate email or rejected file"),
        (status = 403, description = "Privileged operator rights required")
    )
)]
pub async fn create_employee(
    PrivilegedOperator(operator): PrivilegedOperator,
    State(state): State<AppState>,
    body: FormBody,
) -> ApiResult<(StatusCode, Json<EmployeeResponse>)> {
    let mut form = body.read(EMPLOYEE_FIELDS).await?;

    let (Some(name), Some(email), Some(phone)) = (
        form.trimmed("name"),
        form.trimmed("email"),
        form.trimmed("phone"),
    ) else {
        return Err(ApiError::validation("Name, email and phone are required"));
    };

    let now = Utc::now();
    let mut employee = Employee {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: normalize_email(email),
        phone: phone.to_string(),
        created_at: now,
        updated_at: now,
        ..Employee::default()
    };

    if state
        .repo
        .find_employee_by_email(&employee.email)
        .await?
        .is_some()
    {
        return Err(ApiError::validation("Email already in use"));
    }
    apply_dates(&mut employee, &form)?;
    apply_files(&state, &mut employee, &mut form).await?;

    state.repo.insert_employee(&employee).await?;
    tracing::info!(employee_id = %employee.id, operator_id = %operator.id, "employee created");

    let response = EmployeeResponse {
        message: "Employee created".into(),
        employee: employee_view(&state.server, &employee),
    };
    notify_new_employee(&state, employee);

    Ok((StatusCode::CREATED, Json(response)))
}

/// update_employee
///
/// Non-blank fields replace the stored ones; new files replace (and remove) the old.
#[utoipa::path(
    put,
    path = "/api/employees/{id}",
    params(("id" = Uuid, Path, description = "Employee id")),
    request_body(content = EmployeeForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated", body = EmployeeResponse),
        (status = 400, description = "Bad field, duplicate email or rejected file"),
        (status = 403, description = "Privileged operator rights required"),
        (status = 404, description = "Missing")
    )
)]
pub async fn update_employee(
    _operator: PrivilegedOperator,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    body: FormBody,
) -> ApiResult<Json<EmployeeResponse>> {
    let mut employee = state
        .repo
        .get_employee(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found"))?;
    let mut form = body.read(EMPLOYEE_FIELDS).await?;

    if let Some(name) = form.trimmed("name") {
        employee.name = name.to_string();
    }
    if let Some(phone) = form.trimmed("phone") {
        employee.phone = phone.to_string();
    }
    if let Some(email) = form.trimmed("email") {
        let email = normalize_email(email);
        if let Some(other) = state.repo.find_employee_by_email(&email).await? {
            if other.id != employee.id {
                return Err(ApiError::validation("Email already in use"));
            }
        }
        employee.email = email;
    }
    apply_dates(&mut employee, &form)?;
    apply_files(&state, &mut employee, &mut form).await?;

    employee.updated_at = Utc::now();
    state.repo.save_employee(&employee).await?;

    Ok(Json(EmployeeResponse {
        message: "Employee updated".into(),
        employee: employee_view(&state.server, &employee),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/employees/{id}",
    params(("id" = Uuid, Path, description = "Employee id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Privileged operator rights required"),
        (status = 404, description = "Missing")
    )
)]
pub async fn delete_employee(
    PrivilegedOperator(operator): PrivilegedOperator,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let employee = state
        .repo
        .get_employee(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    state.media().cascade_delete(&employee).await;
    state.repo.delete_employee(employee.id).await?;
    tracing::info!(employee_id = %id, operator_id = %operator.id, "employee deleted");

    Ok(Json(MessageResponse::new("Employee deleted")))
}
