// src/services/course_form.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::{
    config::{MAX_COURSE_FILE_BYTES, MAX_MODULE_FILES},
    error::AppError,
    media::UploadedFile,
    models::course::{Audience, Module, ParseEnumError},
    utils::{
        html::clean_html,
        multipart::{MultipartForm, ensure_file},
    },
};

pub const IMAGE_FIELD: &str = "image";
pub const MODULE_FILES_FIELD: &str = "module_files";

const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png"];
const MODULE_FILE_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/zip",
];

/// Validated text part of a course create/update form.
#[derive(Debug, Clone)]
pub struct CourseDraft {
    pub title: String,
    pub tools: Vec<String>,
    pub learning_outcomes: Vec<String>,
    pub duration_hours: i32,
    pub welcome: String,
    pub modules: Vec<Module>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub audience: Audience,
}

/// Parsed course form, files already type- and size-checked.
#[derive(Debug)]
pub struct CourseForm {
    pub draft: CourseDraft,
    pub image: Option<UploadedFile>,
    pub module_files: Vec<UploadedFile>,
}

impl CourseForm {
    /// Parses and validates the multipart course form.
    ///
    /// JSON fields (`tools`, `learning_outcomes`, `modules`) may be absent,
    /// but when present they must parse; nothing is silently defaulted.
    pub fn parse(mut form: MultipartForm) -> Result<Self, AppError> {
        let title = form.require_text("title")?.to_string();
        if title.chars().count() > 200 {
            return Err(AppError::BadRequest(
                "Field 'title' must be at most 200 characters".to_string(),
            ));
        }

        let tools: Vec<String> = json_field(&form, "tools")?;
        let learning_outcomes: Vec<String> = json_field(&form, "learning_outcomes")?;
        let modules: Vec<Module> = json_field(&form, "modules")?;

        for (i, module) in modules.iter().enumerate() {
            module
                .validate()
                .map_err(|e| AppError::BadRequest(format!("Module {}: {}", i, e)))?;
        }

        let duration_hours = match form.text("duration_hours") {
            None => 0,
            Some(raw) => raw.parse::<i32>().ok().filter(|h| *h >= 0).ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Field 'duration_hours' must be a non-negative integer, got '{}'",
                    raw
                ))
            })?,
        };

        let welcome = form.text("welcome").map(clean_html).unwrap_or_default();

        let start_date = date_field(&form, "start_date")?;
        let end_date = date_field(&form, "end_date")?;
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if end < start {
                return Err(AppError::BadRequest(
                    "Field 'end_date' must not be before 'start_date'".to_string(),
                ));
            }
        }

        let audience: Audience = form
            .require_text("audience")?
            .parse()
            .map_err(|e: ParseEnumError| AppError::BadRequest(e.to_string()))?;

        let mut images = form.take_files(IMAGE_FIELD);
        if images.len() > 1 {
            return Err(AppError::BadRequest("Only one course image is allowed".to_string()));
        }
        let image = images.pop();
        if let Some(image) = &image {
            ensure_file(image, IMAGE_FIELD, IMAGE_TYPES, MAX_COURSE_FILE_BYTES)?;
        }

        let module_files = form.take_files(MODULE_FILES_FIELD);
        if module_files.len() > MAX_MODULE_FILES {
            return Err(AppError::BadRequest(format!(
                "At most {} module files per request",
                MAX_MODULE_FILES
            )));
        }
        for file in &module_files {
            ensure_file(file, MODULE_FILES_FIELD, MODULE_FILE_TYPES, MAX_COURSE_FILE_BYTES)?;
        }

        form.reject_unexpected_files()?;

        Ok(Self {
            draft: CourseDraft {
                title,
                tools,
                learning_outcomes,
                duration_hours,
                welcome,
                modules,
                start_date,
                end_date,
                audience,
            },
            image,
            module_files,
        })
    }
}

fn json_field<T>(form: &MultipartForm, name: &str) -> Result<Vec<T>, AppError>
where
    T: DeserializeOwned,
{
    match form.text(name) {
        None => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| AppError::BadRequest(format!("Field '{}' is not valid JSON: {}", name, e))),
    }
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
fn date_field(form: &MultipartForm, name: &str) -> Result<Option<DateTime<Utc>>, AppError> {
    let Some(raw) = form.text(name) else {
        return Ok(None);
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Some(dt.and_utc()))
        .ok_or_else(|| AppError::BadRequest(format!("Field '{}' is not a valid date", name)))
}
