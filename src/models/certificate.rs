// src/models/certificate.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use url::form_urlencoded;
use uuid::Uuid;

/// Represents the 'certificates' table. Unique per (user, course).
///
/// Names are denormalized so a certificate survives course or account removal.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Certificate {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub code: String,
    pub user_name: String,
    pub course_name: String,
    pub issued_at: DateTime<Utc>,
}

impl Certificate {
    /// Relative link to the printable diploma page.
    pub fn diploma_url(&self) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("name", &self.user_name)
            .append_pair("course", &self.course_name)
            .append_pair("date", &self.issued_at.format("%Y-%m-%d").to_string())
            .append_pair("code", &self.code)
            .finish();
        format!("/diploma.html?{}", query)
    }
}

/// Certificate plus its diploma link.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateResponse {
    #[serde(flatten)]
    pub certificate: Certificate,
    pub diploma_url: String,
}

impl From<Certificate> for CertificateResponse {
    fn from(certificate: Certificate) -> Self {
        let diploma_url = certificate.diploma_url();
        Self {
            certificate,
            diploma_url,
        }
    }
}
