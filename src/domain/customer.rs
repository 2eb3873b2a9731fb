use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Contact details supplied with a booking request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CustomerInfo {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 200, message = "name is required"))]
    pub full_name: String,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
}

impl CustomerInfo {
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }
}
