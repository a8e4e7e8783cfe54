use serde::{Deserialize, Serialize};

const STAFF_ROLES: [&str; 3] = ["admin", "instructor", "head_ta"];

/// The caller as reported by the user-management service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub role: Option<String>,
}

impl CurrentUser {
    pub fn is_staff(&self) -> bool {
        if self.is_superuser {
            return true;
        }
        let role = self.role.as_deref().unwrap_or_default();
        STAFF_ROLES.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}
