use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub role_id: u8,
    pub is_active: bool,
}

/// Compact user reference embedded in shift and attendance payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct UserRef {
    #[schema(example = 12)]
    pub id: u64,
    #[schema(example = "wanjiru")]
    pub username: String,
}
