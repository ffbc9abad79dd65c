use serde::Deserialize;

/// Required fields per operation, checked before any auth or storage work.
pub const ADD_FIELDS: &[&str] = &["name", "article", "token"];
pub const DELETE_FIELDS: &[&str] = &["id", "token"];
pub const SPHERE_ADD_FIELDS: &[&str] = &["id", "sphere", "token"];
pub const SPHERE_DELETE_FIELDS: &[&str] = &["id", "token"];
pub const PHOTO_ADD_FIELDS: &[&str] = &["id", "link", "token"];
pub const PHOTO_DELETE_FIELDS: &[&str] = &["id", "link", "token"];

pub const MAX_NAME_LEN: usize = 50;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub query: Option<String>,
}

pub(crate) fn default_limit() -> i64 {
    20
}
