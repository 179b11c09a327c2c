use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cached_queries: usize,
    pub live_subscriptions: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeletePostQuery {
    pub confirm: bool,
}
