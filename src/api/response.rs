use serde::Serialize;

/// Standard `{ "data": T }` success envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// Body of the admin deny sweep.
#[derive(Debug, Serialize)]
pub struct DeniedCount {
    pub denied: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub leagues: usize,
}
