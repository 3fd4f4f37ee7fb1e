use serde::Serialize;

pub(crate) mod health_check_controller;
pub(crate) mod message_controller;
pub(crate) mod page_controller;
pub(crate) mod session_controller;
pub(crate) mod user_controller;

/// JSON envelope wrapping successful response payloads.
#[derive(Debug, Serialize)]
pub(crate) struct ApiResponse<T: Serialize> {
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_response_nests_payload_under_data() {
        let response = ApiResponse::new(json!({ "id": "x" }));
        let serialized = serde_json::to_value(&response).unwrap();
        assert_eq!(serialized, json!({ "data": { "id": "x" } }));
    }
}
