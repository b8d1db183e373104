use serde::Serialize;

/// Response body shared by every JSON endpoint: `{status, message?, data?}`.
#[derive(Serialize, Debug, Clone)]
pub struct ApiResponse<T: Serialize> {
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        ApiResponse { status: true, message: None, data: Some(data) }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        ApiResponse { status: true, message: Some(message.into()), data: Some(data) }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        ApiResponse { status: true, message: Some(message.into()), data: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ApiResponse { status: false, message: Some(message.into()), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_omits_data() {
        let json = serde_json::to_value(ApiResponse::failure("nope")).unwrap();
        assert_eq!(json, serde_json::json!({"status": false, "message": "nope"}));
    }

    #[test]
    fn data_omits_message() {
        let json = serde_json::to_value(ApiResponse::data(vec![1, 2])).unwrap();
        assert_eq!(json, serde_json::json!({"status": true, "data": [1, 2]}));
    }
}
