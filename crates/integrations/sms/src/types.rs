use serde::Deserialize;

/// Successful response from the message creation endpoint.
#[derive(Debug, Deserialize)]
pub struct MessageResponse {
    /// Provider-assigned message sid.
    pub sid: String,
    /// Initial message status (`queued`, `sending`, ...).
    pub status: Option<String>,
}

/// Error body returned by the API for rejected requests.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    /// Numeric error code (e.g. 21211 for an invalid `To` number).
    pub code: Option<i64>,
    /// Human-readable error description.
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_response_deserializes() {
        let body = r#"{"sid":"SM123","status":"queued","num_segments":"1"}"#;
        let response: MessageResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.sid, "SM123");
        assert_eq!(response.status.as_deref(), Some("queued"));
    }

    #[test]
    fn error_response_deserializes() {
        let body = r#"{"code":21211,"message":"Invalid 'To' Phone Number","status":400}"#;
        let response: ApiErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.code, Some(21211));
    }
}
