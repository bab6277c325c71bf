// REST envelope types
//
// Every DevPulse service wraps its payload in the same envelope. Paginated
// endpoints put a Spring-style page inside `data`.

use serde::{Deserialize, Serialize};

/// `{ success, message?, data? }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// The payload of a successful response, or the message a user should see
    pub fn into_result(self) -> std::result::Result<T, String> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(self
                .message
                .unwrap_or_else(|| "response carried no data".to_string())),
            (false, _) => Err(self
                .message
                .unwrap_or_else(|| "request failed".to_string())),
        }
    }
}

/// One page of a paginated listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_elements: u64,
    /// Zero-based page index, when the server reports it
    #[serde(default)]
    pub number: Option<u32>,
}
