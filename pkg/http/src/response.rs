//! Response representation and the error-body shape the API returns on
//! non-2xx responses (spec §4.5, §9). Grounded on the teacher's
//! `http::response_ref.rs` `Response` struct.

use serde::Deserialize;

use crate::headers::Headers;
use crate::status::StatusCode;

#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl Response {
    pub fn body_as_json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Parses the `{code, error_ref, message, errors?}` shape the API
    /// sends on failures, used to build an `ApiError`.
    pub fn error_body(&self) -> Option<ApiErrorBody> {
        #[derive(Deserialize)]
        struct Envelope {
            error: ApiErrorBody,
        }
        serde_json::from_slice::<Envelope>(&self.body)
            .ok()
            .map(|e| e.error)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: u32,
    pub error_ref: u32,
    pub message: String,
    #[serde(default)]
    pub errors: Option<std::collections::HashMap<String, String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_error_envelope() {
        let resp = Response {
            status: StatusCode(403),
            headers: Headers::new(),
            body: br#"{"error":{"code":403,"error_ref":11050,"message":"forbidden"}}"#.to_vec(),
        };
        let err = resp.error_body().expect("error body");
        assert_eq!(err.code, 403);
        assert_eq!(err.error_ref, 11050);
        assert_eq!(err.message, "forbidden");
    }

    #[test]
    fn non_error_body_yields_none() {
        let resp = Response {
            status: StatusCode(200),
            headers: Headers::new(),
            body: br#"{"id":7}"#.to_vec(),
        };
        assert!(resp.error_body().is_none());
    }
}
