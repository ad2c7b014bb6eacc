//! Classifies a parsed API error body into the three buckets spec §4.5 /
//! §7 care about: the rate-limit code, the "success no-op" family (the
//! user's declarative intent already holds server-side, so callers treat
//! it as success), and everything else, which surfaces as a structured
//! `ApiError`.

use base_error::ApiError;
use modio_http::ApiErrorBody;

/// The API's published rate-limit `error_ref`.
pub const RATE_LIMITED_ERROR_REF: u32 = 11050;

/// `error_ref`s the API returns when an action is idempotent and the
/// requested state already holds: already subscribed, already
/// unsubscribed, already following, rating unchanged.
pub const SUCCESS_NO_OP_ERROR_REFS: &[u32] = &[15004, 15005, 16004, 23004, 23005];

/// `error_ref`s the API returns for a mod that will never become
/// installable again this session or any other: removed by its creator,
/// the game no longer accepts submissions, or the user is banned from
/// the game. Retrying these wastes the session's retry budget on
/// something that can only be cleared by a human (spec invariant 5).
pub const UNRECOVERABLE_ERROR_REFS: &[u32] = &[15006, 15007, 16005];

pub enum Classification {
    SuccessNoOp,
    RateLimited,
    Api(ApiError),
}

pub fn classify(body: &ApiErrorBody) -> Classification {
    if body.error_ref == RATE_LIMITED_ERROR_REF {
        Classification::RateLimited
    } else if SUCCESS_NO_OP_ERROR_REFS.contains(&body.error_ref) {
        Classification::SuccessNoOp
    } else {
        Classification::Api(ApiError::ServerError {
            code: body.code,
            error_ref: body.error_ref,
            message: body.message.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(error_ref: u32) -> ApiErrorBody {
        ApiErrorBody { code: 403, error_ref, message: "x".to_string(), errors: None }
    }

    #[test]
    fn rate_limit_ref_classifies_as_rate_limited() {
        assert!(matches!(classify(&body(RATE_LIMITED_ERROR_REF)), Classification::RateLimited));
    }

    #[test]
    fn success_no_op_family_classifies_as_no_op() {
        assert!(matches!(classify(&body(15004)), Classification::SuccessNoOp));
    }

    #[test]
    fn unrecognized_ref_surfaces_as_api_error() {
        match classify(&body(99999)) {
            Classification::Api(ApiError::ServerError { error_ref, .. }) => assert_eq!(error_ref, 99999),
            _ => panic!("expected an Api classification"),
        }
    }

    #[test]
    fn unrecoverable_ref_still_surfaces_as_api_error_for_the_caller_to_classify() {
        // `classify` itself only separates rate-limit and success-no-op
        // from everything else; it's `ops::mods::classify_install_error`
        // that further splits `UNRECOVERABLE_ERROR_REFS` out of the `Api`
        // bucket into a permanent quarantine.
        match classify(&body(UNRECOVERABLE_ERROR_REFS[0])) {
            Classification::Api(ApiError::ServerError { error_ref, .. }) => {
                assert_eq!(error_ref, UNRECOVERABLE_ERROR_REFS[0]);
            }
            _ => panic!("expected an Api classification"),
        }
    }
}
