//! Exit codes for the `attest` binary.
//! Failure kinds are told apart by message, not by code.

use attest_core::AttestError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1; // Usage, precondition, key, signature or integrity failure

/// Exit code for an error returned by a command handler.
pub fn for_error(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<AttestError>()
        .map_or(FAILURE, AttestError::exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attest_errors_map_through_exit_code() {
        let options = attest_core::VerifyOptions {
            root: "/nonexistent/attest-root".into(),
            manifest_path: "/nonexistent/attest-root/checksums.json".into(),
            signature_path: "/nonexistent/attest-root/checksums.json.sig".into(),
            key: attest_core::KeyOptions::default(),
        };
        let missing = attest_core::verify_with_env(&options, |_| None).unwrap_err();
        let expected = missing.exit_code();
        assert_eq!(for_error(&anyhow::Error::new(missing)), expected);
        assert_eq!(expected, FAILURE);
    }

    #[test]
    fn other_errors_are_failures() {
        assert_eq!(for_error(&anyhow::anyhow!("bad pattern")), FAILURE);
    }
}
