//! Errors raised at the JNI boundary.

use jrebridge_core::error::STATUS_ENTRY_UNAVAILABLE;
use jrebridge_core::{LaunchError, ResolutionError};
use thiserror::Error;

/// Status for failures inside the JNI plumbing itself.
pub const STATUS_JNI_FAILURE: i32 = -1;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("jni: {0}")]
    Jni(#[from] jni::errors::Error),
}

impl BridgeError {
    /// Negative status handed back to the managed caller.
    #[must_use]
    pub fn status(&self) -> i32 {
        match self {
            Self::Launch(err) => err.status(),
            Self::Resolution(_) => STATUS_ENTRY_UNAVAILABLE,
            Self::Jni(_) => STATUS_JNI_FAILURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_inner_error() {
        let launch: BridgeError = LaunchError::Allocation { index: 1 }.into();
        assert_eq!(launch.status(), LaunchError::Allocation { index: 1 }.status());

        let resolution: BridgeError = ResolutionError::LibraryNotFound {
            library: "libjli.so".into(),
            diagnostic: "not found".into(),
        }
        .into();
        assert_eq!(resolution.status(), STATUS_ENTRY_UNAVAILABLE);

        let jni: BridgeError = jni::errors::Error::NullPtr("args").into();
        assert_eq!(jni.status(), STATUS_JNI_FAILURE);
        assert!(jni.to_string().starts_with("jni:"));
    }
}
