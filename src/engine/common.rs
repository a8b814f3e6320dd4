// src/engine/common.rs
//
// Common utilities shared across engine modules.
// Provides the engine result alias and the codec panic policy.

use crate::error::CompositorError;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Result type used throughout the engine. The napi layer converts at the boundary.
pub type EngineResult<T> = std::result::Result<T, CompositorError>;

/// Run a codec call and convert a panic into `InternalPanic`.
///
/// mozjpeg reports libjpeg errors by unwinding, so every call into it goes through
/// here. `stage` names the operation in the resulting error message.
pub fn run_with_panic_policy<T, F>(stage: &'static str, f: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(target: "studio_compositor::engine", stage, %message, "codec panicked");
            Err(CompositorError::internal_panic(format!(
                "{stage}: {message}"
            )))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn passes_through_ok_and_err() {
        let ok: EngineResult<u32> = run_with_panic_policy("ok", || Ok(7));
        assert_eq!(ok.unwrap(), 7);

        let err: EngineResult<u32> =
            run_with_panic_policy("err", || Err(CompositorError::decode_failed("bad")));
        assert_eq!(err.unwrap_err().kind(), ErrorKind::DecodeFailed);
    }

    #[test]
    fn converts_panic_to_internal() {
        let err: EngineResult<u32> = run_with_panic_policy("jpeg decode", || panic!("boom"));
        let err = err.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        let msg = err.to_string();
        assert!(msg.contains("jpeg decode"));
        assert!(msg.contains("boom"));
    }
}
