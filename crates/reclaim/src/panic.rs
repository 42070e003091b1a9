//! Panic payload helpers.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Renders a panic payload as text.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Runs `f`, turning a panic into its rendered message.
pub fn catch<R>(f: impl FnOnce() -> R) -> Result<R, String> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_str_and_string_payloads() {
        assert_eq!(catch(|| panic!("plain")), Err::<(), _>("plain".to_string()));
        let n = 3;
        assert_eq!(
            catch(|| panic!("formatted {n}")),
            Err::<(), _>("formatted 3".to_string())
        );
        assert_eq!(catch(|| 7), Ok(7));
    }

    #[test]
    fn test_catch_assert_message() {
        let err = catch(|| assert_eq!(1 + 1, 3, "math")).unwrap_err();
        assert!(err.contains("math"));
    }
}
