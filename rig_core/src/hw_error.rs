//! Maps `Box<dyn Error>` from trait boundaries to typed `RigError`.
//!
//! The traits in `rig_traits` use `Box<dyn Error + Send + Sync>` so real
//! drivers can return whatever they like; this module converts those to the
//! typed enum, with an optional feature-gated path for
//! `rig_hardware::HwError` downcasting.

use crate::error::RigError;

/// Map a trait-boundary error to a typed `RigError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> RigError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<rig_hardware::HwError>() {
            return match hw {
                rig_hardware::HwError::Timeout => RigError::Timeout,
                other => RigError::Hardware(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        RigError::Timeout
    } else {
        RigError::Hardware(s)
    }
}

/// Shorthand for `map_err` at trait call sites.
pub(crate) fn hw(e: rig_traits::DynError) -> RigError {
    map_hw_error(&*e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_timeouts_map_to_timeout() {
        let e: rig_traits::DynError = "serial read timeout".into();
        assert_eq!(hw(e), RigError::Timeout);
    }

    #[test]
    fn other_errors_keep_their_message() {
        let e: rig_traits::DynError = "stall on R3".into();
        assert_eq!(hw(e), RigError::Hardware("stall on R3".into()));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn typed_hw_errors_downcast() {
        let e: rig_traits::DynError = Box::new(rig_hardware::HwError::Timeout);
        assert_eq!(hw(e), RigError::Timeout);
        let e: rig_traits::DynError = Box::new(rig_hardware::HwError::Actuator("R1".into()));
        assert_eq!(hw(e), RigError::Hardware("actuator fault on R1".into()));
    }
}
