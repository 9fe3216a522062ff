//! Convergence rules for the autofocus and auto-exposure steps.
//!
//! A missing state field counts as converged: some devices never report
//! AF or AE state at all.

use super::result::{AeState, AfState, CaptureResult, ResultKey};

/// Readiness of a convergence step after one result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// The step may advance.
    Ready,
    /// Keep waiting for further results.
    Pending,
}

impl Convergence {
    /// True for [`Convergence::Ready`].
    pub fn is_ready(self) -> bool {
        self == Convergence::Ready
    }
}

/// Autofocus is ready once locked, whether or not it found focus.
pub fn af_convergence(result: &CaptureResult) -> Convergence {
    match result.get(ResultKey::AfState) {
        None => Convergence::Ready,
        Some(code) => match AfState::from_code(code) {
            Some(AfState::FocusedLocked) | Some(AfState::NotFocusedLocked) => Convergence::Ready,
            _ => Convergence::Pending,
        },
    }
}

/// Auto-exposure is ready once converged or once it has decided flash is needed.
pub fn ae_convergence(result: &CaptureResult) -> Convergence {
    match result.get(ResultKey::AeState) {
        None => Convergence::Ready,
        Some(code) => match AeState::from_code(code) {
            Some(AeState::Converged) | Some(AeState::FlashRequired) => Convergence::Ready,
            _ => Convergence::Pending,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn af(state: AfState) -> CaptureResult {
        CaptureResult::partial(1).with_af_state(state)
    }

    fn ae(state: AeState) -> CaptureResult {
        CaptureResult::partial(1).with_ae_state(state)
    }

    #[test]
    fn test_af_ready_states() {
        assert!(af_convergence(&CaptureResult::partial(1)).is_ready());
        assert!(af_convergence(&af(AfState::FocusedLocked)).is_ready());
        assert!(af_convergence(&af(AfState::NotFocusedLocked)).is_ready());
    }

    #[test]
    fn test_af_pending_states() {
        for state in [
            AfState::Inactive,
            AfState::PassiveScan,
            AfState::PassiveFocused,
            AfState::ActiveScan,
            AfState::PassiveUnfocused,
        ] {
            assert_eq!(af_convergence(&af(state)), Convergence::Pending, "{:?}", state);
        }
    }

    #[test]
    fn test_ae_ready_states() {
        assert!(ae_convergence(&CaptureResult::final_result(1)).is_ready());
        assert!(ae_convergence(&ae(AeState::Converged)).is_ready());
        assert!(ae_convergence(&ae(AeState::FlashRequired)).is_ready());
    }

    #[test]
    fn test_ae_pending_states() {
        for state in [
            AeState::Inactive,
            AeState::Searching,
            AeState::Locked,
            AeState::Precapture,
        ] {
            assert_eq!(ae_convergence(&ae(state)), Convergence::Pending, "{:?}", state);
        }
    }

    #[test]
    fn test_rules_read_their_own_key() {
        // An AE state says nothing about focus, and vice versa.
        let only_ae = ae(AeState::Searching);
        assert!(af_convergence(&only_ae).is_ready());
        let only_af = af(AfState::ActiveScan);
        assert!(ae_convergence(&only_af).is_ready());
    }

    proptest! {
        #[test]
        fn unknown_codes_never_converge(code in 7i32..i32::MAX) {
            let result = CaptureResult::partial(1)
                .with(ResultKey::AfState, code)
                .with(ResultKey::AeState, code);
            prop_assert_eq!(af_convergence(&result), Convergence::Pending);
            prop_assert_eq!(ae_convergence(&result), Convergence::Pending);
        }
    }
}
