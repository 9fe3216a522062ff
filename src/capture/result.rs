//! Per-frame capture results.

use std::collections::BTreeMap;

/// Metadata keys a result may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResultKey {
    /// Autofocus state, see [`AfState`].
    AfState,
    /// Auto-exposure state, see [`AeState`].
    AeState,
    /// Auto-white-balance state (carried, not interpreted).
    AwbState,
}

/// Whether a result is an early partial or the frame's final metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Early subset of the frame's metadata.
    Partial,
    /// Complete metadata; the frame is done.
    Final,
}

/// Autofocus algorithm state, with the platform's numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfState {
    /// Autofocus off or not yet started.
    Inactive = 0,
    /// Continuous mode is scanning on its own.
    PassiveScan = 1,
    /// Continuous mode believes the scene is in focus.
    PassiveFocused = 2,
    /// A triggered scan is running.
    ActiveScan = 3,
    /// Scan finished in focus; lens locked.
    FocusedLocked = 4,
    /// Scan finished out of focus; lens locked.
    NotFocusedLocked = 5,
    /// Continuous mode believes the scene is out of focus.
    PassiveUnfocused = 6,
}

impl AfState {
    /// Maps a platform code, `None` for unknown codes.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(AfState::Inactive),
            1 => Some(AfState::PassiveScan),
            2 => Some(AfState::PassiveFocused),
            3 => Some(AfState::ActiveScan),
            4 => Some(AfState::FocusedLocked),
            5 => Some(AfState::NotFocusedLocked),
            6 => Some(AfState::PassiveUnfocused),
            _ => None,
        }
    }
}

/// Auto-exposure algorithm state, with the platform's numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AeState {
    /// Auto-exposure off or not yet started.
    Inactive = 0,
    /// Still adjusting.
    Searching = 1,
    /// Settled for the current scene.
    Converged = 2,
    /// Held by an AE lock.
    Locked = 3,
    /// Settled, but the still needs flash.
    FlashRequired = 4,
    /// Precapture metering is running.
    Precapture = 5,
}

impl AeState {
    /// Maps a platform code, `None` for unknown codes.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(AeState::Inactive),
            1 => Some(AeState::Searching),
            2 => Some(AeState::Converged),
            3 => Some(AeState::Locked),
            4 => Some(AeState::FlashRequired),
            5 => Some(AeState::Precapture),
            _ => None,
        }
    }
}

/// Metadata for one frame: a sparse key/value map plus completion.
///
/// Values are kept as raw codes so that codes unknown to this crate still
/// reach the convergence rules (which treat them as "not converged").
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureResult {
    frame_number: u64,
    completion: Completion,
    values: BTreeMap<ResultKey, i32>,
}

impl CaptureResult {
    /// An empty result for `frame_number`.
    pub fn new(frame_number: u64, completion: Completion) -> Self {
        Self {
            frame_number,
            completion,
            values: BTreeMap::new(),
        }
    }

    /// An empty partial result.
    pub fn partial(frame_number: u64) -> Self {
        Self::new(frame_number, Completion::Partial)
    }

    /// An empty final result.
    pub fn final_result(frame_number: u64) -> Self {
        Self::new(frame_number, Completion::Final)
    }

    /// Sets a raw value.
    pub fn with(mut self, key: ResultKey, code: i32) -> Self {
        self.values.insert(key, code);
        self
    }

    /// Sets the AF state.
    pub fn with_af_state(self, state: AfState) -> Self {
        self.with(ResultKey::AfState, state as i32)
    }

    /// Sets the AE state.
    pub fn with_ae_state(self, state: AeState) -> Self {
        self.with(ResultKey::AeState, state as i32)
    }

    /// Raw value for `key`, if the result carries it.
    pub fn get(&self, key: ResultKey) -> Option<i32> {
        self.values.get(&key).copied()
    }

    /// Frame this result describes.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Partial or final.
    pub fn completion(&self) -> Completion {
        self.completion
    }

    /// True for the frame's final metadata.
    pub fn is_final(&self) -> bool {
        self.completion == Completion::Final
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_values() {
        let result = CaptureResult::partial(7).with_af_state(AfState::ActiveScan);

        assert_eq!(result.get(ResultKey::AfState), Some(3));
        assert_eq!(result.get(ResultKey::AeState), None);
        assert!(!result.is_final());
        assert_eq!(result.frame_number(), 7);
    }

    #[test]
    fn test_state_codes() {
        assert_eq!(AfState::from_code(4), Some(AfState::FocusedLocked));
        assert_eq!(AeState::from_code(4), Some(AeState::FlashRequired));
        assert_eq!(AeState::from_code(42), None);
    }
}
