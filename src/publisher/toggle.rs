//! Toggle state and the labels it maps to

use std::fmt;

/// Binary actuator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchState {
    On,
    Off,
}

impl SwitchState {
    pub fn from_flag(is_on: bool) -> Self {
        if is_on {
            SwitchState::On
        } else {
            SwitchState::Off
        }
    }

    pub fn is_on(self) -> bool {
        self == SwitchState::On
    }

    /// Default wire label
    pub fn label(self) -> &'static str {
        match self {
            SwitchState::On => "ON",
            SwitchState::Off => "OFF",
        }
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Process-wide toggle, starting at OFF so the first advance yields ON.
///
/// Never reset by reconnections.
#[derive(Debug, Clone, Default)]
pub struct ToggleState {
    is_on: bool,
    flips: u64,
}

impl ToggleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip and return the new state
    pub fn advance(&mut self) -> SwitchState {
        self.is_on = !self.is_on;
        self.flips += 1;
        SwitchState::from_flag(self.is_on)
    }

    pub fn current(&self) -> SwitchState {
        SwitchState::from_flag(self.is_on)
    }

    /// Number of flips so far (equals the number of publishes attempted)
    pub fn flips(&self) -> u64 {
        self.flips
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_first_advance_is_on() {
        let mut toggle = ToggleState::new();
        assert_eq!(toggle.current(), SwitchState::Off);
        assert_eq!(toggle.advance(), SwitchState::On);
        assert_eq!(toggle.advance(), SwitchState::Off);
        assert_eq!(toggle.flips(), 2);
    }

    #[test]
    fn test_labels() {
        assert_eq!(SwitchState::On.to_string(), "ON");
        assert_eq!(SwitchState::Off.label(), "OFF");
        assert!(SwitchState::from_flag(true).is_on());
        assert!(!SwitchState::from_flag(false).is_on());
    }

    proptest! {
        #[test]
        fn prop_nth_advance_alternates(n in 1u64..500) {
            let mut toggle = ToggleState::new();
            let mut last = toggle.current();
            for _ in 0..n {
                last = toggle.advance();
            }
            // 1-indexed: odd advances are ON, even are OFF
            prop_assert_eq!(last, SwitchState::from_flag(n % 2 == 1));
            prop_assert_eq!(toggle.flips(), n);
        }
    }
}
