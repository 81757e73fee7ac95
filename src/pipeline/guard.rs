//! Disable-and-restore masking of an event source.

use crate::hal::EventLine;

/// Masks an event line for as long as the guard lives
///
/// The line's previous enable state is restored when the guard drops, on
/// every exit path of the scope that holds it.
pub struct MaskGuard<'a, L: EventLine + ?Sized> {
    line: &'a mut L,
    was_enabled: bool,
}

impl<'a, L: EventLine + ?Sized> MaskGuard<'a, L> {
    pub fn new(line: &'a mut L) -> Self {
        let was_enabled = line.is_enabled();
        line.disable();
        Self { line, was_enabled }
    }

    /// Whether the line was enabled when the guard was taken
    pub fn was_enabled(&self) -> bool {
        self.was_enabled
    }
}

impl<L: EventLine + ?Sized> Drop for MaskGuard<'_, L> {
    fn drop(&mut self) {
        if self.was_enabled {
            self.line.enable();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::sim::SimLine;
    use crate::hal::MockEventLine;
    use mockall::Sequence;

    #[test]
    fn test_guard_restores_enabled_line() {
        let mut line = SimLine::new();
        line.enable();

        {
            let guard = MaskGuard::new(&mut line);
            assert!(guard.was_enabled());
        }

        assert!(line.is_enabled());
        assert_eq!(line.disables(), 1);
        assert_eq!(line.enables(), 2);
    }

    #[test]
    fn test_guard_keeps_disabled_line_disabled() {
        let mut line = SimLine::new();

        {
            let _guard = MaskGuard::new(&mut line);
        }

        assert!(!line.is_enabled());
        assert_eq!(line.enables(), 0);
    }

    #[test]
    fn test_guard_disables_before_restoring() {
        let mut seq = Sequence::new();
        let mut line = MockEventLine::new();

        line.expect_is_enabled()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(true);
        line.expect_disable().times(1).in_sequence(&mut seq).return_const(());
        line.expect_enable().times(1).in_sequence(&mut seq).return_const(());

        drop(MaskGuard::new(&mut line));
    }

    #[test]
    fn test_guard_restores_on_panic() {
        let mut line = SimLine::new();
        line.enable();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = MaskGuard::new(&mut line);
            panic!("handler failed");
        }));

        assert!(result.is_err());
        assert!(line.is_enabled());
    }
}
