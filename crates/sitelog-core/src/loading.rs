//! Loading-indicator collaborator.
//!
//! Purely cosmetic: nothing in the core reads back from it.

pub trait LoadingSignal: Send + Sync {
    fn show(&self);
    fn hide(&self);
}

/// Signal that does nothing. Default for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLoadingSignal;

impl LoadingSignal for NoLoadingSignal {
    fn show(&self) {}
    fn hide(&self) {}
}

/// Shows the indicator on creation and hides it on drop, so every exit path
/// of the wrapped operation hides it.
pub struct LoadingGuard<'a> {
    signal: &'a dyn LoadingSignal,
}

impl<'a> LoadingGuard<'a> {
    pub fn show(signal: &'a dyn LoadingSignal) -> Self {
        signal.show();
        Self { signal }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.signal.hide();
    }
}
