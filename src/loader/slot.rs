//! Resolve Slot Module
//!
//! Cancellation state owned by whatever issues resolves on behalf of a view.
//! Starting a new load through a slot cancels the previous one, so a reused
//! view never receives a stale artifact.

use tokio::task::JoinHandle;

use crate::error::Result;
use crate::key::SizeHint;
use crate::loader::{Codec, Loader};

// == Resolve Slot ==
#[derive(Debug, Default)]
pub struct ResolveSlot {
    current: Option<JoinHandle<()>>,
}

impl ResolveSlot {
    pub fn new() -> Self {
        Self::default()
    }

    // == Load ==
    /// Cancels the previous load, then resolves `address` in the background
    /// and hands the outcome to `on_done`.
    ///
    /// Cancelling only withdraws this slot's interest; other callers of the
    /// same key still receive the result.
    pub fn load<C, F>(
        &mut self,
        loader: &Loader<C>,
        address: impl Into<String>,
        size_hint: Option<SizeHint>,
        on_done: F,
    ) where
        C: Codec,
        F: FnOnce(Result<C::Artifact>) + Send + 'static,
    {
        self.cancel();

        let loader = loader.clone();
        let address = address.into();
        self.current = Some(tokio::spawn(async move {
            let outcome = loader.resolve(&address, size_hint).await;
            on_done(outcome);
        }));
    }

    // == Cancel ==
    /// Aborts the current load, if any. Its callback will not run unless the
    /// load had already settled.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.abort();
        }
    }

    /// True while a load started through this slot has not finished.
    pub fn is_loading(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for ResolveSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
