//! Case hooks recording their activations.

use std::sync::{
    Mutex,
    PoisonError,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use testbed::{BoxError, CaseContext, hooks::CaseHook};

/// Hook counting attach/detach cycles and detecting overlapping activations.
#[derive(Debug, Default)]
pub struct RecordingHook {
    active: AtomicBool,
    attaches: AtomicUsize,
    detaches: AtomicUsize,
    overlaps: AtomicUsize,
    cases: Mutex<Vec<String>>,
}

impl RecordingHook {
    /// Number of activations.
    #[must_use]
    pub fn attaches(&self) -> usize { self.attaches.load(Ordering::SeqCst) }

    /// Number of deactivations.
    #[must_use]
    pub fn detaches(&self) -> usize { self.detaches.load(Ordering::SeqCst) }

    /// Activations that happened while the hook was already active.
    #[must_use]
    pub fn overlaps(&self) -> usize { self.overlaps.load(Ordering::SeqCst) }

    /// Whether the hook is currently active.
    #[must_use]
    pub fn is_active(&self) -> bool { self.active.load(Ordering::SeqCst) }

    /// Names of the cases the hook was attached for.
    #[must_use]
    pub fn cases(&self) -> Vec<String> {
        self.cases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CaseHook for RecordingHook {
    fn name(&self) -> &str { "recording" }

    fn attach(&self, ctx: &mut CaseContext) -> Result<(), BoxError> {
        if self.active.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.attaches.fetch_add(1, Ordering::SeqCst);
        self.cases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ctx.case_name().to_owned());
        Ok(())
    }

    fn detach(&self, _ctx: &mut CaseContext) -> Result<(), BoxError> {
        self.active.store(false, Ordering::SeqCst);
        self.detaches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hook failing on attach or detach.
#[derive(Debug)]
pub struct FailingHook {
    on_attach: bool,
    detaches: AtomicUsize,
}

impl FailingHook {
    /// Hook whose attach fails.
    #[must_use]
    pub fn on_attach() -> Self {
        Self {
            on_attach: true,
            detaches: AtomicUsize::new(0),
        }
    }

    /// Hook whose detach fails.
    #[must_use]
    pub fn on_detach() -> Self {
        Self {
            on_attach: false,
            detaches: AtomicUsize::new(0),
        }
    }

    /// Number of detach calls.
    #[must_use]
    pub fn detaches(&self) -> usize { self.detaches.load(Ordering::SeqCst) }
}

impl CaseHook for FailingHook {
    fn name(&self) -> &str { "failing" }

    fn attach(&self, _ctx: &mut CaseContext) -> Result<(), BoxError> {
        if self.on_attach {
            return Err("hook refused to attach".into());
        }
        Ok(())
    }

    fn detach(&self, _ctx: &mut CaseContext) -> Result<(), BoxError> {
        self.detaches.fetch_add(1, Ordering::SeqCst);
        if self.on_attach {
            Ok(())
        } else {
            Err("hook refused to detach".into())
        }
    }
}
