//! Case-scoped hooks.
//!
//! A [`CaseHook`] is activated immediately before one case runs and
//! deactivated immediately after it finishes. [`HookRegistry`] tracks which
//! hooks are active so activations never overlap between cases.

use std::{
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use log::{debug, warn};

use crate::{
    context::CaseContext,
    error::{BoxError, HookError},
    panic::format_panic,
};

/// Extension point wrapped around a single case.
///
/// Hooks receive the case context and may publish per-case state through
/// [`CaseContext::extensions_mut`], such as request interceptors.
pub trait CaseHook: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str { std::any::type_name::<Self>() }

    /// Activate the hook before the case body runs.
    ///
    /// # Errors
    ///
    /// An error aborts the case; the group continues.
    fn attach(&self, ctx: &mut CaseContext) -> Result<(), BoxError>;

    /// Deactivate the hook after the case body ran.
    ///
    /// # Errors
    ///
    /// An error is reported alongside the case outcome.
    fn detach(&self, ctx: &mut CaseContext) -> Result<(), BoxError>;
}

/// Activation state of the hooks tracked by a [`HookRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookState {
    /// No hook is active.
    Inactive,
    /// Hooks are active for a running case.
    Active,
}

/// Hooks declared for a group, activated one case at a time.
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn CaseHook>>,
    active: Vec<Arc<dyn CaseHook>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |hooks: &[Arc<dyn CaseHook>]| {
            hooks
                .iter()
                .map(|hook| hook.name().to_owned())
                .collect::<Vec<_>>()
        };
        f.debug_struct("HookRegistry")
            .field("hooks", &names(&self.hooks))
            .field("active", &names(&self.active))
            .finish()
    }
}

fn guarded(
    hook: &dyn CaseHook,
    ctx: &mut CaseContext,
    call: fn(&dyn CaseHook, &mut CaseContext) -> Result<(), BoxError>,
) -> Result<(), BoxError> {
    catch_unwind(AssertUnwindSafe(|| call(hook, ctx))).unwrap_or_else(|panic| {
        Err(format!("hook panicked: {}", format_panic(&panic)).into())
    })
}

impl HookRegistry {
    /// Track the hooks declared for a group.
    #[must_use]
    pub fn new(hooks: Vec<Arc<dyn CaseHook>>) -> Self {
        Self {
            hooks,
            active: Vec::new(),
        }
    }

    /// Declared group-level hooks.
    #[must_use]
    pub fn hooks(&self) -> &[Arc<dyn CaseHook>] { &self.hooks }

    /// Whether any hook is currently active.
    #[must_use]
    pub fn state(&self) -> HookState {
        if self.active.is_empty() {
            HookState::Inactive
        } else {
            HookState::Active
        }
    }

    /// Activate the group's hooks, then `case_hooks`, for one case.
    ///
    /// Stops at the first failing hook. The failing hook and every hook
    /// activated before it stay registered as active so that
    /// [`detach_for`](Self::detach_for) releases them.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::StillActive`] if the previous case was not
    /// detached, or [`HookError::Attach`] if a hook failed or panicked.
    pub fn attach_for(
        &mut self,
        ctx: &mut CaseContext,
        case_hooks: &[Arc<dyn CaseHook>],
    ) -> Result<(), HookError> {
        if let Some(hook) = self.active.first() {
            return Err(HookError::StillActive {
                hook: hook.name().to_owned(),
            });
        }
        for hook in self.hooks.iter().chain(case_hooks) {
            self.active.push(Arc::clone(hook));
            debug!("attaching hook: case={}, hook={}", ctx.case_name(), hook.name());
            guarded(hook.as_ref(), ctx, |hook, ctx| hook.attach(ctx)).map_err(|source| {
                HookError::Attach {
                    hook: hook.name().to_owned(),
                    source,
                }
            })?;
        }
        Ok(())
    }

    /// Deactivate every active hook, in reverse activation order.
    ///
    /// Every hook is detached even when an earlier one fails; the failures
    /// are returned.
    pub fn detach_for(&mut self, ctx: &mut CaseContext) -> Vec<HookError> {
        let mut errors = Vec::new();
        while let Some(hook) = self.active.pop() {
            debug!("detaching hook: case={}, hook={}", ctx.case_name(), hook.name());
            if let Err(source) = guarded(hook.as_ref(), ctx, |hook, ctx| hook.detach(ctx)) {
                warn!(
                    "hook failed to detach: case={}, hook={}, error={source}",
                    ctx.case_name(),
                    hook.name()
                );
                errors.push(HookError::Detach {
                    hook: hook.name().to_owned(),
                    source,
                });
            }
        }
        errors
    }
}
