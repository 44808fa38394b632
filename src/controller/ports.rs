use crate::host::HostContext;
use crate::reconciler::PortEditor;
use crate::scheduler::{FiredTimer, StabilizeState, Stabilizer, TimerKind, TimerToken};
use crate::settings::Settings;
use crate::width::WidthStabilizer;

/// How a port-owning controller should react to one of its timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    /// The debounce window elapsed: run the reconciliation now.
    Reconcile,
    /// The timer was consumed internally.
    Handled,
    /// Not ours, or stale.
    Ignored,
}

/// Scheduling state shared by every controller with a dynamic port list:
/// the debounce, the width override and the deferred first pass.
#[derive(Debug, Clone, Default)]
pub struct PortState {
    stabilizer: Stabilizer,
    width: WidthStabilizer,
    deferred: Option<TimerToken>,
}

impl PortState {
    pub fn new(settings: &Settings) -> Self {
        Self {
            stabilizer: Stabilizer::default(),
            width: WidthStabilizer::new(settings.width_decay_ms),
            deferred: None,
        }
    }

    pub fn stabilize_state(&self) -> StabilizeState {
        self.stabilizer.state()
    }

    pub fn width(&self) -> &WidthStabilizer {
        &self.width
    }

    /// Arms the debounce unless a run is already pending.
    pub fn request(&mut self, ctx: &mut HostContext<'_>, delay_ms: u64) -> TimerToken {
        self.stabilizer.schedule(ctx.timers, ctx.node, delay_ms)
    }

    /// Schedules the deferred pass that runs once the host has restored links.
    pub fn defer_first_pass(&mut self, ctx: &mut HostContext<'_>) {
        if let Some(token) = self.deferred.take() {
            ctx.timers.cancel(token);
        }
        let delay = ctx.settings.deferred_restore_ms;
        self.deferred = Some(ctx.timers.schedule(ctx.node, TimerKind::DeferredRestore, delay));
    }

    pub fn on_timer(&mut self, ctx: &mut HostContext<'_>, timer: FiredTimer) -> TimerOutcome {
        match timer.kind {
            TimerKind::Stabilize if self.stabilizer.fire(timer.token) => TimerOutcome::Reconcile,
            TimerKind::WidthDecay if self.width.on_decay(timer.token, ctx.graph, ctx.node) => {
                ctx.mark_dirty();
                TimerOutcome::Handled
            }
            TimerKind::DeferredRestore if self.deferred == Some(timer.token) => {
                self.deferred = None;
                self.request(ctx, 1);
                TimerOutcome::Handled
            }
            _ => TimerOutcome::Ignored,
        }
    }

    pub fn editor<'c>(&'c mut self, ctx: &'c mut HostContext<'_>) -> PortEditor<'c> {
        ctx.editor(&mut self.width)
    }

    pub fn teardown(&mut self, ctx: &mut HostContext<'_>) {
        self.stabilizer.cancel(ctx.timers);
        self.width.cancel(ctx.timers);
        if let Some(token) = self.deferred.take() {
            ctx.timers.cancel(token);
        }
    }
}
