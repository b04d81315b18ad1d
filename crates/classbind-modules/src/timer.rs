//! Tick-based timers in the `timer` namespace.
//!
//! Each timer is a pending task that finishes after a number of pump passes.
//! Scripts pass a callback, a payload and any instances the callback needs:
//!
//! ```text
//! timer.after(ticks, callback, payload, keep_alive...)
//! timer.fail_after(ticks, callback, message, keep_alive...)
//! ```
//!
//! The callback receives `(keep_alive..., ok, payload)`.

use classbind_core::{CallError, RegistrationError};
use classbind_registry::{CallContext, TaskPoll, TypeRegistry};

/// A task that stays pending for `ticks` polls, then yields `outcome`.
pub fn countdown(ticks: u32, outcome: TaskPoll) -> impl FnMut() -> TaskPoll {
    let mut remaining = ticks;
    move || {
        if remaining == 0 {
            outcome.clone()
        } else {
            remaining -= 1;
            TaskPoll::Pending
        }
    }
}

fn defer_countdown(ctx: &mut CallContext<'_>, succeed: bool) -> Result<(), CallError> {
    let ticks: u32 = ctx.arg(0)?;
    let callback = ctx.arg_slot(1)?.clone();
    let payload = ctx.arg_slot(2)?.clone();
    let keep_alive = ctx.args()[3..].to_vec();
    let outcome = if succeed {
        TaskPoll::Ready(payload)
    } else {
        TaskPoll::Failed(payload.to_string())
    };
    ctx.defer(countdown(ticks, outcome), callback, keep_alive)
}

/// Register the `timer` namespace.
pub fn register(registry: &mut TypeRegistry) -> Result<(), RegistrationError> {
    registry
        .namespace("timer")?
        .raw("after", |ctx: &mut CallContext<'_>| defer_countdown(ctx, true))
        .raw("fail_after", |ctx: &mut CallContext<'_>| {
            defer_countdown(ctx, false)
        });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use classbind_core::Dynamic;

    #[test]
    fn countdown_finishes_after_ticks() {
        let mut task = countdown(2, TaskPoll::Ready(Dynamic::Int(1)));
        assert_eq!(task(), TaskPoll::Pending);
        assert_eq!(task(), TaskPoll::Pending);
        assert_eq!(task(), TaskPoll::Ready(Dynamic::Int(1)));
    }

    #[test]
    fn zero_ticks_is_immediate() {
        let mut task = countdown(0, TaskPoll::Failed("boom".into()));
        assert_eq!(task(), TaskPoll::Failed("boom".into()));
    }
}
