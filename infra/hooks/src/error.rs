use std::borrow::Cow;

/// Errors raised while configuring a [`LifecycleHookBus`](crate::LifecycleHookBus).
#[filekit_derive::filekit_error]
pub enum HookError {
    /// The mirror channel needs room for at least one event.
    #[error("Invalid capacity{}: {message}", format_context(.context))]
    InvalidCapacity { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
