//! Utility macros for reducing boilerplate

/// Macro to implement `FromRef<AppState>` for state extractors.
///
/// Allows sub-state types to be extracted with `State<T>` in axum handlers.
///
/// # Example
/// ```ignore
/// impl_from_ref!(Arc<ExecutionSupervisor>, supervisor);
/// // Expands to:
/// impl axum::extract::FromRef<AppState> for Arc<ExecutionSupervisor> {
///     fn from_ref(state: &AppState) -> Self {
///         state.supervisor.clone()
///     }
/// }
/// ```
#[macro_export]
macro_rules! impl_from_ref {
    ($type:ty, $field:ident) => {
        impl axum::extract::FromRef<$crate::state::AppState> for $type {
            fn from_ref(state: &$crate::state::AppState) -> Self {
                state.$field.clone()
            }
        }
    };
}
