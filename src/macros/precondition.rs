/// Log a contract violation and abort the current thread.
///
/// Evaluates to `!`, so it can terminate a `match` arm.
#[macro_export]
macro_rules! contract_violation {
    ($($arg:tt)+) => {{
        let message = format!($($arg)+);
        log::error!("{}", message);
        panic!("{}", message)
    }};
}

/// Contract check for code generation inputs.
///
/// A failed check means the caller built an invalid request; there is no
/// fallback value.
#[macro_export]
macro_rules! precondition {
    ($cond:expr $(,)?) => {
        $crate::precondition!($cond, "precondition failed: {}", stringify!($cond))
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::contract_violation!($($arg)+);
        }
    };
}

/// Unwrap a required descriptor field, aborting if it was never set.
#[macro_export]
macro_rules! require_field {
    ($owner:literal, $field:ident, $value:expr) => {
        match $value {
            Some(value) => value,
            None => $crate::contract_violation!(
                "{}.{} must be set before generating code",
                $owner,
                stringify!($field)
            ),
        }
    };
}
