//! Log macros for the decoder.
//!
//! With the `logging` feature they forward to the `log` crate. Without it the
//! arguments are only borrowed, so nothing is formatted.

macro_rules! forward {
    ($level:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "logging")]
        ::log::$level!($fmt $(, $arg)*);
        #[cfg(not(feature = "logging"))]
        { $(let _ = &$arg;)* }
    }};
}

macro_rules! ldebug {
    ($($tokens:tt)*) => { $crate::log::forward!(debug, $($tokens)*) };
}

macro_rules! linfo {
    ($($tokens:tt)*) => { $crate::log::forward!(info, $($tokens)*) };
}

macro_rules! lwarn {
    ($($tokens:tt)*) => { $crate::log::forward!(warn, $($tokens)*) };
}

macro_rules! lerror {
    ($($tokens:tt)*) => { $crate::log::forward!(error, $($tokens)*) };
}

pub(crate) use forward;
pub(crate) use {ldebug, lerror, linfo, lwarn};
