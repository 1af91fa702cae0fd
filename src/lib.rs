pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod field_spec;
pub mod ident;
pub mod logging;
pub mod materializer;
pub mod metadata;
pub mod registry;
pub mod repository;
pub mod storage;

pub use config::RegistryConfig;
pub use error::{ExecFailure, RegistryError, Result, Stage};
pub use field_spec::{FieldSet, FieldSpec};
pub use registry::{EntityTypeRegistry, TypeInfo};

// Test-only printing helper: expands to eprintln! during tests and debug builds and is a no-op otherwise.
// Usage: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In non-test builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
