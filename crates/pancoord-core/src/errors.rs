//! Error types for the coordinator core
//!
//! Collaborator failures (MAC, persistence, security) each get their own enum so
//! implementations can report precise causes; `CoordError` unifies them for the
//! few operations that surface an error to the caller. Protocol outcomes such as
//! "PAN at capacity" are statuses, not errors.

use alloc::string::String;

// ----------------------------------------------------------------------------
// Collaborator Error Types
// ----------------------------------------------------------------------------

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        /// Failure reported synchronously by the MAC layer
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum MacError {
            #[error("MAC rejected {request}: status {status:#04x}")]
            RequestRejected { request: &'static str, status: u8 },
            #[error("Unsupported PIB attribute: {attribute}")]
            UnsupportedAttribute { attribute: &'static str },
            #[error("MAC queue full")]
            QueueFull,
            #[error("MAC unavailable: {reason}")]
            Unavailable { reason: String },
        }
    } else {
        /// Failure reported synchronously by the MAC layer (no_std version)
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum MacError {
            RequestRejected { request: &'static str, status: u8 },
            UnsupportedAttribute { attribute: &'static str },
            QueueFull,
            Unavailable { reason: String },
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        /// Failure reported by the persistence collaborator
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum StoreError {
            #[error("Record not found")]
            NotFound,
            #[error("Device list full (capacity: {capacity})")]
            DeviceListFull { capacity: usize },
            #[error("Storage write failed: {reason}")]
            WriteFailed { reason: String },
            #[error("Storage read failed: {reason}")]
            ReadFailed { reason: String },
        }
    } else {
        /// Failure reported by the persistence collaborator (no_std version)
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum StoreError {
            NotFound,
            DeviceListFull { capacity: usize },
            WriteFailed { reason: String },
            ReadFailed { reason: String },
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        /// Failure reported by the security collaborator
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum SecurityError {
            #[error("Key import failed: {reason}")]
            KeyImportFailed { reason: String },
            #[error("Device table full (capacity: {capacity})")]
            DeviceTableFull { capacity: usize },
            #[error("Device not found in key table")]
            DeviceNotFound,
        }
    } else {
        /// Failure reported by the security collaborator (no_std version)
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum SecurityError {
            KeyImportFailed { reason: String },
            DeviceTableFull { capacity: usize },
            DeviceNotFound,
        }
    }
}

// ----------------------------------------------------------------------------
// Core Error Type
// ----------------------------------------------------------------------------

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        /// Errors surfaced by coordinator operations
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum CoordError {
            #[error("MAC error: {0}")]
            Mac(#[from] MacError),

            #[error("Storage error: {0}")]
            Store(#[from] StoreError),

            #[error("Security error: {0}")]
            Security(#[from] SecurityError),

            /// Operation not permitted in the current lifecycle state
            #[error("Invalid state: {operation} not allowed while {state}")]
            InvalidState { operation: &'static str, state: String },

            /// Configuration error
            #[error("Configuration error: {reason}")]
            Configuration { reason: String },

            /// Restore data was inconsistent with the association table
            #[error("Restore error: {reason}")]
            Restore { reason: String },
        }
    } else {
        /// Errors surfaced by coordinator operations (no_std version)
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum CoordError {
            Mac(MacError),
            Store(StoreError),
            Security(SecurityError),
            InvalidState { operation: &'static str, state: String },
            Configuration { reason: String },
            Restore { reason: String },
        }

        impl From<MacError> for CoordError {
            fn from(err: MacError) -> Self {
                CoordError::Mac(err)
            }
        }

        impl From<StoreError> for CoordError {
            fn from(err: StoreError) -> Self {
                CoordError::Store(err)
            }
        }

        impl From<SecurityError> for CoordError {
            fn from(err: SecurityError) -> Self {
                CoordError::Security(err)
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl CoordError {
    /// Create an invalid state error for an operation
    pub fn invalid_state<S: Into<String>>(operation: &'static str, state: S) -> Self {
        CoordError::InvalidState {
            operation,
            state: state.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        CoordError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a restore error with a reason
    pub fn restore_error<T: Into<String>>(reason: T) -> Self {
        CoordError::Restore {
            reason: reason.into(),
        }
    }

    /// Create a key import error with a reason
    pub fn key_import_failed<T: Into<String>>(reason: T) -> Self {
        CoordError::Security(SecurityError::KeyImportFailed {
            reason: reason.into(),
        })
    }
}

pub type Result<T> = core::result::Result<T, CoordError>;
