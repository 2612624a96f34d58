//! Macro for implementing Display and FromStr for tag enums
//!
//! Sync scopes, resource kinds and similar enums travel as lowercase strings
//! through query parameters, SQLite columns and log fields. This macro keeps
//! both directions of that conversion in one place.
//!
//! # Example
//!
//! ```rust
//! use sellersync_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum DeliveryState {
//!     Visible,
//!     InFlight,
//! }
//!
//! impl_domain_status_conversions!(DeliveryState {
//!     Visible => "visible",
//!     InFlight => "in_flight",
//! });
//! ```

/// Implements Display and FromStr traits for tag enums
///
/// - Display: writes the mapped lowercase string
/// - FromStr: parses case-insensitively, erroring with the enum name
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Phase {
        Idle,
        Running,
    }

    impl_domain_status_conversions!(Phase {
        Idle => "idle",
        Running => "running",
    });

    #[test]
    fn test_display() {
        assert_eq!(Phase::Idle.to_string(), "idle");
        assert_eq!(Phase::Running.to_string(), "running");
    }

    #[test]
    fn test_from_str_is_case_insensitive() {
        assert_eq!(Phase::from_str("RUNNING").unwrap(), Phase::Running);
        assert_eq!(Phase::from_str(" idle ").unwrap(), Phase::Idle);
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        let err = Phase::from_str("paused").unwrap_err();
        assert!(err.contains("Phase"));
    }
}
