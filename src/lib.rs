//! sqlre - cached regular-expression functions for SQL engines
//!
//! The [`core`] module holds the engine-level pieces: a per-session
//! [`PatternCache`](core::PatternCache), the single-match and substitution
//! operations, and the [`MatchEnumerator`](core::MatchEnumerator) behind the
//! `REGEXP_TABLE` table-valued function. [`host`] adapts them to a
//! dynamically typed SQL value model.
//!
//! ```
//! use sqlre::host::{Session, Value};
//!
//! let session = Session::default();
//! let replaced = session
//!     .call(
//!         "REGEXP_REPLACE",
//!         &[Value::from("banana"), Value::from("(an)"), Value::from("<$1>")],
//!     )
//!     .unwrap();
//! assert_eq!(replaced, Value::Text("b<an><an>a".to_string()));
//! ```

pub mod config;
pub mod core;
pub mod host;
#[cfg(feature = "cli")]
pub mod logging;
pub mod output;

pub use config::Config;
pub use host::{HostError, Session, Value};
