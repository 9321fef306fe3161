//! Macros for building records.
//!
//! # Examples
//!
//! ```
//! use udp_log_shipper::record;
//!
//! let record = record! {
//!     "ts" => 1.0,
//!     "id" => record! { "orig_h" => "10.0.0.1", "orig_p" => 52311u64 },
//!     "note" => "X",
//! };
//!
//! assert_eq!(
//!     record.to_json().unwrap(),
//!     r#"{"ts":1.0,"id.orig_h":"10.0.0.1","id.orig_p":52311,"note":"X"}"#
//! );
//! ```

/// Build a `Record` whose fields are all loggable, in the order given.
///
/// Values may be anything convertible into `FieldValue`, including nested
/// `record!` invocations.
#[macro_export]
macro_rules! record {
    () => {
        $crate::Record::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {
        $crate::Record::new()$(.with_field($name, $value))+
    };
}
