//! This crate finds the content protection key id (KID) embedded in a DASH manifest.
//!
//! Manifests are scanned as plain text, so documents that are not well formed XML
//! are still searched. Several [`Probe`]s are tried in priority order and the first
//! hit wins.
//!
//! ```
//! let mpd = r#"<ContentProtection cenc:default_KID="AB-CD-12-34"/>"#;
//! assert_eq!(vidkey_mpd::extract_kid(mpd).as_deref(), Some("ABCD1234"));
//! ```

mod kid;

pub use kid::{Kid, Probe, extract_kid, find_kid};
