//! Resolve a `(batchId, subjectId, childId)` triple into a playable stream url and,
//! for DASH manifests, the clear content key needed to play it.
//!
//! ```no_run
//! # async fn run() -> vidkey::Result<()> {
//! let config = vidkey::Config::new("https://upstream.test/api".parse().unwrap(), "passphrase");
//! let resolver = vidkey::Resolver::builder(config).build()?;
//! let resolution = resolver.resolve("batch", "subject", "child").await?;
//! println!("{}", serde_json::to_string(&resolution).unwrap());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cipher;
pub mod drm;
pub mod headers;
pub mod logger;
pub mod server;
pub mod token;

mod config;
mod error;
mod request;
mod resolver;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use request::ResolutionRequest;
pub use resolver::{
    DECRYPTION_FAILED_NOTE, EncryptedPassthrough, Resolution, ResolvedStream, Resolver,
    ResolverBuilder, StreamMetadata,
};
pub use reqwest;
