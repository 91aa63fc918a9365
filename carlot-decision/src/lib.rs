//! Decision providers for the car lot samples.
//!
//! A [`Decider`] takes an [`Input`] document describing who wants to do
//! what to which resource, and answers with a [`Decision`]. The decision
//! result is opaque; callers locate the allow/deny boolean inside it with
//! an [`AllowPath`].

mod decision;
mod embedded;
pub mod engine;
mod fixed;
mod http;
mod input;
mod path;

pub use decision::Decision;
pub use embedded::EmbeddedDecider;
pub use fixed::FixedDecider;
pub use http::HttpDecider;
pub use input::Input;
pub use path::AllowPath;

use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

/// Something capable of obtaining authorization decisions.
///
/// Implementations must not retry on failure; a failed call is surfaced
/// to the caller immediately.
#[automock]
#[async_trait]
pub trait Decider: Send + Sync {
    async fn decision(&self, input: &Input) -> Result<Decision>;
}
