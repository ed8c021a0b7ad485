//! Audience targeting for in-app messages.
//!
//! Decides whether the current device matches a message's [`Audience`].
//! Evaluation is a pure function of the audience, a [`DeviceState`]
//! snapshot, and optionally the remote tag groups the audience asked for.
//!
//! # Example
//!
//! ```
//! use inapp_audience::{matches, DeviceState};
//! use inapp_types::Audience;
//!
//! let device = DeviceState {
//!     notifications_opted_in: true,
//!     locales: vec!["en-US".into()],
//!     ..Default::default()
//! };
//! let audience = Audience {
//!     notifications_opt_in: Some(true),
//!     language_tags: vec!["en".into()],
//!     ..Default::default()
//! };
//!
//! assert!(matches(Some(&audience), &device, None));
//! ```
//!
//! [`Audience`]: inapp_types::Audience

mod device;
mod evaluator;
pub mod locale;
pub mod version;

pub use device::{test_device_digest, test_device_id, DeviceState};
pub use evaluator::{matches, matches_for_scheduling};
pub use version::VersionConstraint;
