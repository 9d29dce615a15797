//! Eliza: a pattern-matching conversational agent
//!
//! The engine is a pure function from an input sentence to a reply plus an
//! end-of-conversation flag. It holds no state between calls, so it is safe
//! to share freely across tasks and to call repeatedly with the same input.
//!
//! ```
//! let reply = eliza::reply("I need a holiday");
//! assert!(!reply.end_conversation);
//!
//! let farewell = eliza::reply("goodbye");
//! assert!(farewell.end_conversation);
//! ```

mod intro;
mod reply;

pub use intro::introductions;
pub use reply::{Reply, reply};
