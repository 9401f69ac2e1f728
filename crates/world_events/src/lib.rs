//! # World Events
//!
//! Gated mutation dispatch for world blocks. Mods register validators and
//! notifiers per block type; the world-state owner routes every block change
//! through [`WorldEvents::try_set`], which refuses the change if any
//! validator objects and announces it to every notifier otherwise.
//!
//! ## Error policy
//!
//! The two phases fail in opposite directions on purpose:
//!
//! * **Validators fail closed.** An error or panic inside a validator is a
//!   refusal. `try_set` returns `Ok(false)` and nothing escapes.
//! * **Notifiers fail loudly.** An error from a notifier is returned from
//!   `try_set` (and a panic unwinds through it), because a broken notifier
//!   is a broken extension that an operator must see.
//!
//! ## Example
//!
//! ```rust
//! use world_events::{Block, BlockId, WorldEvents};
//!
//! let mut events = WorldEvents::new();
//!
//! // Bedrock (type 7) can never be replaced.
//! events.install_can_replace(7, |_, _, _| Ok(false))?;
//! events.seal();
//!
//! let id = BlockId::new(0, 0, 0, 0);
//! assert!(!events.try_set(id, Block::new(7), Block::AIR)?);
//! assert!(events.try_set(id, Block::new(1), Block::AIR)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod dispatcher;
pub mod error;
pub mod table;
pub mod types;

pub use dispatcher::{Notifier, Validator, WorldEvents};
pub use error::{DispatchError, HookError, TableError};
pub use table::HookTable;
pub use types::{Block, BlockId, BLOCK_TYPE_COUNT};
