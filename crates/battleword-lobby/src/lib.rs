//! Everything that happens before a game exists.
//!
//! - [`MatchmakingQueue`] pairs anonymous players in arrival order.
//! - [`NotificationRouter`] tracks who is online and runs the
//!   challenge/rematch negotiation between two named players.
//!
//! Both create games through the [`battleword_game::GameFactory`] seam,
//! so they can be tested without a repository.

mod error;
mod queue;
mod router;

pub use error::LobbyError;
pub use queue::{Match, MatchmakingQueue};
pub use router::{Delivery, NotificationRouter, PendingChallenge, Resolution};
