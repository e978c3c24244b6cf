//! Runtime Layer
//!
//! Async driver for live sessions. This layer is **non-deterministic**:
//! it maps wall-clock time onto the engine's logical clock. All game logic
//! stays in `game/`.

pub mod session;

pub use session::SessionHandle;
