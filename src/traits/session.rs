//! Authenticated-session seam.

pub trait SessionStore: Send + Sync {
    /// Whether a user is currently signed in.
    fn is_authenticated(&self) -> bool;
}
