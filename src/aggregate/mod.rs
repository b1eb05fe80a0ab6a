//! Aggregate module
//!
//! Aggregate Root pattern implementation for Event Sourcing.
//! State is a fold over events; commands are validated against that
//! state by a separate handler.

pub mod account;
pub mod state;

pub use account::Account;
pub use state::AccountState;

/// Fold contract that every event-sourced state implements
pub trait Aggregate: Sized {
    /// Identifier of one aggregate instance
    type Id;

    /// The type of events this aggregate handles
    type Event;

    /// Get the aggregate type name (for storage)
    fn aggregate_type() -> &'static str;

    /// State before the first event
    fn init(id: Self::Id) -> Self;

    /// Get the aggregate ID
    fn id(&self) -> &Self::Id;

    /// Get the current version (number of events applied)
    fn version(&self) -> i64;

    /// Apply an event to update the aggregate state
    fn apply(self, event: &Self::Event) -> Self;

    /// Apply events in order
    fn fold<'a, I>(self, events: I) -> Self
    where
        I: IntoIterator<Item = &'a Self::Event>,
        Self::Event: 'a,
    {
        events.into_iter().fold(self, Self::apply)
    }
}
