use std::fmt::Debug;

use crate::event::Event;

/// The Aggregate trait is responsible for validating commands, mapping commands to events, and applying
/// events onto the state.
///
/// An Aggregate should be able to derive its own state from nothing but its initial configuration, and its
/// event stream. Applying the same events, in the same order, to the same aggregate, should always yield an
/// identical aggregate state.
///
/// Both functions are pure: the aggregate never performs I/O, it never reads the clock and it never
/// generates identifiers. Whatever it needs has to be carried by the command.
pub trait Aggregate {
    /// The name of the aggregate. It is used as prefix for the event store table.
    const NAME: &'static str;

    /// Internal aggregate state. This will be wrapped in [`crate::AggregateState`] and could be used to
    /// validate commands.
    type State: Default + Clone + Debug + Send + Sync;

    /// A command is an action that the caller can execute over an aggregate in order to let it emit
    /// an event.
    type Command: Send;

    /// An event represents a fact that took place in the domain. They are the source of truth;
    /// your current state is derived from the events.
    type Event: Event;

    /// This associated type is used to get domain errors while handling a command.
    type Error: std::error::Error + Send + Sync;

    /// Handles, validates a command and emits events.
    ///
    /// If the command is rejected nothing is emitted and the state is left untouched.
    fn handle_command(state: &Self::State, command: Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Updates the aggregate state using the new event. This assumes that the event can be correctly
    /// applied to the state.
    fn apply_event(state: Self::State, payload: Self::Event) -> Self::State;

    /// Decides on a command and returns both the state after the emitted events and the events
    /// themselves.
    fn decide(state: &Self::State, command: Self::Command) -> Result<(Self::State, Vec<Self::Event>), Self::Error> {
        let events = Self::handle_command(state, command)?;
        let next = events
            .iter()
            .cloned()
            .fold(state.clone(), |acc, event| Self::apply_event(acc, event));

        Ok((next, events))
    }

    /// Folds a whole event history onto the default state.
    fn replay<I>(events: I) -> Self::State
    where
        I: IntoIterator<Item = Self::Event>,
    {
        events
            .into_iter()
            .fold(Self::State::default(), |acc, event| Self::apply_event(acc, event))
    }
}
