//! The reducer abstraction used for every document transition.
//!
//! A reducer is a pure function `(State, Action, Environment) → Result<Outcome, Error>`. It
//! validates the action against the current state and either mutates the state and reports
//! what happened, or leaves the state untouched and returns an error. Services wrap reducers in
//! the load → reduce → versioned save cycle, so the same pure logic runs again on every retry.

/// Business logic for one kind of document.
///
/// # Contract
///
/// On `Err`, `state` must be exactly as it was before the call. Implementations validate first
/// and mutate last so a rejected action can never leave a half-applied change behind.
///
/// # Example
///
/// ```ignore
/// impl Reducer for SessionReducer {
///     type State = Session;
///     type Action = SessionAction;
///     type Environment = TransitionEnv;
///     type Outcome = SessionEvent;
///     type Error = BookingError;
///
///     fn reduce(&self, state: &mut Session, action: SessionAction, env: &TransitionEnv)
///         -> Result<SessionEvent, BookingError>
///     {
///         match action { /* ... */ }
///     }
/// }
/// ```
pub trait Reducer {
    /// The state type this reducer operates on
    type State;

    /// The action type this reducer processes
    type Action;

    /// The environment type with injected dependencies
    type Environment;

    /// Description of the change that was applied
    type Outcome;

    /// Rejection reason
    type Error;

    /// Reduce an action into a state change.
    ///
    /// # Errors
    ///
    /// Returns the implementation's error when the action is not valid for the current state.
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Result<Self::Outcome, Self::Error>;
}
