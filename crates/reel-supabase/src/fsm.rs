//! Client-side session state machine.
//!
//! Tracks whether the adapter holds a session so that auth events are only
//! emitted for real transitions (a second sign-out while already signed out
//! announces nothing).
//!
//! ```text
//!              SignIn / Restore
//!  SignedOut ──────────────────► SignedIn ◄──┐
//!     ▲  │                         │  │      │ SignIn
//!     │  │ RefreshStarted          │  └──────┘
//!     │  ▼                         │ RefreshStarted
//!     │ Refreshing ◄───────────────┘
//!     │  │  RefreshRetry ⟲
//!     │  │  RefreshSucceeded ──► SignedIn
//!     └──┴─ RefreshFailed / SignOut
//! ```

use reel_session::AuthEventKind;
use rust_fsm::*;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub client_machine(SignedOut)

    SignedOut => {
        SignIn => SignedIn,
        // Session found in storage at first use.
        Restore => SignedIn,
        RefreshStarted => Refreshing
    },
    SignedIn => {
        SignIn => SignedIn,
        RefreshStarted => Refreshing,
        SignOut => SignedOut
    },
    Refreshing => {
        RefreshRetry => Refreshing,
        RefreshSucceeded => SignedIn,
        RefreshFailed => SignedOut,
        SignIn => SignedIn,
        SignOut => SignedOut
    }
}

pub use client_machine::Input as ClientInput;
pub use client_machine::State as ClientState;
pub use client_machine::StateMachine as ClientMachine;

/// Event announced after a successful transition, if any.
pub fn event_for(input: &ClientInput) -> Option<AuthEventKind> {
    match input {
        ClientInput::SignIn => Some(AuthEventKind::SignedIn),
        ClientInput::Restore => Some(AuthEventKind::InitialSession),
        ClientInput::RefreshSucceeded => Some(AuthEventKind::TokenRefreshed),
        ClientInput::SignOut | ClientInput::RefreshFailed => Some(AuthEventKind::SignedOut),
        ClientInput::RefreshStarted | ClientInput::RefreshRetry => None,
    }
}
