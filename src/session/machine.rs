use statig::prelude::*;

use super::events::SessionEvent;
use super::types::{SessionApplyStatus, SessionMode};

#[derive(Clone, Copy, Debug)]
pub(super) struct SessionMachine {
    pub(super) mode: SessionMode,
}

#[derive(Clone, Copy, Debug)]
pub(super) struct DispatchContext {
    pub(super) status: SessionApplyStatus,
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self {
            status: SessionApplyStatus::Unchanged,
        }
    }
}

impl SessionMachine {
    pub(super) fn new() -> Self {
        Self {
            mode: SessionMode::Idle,
        }
    }

    fn set_mode(&mut self, context: &mut DispatchContext, mode: SessionMode) {
        context.status = if self.mode == mode {
            SessionApplyStatus::Unchanged
        } else {
            SessionApplyStatus::Applied
        };
        self.mode = mode;
    }
}

#[state_machine(initial = "State::idle()")]
impl SessionMachine {
    #[state]
    fn idle(&mut self, context: &mut DispatchContext, event: &SessionEvent) -> Outcome<State> {
        match event {
            SessionEvent::OpenedForRead => {
                self.set_mode(context, SessionMode::Reading);
                Transition(State::reading())
            }
            SessionEvent::OpenedForWrite => {
                self.set_mode(context, SessionMode::Writing);
                Transition(State::writing())
            }
            SessionEvent::OpenedForLog => {
                self.set_mode(context, SessionMode::Logging);
                Transition(State::logging())
            }
            SessionEvent::Closed => {
                context.status = SessionApplyStatus::Unchanged;
                Handled
            }
        }
    }

    #[state]
    fn reading(&mut self, context: &mut DispatchContext, event: &SessionEvent) -> Outcome<State> {
        match event {
            SessionEvent::Closed => {
                self.set_mode(context, SessionMode::Idle);
                Transition(State::idle())
            }
            _ => {
                context.status = SessionApplyStatus::InvalidTransition;
                Handled
            }
        }
    }

    #[state]
    fn writing(&mut self, context: &mut DispatchContext, event: &SessionEvent) -> Outcome<State> {
        match event {
            SessionEvent::Closed => {
                self.set_mode(context, SessionMode::Idle);
                Transition(State::idle())
            }
            _ => {
                context.status = SessionApplyStatus::InvalidTransition;
                Handled
            }
        }
    }

    #[state]
    fn logging(&mut self, context: &mut DispatchContext, event: &SessionEvent) -> Outcome<State> {
        match event {
            SessionEvent::Closed => {
                self.set_mode(context, SessionMode::Idle);
                Transition(State::idle())
            }
            _ => {
                context.status = SessionApplyStatus::InvalidTransition;
                Handled
            }
        }
    }
}
