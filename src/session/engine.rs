use statig::blocking::IntoStateMachineExt as _;

use super::events::SessionEvent;
use super::machine::{DispatchContext, SessionMachine};
use super::types::{SessionApplyStatus, SessionMode};

#[derive(Clone, Copy, Debug)]
pub struct SessionApplyResult {
    pub before: SessionMode,
    pub after: SessionMode,
    pub status: SessionApplyStatus,
}

impl SessionApplyResult {
    pub fn changed(self) -> bool {
        matches!(self.status, SessionApplyStatus::Applied)
    }
}

pub struct SessionEngine {
    machine: statig::blocking::StateMachine<SessionMachine>,
}

impl Default for SessionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionEngine {
    pub fn new() -> Self {
        Self {
            machine: SessionMachine::new().state_machine(),
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.machine.inner().mode
    }

    pub fn apply(&mut self, event: SessionEvent) -> SessionApplyResult {
        let before = self.mode();
        let mut context = DispatchContext::default();
        self.machine.handle_with_context(&event, &mut context);
        let after = self.mode();
        SessionApplyResult {
            before,
            after,
            status: context.status,
        }
    }
}
