//! Alert lifecycle transitions against the dedup log.

use crate::entity::WarningStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningAction {
    None,
    NotifyNew,
    NotifyUpdated,
    NotifyCancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub action: WarningAction,
    pub new_status: WarningStatus,
}

impl Transition {
    fn new(action: WarningAction, new_status: WarningStatus) -> Self {
        Self { action, new_status }
    }

    pub fn notifies(&self) -> bool {
        self.action != WarningAction::None
    }
}

/// Decides what to do with an observed alert given its last logged status.
///
/// Statuses only move forward: `active -> update -> cancel`. A record that
/// reached `cancel` never fires again, and an `update` record seeing `active`
/// keeps its status without notifying.
pub fn transition(stored: Option<WarningStatus>, observed: WarningStatus) -> Transition {
    use WarningAction as A;
    use WarningStatus as S;

    match (stored, observed) {
        (None, S::Cancel) => Transition::new(A::NotifyCancelled, S::Cancel),
        (None, observed) => Transition::new(A::NotifyNew, observed),
        (Some(S::Cancel), _) => Transition::new(A::None, S::Cancel),
        (Some(stored), observed) if stored == observed => Transition::new(A::None, stored),
        (Some(_), S::Cancel) => Transition::new(A::NotifyCancelled, S::Cancel),
        (Some(S::Active), S::Update) => Transition::new(A::NotifyUpdated, S::Update),
        (Some(stored), _) => Transition::new(A::None, stored),
    }
}
