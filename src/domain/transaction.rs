//! Deal workflow: phases, tasks and the advance rule.

use uuid::Uuid;

use super::Actor;

text_enum! {
    pub enum TransactionStatus {
        Pending => "pending",
        Active => "active",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

text_enum! {
    /// Phases run strictly in declaration order.
    pub enum Phase {
        Negotiations => "negotiations",
        Closing => "closing",
        Completed => "completed",
    }
}

text_enum! {
    pub enum TaskStatus {
        Pending => "pending",
        Complete => "complete",
    }
}

text_enum! {
    pub enum FileCategory {
        Contract => "contract",
        Disclosure => "disclosure",
        Financial => "financial",
        Title => "title",
        Closing => "closing",
        Other => "other",
    }
}

text_enum! {
    pub enum TimelineEventType {
        Info => "info",
        Task => "task",
        Document => "document",
        Note => "note",
    }
}

impl Phase {
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Negotiations => Some(Phase::Closing),
            Phase::Closing => Some(Phase::Completed),
            Phase::Completed => None,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Phase::Negotiations => 0,
            Phase::Closing => 1,
            Phase::Completed => 2,
        }
    }

    /// Tasks can only be attached to a working phase.
    pub fn accepts_tasks(self) -> bool {
        self != Phase::Completed
    }

    pub fn is_before(self, other: Phase) -> bool {
        self.rank() < other.rank()
    }
}

impl TransactionStatus {
    /// Manual status edits: only pending → active. Completion belongs to the
    /// phase machine and nothing sets cancelled.
    pub fn can_update_to(self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::Active)
        )
    }
}

/// Decides the phase a transaction moves to after one of its tasks was marked
/// complete.
///
/// `required_in_phase` holds the statuses of every required task in
/// `current`, including the one just completed. Only a required task can
/// trigger the move, a phase with no required tasks never advances on its own,
/// and the move is always exactly one step.
pub fn phase_after_completion(
    current: Phase,
    completed_task_required: bool,
    required_in_phase: &[TaskStatus],
) -> Option<Phase> {
    if !completed_task_required || required_in_phase.is_empty() {
        return None;
    }
    if required_in_phase
        .iter()
        .all(|status| *status == TaskStatus::Complete)
    {
        current.next()
    } else {
        None
    }
}

/// Assigned tasks are completed by the assignee; unassigned ones by either
/// party. Admins may complete anything.
pub fn can_complete_task(
    actor: &Actor,
    assigned_to: Option<Uuid>,
    buyer_id: Uuid,
    seller_id: Uuid,
) -> bool {
    if actor.is_admin {
        return true;
    }
    match assigned_to {
        Some(assignee) => actor.user_id == assignee,
        None => actor.user_id == buyer_id || actor.user_id == seller_id,
    }
}

/// Non-public files are visible to their uploader and admins only.
pub fn can_view_file(actor: &Actor, uploaded_by: Uuid, is_public: bool) -> bool {
    is_public || actor.is_or_admin(uploaded_by)
}

pub fn phase_change_description(from: Phase, to: Phase) -> String {
    format!("Phase advanced from {} to {}", from, to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_advance_one_step() {
        assert_eq!(Phase::Negotiations.next(), Some(Phase::Closing));
        assert_eq!(Phase::Closing.next(), Some(Phase::Completed));
        assert_eq!(Phase::Completed.next(), None);
        assert!(Phase::Negotiations.is_before(Phase::Closing));
        assert!(!Phase::Closing.is_before(Phase::Negotiations));
        assert!(!Phase::Closing.is_before(Phase::Closing));
    }

    #[test]
    fn advances_when_last_required_task_completes() {
        let statuses = [TaskStatus::Complete, TaskStatus::Complete];
        assert_eq!(
            phase_after_completion(Phase::Negotiations, true, &statuses),
            Some(Phase::Closing)
        );
        assert_eq!(
            phase_after_completion(Phase::Closing, true, &statuses),
            Some(Phase::Completed)
        );
    }

    #[test]
    fn waits_for_remaining_required_tasks() {
        let statuses = [TaskStatus::Complete, TaskStatus::Pending];
        assert_eq!(phase_after_completion(Phase::Negotiations, true, &statuses), None);
    }

    #[test]
    fn optional_task_never_advances() {
        let statuses = [TaskStatus::Complete, TaskStatus::Complete];
        assert_eq!(phase_after_completion(Phase::Negotiations, false, &statuses), None);
        assert_eq!(phase_after_completion(Phase::Negotiations, false, &[]), None);
    }

    #[test]
    fn empty_phase_does_not_advance() {
        assert_eq!(phase_after_completion(Phase::Negotiations, true, &[]), None);
    }

    #[test]
    fn completed_phase_is_terminal() {
        assert_eq!(
            phase_after_completion(Phase::Completed, true, &[TaskStatus::Complete]),
            None
        );
        assert!(!Phase::Completed.accepts_tasks());
    }

    #[test]
    fn task_completion_permissions() {
        let buyer = Uuid::new_v4();
        let seller = Uuid::new_v4();
        let assignee = Uuid::new_v4();

        assert!(can_complete_task(&Actor::user(buyer), None, buyer, seller));
        assert!(can_complete_task(&Actor::user(seller), None, buyer, seller));
        assert!(!can_complete_task(&Actor::user(assignee), None, buyer, seller));

        assert!(can_complete_task(&Actor::user(assignee), Some(assignee), buyer, seller));
        assert!(!can_complete_task(&Actor::user(buyer), Some(assignee), buyer, seller));
        assert!(can_complete_task(&Actor::admin(Uuid::new_v4()), Some(assignee), buyer, seller));
    }

    #[test]
    fn file_visibility() {
        let uploader = Uuid::new_v4();
        let other = Actor::user(Uuid::new_v4());

        assert!(can_view_file(&other, uploader, true));
        assert!(!can_view_file(&other, uploader, false));
        assert!(can_view_file(&Actor::user(uploader), uploader, false));
        assert!(can_view_file(&Actor::admin(Uuid::new_v4()), uploader, false));
    }

    #[test]
    fn manual_status_updates() {
        assert!(TransactionStatus::Pending.can_update_to(TransactionStatus::Active));
        assert!(!TransactionStatus::Pending.can_update_to(TransactionStatus::Cancelled));
        assert!(!TransactionStatus::Active.can_update_to(TransactionStatus::Completed));
        assert!(!TransactionStatus::Completed.can_update_to(TransactionStatus::Active));
    }

    #[test]
    fn phase_change_wording() {
        assert_eq!(
            phase_change_description(Phase::Negotiations, Phase::Closing),
            "Phase advanced from negotiations to closing"
        );
    }
}
