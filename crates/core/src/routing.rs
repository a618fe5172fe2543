use crate::domain::conversation::ConversationStatus;
use crate::intent::Intent;

/// Entry checkpoint for every turn. Anything other than `Automated` halts
/// the turn before a single component runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    Halt { status: ConversationStatus },
}

pub fn guard(status: ConversationStatus) -> GuardDecision {
    match status {
        ConversationStatus::Automated => GuardDecision::Proceed,
        other => GuardDecision::Halt { status: other },
    }
}

/// Where the pending collection stands when the router runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectionReadiness {
    /// No open form for this conversation.
    None,
    /// A form is open but fields or the confirmation are still missing.
    Collecting,
    /// Every field plus an explicit confirmation arrived this turn.
    ConfirmedComplete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteTarget {
    Reception,
    Agenda,
    HumanHandoff,
    Fallback,
    Halt,
}

/// Pure decision table. No inference: the same inputs always produce the
/// same target, and unrecognized combinations land on the safe fallback.
pub fn route(
    status: ConversationStatus,
    intent: Intent,
    readiness: CollectionReadiness,
) -> RouteTarget {
    if status != ConversationStatus::Automated {
        return RouteTarget::Halt;
    }

    match (intent, readiness) {
        (Intent::Human, _) => RouteTarget::HumanHandoff,
        (Intent::Create | Intent::Cancel | Intent::Reschedule, CollectionReadiness::ConfirmedComplete) => {
            RouteTarget::Agenda
        }
        (Intent::Create | Intent::Cancel | Intent::Reschedule, _) => RouteTarget::Reception,
        (Intent::Query, _) => RouteTarget::Agenda,
        (Intent::Other, _) => RouteTarget::Fallback,
    }
}
