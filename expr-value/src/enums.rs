//! Closed internal enumerations carried as [`crate::Value`] payloads.
//!
//! These mirror the small, fixed vocabularies the plan executive's node
//! state machine and command dispatch use. The state machine itself lives
//! outside this crate; only the enumerations needed to type and compare
//! `Value`s of these kinds live here.

use std::fmt;

macro_rules! closed_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Self::$variant => write!(f, stringify!($variant))),+
                }
            }
        }
    };
}

closed_enum!(
    /// Lifecycle state of a plan node, as observed by `NodeState`-typed
    /// expressions. The node hierarchy that produces these values is an
    /// external collaborator; this crate only needs the closed vocabulary.
    NodeState {
        Inactive,
        Waiting,
        Executing,
        Finishing,
        Failing,
        Finished,
        IterationEnded,
    }
);

closed_enum!(
    /// Terminal outcome of a finished plan node.
    NodeOutcome {
        Success,
        Failure,
        Skipped,
        Interrupted,
    }
);

closed_enum!(
    /// Reason a node's outcome was `Failure`.
    FailureType {
        PreConditionFailed,
        PostConditionFailed,
        InvariantConditionFailed,
        ParentFailed,
        ExitedWithError,
    }
);

closed_enum!(
    /// Status of a dispatched command, as reported back through the
    /// external interface.
    CommandHandle {
        Sent,
        Accepted,
        RejectedByChecker,
        Failed,
        Succeeded,
        Aborted,
    }
);
