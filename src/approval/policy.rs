// ABOUTME: Approval policy decision logic for tool invocations.
// ABOUTME: Evaluates SecurityLevel, AskMode, and allowlist status to produce an ApprovalOutcome.

use super::types::{AskMode, ApprovalOutcome, SecurityLevel};

/// Evaluate the approval policy for a tool invocation.
///
/// Given the security level, ask mode, and whether the allowlist is satisfied,
/// returns the appropriate approval outcome (Allow, Denied, or Ask).
pub fn evaluate_approval(
    security: SecurityLevel,
    ask: AskMode,
    allowlist_satisfied: bool,
) -> ApprovalOutcome {
    // Rule 1: Deny always blocks, regardless of anything else.
    if security == SecurityLevel::Deny {
        return ApprovalOutcome::Denied;
    }

    // Rule 2: Always-ask overrides all other logic.
    if ask == AskMode::Always {
        return ApprovalOutcome::Ask;
    }

    match security {
        SecurityLevel::Deny => unreachable!("handled above"),

        SecurityLevel::Allowlist => {
            if allowlist_satisfied {
                // Rule 3: Allowlist + satisfied → allow.
                ApprovalOutcome::Allow
            } else {
                match ask {
                    AskMode::OnMiss => ApprovalOutcome::Ask,   // Rule 4
                    AskMode::Off => ApprovalOutcome::Denied,   // Rule 5
                    AskMode::Always => unreachable!("handled above"),
                }
            }
        }

        SecurityLevel::Full => {
            if allowlist_satisfied || ask == AskMode::Off {
                // Rule 6: Full + (satisfied or Off) → allow.
                ApprovalOutcome::Allow
            } else {
                // Rule 7: Full + OnMiss + !satisfied → ask.
                ApprovalOutcome::Ask
            }
        }
    }
}
