//! Step activation tables
//!
//! One table per protocol ordering. A rule is active when the offered action
//! matches (if the rule is gated on one), every required event is present
//! and the step's own postcondition event is absent. Rules are evaluated
//! top to bottom and the first match wins, so at most one step is active.

use super::action::ActionKind;
use super::protocol::{Event, EventKind, EventSet, Leg, ProtocolOrdering, Role};

use serde::Serialize;
use std::fmt;

/// Named point in the swap protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SwapStep {
    AliceDeploy,
    AliceFund,
    BobFund,
    AliceRedeem,
}

impl SwapStep {
    /// Participant who has to act for this step to complete
    pub fn actor(&self) -> Role {
        match self {
            SwapStep::AliceDeploy | SwapStep::AliceFund | SwapStep::AliceRedeem => Role::Alice,
            SwapStep::BobFund => Role::Bob,
        }
    }

    /// Event that completes this step under the given ordering
    pub fn postcondition(&self, ordering: ProtocolOrdering) -> Option<Event> {
        rules(ordering)
            .iter()
            .find(|rule| rule.step == *self)
            .map(|rule| rule.absent)
    }
}

impl fmt::Display for SwapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SwapStep::AliceDeploy => "alice-deploy",
            SwapStep::AliceFund => "alice-fund",
            SwapStep::BobFund => "bob-fund",
            SwapStep::AliceRedeem => "alice-redeem",
        };
        f.write_str(name)
    }
}

/// One row of a step table
#[derive(Debug, Clone, Copy)]
pub struct StepRule {
    pub step: SwapStep,
    /// Offered action kind the step is gated on, `None` for steps inferred from events
    pub offered: Option<ActionKind>,
    pub requires: &'static [Event],
    /// Postcondition: the step is over once this event is observed
    pub absent: Event,
}

impl StepRule {
    fn matches(&self, events: &EventSet, offered: Option<ActionKind>) -> bool {
        if let Some(kind) = self.offered {
            if offered != Some(kind) {
                return false;
            }
        }

        self.requires.iter().all(|e| events.contains_event(e)) && !events.contains_event(&self.absent)
    }
}

const HERC20_DEPLOYED: Event = Event::new(Leg::Herc20, EventKind::Deployed);
const HERC20_FUNDED: Event = Event::new(Leg::Herc20, EventKind::Funded);
const HERC20_REDEEMED: Event = Event::new(Leg::Herc20, EventKind::Redeemed);
const HBIT_FUNDED: Event = Event::new(Leg::Hbit, EventKind::Funded);
const HBIT_REDEEMED: Event = Event::new(Leg::Hbit, EventKind::Redeemed);

/// HERC20 (alpha) settles before HBIT (beta)
pub const ALPHA_FIRST: &[StepRule] = &[
    StepRule {
        step: SwapStep::AliceDeploy,
        offered: Some(ActionKind::Deploy),
        requires: &[],
        absent: HERC20_DEPLOYED,
    },
    StepRule {
        step: SwapStep::AliceFund,
        offered: Some(ActionKind::Fund),
        requires: &[HERC20_DEPLOYED],
        absent: HERC20_FUNDED,
    },
    StepRule {
        step: SwapStep::BobFund,
        offered: None,
        requires: &[HERC20_DEPLOYED, HERC20_FUNDED],
        absent: HBIT_FUNDED,
    },
    StepRule {
        step: SwapStep::AliceRedeem,
        offered: Some(ActionKind::Redeem),
        requires: &[HERC20_DEPLOYED, HERC20_FUNDED, HBIT_FUNDED],
        absent: HBIT_REDEEMED,
    },
];

/// HBIT (alpha) settles before HERC20 (beta)
pub const BETA_FIRST: &[StepRule] = &[
    StepRule {
        step: SwapStep::AliceFund,
        offered: Some(ActionKind::Fund),
        requires: &[],
        absent: HBIT_FUNDED,
    },
    StepRule {
        step: SwapStep::BobFund,
        offered: None,
        requires: &[HBIT_FUNDED],
        absent: HERC20_FUNDED,
    },
    StepRule {
        step: SwapStep::AliceRedeem,
        offered: Some(ActionKind::Redeem),
        requires: &[HBIT_FUNDED, HERC20_DEPLOYED, HERC20_FUNDED],
        absent: HERC20_REDEEMED,
    },
];

pub fn rules(ordering: ProtocolOrdering) -> &'static [StepRule] {
    match ordering {
        ProtocolOrdering::AlphaFirst => ALPHA_FIRST,
        ProtocolOrdering::BetaFirst => BETA_FIRST,
    }
}

/// Step whose preconditions hold and whose postcondition is not yet observed
pub fn active_step(
    ordering: ProtocolOrdering,
    events: &EventSet,
    offered: Option<ActionKind>,
) -> Option<SwapStep> {
    rules(ordering)
        .iter()
        .find(|rule| rule.matches(events, offered))
        .map(|rule| rule.step)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(list: &[Event]) -> EventSet {
        list.iter().copied().collect()
    }

    const ALL_EVENTS: [Event; 6] = [
        HERC20_DEPLOYED,
        HERC20_FUNDED,
        HERC20_REDEEMED,
        HBIT_FUNDED,
        HBIT_REDEEMED,
        Event::new(Leg::Hbit, EventKind::Deployed),
    ];

    #[test]
    fn test_alpha_first_progression() {
        let ordering = ProtocolOrdering::AlphaFirst;

        assert_eq!(
            active_step(ordering, &events(&[]), Some(ActionKind::Deploy)),
            Some(SwapStep::AliceDeploy)
        );
        assert_eq!(
            active_step(ordering, &events(&[HERC20_DEPLOYED]), Some(ActionKind::Fund)),
            Some(SwapStep::AliceFund)
        );
        assert_eq!(
            active_step(
                ordering,
                &events(&[HERC20_DEPLOYED, HERC20_FUNDED]),
                Some(ActionKind::Fund)
            ),
            Some(SwapStep::BobFund)
        );
        assert_eq!(
            active_step(
                ordering,
                &events(&[HERC20_DEPLOYED, HERC20_FUNDED, HBIT_FUNDED]),
                Some(ActionKind::Redeem)
            ),
            Some(SwapStep::AliceRedeem)
        );
        assert_eq!(
            active_step(
                ordering,
                &events(&[HERC20_DEPLOYED, HERC20_FUNDED, HBIT_FUNDED, HBIT_REDEEMED]),
                Some(ActionKind::Redeem)
            ),
            None
        );
    }

    #[test]
    fn test_beta_first_progression() {
        let ordering = ProtocolOrdering::BetaFirst;

        assert_eq!(
            active_step(ordering, &events(&[]), Some(ActionKind::Fund)),
            Some(SwapStep::AliceFund)
        );
        assert_eq!(
            active_step(ordering, &events(&[HBIT_FUNDED]), None),
            Some(SwapStep::BobFund)
        );
        assert_eq!(
            active_step(
                ordering,
                &events(&[HBIT_FUNDED, HERC20_DEPLOYED, HERC20_FUNDED]),
                Some(ActionKind::Redeem)
            ),
            Some(SwapStep::AliceRedeem)
        );
        assert_eq!(
            active_step(
                ordering,
                &events(&[HBIT_FUNDED, HERC20_DEPLOYED, HERC20_FUNDED, HERC20_REDEEMED]),
                Some(ActionKind::Redeem)
            ),
            None
        );
    }

    #[test]
    fn test_gated_steps_need_matching_offer() {
        let ordering = ProtocolOrdering::AlphaFirst;

        assert_eq!(active_step(ordering, &events(&[]), None), None);
        assert_eq!(active_step(ordering, &events(&[]), Some(ActionKind::Fund)), None);
        assert_eq!(
            active_step(ordering, &events(&[HERC20_DEPLOYED]), Some(ActionKind::Deploy)),
            None
        );
    }

    #[test]
    fn test_at_most_one_rule_matches() {
        let offers = [
            None,
            Some(ActionKind::Deploy),
            Some(ActionKind::Fund),
            Some(ActionKind::Redeem),
        ];

        // every subset of the event universe, every offer, both orderings
        for mask in 0u32..(1 << ALL_EVENTS.len()) {
            let set: EventSet = ALL_EVENTS
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, e)| *e)
                .collect();

            for ordering in [ProtocolOrdering::AlphaFirst, ProtocolOrdering::BetaFirst] {
                for offered in offers {
                    let matching = rules(ordering)
                        .iter()
                        .filter(|rule| rule.matches(&set, offered))
                        .count();
                    assert!(
                        matching <= 1,
                        "{:?} {:?} {:?} matched {} rules",
                        ordering,
                        set,
                        offered,
                        matching
                    );
                }
            }
        }
    }

    #[test]
    fn test_step_actor_and_postcondition() {
        assert_eq!(SwapStep::BobFund.actor(), Role::Bob);
        assert_eq!(SwapStep::AliceRedeem.actor(), Role::Alice);
        assert_eq!(
            SwapStep::AliceRedeem.postcondition(ProtocolOrdering::AlphaFirst),
            Some(HBIT_REDEEMED)
        );
        assert_eq!(
            SwapStep::BobFund.postcondition(ProtocolOrdering::BetaFirst),
            Some(HERC20_FUNDED)
        );
        assert_eq!(SwapStep::AliceDeploy.postcondition(ProtocolOrdering::BetaFirst), None);
    }
}
