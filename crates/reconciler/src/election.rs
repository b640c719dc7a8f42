//! Choosing the member that bootstraps a cluster with nothing serving.

use std::cmp::Reverse;

use galera_cluster::{Health, Member, Ordinal};

/// Picks the member with the highest committed sequence number.
///
/// Only members that answered this pass and reported a recovery position are
/// eligible. Equal sequence numbers go to the lowest ordinal whatever history
/// tag they carry. Returns `None` rather than guess when nobody is eligible.
#[must_use]
pub fn elect_seed(members: &[Member]) -> Option<Ordinal> {
    members
        .iter()
        .filter(|member| matches!(member.health, Health::Healthy | Health::Unhealthy))
        .filter_map(|member| {
            member
                .recovery_position
                .as_ref()
                .map(|position| (position.seqno, Reverse(member.ordinal)))
        })
        .max()
        .map(|(_, Reverse(ordinal))| ordinal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use galera_cluster::{RecoveryPosition, Role};
    use proptest::prelude::*;

    fn member(ordinal: u32, health: Health, seqno: Option<i64>) -> Member {
        Member {
            ordinal: Ordinal(ordinal),
            role: Role::Unknown,
            health,
            recovery_position: seqno.map(RecoveryPosition::new),
            running_version: None,
        }
    }

    #[test]
    fn highest_position_wins() {
        let members = vec![
            member(0, Health::Unhealthy, Some(10)),
            member(1, Health::Unhealthy, Some(12)),
            member(2, Health::Unhealthy, Some(11)),
        ];
        assert_eq!(elect_seed(&members), Some(Ordinal(1)));
    }

    #[test]
    fn ties_go_to_lowest_ordinal() {
        let members = vec![
            member(2, Health::Unhealthy, Some(7)),
            member(0, Health::Unhealthy, Some(7)),
            member(1, Health::Unhealthy, Some(7)),
        ];
        assert_eq!(elect_seed(&members), Some(Ordinal(0)));
    }

    #[test]
    fn history_tag_does_not_break_seqno_ties() {
        let tagged = |ordinal: u32, history: &str| Member {
            recovery_position: Some(RecoveryPosition::with_history(history, 5)),
            ..member(ordinal, Health::Unhealthy, None)
        };
        let members = vec![tagged(0, "aaaa"), tagged(1, "zzzz")];
        assert_eq!(elect_seed(&members), Some(Ordinal(0)));
    }

    #[test]
    fn unqueried_and_unreachable_members_are_ineligible() {
        let members = vec![
            member(0, Health::Unreachable, Some(100)),
            member(1, Health::Starting, Some(100)),
            member(2, Health::Absent, Some(100)),
            member(3, Health::Unhealthy, None),
        ];
        assert_eq!(elect_seed(&members), None);

        let mut with_one = members;
        with_one.push(member(4, Health::Unhealthy, Some(-1)));
        assert_eq!(elect_seed(&with_one), Some(Ordinal(4)));
    }

    fn arb_member() -> impl Strategy<Value = (u32, u8, Option<i64>)> {
        (0u32..16, 0u8..5, proptest::option::of(-1i64..20))
    }

    fn health(code: u8) -> Health {
        match code {
            0 => Health::Starting,
            1 => Health::Healthy,
            2 => Health::Unhealthy,
            3 => Health::Unreachable,
            _ => Health::Absent,
        }
    }

    proptest! {
        #[test]
        fn election_is_deterministic_and_order_independent(
            raw in proptest::collection::vec(arb_member(), 0..12),
            rotate in 0usize..12,
        ) {
            let mut members: Vec<Member> = raw
                .iter()
                .map(|(ordinal, code, seqno)| member(*ordinal, health(*code), *seqno))
                .collect();
            members.sort_by_key(|m| m.ordinal);
            members.dedup_by_key(|m| m.ordinal);

            let first = elect_seed(&members);
            prop_assert_eq!(first, elect_seed(&members));

            let mut shuffled = members.clone();
            if !shuffled.is_empty() {
                let by = rotate % shuffled.len();
                shuffled.rotate_left(by);
            }
            shuffled.reverse();
            prop_assert_eq!(first, elect_seed(&shuffled));

            if let Some(winner) = first {
                let winner = members.iter().find(|m| m.ordinal == winner).unwrap();
                prop_assert!(matches!(winner.health, Health::Healthy | Health::Unhealthy));
                for other in &members {
                    if matches!(other.health, Health::Healthy | Health::Unhealthy) {
                        if let Some(position) = &other.recovery_position {
                            let best = winner.recovery_position.as_ref().unwrap().seqno;
                            prop_assert!(position.seqno <= best);
                        }
                    }
                }
            }
        }
    }
}
