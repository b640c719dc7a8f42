//! Scenario tests for reconciliation passes against a simulated cluster.

mod common;

use assert_matches::assert_matches;
use common::{Harness, spec};
use galera_cluster::{ClusterPhase, Health, Ordinal, RecoveryPosition, Role};
use galera_cluster_mock::MockCluster;
use galera_reconciler::Action;
use tracing_test::traced_test;

#[tokio::test]
#[traced_test]
async fn cold_start_provisions_elects_and_joins_one_member_per_pass() {
    let mut harness = Harness::new("cold", spec(3, 2, "mariadb:11.4"));

    let reports = harness.converge(10).await;
    let actions: Vec<Action> = reports.iter().filter_map(|r| r.action.clone()).collect();

    assert_eq!(
        actions,
        vec![
            Action::Provision { ordinal: Ordinal(0) },
            Action::Provision { ordinal: Ordinal(1) },
            Action::Provision { ordinal: Ordinal(2) },
            Action::CreateAsSeed { ordinal: Ordinal(0) },
            Action::CreateAsPrimary {
                ordinal: Ordinal(1),
                join: Ordinal(0),
            },
            Action::CreateAsSecondary {
                ordinal: Ordinal(2),
                join: Ordinal(0),
            },
        ]
    );
    assert_eq!(reports[0].phase, Some(ClusterPhase::Bootstrapping));
    assert!(reports.iter().all(|r| r.action.is_none() || r.applied));

    assert_eq!(
        harness.cluster.mutations(),
        vec![
            "create cold-0000 mariadb:11.4",
            "create cold-0001 mariadb:11.4",
            "create cold-0002 mariadb:11.4",
            "seed cold-0000",
            "primary cold-0001 cold-0000",
            "secondary cold-0002 cold-0000",
        ]
    );

    let status = harness.store.status(&harness.id).unwrap();
    assert_eq!(status.phase, ClusterPhase::Converged);
    assert_eq!(status.size, 3);
    assert_eq!(status.primaries, 2);
    assert_eq!(status.members[2].name, "cold-0002");
    assert_eq!(status.members[2].role, Role::Secondary);
}

#[tokio::test]
async fn seed_goes_to_the_member_with_the_most_history() {
    let cluster = MockCluster::new();
    let mut harness = Harness::with_cluster("history", spec(3, 0, "v1"), cluster);
    harness
        .cluster
        .set_position(&harness.id, 1, RecoveryPosition::with_history("a1b2", 42));
    harness
        .cluster
        .set_position(&harness.id, 2, RecoveryPosition::with_history("a1b2", 41));

    harness.converge(10).await;

    assert!(
        harness
            .cluster
            .mutations()
            .contains(&"seed history-0001".to_string())
    );
    assert_eq!(
        harness.cluster.member(&harness.id, 1).unwrap().role,
        Some(Role::Seed)
    );
}

#[tokio::test]
async fn resize_from_three_to_five_creates_one_member_per_pass() {
    let mut harness = Harness::new("resize", spec(3, 0, "v1"));
    harness.converge(10).await;

    harness.edit(|spec| spec.replicas = 5);
    let reports = harness.converge(10).await;

    let creates: Vec<Action> = reports
        .iter()
        .filter_map(|r| r.action.clone())
        .filter(|action| {
            matches!(
                action,
                Action::CreateAsPrimary { .. } | Action::CreateAsSecondary { .. }
            )
        })
        .collect();
    assert_eq!(
        creates,
        vec![
            Action::CreateAsPrimary {
                ordinal: Ordinal(3),
                join: Ordinal(0),
            },
            Action::CreateAsPrimary {
                ordinal: Ordinal(4),
                join: Ordinal(0),
            },
        ]
    );
    assert_eq!(reports.len(), 3);
    assert_eq!(harness.store.status(&harness.id).unwrap().primaries, 5);
}

#[tokio::test]
async fn scale_down_removes_highest_secondary_before_any_primary() {
    let mut harness = Harness::new("shrink", spec(5, 3, "v1"));
    harness.converge(15).await;
    harness.cluster.clear_mutations();

    harness.edit(|spec| spec.replicas = 4);
    let report = harness.pass().await;

    assert_eq!(
        report.action,
        Some(Action::Remove {
            ordinal: Ordinal(4),
            role: Role::Secondary,
            graceful: true,
        })
    );
    assert_eq!(
        harness.cluster.mutations(),
        vec!["stop shrink-0004", "delete shrink-0004"]
    );

    harness.converge(5).await;
    assert_eq!(harness.cluster.ordinals(&harness.id), vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn paused_cluster_takes_no_action_until_resumed() {
    let mut harness = Harness::new("paused", spec(3, 0, "v1"));
    harness.converge(10).await;
    harness.cluster.clear_mutations();

    harness.edit(|spec| {
        spec.paused = true;
        spec.replicas = 5;
    });
    for _ in 0..3 {
        let report = harness.pass().await;
        assert_eq!(report.phase, Some(ClusterPhase::Paused));
        assert!(report.action.is_none());
    }
    assert!(harness.cluster.mutations().is_empty());

    harness.edit(|spec| spec.paused = false);
    let report = harness.pass().await;
    assert_eq!(
        report.action,
        Some(Action::CreateAsPrimary {
            ordinal: Ordinal(3),
            join: Ordinal(0),
        })
    );
}

#[tokio::test]
#[traced_test]
async fn losing_the_only_primary_degrades_then_reelects_after_full_outage() {
    let mut harness = Harness::new("outage", spec(5, 1, "v1"));
    harness.converge(15).await;
    harness.cluster.clear_mutations();

    harness.cluster.kill(&harness.id, 0);
    for _ in 0..2 {
        let report = harness.pass().await;
        assert_eq!(report.phase, Some(ClusterPhase::Degraded));
        assert!(report.action.is_none());
    }
    assert!(harness.cluster.mutations().is_empty());

    for ordinal in 1..5 {
        harness.cluster.crash(&harness.id, ordinal);
    }
    harness
        .cluster
        .set_position(&harness.id, 3, RecoveryPosition::new(100));

    let report = harness.pass().await;
    assert_eq!(report.action, Some(Action::Provision { ordinal: Ordinal(0) }));

    let report = harness.pass().await;
    assert_eq!(report.action, Some(Action::CreateAsSeed { ordinal: Ordinal(3) }));
    assert!(report.applied);

    harness.converge(15).await;
    let status = harness.store.status(&harness.id).unwrap();
    assert_eq!(status.primaries, 1);
    assert!(
        status
            .members
            .iter()
            .all(|member| member.health == Health::Healthy)
    );
}

#[tokio::test]
async fn crashed_primaries_below_a_majority_degrade_while_repairs_continue() {
    let mut harness = Harness::new("minority", spec(3, 3, "v1"));
    harness.converge(10).await;

    harness.cluster.crash(&harness.id, 1);
    harness.cluster.crash(&harness.id, 2);
    let report = harness.pass().await;

    assert_eq!(report.phase, Some(ClusterPhase::Degraded));
    assert_matches!(
        report.reason,
        Some(reason) if reason.starts_with("1 of 2 required primaries healthy")
    );
    assert_matches!(
        report.action,
        Some(Action::CreateAsPrimary { ordinal: Ordinal(1), .. })
    );
    assert!(report.applied);

    harness.converge(10).await;
    assert_eq!(harness.store.status(&harness.id).unwrap().primaries, 3);
}

#[tokio::test]
async fn removed_primaries_below_a_majority_degrade() {
    let mut harness = Harness::new("vanishing", spec(3, 0, "v1"));
    harness.converge(10).await;

    harness.cluster.kill(&harness.id, 1);
    harness.cluster.kill(&harness.id, 2);
    let report = harness.pass().await;

    assert_eq!(report.phase, Some(ClusterPhase::Degraded));
    assert_eq!(harness.phase(), Some(ClusterPhase::Degraded));
}

#[tokio::test]
async fn unreachable_primaries_degrade_only_after_threshold() {
    let mut harness = Harness::new("flaky", spec(3, 0, "v1"));
    harness.converge(10).await;
    harness.cluster.clear_mutations();

    harness.cluster.set_unreachable(&harness.id, 1, true);
    harness.cluster.set_unreachable(&harness.id, 2, true);

    for _ in 0..2 {
        let report = harness.pass().await;
        assert_eq!(report.phase, Some(ClusterPhase::Converging));
        assert!(report.action.is_none());
    }

    let report = harness.pass().await;
    assert_eq!(report.phase, Some(ClusterPhase::Degraded));

    let status = harness.store.status(&harness.id).unwrap();
    assert_eq!(status.members[1].health, Health::Unreachable);
    assert_eq!(status.members[1].role, Role::Primary);

    harness.cluster.set_unreachable(&harness.id, 1, false);
    harness.cluster.set_unreachable(&harness.id, 2, false);
    let report = harness.pass().await;
    assert_eq!(report.phase, Some(ClusterPhase::Converged));
    assert!(harness.cluster.mutations().is_empty());
}

#[tokio::test]
async fn dual_seed_is_reported_and_nothing_is_started() {
    let cluster = MockCluster::new();
    let mut harness = Harness::with_cluster("dual", spec(3, 0, "v1"), cluster);
    harness.cluster.insert_running(&harness.id, 0, Role::Seed, "v1");
    harness.cluster.insert_running(&harness.id, 1, Role::Seed, "v1");

    let report = harness.pass().await;

    assert_eq!(report.phase, Some(ClusterPhase::Degraded));
    assert_matches!(report.reason, Some(reason) if reason.contains("seed"));
    assert!(report.action.is_none());
    assert!(harness.cluster.mutations().is_empty());
}

#[tokio::test]
async fn failed_action_is_not_retried_within_the_pass() {
    let mut harness = Harness::new("failing", spec(3, 0, "v1"));
    harness.cluster.fail_next("create");

    let report = harness.pass().await;
    assert_eq!(report.action, Some(Action::Provision { ordinal: Ordinal(0) }));
    assert!(!report.applied);
    assert_matches!(report.reason, Some(reason) if reason.contains("failed"));
    assert!(harness.cluster.mutations().is_empty());

    let report = harness.pass().await;
    assert_eq!(report.action, Some(Action::Provision { ordinal: Ordinal(0) }));
    assert!(report.applied);
    assert_eq!(harness.cluster.mutations(), vec!["create failing-0000 v1"]);
}

#[tokio::test]
async fn rolling_upgrade_moves_one_member_at_a_time() {
    let mut harness = Harness::new("upgrade", spec(3, 0, "v1"));
    harness.converge(10).await;
    harness.cluster.clear_mutations();

    harness.edit(|spec| spec.image = "v2".to_string());
    let reports = harness.converge(10).await;

    let upgrades: Vec<Action> = reports.iter().filter_map(|r| r.action.clone()).collect();
    assert_eq!(
        upgrades,
        vec![
            Action::Upgrade {
                ordinal: Ordinal(2),
                role: Role::Primary,
                join: Ordinal(0),
            },
            Action::Upgrade {
                ordinal: Ordinal(1),
                role: Role::Primary,
                join: Ordinal(0),
            },
            Action::Upgrade {
                ordinal: Ordinal(0),
                role: Role::Seed,
                join: Ordinal(1),
            },
        ]
    );
    assert_eq!(
        &harness.cluster.mutations()[..4],
        &[
            "stop upgrade-0002",
            "delete upgrade-0002",
            "create upgrade-0002 v2",
            "primary upgrade-0002 upgrade-0000",
        ]
    );
    for ordinal in 0..3 {
        let member = harness.cluster.member(&harness.id, ordinal).unwrap();
        assert_eq!(member.version.as_deref(), Some("v2"));
        assert_eq!(member.role, Some(Role::Primary));
    }
}

#[tokio::test]
async fn upgrade_stalls_when_the_upgraded_member_never_settles() {
    let mut harness = Harness::new("stall", spec(3, 0, "v1"));
    harness.converge(10).await;

    harness.cluster.set_startup_passes(100);
    harness.edit(|spec| spec.image = "v2".to_string());

    let report = harness.pass().await;
    assert_matches!(report.action, Some(Action::Upgrade { .. }));

    let mut last = None;
    for _ in 0..4 {
        let report = harness.pass().await;
        assert!(report.action.is_none());
        last = Some(report);
    }
    let last = last.unwrap();
    assert_eq!(last.phase, Some(ClusterPhase::Degraded));
    assert_matches!(last.reason, Some(reason) if reason.starts_with("upgrade stalled"));
}

#[tokio::test]
async fn upgrade_stalls_when_the_upgraded_member_keeps_crashing() {
    let mut harness = Harness::new("crashloop", spec(3, 0, "v1"));
    harness.converge(10).await;

    harness.edit(|spec| spec.image = "v2".to_string());
    let report = harness.pass().await;
    assert_matches!(report.action, Some(Action::Upgrade { ordinal: Ordinal(2), .. }));

    let mut reports = Vec::new();
    for _ in 0..8 {
        harness.cluster.crash(&harness.id, 2);
        reports.push(harness.pass().await);
    }

    let last = reports.last().unwrap();
    assert_eq!(last.phase, Some(ClusterPhase::Degraded));
    assert_matches!(&last.reason, Some(reason) if reason.starts_with("upgrade stalled"));
    assert!(reports[4..].iter().all(|report| report.action.is_none()));

    let member = harness.cluster.member(&harness.id, 1).unwrap();
    assert_eq!(member.version.as_deref(), Some("v1"));
}

#[tokio::test]
async fn deleted_cluster_is_torn_down_highest_ordinal_first() {
    let mut harness = Harness::new("doomed", spec(3, 0, "v1"));
    harness.converge(10).await;
    harness.cluster.clear_mutations();

    harness.store.request_deletion(&harness.id);
    let mut removed = Vec::new();
    loop {
        let report = harness.pass().await;
        if report.finished {
            break;
        }
        removed.push(report.action.unwrap().target());
    }

    assert_eq!(removed, vec![Ordinal(2), Ordinal(1), Ordinal(0)]);
    assert_eq!(
        harness.cluster.mutations(),
        vec![
            "stop doomed-0002",
            "delete doomed-0002",
            "stop doomed-0001",
            "delete doomed-0001",
            "stop doomed-0000",
            "delete doomed-0000",
        ]
    );
    assert!(!harness.store.contains(&harness.id));
}

#[tokio::test]
async fn vanished_cluster_is_torn_down_with_remembered_commands() {
    let mut harness = Harness::new("vanished", spec(3, 0, "v1"));
    harness.converge(10).await;

    harness.store.remove(&harness.id);
    let mut passes = 0;
    while !harness.pass().await.finished {
        passes += 1;
        assert!(passes <= 3);
    }
    assert!(harness.cluster.ordinals(&harness.id).is_empty());
}

#[tokio::test]
async fn cancelled_pass_does_not_act() {
    let mut harness = Harness::new("cancelled", spec(3, 0, "v1"));
    harness.cancel.cancel();

    let report = harness.pass().await;
    assert!(report.aborted);
    assert_eq!(report.action, Some(Action::Provision { ordinal: Ordinal(0) }));
    assert!(harness.cluster.mutations().is_empty());
}

#[tokio::test]
async fn every_pass_takes_at_most_one_action_and_writes_status_once() {
    let cluster = MockCluster::new().with_startup_passes(2);
    let mut harness = Harness::with_cluster("steady", spec(5, 3, "v1"), cluster);

    let mut passes = 0;
    let mut mutations = 0;
    loop {
        let report = harness.pass().await;
        passes += 1;
        let now = harness.cluster.mutations().len();
        // an action is at most a create plus a start, or a stop plus a delete
        assert!(now - mutations <= 2);
        mutations = now;
        assert_eq!(harness.store.status_writes(&harness.id), passes);
        if report.phase == Some(ClusterPhase::Converged) {
            break;
        }
        assert!(passes < 40, "did not converge");
    }
}

#[tokio::test]
async fn invalid_manifest_is_reported_as_degraded() {
    let mut invalid = spec(3, 0, "v1");
    invalid.status_command = Some(vec!["something-else".to_string()]);
    let mut harness = Harness::new("invalid", invalid);

    let report = harness.pass().await;
    assert_eq!(report.phase, Some(ClusterPhase::Degraded));
    assert_matches!(report.reason, Some(reason) if reason.contains("statusCommand"));
    assert!(harness.cluster.mutations().is_empty());
}

#[tokio::test]
#[traced_test]
async fn unreadable_manifest_degrades_without_touching_members() {
    let mut harness = Harness::new("garbled", spec(3, 0, "v1"));
    harness.converge(10).await;
    harness.cluster.clear_mutations();

    harness.store.set_unreadable(&harness.id, true);
    for _ in 0..3 {
        let report = harness.pass().await;
        assert_eq!(report.phase, Some(ClusterPhase::Degraded));
        assert_matches!(report.reason, Some(reason) if reason.starts_with("unreadable manifest"));
        assert!(report.action.is_none());
    }
    assert!(harness.cluster.mutations().is_empty());
    assert_eq!(harness.cluster.ordinals(&harness.id), vec![0, 1, 2]);
    assert_eq!(harness.phase(), Some(ClusterPhase::Degraded));

    harness.store.set_unreadable(&harness.id, false);
    let report = harness.pass().await;
    assert_eq!(report.phase, Some(ClusterPhase::Converged));
}
