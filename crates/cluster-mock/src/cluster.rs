//! A simulated galera cluster: compute units plus the database running on them.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use galera_cluster::{
    BootstrapParams, ClusterId, CommandExecutor, ComputePlatform, ComputeUnit, Health,
    MemberCommands, MemberRef, Ordinal, RecoveryPosition, ResolvedCommands, Role, StatusReport,
};
use parking_lot::Mutex;

use crate::Error;

/// One simulated member.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SimulatedMember {
    /// Image of the compute unit.
    pub version: Option<String>,

    /// Role the database runs in; `None` when it is not running.
    pub role: Option<Role>,

    /// Status calls left before the database reports healthy.
    pub starting_left: u32,
}

#[derive(Debug, Default)]
struct State {
    startup_passes: u32,
    units: BTreeMap<ClusterId, BTreeMap<Ordinal, SimulatedMember>>,
    positions: HashMap<(ClusterId, Ordinal), RecoveryPosition>,
    unreachable: BTreeSet<(ClusterId, Ordinal)>,
    failures: HashMap<String, u32>,
    calls: Vec<String>,
}

impl State {
    fn take_failure(&mut self, operation: &str) -> Result<(), Error> {
        match self.failures.get_mut(operation) {
            Some(left) if *left > 0 => {
                *left -= 1;
                Err(Error::Failed(format!("injected {operation} failure")))
            }
            _ => Ok(()),
        }
    }

    fn unit(&mut self, member: &MemberRef) -> Result<&mut SimulatedMember, Error> {
        self.units
            .get_mut(&member.cluster)
            .and_then(|units| units.get_mut(&member.ordinal))
            .ok_or_else(|| Error::NotFound(member.name()))
    }

    fn check_reachable(&self, member: &MemberRef) -> Result<(), Error> {
        if self
            .unreachable
            .contains(&(member.cluster.clone(), member.ordinal))
        {
            return Err(Error::Unreachable(member.name()));
        }
        Ok(())
    }

    fn start(
        &mut self,
        member: &MemberRef,
        role: Role,
        peer: Option<&MemberRef>,
    ) -> Result<(), Error> {
        if let Some(peer) = peer {
            let serving = self
                .units
                .get(&peer.cluster)
                .and_then(|units| units.get(&peer.ordinal))
                .is_some_and(|unit| unit.role.is_some() && unit.starting_left == 0);
            if !serving {
                return Err(Error::Failed(format!("peer {} is not serving", peer.name())));
            }
        }

        let startup_passes = self.startup_passes;
        let unit = self.unit(member)?;
        if unit.role.is_some() {
            return Err(Error::Failed(format!("{} is already running", member.name())));
        }
        unit.role = Some(role);
        unit.starting_left = startup_passes;
        Ok(())
    }
}

/// In-memory cluster implementing both the command executor and the platform.
#[derive(Clone, Debug, Default)]
pub struct MockCluster {
    state: Arc<Mutex<State>>,
}

impl MockCluster {
    /// Creates an empty simulation where members become healthy immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of status queries a started member reports `Starting` for.
    #[must_use]
    pub fn with_startup_passes(self, passes: u32) -> Self {
        self.state.lock().startup_passes = passes;
        self
    }

    /// Changes the startup delay for members started from now on.
    pub fn set_startup_passes(&self, passes: u32) {
        self.state.lock().startup_passes = passes;
    }

    /// Adds a running member directly, bypassing the platform.
    pub fn insert_running(&self, cluster: &ClusterId, ordinal: u32, role: Role, version: &str) {
        self.state
            .lock()
            .units
            .entry(cluster.clone())
            .or_default()
            .insert(
                Ordinal(ordinal),
                SimulatedMember {
                    version: Some(version.to_string()),
                    role: Some(role),
                    starting_left: 0,
                },
            );
    }

    /// Sets the recovery position a member reports.
    pub fn set_position(&self, cluster: &ClusterId, ordinal: u32, position: RecoveryPosition) {
        self.state
            .lock()
            .positions
            .insert((cluster.clone(), Ordinal(ordinal)), position);
    }

    /// Destroys a member's compute unit.
    pub fn kill(&self, cluster: &ClusterId, ordinal: u32) {
        if let Some(units) = self.state.lock().units.get_mut(cluster) {
            units.remove(&Ordinal(ordinal));
        }
    }

    /// Stops a member's database while leaving the unit in place.
    pub fn crash(&self, cluster: &ClusterId, ordinal: u32) {
        if let Some(unit) = self
            .state
            .lock()
            .units
            .get_mut(cluster)
            .and_then(|units| units.get_mut(&Ordinal(ordinal)))
        {
            unit.role = None;
            unit.starting_left = 0;
        }
    }

    /// Makes a member's database stop answering, or answer again.
    pub fn set_unreachable(&self, cluster: &ClusterId, ordinal: u32, unreachable: bool) {
        let key = (cluster.clone(), Ordinal(ordinal));
        let mut state = self.state.lock();
        if unreachable {
            state.unreachable.insert(key);
        } else {
            state.unreachable.remove(&key);
        }
    }

    /// Makes the next call of `operation` fail.
    pub fn fail_next(&self, operation: &str) {
        *self
            .state
            .lock()
            .failures
            .entry(operation.to_string())
            .or_default() += 1;
    }

    /// Snapshot of one member.
    #[must_use]
    pub fn member(&self, cluster: &ClusterId, ordinal: u32) -> Option<SimulatedMember> {
        self.state
            .lock()
            .units
            .get(cluster)
            .and_then(|units| units.get(&Ordinal(ordinal)))
            .cloned()
    }

    /// Ordinals with a compute unit.
    #[must_use]
    pub fn ordinals(&self, cluster: &ClusterId) -> Vec<u32> {
        self.state
            .lock()
            .units
            .get(cluster)
            .map(|units| units.keys().map(|ordinal| ordinal.get()).collect())
            .unwrap_or_default()
    }

    /// Every mutating call so far, oldest first.
    #[must_use]
    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Forgets recorded calls.
    pub fn clear_mutations(&self) {
        self.state.lock().calls.clear();
    }
}

/// Commands of one cluster of a [`MockCluster`].
#[derive(Clone, Debug)]
pub struct MockCommands {
    cluster: ClusterId,
    state: Arc<Mutex<State>>,
}

impl CommandExecutor for MockCluster {
    type Commands = MockCommands;

    fn commands_for(&self, cluster: &ClusterId, _commands: &ResolvedCommands) -> MockCommands {
        MockCommands {
            cluster: cluster.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl MockCommands {
    fn start(
        &self,
        operation: &str,
        member: &MemberRef,
        role: Role,
        peer: Option<&MemberRef>,
    ) -> Result<(), Error> {
        debug_assert_eq!(member.cluster, self.cluster);
        let mut state = self.state.lock();
        state.take_failure(operation)?;
        state.check_reachable(member)?;
        state.start(member, role, peer)?;
        let call = peer.map_or_else(
            || format!("{operation} {}", member.name()),
            |peer| format!("{operation} {} {}", member.name(), peer.name()),
        );
        state.calls.push(call);
        Ok(())
    }
}

#[async_trait]
impl MemberCommands for MockCommands {
    type Error = Error;

    async fn status(&self, member: &MemberRef) -> Result<StatusReport, Error> {
        let mut state = self.state.lock();
        state.take_failure("status")?;
        state.check_reachable(member)?;
        let unit = state.unit(member)?;

        Ok(match unit.role {
            None => StatusReport::new(Health::Unhealthy, Role::Unknown),
            Some(role) if unit.starting_left > 0 => {
                unit.starting_left -= 1;
                StatusReport::new(Health::Starting, role)
            }
            Some(role) => StatusReport::new(Health::Healthy, role),
        })
    }

    async fn sequence(&self, member: &MemberRef) -> Result<RecoveryPosition, Error> {
        let mut state = self.state.lock();
        state.take_failure("sequence")?;
        state.check_reachable(member)?;
        state.unit(member)?;

        Ok(state
            .positions
            .get(&(member.cluster.clone(), member.ordinal))
            .cloned()
            .unwrap_or_else(|| RecoveryPosition::new(0)))
    }

    async fn seed(&self, member: &MemberRef) -> Result<(), Error> {
        self.start("seed", member, Role::Seed, None)
    }

    async fn primary(&self, member: &MemberRef, peer: &MemberRef) -> Result<(), Error> {
        self.start("primary", member, Role::Primary, Some(peer))
    }

    async fn secondary(&self, member: &MemberRef, peer: &MemberRef) -> Result<(), Error> {
        self.start("secondary", member, Role::Secondary, Some(peer))
    }

    async fn stop(&self, member: &MemberRef) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.take_failure("stop")?;
        state.check_reachable(member)?;
        let unit = state.unit(member)?;
        unit.role = None;
        unit.starting_left = 0;
        state.calls.push(format!("stop {}", member.name()));
        Ok(())
    }
}

#[async_trait]
impl ComputePlatform for MockCluster {
    type Error = Error;

    async fn list(&self, cluster: &ClusterId) -> Result<Vec<ComputeUnit>, Error> {
        let mut state = self.state.lock();
        state.take_failure("list")?;

        Ok(state
            .units
            .get(cluster)
            .map(|units| {
                units
                    .iter()
                    .map(|(ordinal, unit)| ComputeUnit {
                        ordinal: *ordinal,
                        version: unit.version.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn exists(&self, member: &MemberRef) -> Result<Option<ComputeUnit>, Error> {
        let mut state = self.state.lock();
        state.take_failure("exists")?;

        Ok(state
            .units
            .get(&member.cluster)
            .and_then(|units| units.get(&member.ordinal))
            .map(|unit| ComputeUnit {
                ordinal: member.ordinal,
                version: unit.version.clone(),
            }))
    }

    async fn create(&self, member: &MemberRef, params: &BootstrapParams) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.take_failure("create")?;

        let units = state.units.entry(member.cluster.clone()).or_default();
        if units.contains_key(&member.ordinal) {
            return Err(Error::Failed(format!("{} already exists", member.name())));
        }
        units.insert(
            member.ordinal,
            SimulatedMember {
                version: Some(params.image.clone()),
                role: None,
                starting_left: 0,
            },
        );
        state
            .calls
            .push(format!("create {} {}", member.name(), params.image));
        Ok(())
    }

    async fn delete(&self, member: &MemberRef) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.take_failure("delete")?;

        if let Some(units) = state.units.get_mut(&member.cluster) {
            units.remove(&member.ordinal);
        }
        state.calls.push(format!("delete {}", member.name()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn commands(cluster: &MockCluster, id: &ClusterId) -> MockCommands {
        cluster.commands_for(
            id,
            &ResolvedCommands {
                status: Vec::new(),
                sequence: Vec::new(),
                stop: Vec::new(),
                seed: Vec::new(),
                primary: Vec::new(),
                secondary: Vec::new(),
            },
        )
    }

    #[tokio::test]
    async fn started_members_report_starting_then_healthy() {
        let id = ClusterId::named("g");
        let cluster = MockCluster::new().with_startup_passes(1);
        let commands = commands(&cluster, &id);
        let member = MemberRef::new(id.clone(), Ordinal(0));

        cluster
            .create(&member, &BootstrapParams::default())
            .await
            .unwrap();
        assert_eq!(
            commands.status(&member).await.unwrap(),
            StatusReport::new(Health::Unhealthy, Role::Unknown)
        );

        commands.seed(&member).await.unwrap();
        assert_eq!(
            commands.status(&member).await.unwrap().health,
            Health::Starting
        );
        assert_eq!(
            commands.status(&member).await.unwrap(),
            StatusReport::new(Health::Healthy, Role::Seed)
        );
    }

    #[tokio::test]
    async fn joiners_need_a_serving_peer() {
        let id = ClusterId::named("g");
        let cluster = MockCluster::new();
        let commands = commands(&cluster, &id);
        let joiner = MemberRef::new(id.clone(), Ordinal(1));
        let peer = MemberRef::new(id.clone(), Ordinal(0));

        let params = BootstrapParams {
            image: "v1".to_string(),
            ..BootstrapParams::default()
        };
        cluster.create(&joiner, &params).await.unwrap();
        assert_matches!(
            commands.primary(&joiner, &peer).await,
            Err(Error::Failed(_))
        );

        cluster.insert_running(&id, 0, Role::Seed, "v1");
        commands.primary(&joiner, &peer).await.unwrap();
        assert_eq!(cluster.mutations(), vec!["create g-0001 v1", "primary g-0001 g-0000"]);
    }

    #[tokio::test]
    async fn injected_failures_and_unreachable_members() {
        let id = ClusterId::named("g");
        let cluster = MockCluster::new();
        let commands = commands(&cluster, &id);
        let member = MemberRef::new(id.clone(), Ordinal(0));
        cluster.insert_running(&id, 0, Role::Seed, "v1");

        cluster.fail_next("stop");
        assert_matches!(commands.stop(&member).await, Err(Error::Failed(_)));
        commands.stop(&member).await.unwrap();

        cluster.set_unreachable(&id, 0, true);
        assert_matches!(commands.status(&member).await, Err(Error::Unreachable(_)));
        assert!(cluster.exists(&member).await.unwrap().is_some());
    }
}
