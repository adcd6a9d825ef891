//! Simulation runner.

use crate::event_queue::EventKey;
use crate::monitor::{PhaseChange, SafetyMonitor, SafetyViolation};
use crate::network::{NetworkConfig, SimulatedNetwork};
use crate::NodeIndex;
use citygate_arbiter::Policy;
use citygate_core::{Action, Event, StateMachine, TimerId};
use citygate_messages::Message;
use citygate_node::{NodeConfig, NodeStateMachine};
use citygate_types::{Phase, StaticTopology, Topology, TopologyError};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, trace};

/// Counters collected while running.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationStats {
    /// Events handled by nodes.
    pub events_processed: u64,
    /// Ticks handled by nodes.
    pub ticks: u64,
    /// Point-to-point messages sent (a broadcast counts N-1).
    pub messages_sent: u64,
    /// Messages sent, by message type.
    pub messages_by_type: BTreeMap<&'static str, u64>,
    /// Entries into a city.
    pub grants: u64,
}

/// Deterministic simulation runner.
///
/// Owns every node and a single event queue. Nodes never run concurrently: the
/// runner pops the earliest event, hands it to its node and turns the returned
/// actions into new scheduled events.
pub struct SimulationRunner {
    nodes: Vec<NodeStateMachine>,
    event_queue: BTreeMap<EventKey, Event>,
    sequence: u64,
    now: Duration,
    network: SimulatedNetwork,
    /// Pending timer per node, so re-arming replaces the old one.
    timers: HashMap<(NodeIndex, TimerId), EventKey>,
    monitor: SafetyMonitor,
    phase_changes: Vec<PhaseChange>,
    stats: SimulationStats,
    initialized: bool,
}

impl SimulationRunner {
    /// Create a runner with one node per process, each driven by a seeded
    /// random policy derived from `seed`.
    pub fn new(
        network_config: NetworkConfig,
        node_config: NodeConfig,
        seed: u64,
    ) -> Result<Self, TopologyError> {
        let policy = node_config.policy.clone().with_seed(seed);
        let node_config = node_config.with_policy(policy);
        let topologies =
            StaticTopology::group(network_config.num_processes, network_config.num_resources)?;
        let nodes = topologies
            .into_iter()
            .map(|topology| {
                let index = topology.local_process_id().0;
                NodeStateMachine::new(index, topology.into_arc(), node_config.clone())
            })
            .collect();
        Ok(Self::with_nodes(nodes, network_config, seed))
    }

    /// Create a runner whose nodes use the given policies, one per process.
    pub fn with_policies(
        network_config: NetworkConfig,
        node_config: NodeConfig,
        policies: Vec<Box<dyn Policy>>,
        seed: u64,
    ) -> Result<Self, TopologyError> {
        let topologies =
            StaticTopology::group(network_config.num_processes, network_config.num_resources)?;
        let nodes = topologies
            .into_iter()
            .zip(policies)
            .map(|(topology, policy)| {
                let index = topology.local_process_id().0;
                NodeStateMachine::with_policy(
                    index,
                    topology.into_arc(),
                    node_config.clone(),
                    policy,
                )
            })
            .collect();
        Ok(Self::with_nodes(nodes, network_config, seed))
    }

    /// Create a runner over prebuilt nodes.
    pub fn with_nodes(
        nodes: Vec<NodeStateMachine>,
        network_config: NetworkConfig,
        seed: u64,
    ) -> Self {
        Self {
            nodes,
            event_queue: BTreeMap::new(),
            sequence: 0,
            now: Duration::ZERO,
            network: SimulatedNetwork::new(network_config, seed),
            timers: HashMap::new(),
            monitor: SafetyMonitor::new(),
            phase_changes: Vec::new(),
            stats: SimulationStats::default(),
            initialized: false,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════════

    /// Current simulated time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Get a node by index.
    pub fn node(&self, index: NodeIndex) -> Option<&NodeStateMachine> {
        self.nodes.get(index as usize)
    }

    /// Get every node.
    pub fn nodes(&self) -> &[NodeStateMachine] {
        &self.nodes
    }

    /// Get the collected counters.
    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// Every mutual-exclusion violation seen so far.
    pub fn violations(&self) -> &[SafetyViolation] {
        self.monitor.violations()
    }

    /// Number of events waiting in the queue.
    pub fn pending_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Take the phase changes recorded since the last call.
    pub fn take_phase_changes(&mut self) -> Vec<PhaseChange> {
        std::mem::take(&mut self.phase_changes)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Running
    // ═══════════════════════════════════════════════════════════════════════════

    /// Start every node. First ticks are staggered over one tick interval.
    ///
    /// Called automatically by the run methods.
    pub fn initialize(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;

        for index in 0..self.nodes.len() as NodeIndex {
            let node = &self.nodes[index as usize];
            let tick_interval = node.config().tick_interval;
            let actions = node.start();
            let offset = self.network.jitter(tick_interval);
            for action in actions {
                match action {
                    Action::SetTimer { id, duration } => {
                        self.set_timer(index, id, offset + duration);
                    }
                    other => self.process_action(index, other),
                }
            }
        }

        debug!(nodes = self.nodes.len(), "Simulation initialized");
    }

    /// Process the earliest event. Returns `false` when the queue is empty.
    pub fn step(&mut self) -> bool {
        self.initialize();

        let Some((key, event)) = self.event_queue.pop_first() else {
            return false;
        };
        if let Event::Tick = event {
            self.timers.remove(&(key.node, TimerId::Tick));
            self.stats.ticks += 1;
        }

        self.now = key.time;
        let node = &mut self.nodes[key.node as usize];
        node.set_time(self.now);
        trace!(node = key.node, event = event.type_name(), time = ?self.now, "Processing event");
        let actions = node.handle(event);
        self.stats.events_processed += 1;

        for action in actions {
            self.process_action(key.node, action);
        }
        true
    }

    /// Process every event scheduled up to and including `end`.
    pub fn run_until(&mut self, end: Duration) {
        self.initialize();
        while self
            .event_queue
            .first_key_value()
            .is_some_and(|(key, _)| key.time <= end)
        {
            self.step();
        }
        self.now = self.now.max(end);
    }

    /// Run for `duration` of simulated time from now.
    pub fn run_for(&mut self, duration: Duration) {
        let end = self.now + duration;
        self.run_until(end);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Actions
    // ═══════════════════════════════════════════════════════════════════════════

    fn process_action(&mut self, from: NodeIndex, action: Action) {
        trace!(node = from, action = action.type_name(), "Processing action");
        match action {
            Action::Send { to, message } => self.send(from, to.0, message),
            Action::Broadcast { message } => {
                let peers: Vec<_> = self.network.peers(from).collect();
                for to in peers {
                    self.send(from, to, message);
                }
            }
            Action::SetTimer { id, duration } => {
                let at = self.now + duration;
                self.set_timer(from, id, at);
            }
            Action::EmitPhaseChange {
                process,
                resource,
                from: previous,
                to,
                clock,
            } => {
                let change = PhaseChange {
                    time: self.now,
                    process,
                    resource,
                    from: previous,
                    to,
                    clock,
                };
                self.monitor.observe(&change);
                if to == Phase::InResource {
                    self.stats.grants += 1;
                }
                self.phase_changes.push(change);
            }
        }
    }

    fn send(&mut self, from: NodeIndex, to: NodeIndex, message: Message) {
        if to as usize >= self.nodes.len() {
            debug!(from, to, "Dropping message to unknown node");
            return;
        }
        let at = self.network.delivery_time(from, to, self.now);
        self.stats.messages_sent += 1;
        *self
            .stats
            .messages_by_type
            .entry(message.type_name())
            .or_default() += 1;
        self.schedule(to, at, Event::from_message(message));
    }

    fn set_timer(&mut self, node: NodeIndex, id: TimerId, at: Duration) {
        if let Some(old) = self.timers.remove(&(node, id)) {
            self.event_queue.remove(&old);
        }
        let event = match id {
            TimerId::Tick => Event::Tick,
        };
        let key = self.schedule(node, at, event);
        self.timers.insert((node, id), key);
    }

    fn schedule(&mut self, node: NodeIndex, at: Duration, event: Event) -> EventKey {
        self.sequence += 1;
        let key = EventKey::new(at, &event, node, self.sequence);
        self.event_queue.insert(key, event);
        key
    }
}
