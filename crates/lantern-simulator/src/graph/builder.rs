use super::{DependencyGraph, Node, NodeId, NodeKind};
use crate::error::{LanternError, Result};
use crate::graph::node::CpuTask;
use crate::network_analyzer::NetworkAnalyzer;
use lantern_abstract::{ErrorCode, NetworkRequest, ResourceType, TraceEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub const SCHEDULABLE_TASK_TITLES: [&str; 4] = [
    "RunTask",
    "ThreadControllerImpl::RunTask",
    "ThreadControllerImpl::DoWork",
    "TaskQueueManager::ProcessTaskFromWorkQueue",
];

/// Tasks shorter than this (ms) are candidates for pruning.
pub const SIGNIFICANT_DUR_THRESHOLD_MS: f64 = 10.0;

/// How far (µs) a CPU task may start before a request ends and still depend on it.
const MINIMUM_TIME_SINCE_NETWORK_END: f64 = -100.0 * 1000.0;

pub fn is_schedulable_task(event: &TraceEvent) -> bool {
    SCHEDULABLE_TASK_TITLES.contains(&event.name.as_str())
}

#[derive(Default)]
struct NetworkNodeIndex {
    ids: Vec<NodeId>,
    by_request_id: HashMap<String, NodeId>,
    by_url: HashMap<String, Vec<NodeId>>,
    /// `None` once more than one root document claims the frame.
    by_frame: HashMap<String, Option<NodeId>>,
}

pub struct PageDependencyGraph;

impl PageDependencyGraph {
    /// Builds the graph of a page load from its main thread events (sorted by
    /// `ts`) and its network records.
    pub fn create_graph(
        main_thread_events: &[TraceEvent],
        network_requests: &[NetworkRequest],
        requested_url: &str,
        main_document_url: &str,
    ) -> Result<DependencyGraph> {
        let (mut nodes, index) = Self::network_nodes(network_requests);
        let cpu_tasks = Self::cpu_tasks(main_thread_events)?;

        let kept: Vec<&NetworkRequest> = nodes
            .iter()
            .filter_map(|n| n.as_network().map(|n| n.request.as_ref()))
            .collect();
        let root = NetworkAnalyzer::find_resource_for_url(&kept, requested_url)
            .and_then(|r| index.by_request_id.get(&r.request_id).copied())
            .ok_or(LanternError::MissingMarker(ErrorCode::NoResourceRequest))?;
        let main_document = NetworkAnalyzer::find_last_document_for_url(&kept, main_document_url)
            .and_then(|r| index.by_request_id.get(&r.request_id).copied())
            .ok_or(LanternError::MissingMarker(ErrorCode::NoResourceRequest))?;

        let first_cpu = nodes.len();
        nodes.extend(cpu_tasks.into_iter().map(Node::cpu));
        let cpu_ids: Vec<NodeId> = (first_cpu..nodes.len()).map(NodeId).collect();

        let mut graph = DependencyGraph::from_parts(nodes, root);
        Self::link_network_nodes(&mut graph, &index)?;
        Self::link_cpu_nodes(&mut graph, &index, &cpu_ids)?;
        graph.set_is_main_document(main_document, true);

        if graph.has_cycle() {
            return Err(LanternError::CycleDetected);
        }
        debug!(
            "Built dependency graph: {} network nodes, {} cpu nodes, {} reachable",
            index.ids.len(),
            cpu_ids.len(),
            graph.reachable().len()
        );
        Ok(graph)
    }

    fn network_nodes(network_requests: &[NetworkRequest]) -> (Vec<Node>, NetworkNodeIndex) {
        let mut nodes = Vec::new();
        let mut index = NetworkNodeIndex::default();

        for request in network_requests {
            if request.mime_type.starts_with("video") || request.from_worker {
                continue;
            }

            let mut request_id = request.request_id.clone();
            while index.by_request_id.contains_key(&request_id) {
                request_id.push_str(":duplicate");
            }
            let request = if request_id == request.request_id {
                Arc::new(request.clone())
            } else {
                Arc::new(NetworkRequest {
                    request_id: request_id.clone(),
                    ..request.clone()
                })
            };

            let id = NodeId(nodes.len());
            index.ids.push(id);
            index.by_request_id.insert(request_id, id);
            index.by_url.entry(request.url.clone()).or_default().push(id);
            if let Some(frame_id) = &request.frame_id
                && request.is_resource_type(ResourceType::Document)
                && request.document_url == request.url
            {
                let value = if index.by_frame.contains_key(frame_id) {
                    None
                } else {
                    Some(id)
                };
                index.by_frame.insert(frame_id.clone(), value);
            }
            nodes.push(Node::network(request));
        }
        (nodes, index)
    }

    /// Groups main thread events under the top-level task that contains them.
    pub fn cpu_tasks(main_thread_events: &[TraceEvent]) -> Result<Vec<CpuTask>> {
        if !main_thread_events.iter().any(is_schedulable_task) {
            return Err(LanternError::MissingMarker(ErrorCode::NoTopLevelEvents));
        }

        let is_task = |e: &TraceEvent| is_schedulable_task(e) && e.dur.is_some_and(|d| d > 0.0);
        let mut tasks = Vec::new();
        let mut i = 0;
        while i < main_thread_events.len() {
            let event = &main_thread_events[i];
            i += 1;
            if !is_task(event) {
                continue;
            }

            let end = event.end_ts();
            let mut corrected_end_ts = None;
            let mut child_events = Vec::new();
            while i < main_thread_events.len() && main_thread_events[i].ts < end {
                let child = &main_thread_events[i];
                if is_task(child) {
                    corrected_end_ts = Some(child.ts - 1.0);
                    break;
                }
                child_events.push(child.clone());
                i += 1;
            }

            tasks.push(CpuTask {
                event: event.clone(),
                child_events,
                corrected_end_ts,
            });
        }
        Ok(tasks)
    }

    fn link_network_nodes(graph: &mut DependencyGraph, index: &NetworkNodeIndex) -> Result<()> {
        let root = graph.root();
        for &id in &index.ids {
            let Some(request) = graph.node(id).as_network().map(|n| Arc::clone(&n.request)) else {
                continue;
            };
            let start = graph.node(id).start_time();

            let direct_initiator = request
                .initiator_request
                .as_deref()
                .and_then(|rid| index.by_request_id.get(rid).copied())
                .unwrap_or(root);
            let can_depend_on_initiator = !graph.is_dependent_on(direct_initiator, id)
                && graph.node(id).can_depend_on(graph.node(direct_initiator));

            let initiator_urls = request
                .initiator
                .as_ref()
                .map(|i| i.urls())
                .unwrap_or_default();
            if initiator_urls.is_empty() && can_depend_on_initiator {
                graph.add_dependent(direct_initiator, id)?;
            }
            for url in initiator_urls {
                let candidates = index.by_url.get(&url).map(Vec::as_slice).unwrap_or(&[]);
                let parent = candidates
                    .iter()
                    .copied()
                    .filter(|c| {
                        graph.node(*c).start_time() <= start && !graph.is_dependent_on(*c, id)
                    })
                    .min_by(|a, b| graph.node(*a).start_time().total_cmp(&graph.node(*b).start_time()));
                match parent {
                    Some(parent) => graph.add_dependency(id, parent)?,
                    None if can_depend_on_initiator => graph.add_dependent(direct_initiator, id)?,
                    None => {}
                }
            }

            if id != root
                && graph.node(id).dependencies().is_empty()
                && graph.node(id).can_depend_on(graph.node(root))
            {
                graph.add_dependency(id, root)?;
            }

            if let Some(destination) = request
                .redirect_destination
                .as_deref()
                .and_then(|rid| index.by_request_id.get(rid).copied())
                && destination != id
            {
                graph.add_dependency(destination, id)?;
            }
        }
        Ok(())
    }

    fn link_cpu_nodes(
        graph: &mut DependencyGraph,
        index: &NetworkNodeIndex,
        cpu_ids: &[NodeId],
    ) -> Result<()> {
        let root = graph.root();
        let mut timers: HashMap<u64, NodeId> = HashMap::new();

        for &id in cpu_ids {
            let task = match &graph.node(id).kind {
                NodeKind::Cpu(task) => Arc::clone(task),
                NodeKind::Network(_) => continue,
            };
            for event in &task.child_events {
                let Some(data) = event.data() else {
                    continue;
                };
                let stack_urls: Vec<&str> = data
                    .stack_trace
                    .iter()
                    .flatten()
                    .map(|f| f.url.as_str())
                    .filter(|u| !u.is_empty())
                    .collect();

                match event.name.as_str() {
                    "TimerInstall" => {
                        if let Some(timer_id) = data.timer_id {
                            timers.insert(timer_id, id);
                        }
                        for url in &stack_urls {
                            Self::add_dependency_on_url(graph, index, id, url)?;
                        }
                    }
                    "TimerFire" => {
                        let installer = data.timer_id.and_then(|t| timers.get(&t).copied());
                        if let Some(installer) = installer
                            && installer != id
                            && graph.node(installer).end_time() <= graph.node(id).start_time()
                        {
                            graph.add_dependent(installer, id)?;
                        }
                    }
                    "InvalidateLayout" | "ScheduleStyleRecalculation" => {
                        for url in &stack_urls {
                            Self::add_dependency_on_url(graph, index, id, url)?;
                        }
                    }
                    "EvaluateScript" => {
                        Self::add_dependency_on_frame(graph, index, id, data.frame.as_deref())?;
                        if let Some(url) = data.url.as_deref() {
                            Self::add_dependency_on_url(graph, index, id, url)?;
                        }
                        for url in &stack_urls {
                            Self::add_dependency_on_url(graph, index, id, url)?;
                        }
                    }
                    "XHRReadyStateChange" => {
                        if data.ready_state != Some(4) {
                            continue;
                        }
                        if let Some(url) = data.url.as_deref() {
                            Self::add_dependency_on_url(graph, index, id, url)?;
                        }
                        for url in &stack_urls {
                            Self::add_dependency_on_url(graph, index, id, url)?;
                        }
                    }
                    "FunctionCall" | "v8.compile" => {
                        Self::add_dependency_on_frame(graph, index, id, data.frame.as_deref())?;
                        if let Some(url) = data.url.as_deref() {
                            Self::add_dependency_on_url(graph, index, id, url)?;
                        }
                    }
                    "ParseAuthorStyleSheet" => {
                        Self::add_dependency_on_frame(graph, index, id, data.frame.as_deref())?;
                        if let Some(url) = data.style_sheet_url.as_deref() {
                            Self::add_dependency_on_url(graph, index, id, url)?;
                        }
                    }
                    "ResourceSendRequest" => {
                        Self::add_dependency_on_frame(graph, index, id, data.frame.as_deref())?;
                        if let Some(request_id) = data.request_id.as_deref() {
                            Self::add_dependent_network_request(graph, index, id, request_id)?;
                        }
                        for url in &stack_urls {
                            Self::add_dependency_on_url(graph, index, id, url)?;
                        }
                    }
                    _ => {}
                }
            }

            if graph.node(id).dependencies().is_empty()
                && graph.node(id).can_depend_on(graph.node(root))
            {
                graph.add_dependency(id, root)?;
            }
        }

        Self::prune_short_tasks(graph, cpu_ids)
    }

    /// Links the task to the closest request for `url` that finished before it
    /// (or at most 100ms after it started).
    fn add_dependency_on_url(
        graph: &mut DependencyGraph,
        index: &NetworkNodeIndex,
        cpu: NodeId,
        url: &str,
    ) -> Result<()> {
        let cpu_start = graph.node(cpu).start_time();
        let mut best: Option<(NodeId, f64)> = None;
        for &candidate in index.by_url.get(url).map(Vec::as_slice).unwrap_or(&[]) {
            let node = graph.node(candidate);
            if cpu_start <= node.start_time() {
                return Ok(());
            }
            let distance = cpu_start - node.end_time();
            if distance >= MINIMUM_TIME_SINCE_NETWORK_END
                && best.is_none_or(|(_, min)| distance < min)
            {
                best = Some((candidate, distance));
            }
        }
        match best {
            Some((candidate, _)) => graph.add_dependency(cpu, candidate),
            None => Ok(()),
        }
    }

    fn add_dependency_on_frame(
        graph: &mut DependencyGraph,
        index: &NetworkNodeIndex,
        cpu: NodeId,
        frame: Option<&str>,
    ) -> Result<()> {
        let Some(Some(document)) = frame.and_then(|f| index.by_frame.get(f)).copied() else {
            return Ok(());
        };
        if graph.node(document).start_time() >= graph.node(cpu).start_time() {
            return Ok(());
        }
        graph.add_dependency(cpu, document)
    }

    fn add_dependent_network_request(
        graph: &mut DependencyGraph,
        index: &NetworkNodeIndex,
        cpu: NodeId,
        request_id: &str,
    ) -> Result<()> {
        let Some(network) = index.by_request_id.get(request_id).copied() else {
            return Ok(());
        };
        if graph.node(network).start_time() <= graph.node(cpu).start_time() {
            return Ok(());
        }
        let Some(request) = graph.node(network).as_network().map(|n| Arc::clone(&n.request)) else {
            return Ok(());
        };
        let resource_type = request.resource_type.or_else(|| {
            request
                .redirect_destination
                .as_deref()
                .and_then(|rid| index.by_request_id.get(rid))
                .and_then(|d| graph.node(*d).as_network())
                .and_then(|n| n.request.resource_type)
        });
        let linkable = matches!(
            resource_type,
            Some(ResourceType::Xhr | ResourceType::Fetch | ResourceType::Script | ResourceType::EventSource)
        );
        if linkable {
            graph.add_dependent(cpu, network)?;
        }
        Ok(())
    }

    /// Splices out short tasks with a single dependency and at most one dependent,
    /// keeping the first layout, paint and parse tasks.
    fn prune_short_tasks(graph: &mut DependencyGraph, cpu_ids: &[NodeId]) -> Result<()> {
        let minimum_duration = SIGNIFICANT_DUR_THRESHOLD_MS * 1000.0;
        let mut found_layout = false;
        let mut found_paint = false;
        let mut found_parse = false;

        for &id in cpu_ids {
            let Some(task) = graph.node(id).as_cpu() else {
                continue;
            };
            let mut is_first = false;
            if !found_layout && task.has_child("Layout") {
                found_layout = true;
                is_first = true;
            }
            if !found_paint && task.has_child("Paint") {
                found_paint = true;
                is_first = true;
            }
            if !found_parse && task.has_child("ParseHTML") {
                found_parse = true;
                is_first = true;
            }
            if is_first || task.duration() >= minimum_duration {
                continue;
            }

            let node = graph.node(id);
            if node.dependencies().len() != 1 || node.dependents().len() > 1 {
                continue;
            }
            let dependencies = node.dependencies().to_vec();
            let dependents = node.dependents().to_vec();
            for dependency in dependencies {
                graph.remove_dependency(id, dependency);
                for &dependent in &dependents {
                    graph.add_dependent(dependency, dependent)?;
                }
            }
            for dependent in dependents {
                graph.remove_dependency(dependent, id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_abstract::{CallFrame, CallStack, Initiator, InitiatorType, Priority, TraceEventData};

    fn request(id: &str, url: &str, kind: ResourceType, start: f64, end: f64) -> NetworkRequest {
        let mut r = NetworkRequest::new(id, url);
        r.resource_type = Some(kind);
        r.renderer_start_time = start;
        r.network_request_time = start;
        r.network_end_time = end;
        r
    }

    fn page_requests() -> Vec<NetworkRequest> {
        let mut document = request("1", "https://a.com/", ResourceType::Document, 0.0, 100.0);
        document.priority = Priority::VeryHigh;
        document.frame_id = Some("F1".into());

        let mut script = request("2", "https://a.com/app.js", ResourceType::Script, 50.0, 110.0);
        script.initiator = Some(Initiator {
            kind: InitiatorType::Parser,
            url: Some("https://a.com/".into()),
            stack: None,
        });

        let mut image = request("3", "https://a.com/img.png", ResourceType::Image, 130.0, 200.0);
        image.initiator = Some(Initiator {
            kind: InitiatorType::Script,
            url: None,
            stack: Some(CallStack {
                call_frames: vec![CallFrame {
                    url: "https://a.com/app.js".into(),
                    ..Default::default()
                }],
                parent: None,
            }),
        });

        let mut video = request("4", "https://a.com/v.mp4", ResourceType::Media, 60.0, 300.0);
        video.mime_type = "video/mp4".into();

        let duplicate = request("2", "https://a.com/other.js", ResourceType::Script, 60.0, 70.0);
        vec![document, script, image, video, duplicate]
    }

    fn main_thread() -> Vec<TraceEvent> {
        vec![
            TraceEvent::complete("RunTask", 115_000.0, 20_000.0, 1, 1),
            TraceEvent::complete("EvaluateScript", 116_000.0, 10_000.0, 1, 1).with_data(
                TraceEventData {
                    url: Some("https://a.com/app.js".into()),
                    ..Default::default()
                },
            ),
            TraceEvent::complete("RunTask", 140_000.0, 1_000.0, 1, 1),
            TraceEvent::complete("FunctionCall", 140_100.0, 500.0, 1, 1),
            TraceEvent::complete("RunTask", 200_000.0, 5_000.0, 1, 1),
            TraceEvent::complete("Layout", 200_100.0, 1_000.0, 1, 1),
        ]
    }

    fn build() -> DependencyGraph {
        PageDependencyGraph::create_graph(
            &main_thread(),
            &page_requests(),
            "https://a.com/",
            "https://a.com/",
        )
        .unwrap()
    }

    fn by_id(graph: &DependencyGraph, id: &str) -> NodeId {
        graph.find_by_id(id).unwrap()
    }

    #[test]
    fn test_network_nodes_link_to_initiators() {
        let graph = build();
        let root = graph.root();
        assert_eq!(graph.node(root).id, "1");
        assert!(graph.node(root).is_main_document());

        let script = by_id(&graph, "2");
        let image = by_id(&graph, "3");
        assert_eq!(graph.node(script).dependencies(), &[root]);
        assert_eq!(graph.node(image).dependencies(), &[script]);
        assert!(graph.find_by_id("4").is_none());

        let duplicate = by_id(&graph, "2:duplicate");
        assert_eq!(graph.node(duplicate).dependencies(), &[root]);
    }

    #[test]
    fn test_cpu_nodes_link_and_prune() {
        let graph = build();
        let script = by_id(&graph, "2");
        let evaluate = by_id(&graph, "1.115000");
        assert_eq!(graph.node(evaluate).dependencies(), &[script]);

        let short = by_id(&graph, "1.140000");
        assert!(graph.node(short).dependencies().is_empty());
        assert!(!graph.reachable().contains(&short));

        let layout = by_id(&graph, "1.200000");
        assert_eq!(graph.node(layout).dependencies(), &[graph.root()]);
        assert_eq!(graph.reachable().len(), 6);
        assert!(!graph.has_cycle());
    }

    #[test]
    fn test_overlapping_tasks_are_truncated() {
        let events = vec![
            TraceEvent::complete("RunTask", 1000.0, 5000.0, 1, 1),
            TraceEvent::complete("Layout", 1500.0, 100.0, 1, 1),
            TraceEvent::complete("RunTask", 3000.0, 1000.0, 1, 1),
        ];
        let tasks = PageDependencyGraph::cpu_tasks(&events).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].corrected_end_ts, Some(2999.0));
        assert_eq!(tasks[0].child_events.len(), 1);
    }

    #[test]
    fn test_missing_top_level_tasks_is_an_error() {
        let events = vec![TraceEvent::complete("Layout", 1500.0, 100.0, 1, 1)];
        let err = PageDependencyGraph::create_graph(&events, &page_requests(), "https://a.com/", "https://a.com/")
            .unwrap_err();
        assert_eq!(err, LanternError::MissingMarker(ErrorCode::NoTopLevelEvents));
    }

    #[test]
    fn test_missing_root_request_is_an_error() {
        let err = PageDependencyGraph::create_graph(
            &main_thread(),
            &page_requests(),
            "https://b.com/",
            "https://a.com/",
        )
        .unwrap_err();
        assert_eq!(err, LanternError::MissingMarker(ErrorCode::NoResourceRequest));
    }
}
