//! Shared artifacts every metric draws from, resolved through the cache.

use crate::cache::{ArtifactKey, ComputedCache};
use crate::error::Result;
use crate::trace_processor::{ProcessedNavigation, ProcessedTrace, TraceProcessor};
use lantern_abstract::{NetworkRequest, PageArtifacts, Settings};
use lantern_simulator::{DependencyGraph, NetworkAnalysis, NetworkAnalyzer, PageDependencyGraph, Simulator};
use std::rc::Rc;

/// The inputs of one report run.
#[derive(Debug, Clone, Copy)]
pub struct MetricInputs<'a> {
    pub artifacts: &'a PageArtifacts,
    pub settings: &'a Settings,
}

impl<'a> MetricInputs<'a> {
    pub fn new(artifacts: &'a PageArtifacts, settings: &'a Settings) -> Self {
        Self {
            artifacts,
            settings,
        }
    }

    pub fn network_records(&self) -> Vec<&'a NetworkRequest> {
        self.artifacts.network_requests.iter().collect()
    }
}

pub fn processed_trace(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<Rc<ProcessedTrace>> {
    cache.get_or_compute(ArtifactKey::ProcessedTrace, |_| {
        TraceProcessor::process_trace(&inputs.artifacts.trace_events)
    })
}

pub fn processed_navigation(
    inputs: &MetricInputs,
    cache: &mut ComputedCache,
) -> Result<Rc<ProcessedNavigation>> {
    cache.get_or_compute(ArtifactKey::ProcessedNavigation, |cache| {
        let trace = processed_trace(inputs, cache)?;
        TraceProcessor::process_navigation(&trace)
    })
}

pub fn network_analysis(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<Rc<NetworkAnalysis>> {
    cache.get_or_compute(ArtifactKey::NetworkAnalysis, |_| {
        Ok(NetworkAnalyzer::analyze(&inputs.network_records())?)
    })
}

pub fn dependency_graph(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<Rc<DependencyGraph>> {
    cache.get_or_compute(ArtifactKey::DependencyGraph, |cache| {
        let trace = processed_trace(inputs, cache)?;
        let artifacts = inputs.artifacts;
        Ok(PageDependencyGraph::create_graph(
            &trace.main_thread_events,
            &artifacts.network_requests,
            &artifacts.requested_url,
            &artifacts.main_document_url,
        )?)
    })
}

pub fn load_simulator(inputs: &MetricInputs, cache: &mut ComputedCache) -> Result<Rc<Simulator>> {
    cache.get_or_compute(ArtifactKey::Simulator, |cache| {
        let analysis = network_analysis(inputs, cache)?;
        Ok(Simulator::from_settings(inputs.settings, &analysis)?)
    })
}
