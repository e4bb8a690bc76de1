//! `replay` command: drive controllers from a recorded trace.
//!
//! Every element in the trace gets its own [`AttachmentController`] sharing
//! one [`RecordingFetchService`]. After the last step all elements still
//! alive are unmounted and delayed releases flushed; anything still open at
//! that point is a leak.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use imagebind::{
    AmbientConfig, AttachmentController, ConfigStore, ElementId, ImageContext, LifecycleResult,
    RangeGeometry, RecordingFetchService,
};

use crate::commands::load_config;
use crate::error::CliError;
use crate::trace::{Trace, TraceEvent};

/// Arguments for `replay`.
#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// JSON trace file
    pub trace: PathBuf,

    /// INI configuration file (defaults apply if omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Counters reported after a replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub elements: usize,
    pub steps: usize,
    pub rejected: usize,
    pub implicit_unmounts: usize,
    pub fetch_calls: usize,
    pub operations: u64,
    pub primary_operations: usize,
    pub prefetches: usize,
    pub releases: usize,
    pub priority_hints: usize,
    pub open_handles: usize,
    pub attached: usize,
}

impl ReplaySummary {
    pub fn leaked(&self) -> bool {
        self.open_handles > 0 || self.attached > 0
    }

    fn print(&self) {
        println!("Replay Summary");
        println!("==============");
        println!("  Elements:            {}", self.elements);
        println!("  Steps:               {}", self.steps);
        println!("  Rejected events:     {}", self.rejected);
        println!("  Implicit unmounts:   {}", self.implicit_unmounts);
        println!();
        println!("  Fetch calls:         {}", self.fetch_calls);
        println!("  Operations started:  {}", self.operations);
        println!("  Primary operations:  {}", self.primary_operations);
        println!("  Prefetches:          {}", self.prefetches);
        println!("  Releases:            {}", self.releases);
        println!("  Priority hints:      {}", self.priority_hints);
        println!();
        println!("  Open handles:        {}", self.open_handles);
        println!("  Attached elements:   {}", self.attached);
    }
}

/// Run the replay command.
pub fn run(args: ReplayArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;
    let trace = Trace::load(&args.trace)?;

    let summary = replay(&trace, config);
    summary.print();

    if summary.leaked() {
        return Err(CliError::Leak {
            open_handles: summary.open_handles,
            attached: summary.attached,
        });
    }
    Ok(())
}

/// Replay a validated trace.
pub fn replay(trace: &Trace, config: AmbientConfig) -> ReplaySummary {
    let fetcher = Arc::new(RecordingFetchService::new());
    let store = Arc::new(ConfigStore::new(config));
    let context = ImageContext::new(store, fetcher.clone());

    let mut controllers: BTreeMap<u64, AttachmentController> = trace
        .elements
        .iter()
        .map(|spec| {
            let controller =
                AttachmentController::new(ElementId(spec.id), spec.props(), context.clone());
            (spec.id, controller)
        })
        .collect();

    let mut summary = ReplaySummary {
        elements: trace.elements.len(),
        steps: trace.steps.len(),
        ..Default::default()
    };

    for (index, step) in trace.steps.iter().enumerate() {
        if step.event == TraceEvent::Flush {
            let flushed = fetcher.flush_delayed_releases();
            tracing::debug!(step = index, flushed, "Delayed releases flushed");
            continue;
        }

        let Some(controller) = step.element.and_then(|id| controllers.get_mut(&id)) else {
            tracing::warn!(step = index, "Step without a known element skipped");
            summary.rejected += 1;
            continue;
        };

        if let Err(e) = apply(controller, step.event) {
            tracing::info!(step = index, error = %e, "Event rejected");
            summary.rejected += 1;
        }
    }

    for controller in controllers.values_mut() {
        if !controller.state().is_terminal() && controller.unmount().is_ok() {
            summary.implicit_unmounts += 1;
        }
    }
    fetcher.flush_delayed_releases();

    summary.fetch_calls = fetcher.fetch_calls();
    summary.operations = fetcher.operations();
    summary.primary_operations = fetcher.primary_operations();
    summary.prefetches = fetcher.prefetches();
    summary.releases = fetcher.releases();
    summary.priority_hints = fetcher.priority_hints().len();
    summary.open_handles = fetcher.open_handles();
    summary.attached = fetcher.attached_count();
    summary
}

fn apply(controller: &mut AttachmentController, event: TraceEvent) -> LifecycleResult<()> {
    match event {
        TraceEvent::Prepare => controller.prepare(),
        TraceEvent::Mount => controller.mount(),
        TraceEvent::Bind => controller.bind(),
        TraceEvent::Unbind => controller.unbind(),
        TraceEvent::Unmount => controller.unmount(),
        TraceEvent::Enter(band) => controller.enter(band),
        TraceEvent::Exit(band) => controller.exit(band),
        TraceEvent::Observe {
            position,
            first_visible,
            last_visible,
        } => controller.observe(RangeGeometry::new(position, first_visible, last_visible)),
        TraceEvent::Bounds {
            width,
            height,
            padding_x,
            padding_y,
        } => controller.on_bounds_defined(width, height, padding_x, padding_y),
        TraceEvent::Flush => Ok(()),
    }
}
