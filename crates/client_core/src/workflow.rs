//! Runs the five remote stages against the workbench.
//!
//! A run is split in three: [`prepare`] snapshots what the stage needs from
//! the workbench, [`WorkflowOrchestrator::execute`] does the network call, and
//! [`Workbench::apply`] folds the answer back in. The workbench lock is never
//! held across the network call, so overlapping runs apply in completion order.

use shared::{
    domain::{Lane, LanePair},
    protocol::StageAction,
};
use tokio::sync::Mutex;

use crate::{
    config::RegionUnits,
    error::WorkflowError,
    geometry::denormalize,
    stage::{StageInput, StageRequest, StageResponse, StageTransport},
    workbench::Workbench,
};

pub const MISSING_IMAGES: &str = "Select both an original and a test signature first.";

/// Builds the request for `action` from the current workbench state. Fails
/// without side effects when an image or a required region is missing.
pub fn prepare(action: StageAction, bench: &Workbench) -> Result<StageRequest, WorkflowError> {
    if Lane::ALL
        .iter()
        .any(|lane| bench.lane(*lane).current_image().is_none())
    {
        return Err(WorkflowError::Precondition(MISSING_IMAGES.to_string()));
    }

    let inputs = LanePair::try_from_fn(|lane| {
        let state = bench.lane(lane);
        let image = state
            .current_image()
            .ok_or_else(|| WorkflowError::Precondition(MISSING_IMAGES.to_string()))?;

        let region = match action {
            StageAction::Clear => {
                let rect = state.selection().map(|rect| rect.ordered()).ok_or_else(|| {
                    WorkflowError::Precondition(format!(
                        "Select a region on the {lane} signature before clearing."
                    ))
                })?;
                Some(match bench.clear_region_units() {
                    RegionUnits::Normalized => rect.to_array(),
                    RegionUnits::Pixel => {
                        let px = denormalize(
                            rect,
                            f64::from(image.width()),
                            f64::from(image.height()),
                        );
                        [px.y1, px.x1, px.y2, px.x2]
                    }
                })
            }
            _ => None,
        };

        Ok(StageInput {
            file_name: format!("{}.{}", lane.field_name(), image.extension()),
            mime_type: image.mime_type(),
            bytes: image.bytes().clone(),
            region,
        })
    })?;

    Ok(StageRequest { action, inputs })
}

pub struct WorkflowOrchestrator<T> {
    transport: T,
}

impl<T: StageTransport> WorkflowOrchestrator<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn execute(&self, request: StageRequest) -> Result<StageResponse, WorkflowError> {
        self.transport.dispatch(request).await
    }

    /// Prepares, executes and applies `action`. Any failure is also rendered
    /// into the workbench's results area.
    pub async fn run(
        &self,
        action: StageAction,
        bench: &Mutex<Workbench>,
    ) -> Result<(), WorkflowError> {
        let prepared = {
            let guard = bench.lock().await;
            prepare(action, &guard)
        };
        let request = match prepared {
            Ok(request) => request,
            Err(err) => {
                tracing::debug!(stage = %action, "stage not started: {err}");
                bench.lock().await.report_error(&err);
                return Err(err);
            }
        };

        let outcome = self.execute(request).await;

        let mut guard = bench.lock().await;
        let result = outcome.and_then(|response| guard.apply(response));
        if let Err(err) = &result {
            guard.report_error(err);
        }
        result
    }
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;
