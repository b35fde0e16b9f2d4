//! The two-lane workbench: lane state, canvases, drag selection and the
//! results area, owned by a single UI thread.

use std::sync::Arc;

use shared::{
    domain::{Lane, LanePair, NormalizedRect, PixelRect},
    error::ApiError,
    protocol::{StageAction, VerdictRow},
};

use crate::{
    blob::BlobRegistry,
    config::RegionUnits,
    error::{ImageError, WorkflowError},
    geometry::{CanvasBounds, PointerEvent},
    lane::{LaneState, SourceImage},
    render::LaneCanvas,
    selection::{PointerRelease, SelectionController, SelectionUpdate},
    stage::{StagePayload, StageResponse},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResultsPanel {
    #[default]
    Empty,
    Table(Vec<VerdictRow>),
    Message(ApiError),
}

#[derive(Debug, Default)]
pub struct Workbench {
    lanes: LanePair<LaneState>,
    canvases: LanePair<LaneCanvas>,
    selection: SelectionController,
    registry: BlobRegistry,
    results: ResultsPanel,
    clear_region_units: RegionUnits,
}

impl Workbench {
    pub fn new(clear_region_units: RegionUnits) -> Self {
        Self {
            clear_region_units,
            ..Self::default()
        }
    }

    pub fn lane(&self, lane: Lane) -> &LaneState {
        self.lanes.get(lane)
    }

    pub fn canvas(&self, lane: Lane) -> &LaneCanvas {
        self.canvases.get(lane)
    }

    pub fn results(&self) -> &ResultsPanel {
        &self.results
    }

    pub fn registry(&self) -> &BlobRegistry {
        &self.registry
    }

    pub fn clear_region_units(&self) -> RegionUnits {
        self.clear_region_units
    }

    pub fn is_dragging(&self, lane: Lane) -> bool {
        self.selection.is_dragging(lane)
    }

    /// Decodes `bytes` and makes it the lane's source. On failure the lane is
    /// left as it was.
    pub fn select_source(
        &mut self,
        lane: Lane,
        name: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<(), ImageError> {
        let image = SourceImage::decode(name, bytes, &self.registry)?;
        tracing::info!(
            %lane,
            name = image.name(),
            width = image.width(),
            height = image.height(),
            "selected source image"
        );
        self.lanes.get_mut(lane).set_source(image);
        self.redraw(lane, None);
        Ok(())
    }

    pub fn pointer_down(
        &mut self,
        lane: Lane,
        event: PointerEvent,
        bounds: CanvasBounds,
    ) -> SelectionUpdate {
        let update = self
            .selection
            .begin(lane, event, bounds, self.lanes.get_mut(lane));
        self.redraw_for(lane, update);
        update
    }

    pub fn pointer_move(
        &mut self,
        lane: Lane,
        event: PointerEvent,
        bounds: CanvasBounds,
    ) -> SelectionUpdate {
        let update = self.selection.update(lane, event, bounds, self.lanes.get(lane));
        self.redraw_for(lane, update);
        update
    }

    pub fn pointer_up(
        &mut self,
        lane: Lane,
        event: PointerEvent,
        bounds: CanvasBounds,
    ) -> SelectionUpdate {
        self.release(lane, PointerRelease::Up(event), bounds)
    }

    pub fn pointer_leave(&mut self, lane: Lane, bounds: CanvasBounds) -> SelectionUpdate {
        self.release(lane, PointerRelease::Leave, bounds)
    }

    fn release(
        &mut self,
        lane: Lane,
        release: PointerRelease,
        bounds: CanvasBounds,
    ) -> SelectionUpdate {
        let update = self
            .selection
            .end(lane, release, bounds, self.lanes.get_mut(lane));
        self.redraw_for(lane, update);
        update
    }

    fn redraw_for(&mut self, lane: Lane, update: SelectionUpdate) {
        match update {
            SelectionUpdate::Ignored => {}
            SelectionUpdate::Live(rect) => self.redraw(lane, Some(rect)),
            SelectionUpdate::Committed(_) => self.redraw(lane, None),
        }
    }

    fn redraw(&mut self, lane: Lane, live: Option<PixelRect>) {
        self.canvases.get_mut(lane).render(self.lanes.get(lane), live);
    }

    fn redraw_all(&mut self) {
        for lane in Lane::ALL {
            self.redraw(lane, None);
        }
    }

    /// Applies a successful stage result. Returned images are decoded for both
    /// lanes before either lane is touched.
    pub fn apply(&mut self, response: StageResponse) -> Result<(), WorkflowError> {
        let action = response.action;
        match response.payload {
            StagePayload::Images(images) => {
                let decoded = images.try_map(|lane, bytes| {
                    SourceImage::decode(
                        format!("{}-{action}", lane.field_name()),
                        bytes,
                        &self.registry,
                    )
                    .map_err(|source| WorkflowError::Image { action, source })
                })?;
                for (lane, image) in [(Lane::Original, decoded.original), (Lane::Test, decoded.test)] {
                    let state = self.lanes.get_mut(lane);
                    state.set_processed(image);
                    if action == StageAction::Clear {
                        state.clear_overlays();
                    }
                }
                self.clear_stale_message();
            }
            StagePayload::Detections(rects) => {
                for (lane, rects) in [(Lane::Original, rects.original), (Lane::Test, rects.test)] {
                    let rects: Vec<NormalizedRect> = rects
                        .into_iter()
                        .filter(NormalizedRect::is_finite)
                        .map(|rect| rect.ordered().clamped())
                        .collect();
                    tracing::debug!(%lane, count = rects.len(), "applying detections");
                    let state = self.lanes.get_mut(lane);
                    if let Some(last) = rects.last() {
                        state.set_selection(Some(*last));
                    }
                    state.set_detections(rects);
                }
                self.clear_stale_message();
            }
            StagePayload::Verdict(rows) => {
                self.results = ResultsPanel::Table(rows);
            }
        }
        self.redraw_all();
        Ok(())
    }

    /// Renders a failed stage into the results area. Lane state is kept.
    pub fn report_error(&mut self, err: &WorkflowError) {
        tracing::warn!(code = ?err.code(), "stage failed: {err}");
        self.results = ResultsPanel::Message(err.to_api_error());
    }

    fn clear_stale_message(&mut self) {
        if matches!(self.results, ResultsPanel::Message(_)) {
            self.results = ResultsPanel::Empty;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lane::test_support::png_bytes;

    fn loaded() -> Workbench {
        let mut bench = Workbench::default();
        bench
            .select_source(Lane::Original, "a.png", png_bytes(40, 20, [255; 4]))
            .expect("original");
        bench
            .select_source(Lane::Test, "b.png", png_bytes(40, 20, [255; 4]))
            .expect("test");
        bench
    }

    fn images(w: u32, h: u32) -> StagePayload {
        StagePayload::Images(LanePair::new(
            png_bytes(w, h, [0, 0, 0, 255]),
            png_bytes(w, h, [0, 0, 0, 255]),
        ))
    }

    #[test]
    fn canvas_tracks_current_image_dimensions() {
        let mut bench = loaded();
        assert_eq!(bench.canvas(Lane::Original).width(), 40);

        bench
            .apply(StageResponse {
                action: StageAction::Align,
                payload: images(64, 32),
            })
            .expect("apply");

        assert_eq!(bench.canvas(Lane::Original).width(), 64);
        assert_eq!(bench.canvas(Lane::Test).height(), 32);
        assert!(bench.lane(Lane::Test).processed().is_some());
    }

    #[test]
    fn drag_redraws_live_then_committed_outline() {
        let mut bench = loaded();
        let bounds = CanvasBounds::unscaled(0.0, 0.0, 40.0, 20.0);
        let before = bench.canvas(Lane::Original).revision();

        bench.pointer_down(Lane::Original, PointerEvent::primary(4.0, 4.0), bounds);
        let live = bench.pointer_move(Lane::Original, PointerEvent::primary(20.0, 10.0), bounds);
        assert_eq!(
            live,
            SelectionUpdate::Live(PixelRect {
                y1: 4.0,
                x1: 4.0,
                y2: 10.0,
                x2: 20.0
            })
        );
        let committed = bench.pointer_leave(Lane::Original, bounds);

        assert!(matches!(committed, SelectionUpdate::Committed(_)));
        assert_eq!(bench.canvas(Lane::Original).revision(), before + 3);
        assert_eq!(
            bench.canvas(Lane::Original).pixels().get_pixel(12, 4).0,
            [255, 0, 0, 255]
        );
        assert!(bench.lane(Lane::Test).selection().is_none());
    }

    #[test]
    fn detections_replace_overlays_and_select_last_rect() {
        let mut bench = loaded();
        bench
            .apply(StageResponse {
                action: StageAction::Detect,
                payload: StagePayload::Detections(LanePair::new(
                    vec![
                        NormalizedRect::new(0.1, 0.1, 0.2, 0.2),
                        NormalizedRect::new(0.9, 0.8, 0.5, 0.4),
                    ],
                    Vec::new(),
                )),
            })
            .expect("apply");

        let original = bench.lane(Lane::Original);
        assert_eq!(original.detections().len(), 2);
        assert_eq!(
            original.selection(),
            Some(NormalizedRect::new(0.5, 0.4, 0.9, 0.8))
        );
        assert!(bench.lane(Lane::Test).detections().is_empty());
        assert!(bench.lane(Lane::Test).selection().is_none());
    }

    #[test]
    fn out_of_range_detections_are_clamped_before_selection() {
        let mut bench = loaded();
        bench
            .apply(StageResponse {
                action: StageAction::Detect,
                payload: StagePayload::Detections(LanePair::new(
                    vec![
                        NormalizedRect::new(0.1, 0.1, 1e300, 0.5),
                        NormalizedRect::new(f64::NAN, 0.1, 0.2, 0.2),
                    ],
                    Vec::new(),
                )),
            })
            .expect("apply");

        let original = bench.lane(Lane::Original);
        assert_eq!(
            original.detections(),
            &[NormalizedRect::new(0.1, 0.1, 1.0, 0.5)]
        );
        assert_eq!(
            original.selection(),
            Some(NormalizedRect::new(0.1, 0.1, 1.0, 0.5))
        );
        assert_eq!(
            bench.canvas(Lane::Original).pixels().get_pixel(4, 10).0,
            [255, 0, 0, 255]
        );
    }

    #[test]
    fn clear_result_drops_selection_and_overlays() {
        let mut bench = loaded();
        let bounds = CanvasBounds::unscaled(0.0, 0.0, 40.0, 20.0);
        bench.pointer_down(Lane::Test, PointerEvent::primary(2.0, 2.0), bounds);
        bench.pointer_up(Lane::Test, PointerEvent::primary(30.0, 15.0), bounds);
        assert!(bench.lane(Lane::Test).selection().is_some());

        bench
            .apply(StageResponse {
                action: StageAction::Clear,
                payload: images(40, 20),
            })
            .expect("apply");

        assert!(bench.lane(Lane::Test).selection().is_none());
        assert!(bench.lane(Lane::Test).detections().is_empty());
        assert_eq!(
            bench.canvas(Lane::Test).pixels().get_pixel(2, 2).0,
            [0, 0, 0, 255]
        );
    }

    #[test]
    fn undecodable_stage_image_leaves_both_lanes_untouched() {
        let mut bench = loaded();
        let err = bench
            .apply(StageResponse {
                action: StageAction::ExtractPoints,
                payload: StagePayload::Images(LanePair::new(
                    png_bytes(8, 8, [0; 4]),
                    b"not an image".to_vec(),
                )),
            })
            .expect_err("bad image");

        assert!(matches!(err, WorkflowError::Image { .. }));
        assert!(bench.lane(Lane::Original).processed().is_none());
        assert_eq!(bench.registry().live(), 2);
    }

    #[test]
    fn errors_and_verdicts_land_in_results() {
        let mut bench = loaded();
        bench.report_error(&WorkflowError::Precondition("select both images".into()));
        assert!(matches!(bench.results(), ResultsPanel::Message(m) if m.message == "select both images"));

        bench
            .apply(StageResponse {
                action: StageAction::Verify,
                payload: StagePayload::Verdict(vec![VerdictRow {
                    check: "check1".into(),
                    value: "match".into(),
                }]),
            })
            .expect("apply");
        assert!(matches!(bench.results(), ResultsPanel::Table(rows) if rows.len() == 1));
    }

    #[test]
    fn teardown_releases_every_blob() {
        let bench = loaded();
        let registry = bench.registry().clone();
        assert_eq!(registry.live(), 2);
        drop(bench);
        assert_eq!(registry.live(), 0);
    }
}
