//! Interactive dashboard controller.
//!
//! Drawing is delegated to a [`Renderer`]; the controller decides what to
//! draw in response to brushes and selections. Every chart it draws is
//! addressed through the [`ViewHandle`] the renderer returned for it, so
//! there is no notion of "the last chart drawn".
//!
//! Panels:
//! - `Timeline` - RT and GVT stacked areas (always present)
//! - `Main` - PE parallel coordinates for the brushed GVT window
//! - `Detail` - KP and LP scatters, the PE chord diagram and the LP-type
//!   communication graph

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::{brush_rt, detail, ChordData, DetailView, Selection, TraceData};
use crate::config::{lp_color, AnalysisConfig, ChartSize, VisualMapping, KP_COLORS, KP_COLOR_DOMAIN};
use crate::error::{AnalysisError, AnalysisResult};
use crate::logs::{log_info, log_warning};
use crate::matrix::GraphData;
use crate::models::{LpType, RecordSet, TimeAxis, TimeWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    Timeline,
    Main,
    Detail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    StackedArea,
    ParallelCoordinates,
    Scatter,
    Chord,
    NodeLink,
}

/// Data handed to a renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ChartData {
    Records(RecordSet),
    Chord(ChordData),
    Graph(GraphData),
}

impl ChartData {
    pub fn len(&self) -> usize {
        match self {
            ChartData::Records(r) => r.len(),
            ChartData::Chord(c) => c.nodes.len(),
            ChartData::Graph(g) => g.nodes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorAssignment {
    pub category: String,
    pub color: String,
}

/// Everything a renderer needs to draw one chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub panel: Panel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub size: ChartSize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping: Option<VisualMapping>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub colors: Vec<ColorAssignment>,
    /// Axis the chart reports brushes on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brush: Option<TimeAxis>,
    /// Whether the chart reports entity selections.
    #[serde(default)]
    pub selectable: bool,
    pub data: ChartData,
}

impl ChartSpec {
    fn new(kind: ChartKind, panel: Panel, size: ChartSize, data: ChartData) -> Self {
        Self {
            kind,
            panel,
            title: None,
            size,
            mapping: None,
            colors: Vec::new(),
            brush: None,
            selectable: false,
            data,
        }
    }

    fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    fn mapping(mut self, mapping: &VisualMapping) -> Self {
        self.mapping = Some(mapping.clone());
        self
    }

    fn colors<'a>(mut self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        self.colors = pairs
            .into_iter()
            .map(|(category, color)| ColorAssignment {
                category: category.to_string(),
                color: color.to_string(),
            })
            .collect();
        self
    }

    fn brush(mut self, axis: TimeAxis) -> Self {
        self.brush = Some(axis);
        self
    }

    fn selectable(mut self) -> Self {
        self.selectable = true;
        self
    }
}

/// A drawn chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewHandle {
    pub id: Uuid,
    pub kind: ChartKind,
    pub panel: Panel,
}

impl ViewHandle {
    pub fn new(kind: ChartKind, panel: Panel) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            panel,
        }
    }
}

/// Chart drawing backend.
pub trait Renderer {
    /// Draw a chart and return its handle.
    fn render(&mut self, spec: ChartSpec) -> ViewHandle;
    /// Replace the data of a drawn chart.
    fn update(&mut self, view: &ViewHandle, data: ChartData);
    /// Remove every chart of a panel.
    fn clear(&mut self, panel: Panel);
}

/// What a [`RecordingRenderer`] was asked to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RenderEvent {
    Render { view: ViewHandle, spec: ChartSpec },
    Update { view: ViewHandle, data: ChartData },
    Clear { panel: Panel },
}

/// Renderer that only records calls. Used by the CLI and tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    pub events: Vec<RenderEvent>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Specs of the charts currently drawn, in drawing order.
    pub fn visible(&self) -> Vec<(ViewHandle, &ChartSpec)> {
        let mut drawn: Vec<(ViewHandle, &ChartSpec)> = Vec::new();
        for event in &self.events {
            match event {
                RenderEvent::Render { view, spec } => drawn.push((*view, spec)),
                RenderEvent::Clear { panel } => drawn.retain(|(v, _)| v.panel != *panel),
                RenderEvent::Update { .. } => {}
            }
        }
        drawn
    }
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, spec: ChartSpec) -> ViewHandle {
        let view = ViewHandle::new(spec.kind, spec.panel);
        self.events.push(RenderEvent::Render { view, spec });
        view
    }

    fn update(&mut self, view: &ViewHandle, data: ChartData) {
        self.events.push(RenderEvent::Update { view: *view, data });
    }

    fn clear(&mut self, panel: Panel) {
        self.events.push(RenderEvent::Clear { panel });
    }
}

/// A user interaction, as replayed from a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interaction {
    /// Brush on the RT timeline.
    BrushRt { low: f64, high: f64 },
    /// Brush on the GVT timeline.
    BrushGvt { low: f64, high: f64 },
    /// PEs picked on the parallel coordinates, in order.
    SelectPes(Vec<usize>),
}

/// Views owned by the dashboard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Views {
    pub rt_timeline: Option<ViewHandle>,
    pub gvt_timeline: Option<ViewHandle>,
    pub main: Vec<ViewHandle>,
    pub detail: Vec<ViewHandle>,
}

/// Drives a [`Renderer`] from interactions over a resident dataset.
pub struct Dashboard<R: Renderer> {
    data: TraceData,
    config: AnalysisConfig,
    renderer: R,
    views: Views,
    current: Option<DetailView>,
}

impl<R: Renderer> Dashboard<R> {
    /// Draw both timelines.
    pub fn new(data: TraceData, config: AnalysisConfig, mut renderer: R) -> Self {
        let charts = config.charts;
        let rt = renderer.render(
            ChartSpec::new(
                ChartKind::StackedArea,
                Panel::Timeline,
                charts.rt_timeline,
                ChartData::Records(data.rt_lps.clone()),
            )
            .title("Real Time (s)")
            .mapping(&config.views.rt_timeline)
            .brush(TimeAxis::Rt),
        );
        let gvt = renderer.render(
            ChartSpec::new(
                ChartKind::StackedArea,
                Panel::Timeline,
                charts.gvt_timeline,
                ChartData::Records(data.gvt_lps.clone()),
            )
            .title("Simulated Time (ms)")
            .mapping(&config.views.gvt_timeline)
            .brush(TimeAxis::Gvt),
        );

        Self {
            data,
            config,
            renderer,
            views: Views {
                rt_timeline: Some(rt),
                gvt_timeline: Some(gvt),
                ..Views::default()
            },
            current: None,
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }

    pub fn views(&self) -> &Views {
        &self.views
    }

    pub fn detail(&self) -> Option<&DetailView> {
        self.current.as_ref()
    }

    /// Narrow the GVT timeline to the samples matching an RT brush.
    /// Returns whether anything changed.
    pub fn on_rt_brush(&mut self, low: f64, high: f64) -> AnalysisResult<bool> {
        let Some(gvt) = brush_rt(&self.data, low, high) else {
            return Ok(false);
        };
        if let Some(view) = &self.views.gvt_timeline {
            self.renderer.update(view, ChartData::Records(gvt));
        }
        Ok(true)
    }

    /// Redraw the main and detail panels for a GVT window.
    pub fn on_gvt_brush(&mut self, low: f64, high: f64) -> AnalysisResult<bool> {
        let window = TimeWindow::closed(TimeAxis::Gvt, low, high);
        let Some(view) = detail(&self.data, &self.config, window)? else {
            return Ok(false);
        };
        self.config.views.kp.validate_against(&view.kps)?;
        self.config.views.lp.validate_against(&view.lps)?;

        self.renderer.clear(Panel::Main);
        self.renderer.clear(Panel::Detail);

        let pc = self.renderer.render(
            ChartSpec::new(
                ChartKind::ParallelCoordinates,
                Panel::Main,
                self.config.charts.parallel_coordinates,
                ChartData::Records(view.pes.clone()),
            )
            .selectable(),
        );
        self.views.main = vec![pc];
        let graph = view.lp_type_matrix.as_ref().map(|m| m.graph());
        self.views.detail = self.render_detail(view.kps.clone(), view.lps.clone(), view.chord(), graph);
        self.current = Some(view);
        Ok(true)
    }

    /// Redraw the detail panel for the PEs picked on the parallel coordinates.
    pub fn on_pe_selection(&mut self, pes: &[usize]) -> AnalysisResult<bool> {
        let view = self.current.as_ref().ok_or(AnalysisError::NoDetailView)?;
        if pes.is_empty() {
            log_warning("Empty PE selection, keeping view");
            return Ok(false);
        }
        let Selection {
            kps,
            lps,
            chord,
            lp_type_matrix,
            ..
        } = view.select(pes)?;
        let graph = lp_type_matrix.map(|m| m.graph());

        self.renderer.clear(Panel::Detail);
        self.views.detail = self.render_detail(kps, lps, chord, graph);
        Ok(true)
    }

    /// Apply a scripted interaction.
    pub fn apply(&mut self, interaction: &Interaction) -> AnalysisResult<bool> {
        log_info(format!("Interaction: {:?}", interaction));
        match interaction {
            Interaction::BrushRt { low, high } => self.on_rt_brush(*low, *high),
            Interaction::BrushGvt { low, high } => self.on_gvt_brush(*low, *high),
            Interaction::SelectPes(pes) => self.on_pe_selection(pes),
        }
    }

    fn render_detail(
        &mut self,
        kps: RecordSet,
        lps: RecordSet,
        chord: Option<ChordData>,
        graph: Option<GraphData>,
    ) -> Vec<ViewHandle> {
        let charts = self.config.charts;
        let mut views = vec![
            self.renderer.render(
                ChartSpec::new(ChartKind::Scatter, Panel::Detail, charts.scatter, ChartData::Records(kps))
                    .title("KP-Level Statistics")
                    .mapping(&self.config.views.kp)
                    .colors(KP_COLOR_DOMAIN.into_iter().zip(KP_COLORS)),
            ),
            self.renderer.render(
                ChartSpec::new(ChartKind::Scatter, Panel::Detail, charts.scatter, ChartData::Records(lps))
                    .title("LP-Level Statistics")
                    .mapping(&self.config.views.lp)
                    .colors(LpType::ALL.into_iter().map(|t| (t.as_str(), lp_color(t)))),
            ),
        ];
        if let Some(chord) = chord {
            views.push(self.renderer.render(ChartSpec::new(
                ChartKind::Chord,
                Panel::Detail,
                charts.chord,
                ChartData::Chord(chord),
            )));
        }
        if let Some(graph) = graph {
            views.push(
                self.renderer.render(
                    ChartSpec::new(ChartKind::NodeLink, Panel::Detail, charts.node_link, ChartData::Graph(graph))
                        .title("LP-Type Communication")
                        .colors(LpType::ALL.into_iter().map(|t| (t.as_str(), lp_color(t)))),
                ),
            );
        }
        views
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::{fixture, fixture_config};

    fn dashboard() -> Dashboard<RecordingRenderer> {
        Dashboard::new(fixture(), fixture_config(), RecordingRenderer::new())
    }

    #[test]
    fn test_timelines_drawn_on_start() {
        let d = dashboard();
        let visible = d.renderer().visible();
        assert_eq!(visible.len(), 2);
        assert_eq!(visible[0].1.brush, Some(TimeAxis::Rt));
        assert_eq!(visible[1].1.size, ChartSize::new(980, 260));
        assert_ne!(d.views().rt_timeline, d.views().gvt_timeline);
    }

    #[test]
    fn test_view_handles_are_distinct_keys() {
        let mut d = dashboard();
        d.on_gvt_brush(10.0, 30.0).unwrap();
        let handles: std::collections::HashSet<ViewHandle> =
            d.renderer().visible().into_iter().map(|(view, _)| view).collect();
        assert_eq!(handles.len(), 7);
    }

    #[test]
    fn test_rt_brush_updates_gvt_view_only() {
        let mut d = dashboard();
        assert!(d.on_rt_brush(0.5, 1.5).unwrap());
        let gvt_view = d.views().gvt_timeline.unwrap();
        match d.renderer().events.last().unwrap() {
            RenderEvent::Update { view, data } => {
                assert_eq!(*view, gvt_view);
                assert_eq!(data.len(), 1);
            }
            other => panic!("unexpected event {:?}", other),
        }

        let before = d.renderer().events.len();
        assert!(!d.on_rt_brush(50.0, 60.0).unwrap());
        assert_eq!(d.renderer().events.len(), before);
    }

    #[test]
    fn test_gvt_brush_draws_detail() {
        let mut d = dashboard();
        assert!(d.on_gvt_brush(10.0, 30.0).unwrap());
        let kinds: Vec<ChartKind> = d.renderer().visible().iter().map(|(v, _)| v.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChartKind::StackedArea,
                ChartKind::StackedArea,
                ChartKind::ParallelCoordinates,
                ChartKind::Scatter,
                ChartKind::Scatter,
                ChartKind::Chord,
                ChartKind::NodeLink
            ]
        );
        let lp_spec = d.renderer().visible()[4].1.clone();
        assert_eq!(lp_spec.colors[2], ColorAssignment { category: "router".into(), color: "purple".into() });
        assert_eq!(d.views().detail.len(), 4);
        match &d.renderer().visible()[6].1.data {
            // 2 PEs x 3 LP types
            ChartData::Graph(graph) => assert_eq!(graph.nodes.len(), 6),
            other => panic!("unexpected data {:?}", other),
        }

        // empty window: nothing is cleared or drawn
        let before = d.renderer().events.len();
        assert!(!d.on_gvt_brush(100.0, 200.0).unwrap());
        assert_eq!(d.renderer().events.len(), before);
        assert_eq!(d.detail().unwrap().window, TimeWindow::closed(TimeAxis::Gvt, 10.0, 30.0));
    }

    #[test]
    fn test_selection_redraws_detail_panel() {
        let mut d = dashboard();
        assert!(matches!(d.on_pe_selection(&[0]), Err(AnalysisError::NoDetailView)));

        d.on_gvt_brush(10.0, 30.0).unwrap();
        let old_detail = d.views().detail.clone();
        assert!(d.apply(&Interaction::SelectPes(vec![1])).unwrap());

        let visible = d.renderer().visible();
        assert_eq!(visible.len(), 7);
        assert!(d.views().detail.iter().all(|v| !old_detail.contains(v)));
        assert_eq!(visible[6].1.data.len(), 3);
        match &visible[5].1.data {
            ChartData::Chord(chord) => assert_eq!(chord.matrix.keys(), &[1]),
            other => panic!("unexpected data {:?}", other),
        }

        assert!(!d.on_pe_selection(&[]).unwrap());
    }

    #[test]
    fn test_interaction_script_serde() {
        let script: Vec<Interaction> = serde_json::from_str(
            r#"[{"brush_rt": {"low": 0, "high": 1.5}}, {"brush_gvt": {"low": 10, "high": 30}}, {"select_pes": [1, 0]}]"#,
        )
        .unwrap();
        assert_eq!(script[2], Interaction::SelectPes(vec![1, 0]));
        let mut d = dashboard();
        for step in &script {
            assert!(d.apply(step).unwrap());
        }
    }
}
