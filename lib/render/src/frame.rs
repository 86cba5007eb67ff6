//! Frame construction.

use crate::pool::PrimitivePool;
use crate::primitive::{DisplayItem, Shape, StyleClass};
use flowloom_core::{NodeId, Point, Rect, Viewport};
use flowloom_graph::{GraphModel, Node};
use flowloom_route::{route, PortAnchor, RouterConfig, Side};
use flowloom_spatial::{EntityId, GridIndex};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Render tuning knobs.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Canvas-space margin added around the viewport when culling, so
    /// entities entering the view during a pan are already drawn.
    pub cull_margin: f64,
    /// Nodes whose on-screen height falls below this many pixels render
    /// simplified (body and label only, no ports or shadow).
    pub lod_threshold_px: f64,
    /// Per-frame build budget; overruns degrade the next frame.
    pub frame_budget: Duration,
    /// Background grid spacing in canvas units.
    pub grid_spacing: f64,
    /// Whether to draw the background grid at all.
    pub show_grid: bool,
    /// Router configuration for connection paths.
    pub router: RouterConfig,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            cull_margin: 100.0,
            lod_threshold_px: 40.0,
            frame_budget: Duration::from_millis(8),
            grid_spacing: 24.0,
            show_grid: true,
            router: RouterConfig::default(),
        }
    }
}

/// Metrics for one frame, emitted for the performance monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Time spent building the display list.
    pub build_time: Duration,
    /// Nodes drawn at full detail.
    pub nodes_drawn: usize,
    /// Nodes drawn in simplified (LOD) form.
    pub nodes_simplified: usize,
    /// Connections drawn.
    pub connections_drawn: usize,
    /// Display items in the frame.
    pub item_count: usize,
    /// Whether this frame ran with decorations dropped.
    pub degraded: bool,
}

/// One rendered frame: a style-batched display list plus its metrics.
#[derive(Debug)]
pub struct Frame {
    /// Display items, sorted by style class then z-order.
    pub items: Vec<DisplayItem>,
    /// Frame metrics.
    pub stats: FrameStats,
}

/// Builds frames from the graph model, spatial index, and viewport.
///
/// Holds the primitive pool and the degradation flag across frames.
#[derive(Debug)]
pub struct FrameBuilder {
    options: RenderOptions,
    pool: PrimitivePool,
    degrade_next: bool,
}

impl FrameBuilder {
    /// Creates a builder.
    #[must_use]
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            pool: PrimitivePool::new(),
            degrade_next: false,
        }
    }

    /// The render options.
    #[must_use]
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// The primitive pool, for inspection.
    #[must_use]
    pub fn pool(&self) -> &PrimitivePool {
        &self.pool
    }

    /// Returns a frame's buffers to the pool.
    pub fn recycle(&mut self, frame: Frame) {
        let mut items = frame.items;
        for item in items.drain(..) {
            if let Shape::Polyline { points, .. } = item.shape {
                self.pool.recycle_points(points);
            }
        }
        self.pool.recycle_items(items);
    }

    /// Builds a frame for the current viewport.
    ///
    /// Never mutates the model; level-of-detail and degradation are
    /// purely presentational.
    pub fn build(
        &mut self,
        model: &GraphModel,
        index: &GridIndex,
        viewport: &Viewport,
        selected: &HashSet<NodeId>,
    ) -> Frame {
        let start = Instant::now();
        let degraded = self.degrade_next;
        let mut items = self.pool.take_items();
        let mut stats = FrameStats {
            degraded,
            ..FrameStats::default()
        };

        let visible = viewport.visible_bounds().expanded(self.options.cull_margin);

        if self.options.show_grid && !degraded {
            self.push_grid(&mut items, viewport);
        }

        let mut visible_nodes: Vec<&Node> = Vec::new();
        let mut visible_connections = Vec::new();
        for entity in index.query(&visible) {
            match entity {
                EntityId::Node(node_id) => {
                    if let Some(node) = model.node(node_id) {
                        visible_nodes.push(node);
                    }
                }
                EntityId::Connection(connection_id) => {
                    if let Some(connection) = model.connection(connection_id) {
                        visible_connections.push(connection);
                    }
                }
            }
        }

        for connection in visible_connections {
            let (Some(source), Some(target)) = (
                model.node(connection.source_node),
                model.node(connection.target_node),
            ) else {
                continue; // endpoint gone; nothing to draw yet
            };
            let registry = model.registry();
            let (Some(source_def), Some(target_def)) =
                (registry.get(&source.type_id), registry.get(&target.type_id))
            else {
                continue;
            };
            let Some(source_anchor) =
                source_def.output_anchor(&source.bounds(), &connection.source_port)
            else {
                continue;
            };
            let Some(target_anchor) =
                target_def.input_anchor(&target.bounds(), &connection.target_port)
            else {
                continue;
            };

            let obstacles: Vec<Rect> = visible_nodes
                .iter()
                .filter(|n| n.id != source.id && n.id != target.id)
                .map(|n| n.bounds())
                .collect();
            let path = route(
                PortAnchor::new(source_anchor, Side::Right),
                PortAnchor::new(target_anchor, Side::Left),
                &obstacles,
                &self.options.router,
            );

            let mut points = self.pool.take_points();
            points.extend(path.waypoints.iter().map(|p| viewport.to_screen(*p)));
            let style = if connection.detached {
                StyleClass::ConnectionDetached
            } else {
                StyleClass::Connection
            };
            items.push(DisplayItem::new(
                style,
                0,
                Shape::Polyline {
                    points,
                    corner_radius: path.corner_radius * viewport.zoom,
                },
            ));
            stats.connections_drawn += 1;
        }

        for node in &visible_nodes {
            let screen_rect = rect_to_screen(&node.bounds(), viewport);
            let simplified = screen_rect.height < self.options.lod_threshold_px;
            if simplified {
                stats.nodes_simplified += 1;
            } else {
                stats.nodes_drawn += 1;
            }

            if !simplified && !degraded {
                items.push(DisplayItem::new(
                    StyleClass::NodeShadow,
                    node.z_order,
                    Shape::Rect {
                        rect: screen_rect.expanded(2.0),
                        corner_radius: 6.0,
                    },
                ));
            }

            let body_style = if node.validation.is_valid() {
                StyleClass::NodeBody
            } else {
                StyleClass::NodeBodyInvalid
            };
            items.push(DisplayItem::new(
                body_style,
                node.z_order,
                Shape::Rect {
                    rect: screen_rect,
                    corner_radius: 6.0,
                },
            ));

            if !simplified {
                self.push_ports(&mut items, model, node, viewport);
            }

            if let Some(label) = node_label(model, node) {
                items.push(DisplayItem::new(
                    StyleClass::NodeLabel,
                    node.z_order,
                    Shape::Text {
                        origin: Point::new(screen_rect.x + 8.0, screen_rect.y + 16.0),
                        content: label,
                        font_size: 12.0,
                    },
                ));
            }

            if selected.contains(&node.id) {
                items.push(DisplayItem::new(
                    StyleClass::SelectionOutline,
                    node.z_order,
                    Shape::Rect {
                        rect: screen_rect.expanded(3.0),
                        corner_radius: 8.0,
                    },
                ));
            }
        }

        // Batch by style, then stacking order within the batch.
        items.sort_by(|a, b| (a.style, a.z_order).cmp(&(b.style, b.z_order)));

        stats.item_count = items.len();
        stats.build_time = start.elapsed();
        self.degrade_next = stats.build_time > self.options.frame_budget;

        tracing::debug!(
            build_us = stats.build_time.as_micros() as u64,
            nodes = stats.nodes_drawn,
            simplified = stats.nodes_simplified,
            connections = stats.connections_drawn,
            items = stats.item_count,
            degraded = stats.degraded,
            "frame built"
        );

        Frame { items, stats }
    }

    fn push_grid(&mut self, items: &mut Vec<DisplayItem>, viewport: &Viewport) {
        let spacing_px = self.options.grid_spacing * viewport.zoom;
        if spacing_px < 4.0 {
            return; // too dense to be useful
        }
        let bounds = viewport.visible_bounds();
        let spacing = self.options.grid_spacing;

        let mut x = (bounds.x / spacing).floor() * spacing;
        while x <= bounds.right() {
            let sx = viewport.to_screen(Point::new(x, bounds.y)).x;
            items.push(DisplayItem::new(
                StyleClass::GridLine,
                0,
                Shape::Line {
                    from: Point::new(sx, 0.0),
                    to: Point::new(sx, viewport.screen.height),
                },
            ));
            x += spacing;
        }
        let mut y = (bounds.y / spacing).floor() * spacing;
        while y <= bounds.bottom() {
            let sy = viewport.to_screen(Point::new(bounds.x, y)).y;
            items.push(DisplayItem::new(
                StyleClass::GridLine,
                0,
                Shape::Line {
                    from: Point::new(0.0, sy),
                    to: Point::new(viewport.screen.width, sy),
                },
            ));
            y += spacing;
        }
    }

    fn push_ports(
        &mut self,
        items: &mut Vec<DisplayItem>,
        model: &GraphModel,
        node: &Node,
        viewport: &Viewport,
    ) {
        let Some(def) = model.registry().get(&node.type_id) else {
            return;
        };
        let bounds = node.bounds();
        for port in &def.inputs {
            if let Some(anchor) = def.input_anchor(&bounds, &port.name) {
                items.push(DisplayItem::new(
                    StyleClass::Port,
                    node.z_order,
                    Shape::Circle {
                        center: viewport.to_screen(anchor),
                        radius: 4.0,
                    },
                ));
            }
        }
        for port in &def.outputs {
            if let Some(anchor) = def.output_anchor(&bounds, &port.name) {
                items.push(DisplayItem::new(
                    StyleClass::Port,
                    node.z_order,
                    Shape::Circle {
                        center: viewport.to_screen(anchor),
                        radius: 4.0,
                    },
                ));
            }
        }
    }
}

/// Converts a canvas-space rect to screen space.
fn rect_to_screen(rect: &Rect, viewport: &Viewport) -> Rect {
    let origin = viewport.to_screen(Point::new(rect.x, rect.y));
    Rect::new(
        origin.x,
        origin.y,
        rect.width * viewport.zoom,
        rect.height * viewport.zoom,
    )
}

/// A node's display label: the `label` property, falling back to the
/// registered type label.
fn node_label(model: &GraphModel, node: &Node) -> Option<String> {
    if let Some(flowloom_graph::PropertyValue::String(label)) = node.property("label") {
        return Some(label.clone());
    }
    model
        .registry()
        .get(&node.type_id)
        .map(|def| def.label.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowloom_core::{ClientId, DocumentId, Size};
    use flowloom_graph::{
        Connection, InputPort, LamportClock, NodeTypeDefinition, NodeTypeRegistry, Operation,
        OperationPayload, OutputPort, PortSchema,
    };

    fn registry() -> NodeTypeRegistry {
        let mut registry = NodeTypeRegistry::new();
        registry.register(
            NodeTypeDefinition::new("source", "Source")
                .with_output(OutputPort::new("output", PortSchema::any())),
        );
        registry.register(
            NodeTypeDefinition::new("sink", "Sink")
                .with_input(InputPort::new("input", PortSchema::any())),
        );
        registry
    }

    struct Scene {
        model: GraphModel,
        index: GridIndex,
        clock: LamportClock,
        client: ClientId,
        seq: u64,
    }

    impl Scene {
        fn new() -> Self {
            let client = ClientId::new();
            Self {
                model: GraphModel::new(DocumentId::new(), "scene", registry()),
                index: GridIndex::new(),
                clock: LamportClock::new(client),
                client,
                seq: 0,
            }
        }

        fn apply(&mut self, payload: OperationPayload) {
            self.seq += 1;
            let op = Operation::new(self.client, self.clock.tick(), self.seq, payload);
            assert!(self.model.apply(&op).is_applied());
        }

        fn add_node(&mut self, type_id: &str, x: f64, y: f64, size: Size) -> Node {
            let node = Node::new(type_id, Point::new(x, y), size);
            self.apply(OperationPayload::InsertNode { node: node.clone() });
            self.index
                .insert(EntityId::Node(node.id), node.bounds());
            node
        }

        fn connect(&mut self, source: &Node, target: &Node) -> Connection {
            let connection = Connection::new(source.id, "output", target.id, "input");
            self.apply(OperationPayload::InsertConnection {
                connection: connection.clone(),
            });
            self.index.insert(
                EntityId::Connection(connection.id),
                source.bounds().union(&target.bounds()),
            );
            connection
        }
    }

    fn viewport() -> Viewport {
        Viewport::new(Size::new(800.0, 600.0))
    }

    #[test]
    fn offscreen_nodes_are_culled() {
        let mut scene = Scene::new();
        scene.add_node("source", 10.0, 10.0, Size::new(120.0, 60.0));
        scene.add_node("source", 5000.0, 5000.0, Size::new(120.0, 60.0));

        let mut builder = FrameBuilder::new(RenderOptions {
            show_grid: false,
            ..RenderOptions::default()
        });
        let frame = builder.build(&scene.model, &scene.index, &viewport(), &HashSet::new());

        assert_eq!(frame.stats.nodes_drawn + frame.stats.nodes_simplified, 1);
    }

    #[test]
    fn lod_simplifies_small_nodes_without_touching_model() {
        let mut scene = Scene::new();
        let node = scene.add_node("source", 100.0, 100.0, Size::new(120.0, 60.0));
        let snapshot = scene.model.snapshot();

        let mut vp = viewport();
        vp.zoom = 0.2; // 60px tall node becomes 12px on screen
        let mut builder = FrameBuilder::new(RenderOptions {
            show_grid: false,
            ..RenderOptions::default()
        });
        let frame = builder.build(&scene.model, &scene.index, &vp, &HashSet::new());

        assert_eq!(frame.stats.nodes_simplified, 1);
        assert_eq!(frame.stats.nodes_drawn, 0);
        assert!(
            !frame
                .items
                .iter()
                .any(|i| matches!(i.style, StyleClass::Port)),
            "simplified nodes draw no ports"
        );
        assert_eq!(scene.model.snapshot(), snapshot, "render never mutates state");
        assert!(scene.model.node(node.id).is_some());
    }

    #[test]
    fn full_detail_nodes_draw_ports_and_labels() {
        let mut scene = Scene::new();
        scene.add_node("source", 100.0, 100.0, Size::new(120.0, 60.0));

        let mut builder = FrameBuilder::new(RenderOptions {
            show_grid: false,
            ..RenderOptions::default()
        });
        let frame = builder.build(&scene.model, &scene.index, &viewport(), &HashSet::new());

        assert!(frame.items.iter().any(|i| i.style == StyleClass::Port));
        assert!(frame.items.iter().any(|i| i.style == StyleClass::NodeLabel));
    }

    #[test]
    fn connections_render_as_polylines() {
        let mut scene = Scene::new();
        let source = scene.add_node("source", 0.0, 100.0, Size::new(120.0, 60.0));
        let sink = scene.add_node("sink", 400.0, 100.0, Size::new(120.0, 60.0));
        scene.connect(&source, &sink);

        let mut builder = FrameBuilder::new(RenderOptions {
            show_grid: false,
            ..RenderOptions::default()
        });
        let frame = builder.build(&scene.model, &scene.index, &viewport(), &HashSet::new());

        assert_eq!(frame.stats.connections_drawn, 1);
        assert!(frame
            .items
            .iter()
            .any(|i| i.style == StyleClass::Connection));
    }

    #[test]
    fn items_are_batched_by_style() {
        let mut scene = Scene::new();
        let source = scene.add_node("source", 0.0, 100.0, Size::new(120.0, 60.0));
        let sink = scene.add_node("sink", 400.0, 100.0, Size::new(120.0, 60.0));
        scene.connect(&source, &sink);

        let mut builder = FrameBuilder::new(RenderOptions::default());
        let frame = builder.build(&scene.model, &scene.index, &viewport(), &HashSet::new());

        let styles: Vec<StyleClass> = frame.items.iter().map(|i| i.style).collect();
        let mut sorted = styles.clone();
        sorted.sort();
        assert_eq!(styles, sorted, "display list is grouped by style class");
    }

    #[test]
    fn degraded_frame_drops_decorations_not_entities() {
        let mut scene = Scene::new();
        scene.add_node("source", 100.0, 100.0, Size::new(120.0, 60.0));

        let mut builder = FrameBuilder::new(RenderOptions {
            frame_budget: Duration::ZERO, // force an overrun
            ..RenderOptions::default()
        });
        let first = builder.build(&scene.model, &scene.index, &viewport(), &HashSet::new());
        assert!(!first.stats.degraded);

        let second = builder.build(&scene.model, &scene.index, &viewport(), &HashSet::new());
        assert!(second.stats.degraded);
        assert!(
            !second.items.iter().any(|i| i.style.is_decoration()),
            "degraded frames drop grid and shadows"
        );
        assert_eq!(
            second.stats.nodes_drawn + second.stats.nodes_simplified,
            1,
            "entities are never dropped"
        );
    }

    #[test]
    fn selection_outline_rendered_for_selected_nodes() {
        let mut scene = Scene::new();
        let node = scene.add_node("source", 100.0, 100.0, Size::new(120.0, 60.0));

        let mut builder = FrameBuilder::new(RenderOptions {
            show_grid: false,
            ..RenderOptions::default()
        });
        let selected: HashSet<NodeId> = [node.id].into_iter().collect();
        let frame = builder.build(&scene.model, &scene.index, &viewport(), &selected);

        assert!(frame
            .items
            .iter()
            .any(|i| i.style == StyleClass::SelectionOutline));
    }

    #[test]
    fn recycling_feeds_the_pool() {
        let mut scene = Scene::new();
        let source = scene.add_node("source", 0.0, 100.0, Size::new(120.0, 60.0));
        let sink = scene.add_node("sink", 400.0, 100.0, Size::new(120.0, 60.0));
        scene.connect(&source, &sink);

        let mut builder = FrameBuilder::new(RenderOptions::default());
        let frame = builder.build(&scene.model, &scene.index, &viewport(), &HashSet::new());
        builder.recycle(frame);

        let before = builder.pool().reuse_count();
        let frame = builder.build(&scene.model, &scene.index, &viewport(), &HashSet::new());
        assert!(builder.pool().reuse_count() > before, "second frame reuses buffers");
        builder.recycle(frame);
    }
}
