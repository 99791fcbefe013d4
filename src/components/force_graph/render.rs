use std::f64::consts::PI;

use web_sys::{CanvasRenderingContext2d, CanvasWindingRule};

use super::scene::{
	DensityLayer, Frame, FrameLabel, FrameLink, FrameNode, LABEL_FONT_PX, RenderEngine,
	SUBLABEL_FONT_PX,
};

/// Paints frames onto a 2D canvas context.
pub struct Canvas2dRenderer {
	ctx: CanvasRenderingContext2d,
}

impl Canvas2dRenderer {
	pub fn new(ctx: CanvasRenderingContext2d) -> Self {
		Self { ctx }
	}
}

impl RenderEngine for Canvas2dRenderer {
	fn render(&mut self, frame: &Frame<'_>) {
		let ctx = &self.ctx;
		ctx.set_global_alpha(1.0);
		ctx.set_fill_style_str(&frame.palette.background);
		ctx.fill_rect(0.0, 0.0, frame.width, frame.height);
		ctx.save();
		let t = frame.transform;
		let _ = ctx.translate(t.x, t.y);
		let _ = ctx.scale(t.k, t.k);
		draw_links(ctx, frame, &frame.links);
		draw_nodes(ctx, frame, &frame.nodes);
		draw_labels(ctx, frame, &frame.labels);
		if let Some(layer) = &frame.density {
			draw_density(ctx, layer);
		}
		ctx.restore();
		ctx.set_global_alpha(1.0);
	}
}

fn draw_links(ctx: &CanvasRenderingContext2d, frame: &Frame<'_>, links: &[FrameLink]) {
	ctx.set_stroke_style_str(&frame.palette.link);
	let _ = ctx.set_line_dash(&js_sys::Array::new());
	for link in links {
		ctx.set_global_alpha(link.alpha);
		ctx.set_line_width(link.width);
		ctx.begin_path();
		ctx.move_to(link.from.x, link.from.y);
		ctx.line_to(link.to.x, link.to.y);
		ctx.stroke();
	}
}

fn draw_nodes(ctx: &CanvasRenderingContext2d, frame: &Frame<'_>, nodes: &[FrameNode]) {
	let k = frame.transform.k.max(f64::EPSILON);
	for node in nodes {
		ctx.set_global_alpha(node.alpha);
		ctx.begin_path();
		let _ = ctx.arc(node.center.x, node.center.y, node.radius, 0.0, 2.0 * PI);
		ctx.set_fill_style_str(&node.color);
		ctx.fill();

		if node.selected {
			ctx.begin_path();
			let _ = ctx.arc(node.center.x, node.center.y, node.radius + 2.0 / k, 0.0, 2.0 * PI);
			ctx.set_stroke_style_str(&frame.palette.selection);
			ctx.set_line_width(2.0 / k);
			ctx.stroke();
		}
	}
}

fn draw_labels(ctx: &CanvasRenderingContext2d, frame: &Frame<'_>, labels: &[FrameLabel]) {
	for label in labels {
		ctx.set_global_alpha(label.alpha);
		ctx.set_fill_style_str(&frame.palette.label);
		ctx.set_font(&format!("{}px sans-serif", label.font_px));
		let _ = ctx.fill_text(&label.text, label.anchor.x, label.anchor.y);

		if let Some(sub) = &label.sublabel {
			// Sublabel keeps the label's proportions at every zoom
			let scale = label.font_px / LABEL_FONT_PX;
			ctx.set_fill_style_str(&frame.palette.sublabel);
			ctx.set_font(&format!("{}px sans-serif", SUBLABEL_FONT_PX * scale));
			let _ = ctx.fill_text(sub, label.anchor.x, label.anchor.y + 12.0 * scale);
		}
	}
}

/// Density bands, innermost last. Rings of a band are filled even-odd so
/// holes stay open.
fn draw_density(ctx: &CanvasRenderingContext2d, layer: &DensityLayer<'_>) {
	let contours = layer.contours;
	ctx.save();
	if layer.blur_px > 0.0 {
		ctx.set_filter(&format!("blur({}px)", layer.blur_px));
	}
	let _ = ctx.translate(contours.offset.x, contours.offset.y);
	ctx.set_fill_style_str(&contours.color);
	ctx.set_stroke_style_str(&contours.color);
	ctx.set_line_width(1.0);
	for band in &contours.bands {
		ctx.begin_path();
		for ring in &band.rings {
			let mut points = ring.iter();
			let Some(first) = points.next() else {
				continue;
			};
			ctx.move_to(first.x, first.y);
			for p in points {
				ctx.line_to(p.x, p.y);
			}
			ctx.close_path();
		}
		ctx.set_global_alpha(layer.fill_alpha);
		ctx.fill_with_canvas_winding_rule(CanvasWindingRule::Evenodd);
		ctx.set_global_alpha(layer.stroke_alpha);
		ctx.stroke();
	}
	ctx.restore();
}
