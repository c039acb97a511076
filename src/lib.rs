//! Browser bindings for the board mirror
//!
//! The page glue owns the DOM: it serializes the foreign board into a
//! snapshot on every mutation, forwards animation frames, timer ticks, pointer
//! events and shortcut keys, and blits the returned frame onto its canvas.
//! Every method that returns `bool` answers "request an animation frame".

mod utils;

use board_renderer::host::HostTree;
use board_renderer::models::{PieceColor, PieceKind};
use board_renderer::output;
use board_renderer::pieces::IconSet;
use board_renderer::settings::Settings;
use board_renderer::BoardMirror;
use cfg_if::cfg_if;
use wasm_bindgen::prelude::*;

cfg_if! {
	// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
	// allocator.
	if #[cfg(all(feature = "wee_alloc", target_arch = "wasm32"))] {
		extern crate wee_alloc;
		#[global_allocator]
		static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;
	}
}

const ICON_SIZE: u32 = 128;

fn js_error(context: &str, e: impl std::fmt::Display) -> JsValue {
	js_sys::Error::new(&format!("{}: {}", context, e)).into()
}

#[wasm_bindgen]
pub struct ParallaxBoard {
	mirror: BoardMirror,
}

#[wasm_bindgen]
impl ParallaxBoard {
	/// `settings` is the persisted settings object, or `undefined`/`null`
	/// for defaults.
	#[wasm_bindgen(constructor)]
	pub fn new(settings: JsValue) -> Result<ParallaxBoard, JsValue> {
		utils::set_panic_hook();
		utils::init_logging();

		let settings = if settings.is_undefined() || settings.is_null() {
			Settings::default()
		} else {
			let mut parsed: Settings = serde_wasm_bindgen::from_value(settings)
				.map_err(|e| js_error("Settings parse error", e))?;
			parsed.sanitize();
			parsed
		};
		Ok(ParallaxBoard {
			mirror: BoardMirror::new(settings, IconSet::procedural(ICON_SIZE)),
		})
	}

	/// Settings as a plain object, for persisting after any setter.
	pub fn settings(&self) -> Result<JsValue, JsValue> {
		serde_wasm_bindgen::to_value(self.mirror.settings())
			.map_err(|e| js_error("Settings encode error", e))
	}

	#[wasm_bindgen(js_name = settingsJson)]
	pub fn settings_json(&self) -> Result<String, JsValue> {
		self.mirror
			.settings_json()
			.map_err(|e| js_error("Settings encode error", e))
	}

	#[wasm_bindgen(getter)]
	pub fn active(&self) -> bool {
		self.mirror.is_active()
	}

	#[wasm_bindgen(getter, js_name = capabilityDisabled)]
	pub fn capability_disabled(&self) -> bool {
		self.mirror.is_capability_disabled()
	}

	#[wasm_bindgen(js_name = onMutation)]
	pub fn on_mutation(&mut self, snapshot: JsValue, now: f64) -> Result<bool, JsValue> {
		let tree: HostTree = serde_wasm_bindgen::from_value(snapshot)
			.map_err(|e| js_error("Snapshot parse error", e))?;
		Ok(self.mirror.on_mutation(&tree, now))
	}

	/// `snapshot` may be `undefined` when the page has nothing fresh.
	#[wasm_bindgen(js_name = onAnimationFrame)]
	pub fn on_animation_frame(&mut self, ts: f64, snapshot: JsValue) -> Result<bool, JsValue> {
		if snapshot.is_undefined() || snapshot.is_null() {
			return Ok(self.mirror.on_animation_frame(ts, None));
		}
		let tree: HostTree = serde_wasm_bindgen::from_value(snapshot)
			.map_err(|e| js_error("Snapshot parse error", e))?;
		Ok(self.mirror.on_animation_frame(ts, Some(&tree)))
	}

	#[wasm_bindgen(js_name = onTimer)]
	pub fn on_timer(&mut self, now: f64) -> bool {
		self.mirror.on_timer(now)
	}

	pub fn teardown(&mut self) {
		self.mirror.teardown();
	}

	/// Pointer position in board-local pixels.
	#[wasm_bindgen(js_name = pointerMove)]
	pub fn pointer_move(&mut self, x: f32, y: f32) -> bool {
		self.mirror.pointer_move(x, y)
	}

	#[wasm_bindgen(js_name = pointerUp)]
	pub fn pointer_up(&mut self) -> bool {
		self.mirror.pointer_up()
	}

	/// Returns false when `command` is not an annotation command at all, so
	/// the page can send it on as a normal move.
	#[wasm_bindgen(js_name = setAnnotation)]
	pub fn set_annotation(&mut self, command: &str) -> bool {
		self.mirror.set_annotation(command)
	}

	#[wasm_bindgen(js_name = clearAnnotations)]
	pub fn clear_annotations(&mut self) -> bool {
		self.mirror.clear_annotations()
	}

	/// Annotations laid out in board pixels, for drawing over a flat board.
	#[wasm_bindgen(js_name = screenAnnotations)]
	pub fn screen_annotations(&self) -> Result<JsValue, JsValue> {
		serde_wasm_bindgen::to_value(&self.mirror.screen_annotations())
			.map_err(|e| js_error("Annotation encode error", e))
	}

	#[wasm_bindgen(js_name = cycleParallax)]
	pub fn cycle_parallax(&mut self, now: f64) -> bool {
		self.mirror.cycle_parallax(now)
	}

	#[wasm_bindgen(js_name = cycleHover)]
	pub fn cycle_hover(&mut self, now: f64) -> bool {
		self.mirror.cycle_hover(now)
	}

	#[wasm_bindgen(js_name = toggleDividers)]
	pub fn toggle_dividers(&mut self) -> bool {
		self.mirror.toggle_dividers()
	}

	#[wasm_bindgen(js_name = cycleBlur)]
	pub fn cycle_blur(&mut self) -> bool {
		self.mirror.cycle_blur()
	}

	#[wasm_bindgen(js_name = cyclePieceStyle)]
	pub fn cycle_piece_style(&mut self, now: f64) -> bool {
		self.mirror.cycle_piece_style(now)
	}

	#[wasm_bindgen(js_name = toggleObfuscations)]
	pub fn toggle_obfuscations(&mut self, now: f64) -> bool {
		self.mirror.toggle_obfuscations(now)
	}

	#[wasm_bindgen(js_name = cycleOcclusionMode)]
	pub fn cycle_occlusion_mode(&mut self, now: f64) -> bool {
		self.mirror.cycle_occlusion_mode(now)
	}

	#[wasm_bindgen(js_name = cycleRotationTiming)]
	pub fn cycle_rotation_timing(&mut self, now: f64) -> bool {
		self.mirror.cycle_rotation_timing(now)
	}

	#[wasm_bindgen(js_name = toggleCustomBoard)]
	pub fn toggle_custom_board(&mut self, now: f64) -> bool {
		self.mirror.toggle_custom_board(now)
	}

	/// Replace the icon for one piece, e.g. `("white", "knight", png)`.
	#[wasm_bindgen(js_name = setIcon)]
	pub fn set_icon(&mut self, color: &str, kind: &str, png: &[u8]) -> Result<bool, JsValue> {
		let color = PieceColor::from_tag(color)
			.ok_or_else(|| js_sys::Error::new("Invalid piece color."))?;
		let kind =
			PieceKind::from_tag(kind).ok_or_else(|| js_sys::Error::new("Invalid piece kind."))?;
		self.mirror
			.set_icon_png(color, kind, png)
			.map_err(|e| js_error("Icon load error", e))
	}

	#[wasm_bindgen(getter, js_name = frameWidth)]
	pub fn frame_width(&self) -> u32 {
		self.mirror.frame().map_or(0, |f| f.width())
	}

	#[wasm_bindgen(getter, js_name = frameHeight)]
	pub fn frame_height(&self) -> u32 {
		self.mirror.frame().map_or(0, |f| f.height())
	}

	/// Last frame as raw RGBA, ready for `ImageData`. Empty when inactive.
	#[wasm_bindgen(js_name = frameRgba)]
	pub fn frame_rgba(&self) -> Vec<u8> {
		self.mirror
			.frame()
			.map(|f| f.as_raw().clone())
			.unwrap_or_default()
	}

	#[wasm_bindgen(js_name = framePng)]
	pub fn frame_png(&self) -> Result<Vec<u8>, JsValue> {
		let frame = self
			.mirror
			.frame()
			.ok_or_else(|| js_sys::Error::new("No frame rendered."))?;
		output::export_png_bytes(frame).map_err(|e| js_error("Export error", e))
	}

	#[wasm_bindgen(getter, js_name = rotationTimerRunning)]
	pub fn rotation_timer_running(&self) -> bool {
		self.mirror.rotation_timer_running()
	}

	#[wasm_bindgen(getter, js_name = healthCheckRunning)]
	pub fn health_check_running(&self) -> bool {
		self.mirror.health_check_running()
	}
}
