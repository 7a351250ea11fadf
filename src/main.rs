//! Gull Toss entry point
//!
//! Handles platform-specific initialization and runs the game loop.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::JsFuture;
    use web_sys::{HtmlCanvasElement, KeyboardEvent, MouseEvent, Response};

    use gull_toss::assets::{AssetError, AssetLoader, AssetRequest, ModelData, asset_channel};
    use gull_toss::consts::*;
    use gull_toss::controls::MoveInput;
    use gull_toss::records::{ClearRecord, format_elapsed};
    use gull_toss::sim::{InstanceRaw, RoundSummary, SceneCoordinator, UiNotifier};
    use gull_toss::{BestTimes, GameConfig};

    #[wasm_bindgen(inline_js = "
        export function request_pointer_lock() {
            const canvas = document.getElementById('canvas');
            if (canvas) {
                const result = canvas.requestPointerLock();
                if (result && result.catch) {
                    result.catch(e => console.error('Pointer lock failed:', e));
                }
            }
        }

        export function submit_frame(bytes, ocean_time) {
            if (window.gullTossDraw) {
                window.gullTossDraw(bytes, ocean_time);
            }
        }
    ")]
    extern "C" {
        fn request_pointer_lock();
        fn submit_frame(bytes: js_sys::Uint8Array, ocean_time: f32);
    }

    /// Fetches model JSON over HTTP
    struct FetchLoader;

    impl AssetLoader for FetchLoader {
        fn load_model(&mut self, url: &str) -> AssetRequest<ModelData> {
            let (request, completer) = asset_channel(url);
            let url = url.to_string();
            wasm_bindgen_futures::spawn_local(async move {
                let result = fetch_text(&url)
                    .await
                    .and_then(|text| ModelData::from_json(&url, &text));
                completer.report_progress(1, 1);
                completer.complete(result);
            });
            request
        }
    }

    async fn fetch_text(url: &str) -> Result<String, AssetError> {
        let failed = |reason: String| AssetError::LoadFailed {
            url: url.to_string(),
            reason,
        };
        let window = web_sys::window().ok_or_else(|| failed("no window".into()))?;
        let response = JsFuture::from(window.fetch_with_str(url))
            .await
            .map_err(|e| failed(format!("{:?}", e)))?;
        let response: Response = response
            .dyn_into()
            .map_err(|_| failed("not a Response".into()))?;
        if !response.ok() {
            return Err(failed(format!("HTTP {}", response.status())));
        }
        let text = response.text().map_err(|e| failed(format!("{:?}", e)))?;
        let text = JsFuture::from(text)
            .await
            .map_err(|e| failed(format!("{:?}", e)))?;
        text.as_string().ok_or_else(|| failed("body is not text".into()))
    }

    /// Win screen, crosshair and HUD in the DOM
    struct DomUi {
        best: BestTimes,
    }

    impl DomUi {
        fn set_text(id: &str, text: &str) {
            let document = web_sys::window().and_then(|w| w.document());
            if let Some(el) = document.and_then(|d| d.get_element_by_id(id)) {
                el.set_text_content(Some(text));
            }
        }

        fn set_class(id: &str, class: &str) {
            let document = web_sys::window().and_then(|w| w.document());
            if let Some(el) = document.and_then(|d| d.get_element_by_id(id)) {
                let _ = el.set_attribute("class", class);
            }
        }
    }

    impl UiNotifier for DomUi {
        fn on_win_condition_met(&mut self, summary: &RoundSummary) {
            let rank = self.best.add(ClearRecord {
                elapsed_ms: summary.elapsed_ms,
                seagulls: summary.seagulls,
                throws: summary.throws,
                timestamp: js_sys::Date::now(),
            });
            self.best.save();

            Self::set_text("win-time", &format_elapsed(summary.elapsed_ms));
            Self::set_text("win-throws", &summary.throws.to_string());
            match rank {
                Some(rank) => Self::set_text("win-rank", &format!("#{}", rank)),
                None => Self::set_text("win-rank", "-"),
            }
            Self::set_class("win-screen", "");
        }

        fn on_input_locked(&mut self, locked: bool) {
            Self::set_class("crosshair", if locked { "" } else { "hidden" });
            Self::set_class("click-to-play", if locked { "hidden" } else { "" });
        }

        fn on_target_hit(&mut self, remaining: u32) {
            Self::set_text("hud-remaining", &remaining.to_string());
        }
    }

    /// Game instance holding all state
    struct Game {
        coordinator: SceneCoordinator,
        input: MoveInput,
        last_time: f64,
    }

    impl Game {
        fn update(&mut self, dt: f32) {
            self.coordinator.controls_mut().apply_movement(self.input, dt);
            self.coordinator.update(dt);
            for event in self.coordinator.drain_events() {
                log::debug!("{:?}", event);
            }
        }

        fn render(&self) {
            let instances: Vec<InstanceRaw> = self.coordinator.render();
            let bytes: &[u8] = bytemuck::cast_slice(&instances);
            submit_frame(js_sys::Uint8Array::from(bytes), self.coordinator.ocean().time);
        }

        fn restart(&mut self) {
            self.coordinator.reset();
            DomUi::set_class("win-screen", "hidden");
            DomUi::set_text("hud-remaining", &self.coordinator.remaining_targets().to_string());
        }
    }

    pub async fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

        log::info!("Gull Toss starting...");

        let window = web_sys::window().expect("no window");
        let document = window.document().expect("no document");

        if let Some(loading) = document.get_element_by_id("loading") {
            let _ = loading.set_attribute("class", "hidden");
        }

        let canvas: HtmlCanvasElement = document
            .get_element_by_id("canvas")
            .expect("no canvas")
            .dyn_into()
            .expect("not a canvas");

        let dpr = window.device_pixel_ratio();
        let width = (canvas.client_width() as f64 * dpr) as u32;
        let height = (canvas.client_height() as f64 * dpr) as u32;
        canvas.set_width(width);
        canvas.set_height(height);

        let config = GameConfig::load();
        let ui = DomUi {
            best: BestTimes::load(),
        };
        let mut coordinator = SceneCoordinator::new(config, Box::new(FetchLoader), Box::new(ui));
        coordinator.set_aspect(width as f32 / height.max(1) as f32);
        DomUi::set_text("hud-remaining", &coordinator.remaining_targets().to_string());

        let game = Rc::new(RefCell::new(Game {
            coordinator,
            input: MoveInput::default(),
            last_time: 0.0,
        }));

        setup_input_handlers(&canvas, game.clone());
        setup_restart_button(game.clone());

        request_animation_frame(game);

        log::info!("Gull Toss running!");
    }

    fn setup_input_handlers(canvas: &HtmlCanvasElement, game: Rc<RefCell<Game>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let Some(document) = window.document() else {
            return;
        };

        // Pointer lock change
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                let locked = web_sys::window()
                    .and_then(|w| w.document())
                    .map(|d| d.pointer_lock_element().is_some())
                    .unwrap_or(false);
                log::info!("Pointer lock {}", if locked { "acquired" } else { "released" });
                game.borrow_mut().coordinator.set_pointer_locked(locked);
            });
            let _ = document.add_event_listener_with_callback(
                "pointerlockchange",
                closure.as_ref().unchecked_ref(),
            );
            closure.forget();
        }

        // Mouse look
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                game.borrow_mut()
                    .coordinator
                    .controls_mut()
                    .look(event.movement_x() as f32, event.movement_y() as f32);
            });
            let _ = document
                .add_event_listener_with_callback("mousemove", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Click: lock the pointer, or throw once locked
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                let mut g = game.borrow_mut();
                if g.coordinator.controls().is_locked() {
                    g.coordinator.throw_from_camera();
                } else {
                    drop(g);
                    request_pointer_lock();
                }
            });
            let _ = canvas
                .add_event_listener_with_callback("mousedown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Keyboard
        for (event_name, pressed) in [("keydown", true), ("keyup", false)] {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                let mut g = game.borrow_mut();
                match event.key().as_str() {
                    "w" | "W" | "ArrowUp" => g.input.forward = pressed,
                    "s" | "S" | "ArrowDown" => g.input.back = pressed,
                    "a" | "A" | "ArrowLeft" => g.input.left = pressed,
                    "d" | "D" | "ArrowRight" => g.input.right = pressed,
                    "r" | "R" if pressed => g.restart(),
                    _ => {}
                }
            });
            let _ = window
                .add_event_listener_with_callback(event_name, closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Resize
        {
            let canvas = canvas.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                let w = canvas.client_width().max(1) as f32;
                let h = canvas.client_height().max(1) as f32;
                game.borrow_mut().coordinator.set_aspect(w / h);
            });
            let _ = window
                .add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn request_animation_frame(game: Rc<RefCell<Game>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |time: f64| {
            game_loop(game, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(game: Rc<RefCell<Game>>, time: f64) {
        {
            let mut g = game.borrow_mut();

            let dt = if g.last_time > 0.0 {
                ((time - g.last_time) / 1000.0) as f32
            } else {
                FIXED_DT
            };
            g.last_time = time;

            g.update(dt);
            g.render();
        }

        request_animation_frame(game);
    }

    fn setup_restart_button(game: Rc<RefCell<Game>>) {
        let document = web_sys::window().and_then(|w| w.document());
        if let Some(btn) = document.and_then(|d| d.get_element_by_id("restart-btn")) {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                game.borrow_mut().restart();
                log::info!("Round restarted");
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn wasm_main() {
    wasm_game::run().await;
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Gull Toss (native) starting...");
    log::info!("Running a headless round - run with `trunk serve` for the web version");

    let config = match std::env::args().nth(1) {
        Some(path) => match std::fs::read_to_string(&path) {
            Ok(json) => gull_toss::GameConfig::from_json(&json).unwrap_or_else(|e| {
                log::warn!("{}: {}; using defaults", path, e);
                gull_toss::GameConfig::default()
            }),
            Err(e) => {
                log::warn!("Cannot read {}: {}; using defaults", path, e);
                gull_toss::GameConfig::default()
            }
        },
        None => gull_toss::GameConfig::load(),
    };

    headless::run(config);
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

/// Auto-aiming demo round without a window
#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec3;
    use gull_toss::assets::InstantLoader;
    use gull_toss::consts::*;
    use gull_toss::records::{ClearRecord, format_elapsed};
    use gull_toss::sim::{RoundSummary, SceneCoordinator, Seagull, UiNotifier};
    use gull_toss::{BestTimes, GameConfig};

    const MAX_FRAMES: u32 = 60 * 180;
    const THROW_EVERY: u32 = 20;

    struct LogUi {
        summary: Rc<RefCell<Option<RoundSummary>>>,
    }

    impl UiNotifier for LogUi {
        fn on_win_condition_met(&mut self, summary: &RoundSummary) {
            *self.summary.borrow_mut() = Some(summary.clone());
        }

        fn on_target_hit(&mut self, remaining: u32) {
            log::info!("Hit! {} seagulls left", remaining);
        }
    }

    /// Lead the target and add lift for the drop over the flight time
    fn aim(from: Vec3, gull: &Seagull, speed: f32, gravity: f32) -> Vec3 {
        let mut target = gull.position();
        for _ in 0..3 {
            let t = from.distance(target) / speed;
            target = gull.path().position(gull.progress() + gull.speed() * t);
        }
        let t = from.distance(target) / speed;
        (target - from).normalize_or_zero() * speed + Vec3::Y * (0.5 * gravity * t)
    }

    pub fn run(config: GameConfig) {
        let summary = Rc::new(RefCell::new(None));
        let ui = LogUi {
            summary: summary.clone(),
        };
        let speed = config.throw_speed;
        let gravity = -config.physics.gravity.y;
        let mut coordinator = SceneCoordinator::new(config, Box::new(InstantLoader), Box::new(ui));

        for frame in 0..MAX_FRAMES {
            if frame % THROW_EVERY == 0 {
                let from = coordinator.controls().throw_origin();
                let velocity = coordinator
                    .seagulls()
                    .iter()
                    .filter(|g| g.is_alive())
                    .min_by(|a, b| {
                        from.distance_squared(a.position())
                            .total_cmp(&from.distance_squared(b.position()))
                    })
                    .map(|gull| aim(from, gull, speed, gravity));
                if let Some(velocity) = velocity {
                    coordinator.throw_ball(from, velocity);
                }
            }

            coordinator.update(FIXED_DT);
            for event in coordinator.drain_events() {
                log::debug!("{:?}", event);
            }
            if coordinator.is_won() {
                break;
            }
        }

        match summary.borrow().clone() {
            Some(summary) => {
                let mut best = BestTimes::load();
                let rank = best.add(ClearRecord {
                    elapsed_ms: summary.elapsed_ms,
                    seagulls: summary.seagulls,
                    throws: summary.throws,
                    timestamp: 0.0,
                });
                best.save();
                println!(
                    "Cleared {} seagulls in {} with {} throws (rank {:?})",
                    summary.seagulls,
                    format_elapsed(summary.elapsed_ms),
                    summary.throws,
                    rank
                );
            }
            None => println!(
                "Out of time: {} of {} seagulls down after {} throws",
                coordinator.hit_count(),
                coordinator.config().seagull_count,
                coordinator.throws()
            ),
        }

        coordinator.dispose();
    }
}
