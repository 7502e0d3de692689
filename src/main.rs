use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use pollster::block_on;
use winit::dpi::LogicalSize;
use winit::event::{DeviceEvent, ElementState, Event, KeyEvent, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::keyboard::PhysicalKey;
use winit::platform::run_on_demand::EventLoopExtRunOnDemand;
use winit::window::{CursorGrabMode, WindowBuilder};

use shadow_demo::{
    AssetLoader, CliOptions, ControllerEvent, DemoAssets, FrameInput, InitError, KeyCode,
    NamedKey, Renderer, ShadowDemo,
};
use shadow_demo::config::USAGE;

/// Pixel-precise wheels (touchpads) report distances; this many pixels
/// count as one wheel tick.
const PIXELS_PER_WHEEL_TICK: f64 = 40.0;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        error!("{err:#}");
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    if options.help {
        println!("{USAGE}");
        return Ok(());
    }
    let config = options.config;

    let loader = AssetLoader::new(&config.assets_dir);
    let assets = loader
        .load_all()
        .map_err(InitError::from)
        .with_context(|| format!("failed to load assets from {}", loader.root().display()))?;
    info!("loaded assets from {}", loader.root().display());

    let demo = ShadowDemo::new(config)?;

    if options.headless {
        run_headless(&demo, &assets)
    } else {
        match run_interactive(demo.clone(), &assets) {
            Ok(()) => Ok(()),
            Err(err) => {
                if err.downcast_ref::<WindowInitError>().is_some() {
                    eprintln!(
                        "{err}. Falling back to --headless mode (set DISPLAY or WAYLAND_DISPLAY to enable rendering)."
                    );
                    run_headless(&demo, &assets)
                } else {
                    Err(err)
                }
            }
        }
    }
}

fn run_headless(demo: &ShadowDemo, assets: &DemoAssets) -> Result<()> {
    println!("{}", demo.report(assets));
    Ok(())
}

fn run_interactive(demo: ShadowDemo, assets: &DemoAssets) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let mut event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;

    let window_config = &demo.config().window;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(window_config.title.as_str())
            .with_inner_size(LogicalSize::new(
                f64::from(window_config.width),
                f64::from(window_config.height),
            ))
            .build(&event_loop)
            .map_err(|err| WindowInitError::from_error("window", err))?,
    );

    let renderer = block_on(Renderer::new(Arc::clone(&window), assets, demo.config()))
        .context("failed to initialize renderer")?;
    let frame_interval = match demo.config().window.fps {
        0 => None,
        fps => Some(Duration::from_secs_f64(1.0 / f64::from(fps))),
    };

    let mut app = AppState {
        renderer,
        demo,
        input: FrameInput::new(),
        frame_interval,
        next_frame: Instant::now(),
        last_error: None,
    };
    app.set_pointer_grab(app.demo.controller().pointer_grabbed);

    event_loop.run_on_demand(|event, elwt| {
        if let Err(err) = app.process_event(&event, elwt) {
            app.last_error = Some(err);
            elwt.exit();
        }
    })?;

    if let Some(err) = app.last_error {
        return Err(err);
    }
    Ok(())
}

struct AppState {
    renderer: Renderer,
    demo: ShadowDemo,
    input: FrameInput,
    frame_interval: Option<Duration>,
    next_frame: Instant,
    last_error: Option<anyhow::Error>,
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

impl AppState {
    fn process_event(&mut self, event: &Event<()>, elwt: &EventLoopWindowTarget<()>) -> Result<()> {
        match event {
            Event::WindowEvent { event, window_id } if *window_id == self.renderer.window_id() => {
                match event {
                    WindowEvent::CloseRequested => elwt.exit(),
                    WindowEvent::Resized(size) => self.renderer.resize(*size),
                    WindowEvent::ScaleFactorChanged { .. } => {
                        let size = self.renderer.window().inner_size();
                        self.renderer.resize(size);
                    }
                    WindowEvent::KeyboardInput { event, .. } => self.handle_keyboard(event),
                    WindowEvent::MouseWheel { delta, .. } => {
                        self.input.add_wheel_ticks(wheel_ticks(*delta));
                    }
                    WindowEvent::RedrawRequested => self.redraw(elwt)?,
                    _ => {}
                }
            }
            Event::DeviceEvent {
                event: DeviceEvent::MouseMotion { delta },
                ..
            } => {
                self.input.add_pointer_motion(delta.0 as f32, delta.1 as f32);
            }
            Event::AboutToWait => self.schedule_redraw(elwt),
            _ => {}
        }
        Ok(())
    }

    fn schedule_redraw(&mut self, elwt: &EventLoopWindowTarget<()>) {
        match self.frame_interval {
            None => {
                elwt.set_control_flow(ControlFlow::Poll);
                self.renderer.window().request_redraw();
            }
            Some(interval) => {
                let now = Instant::now();
                if now >= self.next_frame {
                    self.renderer.window().request_redraw();
                    self.next_frame = now + interval;
                }
                elwt.set_control_flow(ControlFlow::WaitUntil(self.next_frame));
            }
        }
    }

    fn redraw(&mut self, elwt: &EventLoopWindowTarget<()>) -> Result<()> {
        let input = self.input.take();
        for event in self.demo.update(&input) {
            match event {
                ControllerEvent::PointerGrabChanged(grabbed) => self.set_pointer_grab(grabbed),
                ControllerEvent::ViewToggled(from_light) => {
                    info!(
                        "viewing from the {}",
                        if from_light { "light" } else { "orbit camera" }
                    );
                }
                ControllerEvent::Quit => {
                    elwt.exit();
                    return Ok(());
                }
            }
        }

        let frame = self.demo.frame(self.renderer.aspect());
        match self.renderer.render(&frame) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = self.renderer.window().inner_size();
                self.renderer.resize(size);
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("surface timeout; retrying next frame");
            }
            Err(err) => return Err(anyhow!("failed to render frame: {err}")),
        }
        Ok(())
    }

    fn handle_keyboard(&mut self, event: &KeyEvent) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        if let Some(key) = map_keycode(code) {
            self.input.press(key);
        }
    }

    fn set_pointer_grab(&self, grabbed: bool) {
        let window = self.renderer.window();
        let result = if grabbed {
            window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined))
        } else {
            window.set_cursor_grab(CursorGrabMode::None)
        };
        if let Err(err) = result {
            warn!("unable to change pointer grab: {err}");
        }
        window.set_cursor_visible(!grabbed);
    }
}

fn wheel_ticks(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(position) => (position.y / PIXELS_PER_WHEEL_TICK) as f32,
    }
}

fn map_keycode(code: winit::keyboard::KeyCode) -> Option<KeyCode> {
    use winit::keyboard::KeyCode as Key;
    Some(match code {
        Key::Space => KeyCode::Named(NamedKey::Space),
        Key::Enter => KeyCode::Named(NamedKey::Enter),
        Key::Tab => KeyCode::Named(NamedKey::Tab),
        Key::ArrowLeft => KeyCode::Named(NamedKey::Left),
        Key::ArrowRight => KeyCode::Named(NamedKey::Right),
        Key::ArrowUp => KeyCode::Named(NamedKey::Up),
        Key::ArrowDown => KeyCode::Named(NamedKey::Down),
        Key::Escape => KeyCode::Named(NamedKey::Escape),
        Key::Backspace => KeyCode::Named(NamedKey::Backspace),
        Key::ShiftLeft => KeyCode::Named(NamedKey::LeftShift),
        Key::ShiftRight => KeyCode::Named(NamedKey::RightShift),
        Key::ControlLeft => KeyCode::Named(NamedKey::LeftCtrl),
        Key::ControlRight => KeyCode::Named(NamedKey::RightCtrl),
        Key::AltLeft => KeyCode::Named(NamedKey::LeftAlt),
        Key::AltRight => KeyCode::Named(NamedKey::RightAlt),
        Key::Digit0 => KeyCode::Digit(0),
        Key::Digit1 => KeyCode::Digit(1),
        Key::Digit2 => KeyCode::Digit(2),
        Key::Digit3 => KeyCode::Digit(3),
        Key::Digit4 => KeyCode::Digit(4),
        Key::Digit5 => KeyCode::Digit(5),
        Key::Digit6 => KeyCode::Digit(6),
        Key::Digit7 => KeyCode::Digit(7),
        Key::Digit8 => KeyCode::Digit(8),
        Key::Digit9 => KeyCode::Digit(9),
        Key::KeyA => KeyCode::Character('A'),
        Key::KeyB => KeyCode::Character('B'),
        Key::KeyC => KeyCode::Character('C'),
        Key::KeyD => KeyCode::Character('D'),
        Key::KeyE => KeyCode::Character('E'),
        Key::KeyF => KeyCode::Character('F'),
        Key::KeyG => KeyCode::Character('G'),
        Key::KeyH => KeyCode::Character('H'),
        Key::KeyI => KeyCode::Character('I'),
        Key::KeyJ => KeyCode::Character('J'),
        Key::KeyK => KeyCode::Character('K'),
        Key::KeyL => KeyCode::Character('L'),
        Key::KeyM => KeyCode::Character('M'),
        Key::KeyN => KeyCode::Character('N'),
        Key::KeyO => KeyCode::Character('O'),
        Key::KeyP => KeyCode::Character('P'),
        Key::KeyQ => KeyCode::Character('Q'),
        Key::KeyR => KeyCode::Character('R'),
        Key::KeyS => KeyCode::Character('S'),
        Key::KeyT => KeyCode::Character('T'),
        Key::KeyU => KeyCode::Character('U'),
        Key::KeyV => KeyCode::Character('V'),
        Key::KeyW => KeyCode::Character('W'),
        Key::KeyX => KeyCode::Character('X'),
        Key::KeyY => KeyCode::Character('Y'),
        Key::KeyZ => KeyCode::Character('Z'),
        Key::F1 => KeyCode::Function(1),
        Key::F2 => KeyCode::Function(2),
        Key::F3 => KeyCode::Function(3),
        Key::F4 => KeyCode::Function(4),
        Key::F5 => KeyCode::Function(5),
        Key::F6 => KeyCode::Function(6),
        Key::F7 => KeyCode::Function(7),
        Key::F8 => KeyCode::Function(8),
        Key::F9 => KeyCode::Function(9),
        Key::F10 => KeyCode::Function(10),
        Key::F11 => KeyCode::Function(11),
        Key::F12 => KeyCode::Function(12),
        _ => return None,
    })
}
