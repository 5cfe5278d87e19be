// License: MIT

//! Compositor connection, registry binding and the protocol state machine.
//! One `Engine` owns every bound global plus the panel arena; all protocol
//! events dispatch onto it.

use std::os::fd::AsRawFd;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use eventline as el;

use wayland_client::{
    Connection, Dispatch, EventQueue, Proxy, QueueHandle, WEnum,
    globals::{GlobalListContents, registry_queue_init},
    protocol::{
        wl_buffer::{self, WlBuffer},
        wl_compositor::WlCompositor,
        wl_output::{self, WlOutput},
        wl_registry,
        wl_seat::WlSeat,
        wl_shm::WlShm,
        wl_shm_pool::WlShmPool,
        wl_subcompositor::WlSubcompositor,
        wl_subsurface::WlSubsurface,
        wl_surface::WlSurface,
    },
};

use wayland_protocols::xdg::shell::client::{
    xdg_surface::{self, XdgSurface},
    xdg_toplevel::{self, XdgToplevel},
    xdg_wm_base::{self, XdgWmBase},
};

use crate::layout::{Layout, Monitor, PendingMonitor};
use crate::shell::gpu::EglInstance;
use crate::shell::panel::{Backdrop, Panel, Slot};
use crate::shell::render::{self, RenderShared};
use crate::warning::{Recorded, WarningLog};

pub(crate) const APP_ID: &str = "triptych";

pub struct Engine {
    pub(crate) conn: Connection,
    event_queue: Option<EventQueue<Engine>>,
    pub(crate) qh: QueueHandle<Engine>,

    pub(crate) compositor: Option<WlCompositor>,
    pub(crate) subcompositor: Option<WlSubcompositor>,
    pub(crate) shm: Option<WlShm>,
    // Bound only to satisfy the required capability set; input is unhandled.
    _seat: Option<WlSeat>,
    pub(crate) wm_base: Option<XdgWmBase>,

    output: Option<WlOutput>,
    pending_monitor: PendingMonitor,
    monitor: Option<Monitor>,

    /// Usable bounds suggested by the window manager; preferred over the
    /// monitor mode when both are known.
    bounds: Option<(i32, i32)>,
    pub(crate) layout: Option<Layout>,

    pub(crate) backdrop: Option<Backdrop>,
    pub(crate) panels: [Panel; Slot::ALL.len()],
    pub(crate) panels_created: bool,

    pub(crate) warnings: WarningLog,
    /// Errors raised inside event dispatch; surfaced by the run loop.
    pub(crate) fatal: Option<anyhow::Error>,

    pub(crate) shared: Arc<RenderShared>,
    render_thread: Option<JoinHandle<()>>,
}

impl Engine {
    /// Connect to the default compositor, bind the required globals and
    /// initialise the EGL display. Fatal if the session is not Wayland or
    /// any required capability never arrives.
    pub fn connect() -> Result<Engine> {
        if std::env::var_os("WAYLAND_DISPLAY").is_none() {
            bail!("Wayland-only: WAYLAND_DISPLAY is unset");
        }

        let conn = Connection::connect_to_env().context("connect_to_env")?;
        let (globals, event_queue) =
            registry_queue_init::<Engine>(&conn).context("registry_queue_init")?;
        let qh = event_queue.handle();

        let compositor = globals.bind::<WlCompositor, _, _>(&qh, 1..=6, ()).ok();
        let subcompositor = globals.bind::<WlSubcompositor, _, _>(&qh, 1..=1, ()).ok();
        let shm = globals.bind::<WlShm, _, _>(&qh, 1..=1, ()).ok();
        let seat = globals.bind::<WlSeat, _, _>(&qh, 1..=5, ()).ok();
        let wm_base = globals.bind::<XdgWmBase, _, _>(&qh, 1..=6, ()).ok();

        // Every one of these is required; a compositor that never advertised
        // one cannot host the session at all.
        let mut missing: Vec<&str> = Vec::new();
        if compositor.is_none() {
            missing.push("wl_compositor");
        }
        if subcompositor.is_none() {
            missing.push("wl_subcompositor");
        }
        if shm.is_none() {
            missing.push("wl_shm");
        }
        if seat.is_none() {
            missing.push("wl_seat");
        }
        if wm_base.is_none() {
            missing.push("xdg_wm_base");
        }
        if !missing.is_empty() {
            bail!("missing required globals: {}", missing.join(", "));
        }

        // Single-monitor support: only the first advertised output is bound.
        let output = globals
            .contents()
            .clone_list()
            .into_iter()
            .find(|g| g.interface == "wl_output")
            .map(|g| {
                globals
                    .registry()
                    .bind::<WlOutput, _, _>(g.name, g.version.min(4), &qh, ())
            });

        el::info!(
            "shell.connect compositor={compositor} subcompositor={subcompositor} shm={shm} seat={seat} wm_base={wm_base} output={output}",
            compositor = compositor.is_some(),
            subcompositor = subcompositor.is_some(),
            shm = shm.is_some(),
            seat = seat.is_some(),
            wm_base = wm_base.is_some(),
            output = output.is_some()
        );

        let shared = RenderShared::new();
        shared.gpu_lock().instance = Some(EglInstance::new(&conn)?);

        let mut engine = Engine {
            conn,
            event_queue: Some(event_queue),
            qh,
            compositor,
            subcompositor,
            shm,
            _seat: seat,
            wm_base,
            output,
            pending_monitor: PendingMonitor::default(),
            monitor: None,
            bounds: None,
            layout: None,
            backdrop: None,
            panels: Default::default(),
            panels_created: false,
            warnings: WarningLog::default(),
            fatal: None,
            shared,
            render_thread: None,
        };

        // Let the first output describe itself before any window exists.
        engine.roundtrip()?;
        Ok(engine)
    }

    // ---- never lose the event queue, even on error ----

    pub fn roundtrip(&mut self) -> Result<()> {
        let mut q = self.event_queue.take().context("event_queue missing")?;
        let res = q.roundtrip(self).context("wayland roundtrip");
        self.event_queue = Some(q);
        res.map(|_| ())
    }

    pub fn blocking_dispatch(&mut self) -> Result<()> {
        let mut q = self.event_queue.take().context("event_queue missing")?;
        let res = q.blocking_dispatch(self).context("blocking_dispatch");
        self.event_queue = Some(q);
        res.map(|_| ())
    }

    pub fn dispatch_pending(&mut self) -> Result<usize> {
        let mut q = self.event_queue.take().context("event_queue missing")?;
        let res = q.dispatch_pending(self).context("dispatch_pending");
        self.event_queue = Some(q);
        res.map(|n| n as usize)
    }

    /// Poll the Wayland socket for readability with a timeout, so the run
    /// loop can observe the shutdown flag even when the compositor is silent.
    fn poll_wayland_readable(&self, timeout: Duration) -> Result<bool> {
        let fd = self.conn.backend().poll_fd().as_raw_fd();

        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };

        let timeout_ms: i32 = timeout.as_millis().min(i32::MAX as u128) as i32;

        let rc = unsafe { libc::poll(&mut pfd as *mut libc::pollfd, 1, timeout_ms) };
        if rc < 0 {
            let e = std::io::Error::last_os_error();
            if e.kind() == std::io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(e).context("poll wayland fd");
        }

        if rc == 0 {
            return Ok(false);
        }

        Ok((pfd.revents & libc::POLLIN) != 0)
    }

    fn dispatch_with_timeout(&mut self, timeout: Duration) -> Result<()> {
        if self.poll_wayland_readable(timeout)? {
            self.blocking_dispatch()?;
        }
        Ok(())
    }

    /// Bounds the layout engine should work from: the window manager's
    /// suggestion wins, otherwise the monitor's mode.
    pub(crate) fn current_bounds(&self) -> Option<(i32, i32)> {
        self.bounds
            .or_else(|| self.monitor.map(|m| (m.width, m.height)))
    }

    pub fn monitor(&self) -> Option<Monitor> {
        self.monitor
    }

    pub fn layout(&self) -> Option<Layout> {
        self.layout
    }

    pub fn last_warning(&self) -> Option<Recorded> {
        self.warnings.last()
    }

    /// Blocking event and render loop. Returns on clean shutdown or the
    /// first fatal error; teardown runs in both cases.
    pub fn run(&mut self) -> Result<()> {
        if self.backdrop.is_none() {
            bail!("run() called before create_window()");
        }
        if self.render_thread.is_none() {
            self.render_thread = Some(render::spawn(self.shared.clone())?);
        }

        let result = loop {
            if let Some(e) = self.fatal.take() {
                break Err(e);
            }
            if !self.shared.is_running() {
                break Ok(());
            }
            if let Err(e) = self.pump(Duration::from_millis(100)) {
                break Err(e);
            }
        };

        self.teardown();
        result
    }

    fn pump(&mut self, timeout: Duration) -> Result<()> {
        self.conn.flush().context("flush")?;
        self.dispatch_with_timeout(timeout)
    }

    /// Shutdown in reverse creation order: render worker, panels, backdrop,
    /// window-manager binding. The connection itself drops with the engine.
    fn teardown(&mut self) {
        self.shared.shutdown();
        if let Some(handle) = self.render_thread.take() {
            let _ = handle.join();
        }
        if self.backdrop.is_some() {
            self.destroy_window();
        }
        if let Some(wm_base) = self.wm_base.take() {
            wm_base.destroy();
        }
        let _ = self.conn.flush();
        el::info!("shell.shutdown");
    }
}

/* ---------- Dispatch ---------- */

impl Dispatch<wl_registry::WlRegistry, GlobalListContents> for Engine {
    fn event(
        _state: &mut Engine,
        _proxy: &wl_registry::WlRegistry,
        _event: wl_registry::Event,
        _data: &GlobalListContents,
        _conn: &Connection,
        _qh: &QueueHandle<Engine>,
    ) {
        // Global removal is deliberately unhandled.
    }
}

impl Dispatch<WlOutput, ()> for Engine {
    fn event(
        state: &mut Engine,
        _proxy: &WlOutput,
        event: wl_output::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Engine>,
    ) {
        if state.monitor.is_some() {
            // The record is immutable for the session once finalised.
            return;
        }

        match event {
            wl_output::Event::Geometry {
                physical_width,
                physical_height,
                ..
            } => {
                state.pending_monitor.physical_width = physical_width;
                state.pending_monitor.physical_height = physical_height;
            }
            wl_output::Event::Mode {
                flags,
                width,
                height,
                refresh,
            } => {
                let current = matches!(
                    flags,
                    WEnum::Value(f) if f.contains(wl_output::Mode::Current)
                );
                if current {
                    state.pending_monitor.width = width;
                    state.pending_monitor.height = height;
                    state.pending_monitor.refresh_mhz = refresh;
                }
            }
            wl_output::Event::Scale { factor } => {
                state.pending_monitor.scale = factor;
            }
            wl_output::Event::Done => {
                let monitor = state.pending_monitor.finalise();
                el::info!(
                    "monitor.done w={w} h={h} refresh={hz} scale={scale}",
                    w = monitor.width as i64,
                    h = monitor.height as i64,
                    hz = monitor.refresh_hz as i64,
                    scale = monitor.scale as i64
                );
                state.monitor = Some(monitor);

                // Everything needed is recorded; the proxy can go.
                if let Some(output) = state.output.take() {
                    if output.version() >= 3 {
                        output.release();
                    }
                }

                if state.bounds.is_none() {
                    if let Err(e) = state.apply_layout() {
                        state.fatal = Some(e);
                    }
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<XdgWmBase, ()> for Engine {
    fn event(
        _state: &mut Engine,
        proxy: &XdgWmBase,
        event: xdg_wm_base::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Engine>,
    ) {
        // Liveness ping: answer within the same dispatch or risk being
        // deemed unresponsive.
        if let xdg_wm_base::Event::Ping { serial } = event {
            proxy.pong(serial);
        }
    }
}

impl Dispatch<XdgSurface, ()> for Engine {
    fn event(
        state: &mut Engine,
        proxy: &XdgSurface,
        event: xdg_surface::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Engine>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            // Ack strictly before any buffer attach.
            proxy.ack_configure(serial);

            let first = match state.backdrop.as_mut() {
                Some(b) if b.xdg == *proxy => {
                    let first = !b.configured;
                    b.configured = true;
                    first
                }
                _ => false,
            };

            if first {
                if let Err(e) = state.on_backdrop_configured() {
                    state.fatal = Some(e);
                }
            }
        }
    }
}

impl Dispatch<XdgToplevel, ()> for Engine {
    fn event(
        state: &mut Engine,
        _proxy: &XdgToplevel,
        event: xdg_toplevel::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Engine>,
    ) {
        match event {
            xdg_toplevel::Event::Configure { .. } => {
                // Always fullscreen; the suggested size is ignored.
                if let Some(b) = state.backdrop.as_ref() {
                    b.toplevel.set_fullscreen(None);
                }
            }
            xdg_toplevel::Event::Close => {
                // Flag only; teardown happens in the run loop once the flag
                // is observed.
                state.shared.shutdown();
            }
            xdg_toplevel::Event::ConfigureBounds { width, height } => {
                if width <= 0 || height <= 0 {
                    el::debug!("toplevel.bounds_unknown");
                    return;
                }
                state.bounds = Some((width, height));
                if let Err(e) = state.apply_layout() {
                    state.fatal = Some(e);
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<WlBuffer, ()> for Engine {
    fn event(
        _state: &mut Engine,
        proxy: &WlBuffer,
        event: wl_buffer::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Engine>,
    ) {
        // Solid paints are one-shot; once the compositor is done with the
        // buffer it can be destroyed.
        if let wl_buffer::Event::Release = event {
            proxy.destroy();
        }
    }
}

wayland_client::delegate_noop!(Engine: ignore WlCompositor);
wayland_client::delegate_noop!(Engine: ignore WlSubcompositor);
wayland_client::delegate_noop!(Engine: ignore WlShm);
wayland_client::delegate_noop!(Engine: ignore WlShmPool);
wayland_client::delegate_noop!(Engine: ignore WlSurface);
wayland_client::delegate_noop!(Engine: ignore WlSubsurface);
wayland_client::delegate_noop!(Engine: ignore WlSeat);
