// License: MIT

//! EGL plumbing for the per-panel rendering contexts. One display-level
//! instance for the session, one context per panel slot. EGL window surfaces
//! start at 1x1 and are resized once the layout engine has real dimensions,
//! since a zero-sized native surface is undefined behaviour in the driver.

use std::ffi::c_void;

use anyhow::{Context as _, Result, anyhow};
use khronos_egl as egl;
use wayland_client::{Connection, Proxy, protocol::wl_surface::WlSurface};
use wayland_egl::WlEglSurface;

use crate::shell::panel::Slot;

pub(crate) struct EglInstance {
    lib: egl::Instance<egl::Static>,
    display: egl::Display,
    config: egl::Config,
}

impl EglInstance {
    pub(crate) fn new(conn: &Connection) -> Result<Self> {
        let lib = egl::Instance::new(egl::Static);

        let wl_display = conn.display().id().as_ptr();
        let display = unsafe { lib.get_display(wl_display.cast()) }
            .ok_or_else(|| anyhow!("eglGetDisplay: no display for wayland connection"))?;
        lib.initialize(display).context("eglInitialize")?;

        let attribs = [
            egl::SURFACE_TYPE,
            egl::WINDOW_BIT,
            egl::RENDERABLE_TYPE,
            egl::OPENGL_ES2_BIT,
            egl::RED_SIZE,
            8,
            egl::GREEN_SIZE,
            8,
            egl::BLUE_SIZE,
            8,
            egl::NONE,
        ];
        let config = lib
            .choose_first_config(display, &attribs)
            .context("eglChooseConfig")?
            .ok_or_else(|| anyhow!("no EGL config supports a window surface"))?;

        Ok(Self { lib, display, config })
    }

    pub(crate) fn current_read_surface(&self) -> Option<*mut c_void> {
        self.lib
            .get_current_surface(egl::READ)
            .map(|s| s.as_ptr())
    }

    pub(crate) fn make_current(&self, panel: &PanelGpu) -> Result<()> {
        self.lib
            .make_current(
                self.display,
                Some(panel.surface),
                Some(panel.surface),
                Some(panel.context),
            )
            .context("eglMakeCurrent")
    }

    pub(crate) fn swap(&self, panel: &PanelGpu) -> Result<()> {
        self.lib
            .swap_buffers(self.display, panel.surface)
            .context("eglSwapBuffers")
    }

    pub(crate) fn loader(&self, name: &str) -> *const c_void {
        match self.lib.get_proc_address(name) {
            Some(f) => f as *const c_void,
            None => std::ptr::null(),
        }
    }
}

/// GPU-side state for one realized panel slot.
pub(crate) struct PanelGpu {
    // Must outlive the EGL surface created on top of it.
    native: WlEglSurface,
    surface: egl::Surface,
    context: egl::Context,
    pub(crate) width: i32,
    pub(crate) height: i32,
}

impl PanelGpu {
    pub(crate) fn new(instance: &EglInstance, surface: &WlSurface) -> Result<Self> {
        let context_attribs = [egl::CONTEXT_CLIENT_VERSION, 2, egl::NONE];
        let context = instance
            .lib
            .create_context(instance.display, instance.config, None, &context_attribs)
            .context("eglCreateContext")?;

        let native =
            WlEglSurface::new(surface.id(), 1, 1).context("wl_egl_window create")?;
        let egl_surface = unsafe {
            instance.lib.create_window_surface(
                instance.display,
                instance.config,
                native.ptr() as *mut c_void,
                None,
            )
        }
        .context("eglCreateWindowSurface")?;

        Ok(Self {
            native,
            surface: egl_surface,
            context,
            width: 1,
            height: 1,
        })
    }

    pub(crate) fn surface_ptr(&self) -> *mut c_void {
        self.surface.as_ptr()
    }

    pub(crate) fn resize(&mut self, width: i32, height: i32) {
        if width <= 0 || height <= 0 || (width, height) == (self.width, self.height) {
            return;
        }
        self.native.resize(width, height, 0, 0);
        self.width = width;
        self.height = height;
    }

    /// Tear down in the strict order context, then EGL surface; the native
    /// wl_egl_window drops last.
    pub(crate) fn destroy(self, instance: &EglInstance) {
        let _ = instance.lib.destroy_context(instance.display, self.context);
        let _ = instance.lib.destroy_surface(instance.display, self.surface);
    }
}

#[derive(Default)]
pub(crate) struct GpuState {
    pub(crate) instance: Option<EglInstance>,
    pub(crate) gl: Option<glow::Context>,
    pub(crate) slots: [Option<PanelGpu>; Slot::ALL.len()],
}

// EGL handles are process-global driver state; every access to this struct is
// serialized behind the render mutex.
unsafe impl Send for GpuState {}
