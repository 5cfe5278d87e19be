// License: MIT

//! Background render worker. A single persistent gate (mutex + condvar)
//! carries the "dimensions changed, redraw" signal; the GPU mutex serializes
//! the draw pass against layout-driven resizes on the main thread.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use anyhow::{Context as _, Result};
use eventline as el;
use glow::HasContext as _;

use crate::shell::gpu::GpuState;
use crate::shell::panel::Slot;

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug)]
struct Gate {
    dims_ready: bool,
    running: bool,
}

pub(crate) struct RenderShared {
    gate: Mutex<Gate>,
    cond: Condvar,
    gpu: Mutex<GpuState>,
}

impl RenderShared {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Mutex::new(Gate { dims_ready: false, running: true }),
            cond: Condvar::new(),
            gpu: Mutex::new(GpuState::default()),
        })
    }

    pub(crate) fn gpu_lock(&self) -> MutexGuard<'_, GpuState> {
        locked(&self.gpu)
    }

    pub(crate) fn gpu_ready(&self) -> bool {
        self.gpu_lock().instance.is_some()
    }

    pub(crate) fn is_running(&self) -> bool {
        locked(&self.gate).running
    }

    /// Clear the running flag and wake the worker so it can observe it.
    pub(crate) fn shutdown(&self) {
        locked(&self.gate).running = false;
        self.cond.notify_all();
    }

    /// One-shot "something changed" notification.
    pub(crate) fn signal_dimensions(&self) {
        locked(&self.gate).dims_ready = true;
        self.cond.notify_all();
    }

    /// Block until dimensions are signalled or the session shuts down.
    /// Returns false on shutdown. The predicate, not the signal, decides the
    /// wake, so spurious wakeups loop back into the wait.
    pub(crate) fn await_dimensions(&self) -> bool {
        let mut gate = locked(&self.gate);
        while gate.running && !gate.dims_ready {
            gate = self.cond.wait(gate).unwrap_or_else(|e| e.into_inner());
        }
        if !gate.running {
            return false;
        }
        gate.dims_ready = false;
        true
    }
}

/// Clear, flush and present every realized panel. Holds the GPU lock for the
/// whole pass; the context is rebound only when the driver's current read
/// surface differs from the panel's own.
fn draw_pass(gpu: &mut GpuState) -> Result<()> {
    let GpuState { instance, gl, slots } = gpu;
    let Some(inst) = instance.as_ref() else {
        return Ok(());
    };

    for slot in Slot::ALL {
        let Some(panel) = slots[slot.index()].as_ref() else {
            continue;
        };

        if inst.current_read_surface() != Some(panel.surface_ptr()) {
            inst.make_current(panel)
                .with_context(|| format!("make current for {}", slot.label()))?;
        }

        let gl = gl.get_or_insert_with(|| unsafe {
            glow::Context::from_loader_function(|name| inst.loader(name))
        });

        let [r, g, b] = slot.clear_colour();
        unsafe {
            gl.clear_color(r, g, b, 1.0);
            gl.clear(glow::COLOR_BUFFER_BIT);
            gl.flush();
        }

        inst.swap(panel)
            .with_context(|| format!("swap buffers for {}", slot.label()))?;
    }

    Ok(())
}

/// Spawn the render worker. Rendering-path failures are unrecoverable driver
/// or compositor desync, so the worker terminates the process on error.
pub(crate) fn spawn(shared: Arc<RenderShared>) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("triptych-render".into())
        .spawn(move || {
            el::debug!("render.thread started");
            while shared.await_dimensions() {
                let mut gpu = shared.gpu_lock();
                if let Err(e) = draw_pass(&mut gpu) {
                    el::error!("render.draw fatal error={err}", err = format!("{e:#}"));
                    std::process::exit(1);
                }
            }
            el::debug!("render.thread exiting");
        })
        .context("spawn render thread")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cancellation_wakes_blocked_worker_without_draw() {
        let shared = RenderShared::new();
        let worker = {
            let shared = shared.clone();
            thread::spawn(move || shared.await_dimensions())
        };

        // Give the worker time to block on the gate.
        thread::sleep(Duration::from_millis(50));
        shared.shutdown();

        let drew = worker.join().unwrap();
        assert!(!drew, "worker must observe shutdown instead of drawing");
    }

    #[test]
    fn signal_is_consumed_once() {
        let shared = RenderShared::new();
        shared.signal_dimensions();
        assert!(shared.await_dimensions());

        // The signal was consumed; with the session shut down the next wait
        // must not see stale readiness.
        shared.shutdown();
        assert!(!shared.await_dimensions());
    }

    #[test]
    fn shutdown_beats_pending_signal() {
        let shared = RenderShared::new();
        shared.signal_dimensions();
        shared.shutdown();
        // Running is checked first: a stopped session never reports work.
        assert!(!shared.await_dimensions());
    }
}
